use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::FormPage;

/// 1バッチ（または1件のジャンプ）で使うブラウザセッション
///
/// `close` で明示的に終了する。終了し損ねても Drop でタスクを止め、
/// chromiumoxide の `Browser` が子プロセスを終了させる。
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    dialog: Arc<Mutex<Option<String>>>,
    handler_task: JoinHandle<()>,
    dialog_task: JoinHandle<()>,
}

impl ChromiumSession {
    /// ブラウザを起動して空ページを開く
    pub async fn launch(config: &ScraperConfig, headless: bool) -> Result<Self, ScraperError> {
        info!("ブラウザを初期化中... (headless={})", headless);

        let mut builder = BrowserConfig::builder().window_size(1280, 900);

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("ブラウザイベント: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // alert/confirm は文言を記録して閉じる（開いたままだとページ操作が止まる）
        let mut dialogs = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("ダイアログ監視エラー: {}", e)))?;
        let dialog = Arc::new(Mutex::new(None));
        let slot = dialog.clone();
        let dialog_page = page.clone();
        let dialog_task = tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                debug!("ダイアログ表示: {}", event.message);
                *slot.lock().await = Some(event.message.clone());
                if let Err(e) = dialog_page
                    .execute(HandleJavaScriptDialogParams::new(true))
                    .await
                {
                    debug!("ダイアログを閉じられません: {}", e);
                }
            }
        });

        info!("ブラウザ初期化完了");
        Ok(Self {
            browser,
            page,
            dialog,
            handler_task,
            dialog_task,
        })
    }

    /// ブラウザを終了する
    pub async fn close(mut self) {
        info!("ブラウザを終了中...");
        self.dialog_task.abort();

        if let Err(e) = self.browser.close().await {
            debug!("ブラウザ終了エラー: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("ブラウザ終了待ちエラー: {}", e);
        }
        self.handler_task.abort();

        info!("ブラウザ終了完了");
    }

    /// セレクタを JS 文字列リテラルにする
    fn js_selector(selector: &str) -> Result<String, ScraperError> {
        serde_json::to_string(selector).map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn eval_bool(&self, script: &str) -> Result<bool, ScraperError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<bool>()
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.dialog_task.abort();
        self.handler_task.abort();
    }
}

#[async_trait]
impl FormPage for ChromiumSession {
    async fn open(&self, url: &str) -> Result<(), ScraperError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool, ScraperError> {
        let script = format!(
            "document.querySelector({}) !== null",
            Self::js_selector(selector)?
        );
        self.eval_bool(&script).await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), ScraperError> {
        let clear = format!(
            r#"
            (function() {{
                var el = document.querySelector({});
                if (!el) return false;
                el.value = '';
                return true;
            }})()
            "#,
            Self::js_selector(selector)?
        );
        if !self.eval_bool(&clear).await? {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }

        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", selector, e)))?
            .type_str(value)
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", selector, e)))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", selector, e)))?;
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<(), ScraperError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .focus()
            .await
            .map_err(|e| ScraperError::JavaScript(format!("{}: {}", selector, e)))?;
        Ok(())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, ScraperError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .attribute(name)
            .await
            .map_err(|e| ScraperError::JavaScript(format!("{}[{}]: {}", selector, name, e)))
    }

    async fn capture(&self, selector: &str) -> Result<Vec<u8>, ScraperError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| ScraperError::JavaScript(format!("{} screenshot: {}", selector, e)))
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        self.page
            .url()
            .await
            .map(|url| url.unwrap_or_default())
            .map_err(|e| ScraperError::Navigation(e.to_string()))
    }

    async fn content(&self) -> Result<String, ScraperError> {
        self.page
            .content()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))
    }

    async fn take_dialog(&self) -> Option<String> {
        self.dialog.lock().await.take()
    }
}

//! 手動 CAPTCHA 入力の待機
//!
//! 人がブラウザ上で CAPTCHA を入力して送信するのを待つ。
//! URL の変化、または CAPTCHA 入力欄の消失で送信済みと判断する。

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

use crate::control::WalkControl;
use crate::record::BatchResult;
use crate::traits::FormPage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualOutcome {
    /// ページが変化した（送信された）
    Submitted,
    /// 「CAPTCHA不正」の通知を検出
    Rejected(String),
    TimedOut,
    SkipRequested,
    ExitRequested,
}

/// 手動入力を待つ
///
/// `timeout` を過ぎるまで `poll` 間隔で確認する。スキップ / 終了要求も毎回確認する。
pub async fn wait_for_manual_entry(
    page: &dyn FormPage,
    control: &WalkControl,
    captcha_selector: &str,
    invalid_markers: &[String],
    timeout: Duration,
    poll: Duration,
    batch: &mut BatchResult,
) -> ManualOutcome {
    if let Err(e) = page.focus(captcha_selector).await {
        debug!("CAPTCHA入力欄にフォーカスできません: {}", e);
    }

    let initial_url = page.current_url().await.unwrap_or_default();
    let started = Instant::now();

    loop {
        if control.exit_requested() {
            return ManualOutcome::ExitRequested;
        }
        if control.take_skip() {
            return ManualOutcome::SkipRequested;
        }

        if let Some(message) = page.take_dialog().await {
            batch.note(format!("Alert detected: {}", message));
            let lowered = message.to_lowercase();
            if invalid_markers
                .iter()
                .any(|m| lowered.contains(&m.to_lowercase()))
            {
                return ManualOutcome::Rejected(message);
            }
        }

        let url_changed = match page.current_url().await {
            Ok(url) => url != initial_url,
            Err(e) => {
                debug!("URL確認エラー: {}", e);
                false
            }
        };
        let form_gone = match page.has_element(captcha_selector).await {
            Ok(present) => !present,
            Err(e) => {
                debug!("CAPTCHA入力欄の確認エラー: {}", e);
                false
            }
        };
        if url_changed || form_gone {
            return ManualOutcome::Submitted;
        }

        if started.elapsed() >= timeout {
            return ManualOutcome::TimedOut;
        }
        sleep(poll).await;
    }
}

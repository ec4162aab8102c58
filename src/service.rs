use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Serialize;
use tower::Service;
use tracing::info;

use crate::browser::ChromiumSession;
use crate::captcha::{RemoteResolver, TwoCaptchaClient};
use crate::config::ScraperConfig;
use crate::control::WalkControl;
use crate::error::ScraperError;
use crate::export::Exporter;
use crate::identifier::{capped_identifier_range, Identifier};
use crate::record::StudentSummary;
use crate::traits::CaptchaResolver;
use crate::walker::{BatchWalker, CaptchaMode, WalkOutcome};

/// スクレイピングリクエスト（識別子範囲）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub start: String,
    pub end: String,
    pub mode: CaptchaMode,
    /// 未指定なら設定値に従う
    pub headless: Option<bool>,
}

impl ScrapeRequest {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            mode: CaptchaMode::Auto,
            headless: None,
        }
    }

    /// 1件だけ取得する
    pub fn single(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self::new(identifier.clone(), identifier)
    }

    pub fn with_mode(mut self, mode: CaptchaMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }
}

/// リクエストを実行可能な形に解決したもの
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub identifiers: Vec<Identifier>,
    pub mode: CaptchaMode,
    pub headless: bool,
}

/// スクレイピング結果
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub students: Vec<StudentSummary>,
    pub log: Vec<String>,
    /// 結果が1件も無ければ `None`
    pub export_path: Option<PathBuf>,
    /// 終了要求で打ち切られた（部分結果）
    pub aborted: bool,
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// 1リクエストごとにブラウザを起動し、終了時に必ず閉じる。
#[derive(Debug, Clone)]
pub struct ScraperService {
    config: Arc<ScraperConfig>,
    control: WalkControl,
}

impl Default for ScraperService {
    fn default() -> Self {
        Self::new(ScraperConfig::default())
    }
}

impl ScraperService {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config: Arc::new(config),
            control: WalkControl::new(),
        }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// 実行中の走査を外から止めるためのハンドル
    pub fn control(&self) -> WalkControl {
        self.control.clone()
    }

    /// 識別子の列挙、CAPTCHA モードとヘッドレス可否を決める
    ///
    /// APIキーが無ければ自動モードは手動に落ちる。手動モードは常にヘッドあり。
    pub fn plan(&self, req: &ScrapeRequest) -> Result<RunPlan, ScraperError> {
        let identifiers = capped_identifier_range(
            &req.start,
            &req.end,
            &self.config.identifier_format,
            self.config.max_batch_size,
        )?;

        let mode = match req.mode {
            CaptchaMode::Auto if !self.config.has_api_key() => {
                info!("APIキー未設定のため手動CAPTCHAモードで実行します");
                CaptchaMode::Manual
            }
            mode => mode,
        };
        let headless = match mode {
            CaptchaMode::Manual => false,
            CaptchaMode::Auto => req.headless.unwrap_or(self.config.headless),
        };

        Ok(RunPlan {
            identifiers,
            mode,
            headless,
        })
    }
}

fn build_resolver(
    config: &ScraperConfig,
    mode: CaptchaMode,
    control: &WalkControl,
) -> Result<Option<RemoteResolver<TwoCaptchaClient>>, ScraperError> {
    if mode == CaptchaMode::Manual {
        return Ok(None);
    }
    let key = config.captcha_api_key.clone().unwrap_or_default();
    let client = TwoCaptchaClient::new(&config.captcha_service_url, key)?;
    Ok(Some(
        RemoteResolver::new(
            client,
            config.timings.captcha_poll_interval,
            config.timings.captcha_max_polls,
        )
        .with_control(control.clone()),
    ))
}

/// 走査結果をエクスポートし、呼び出し側向けの結果にする
pub fn finish(config: &ScraperConfig, outcome: WalkOutcome) -> Result<ScrapeResult, ScraperError> {
    let aborted = outcome.aborted();
    let (records, log) = outcome.result.into_parts();

    let export_path = Exporter::new(&config.output_dir).export(&records)?;

    Ok(ScrapeResult {
        students: records.iter().map(StudentSummary::from).collect(),
        log,
        export_path,
        aborted,
    })
}

async fn execute(
    config: Arc<ScraperConfig>,
    control: WalkControl,
    plan: RunPlan,
) -> Result<ScrapeResult, ScraperError> {
    let resolver = build_resolver(&config, plan.mode, &control)?;
    let walker = BatchWalker::new(&config, control)?.with_headless(plan.headless);

    let session = ChromiumSession::launch(&config, plan.headless).await?;
    let outcome = walker
        .walk(
            &session,
            resolver.as_ref().map(|r| r as &dyn CaptchaResolver),
            &plan.identifiers,
            plan.mode,
        )
        .await;
    session.close().await;

    finish(&config, outcome)
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!(
            "スクレイピングリクエスト受信: {}..{} ({:?})",
            req.start, req.end, req.mode
        );

        let config = self.config.clone();
        let control = self.control.clone();
        let plan = self.plan(&req);

        Box::pin(async move {
            let plan = plan?;
            control.reset();

            let result = execute(config, control, plan).await?;

            info!(
                "スクレイピング完了: students={}, path={:?}, aborted={}",
                result.students.len(),
                result.export_path,
                result.aborted
            );

            Ok(result)
        })
    }
}

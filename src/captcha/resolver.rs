//! 解決サービスを使った自動 CAPTCHA 解決

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::types::{CaptchaError, CaptchaImage, CaptchaTask, PollStatus};
use crate::control::WalkControl;
use crate::traits::CaptchaResolver;

/// 投入 / ポーリングの2操作を持つ外部解決サービス
#[async_trait]
pub trait SolveService: Send + Sync {
    /// 画像を投入し、ジョブIDを得る
    async fn submit(&self, image_base64: &str) -> Result<String, CaptchaError>;

    /// ジョブの状態を問い合わせる
    async fn poll(&self, job_id: &str) -> Result<PollStatus, CaptchaError>;
}

/// 投入後、一定間隔で最大回数までポーリングする
///
/// 失敗しても内部では再試行しない。再試行は走査側が識別子単位で行う
/// （CAPTCHA はページ読み込みごとに作り直されるため）。
///
/// `with_control` を設定すると、ポーリングの合間にスキップ / 終了要求を確認する。
pub struct RemoteResolver<S> {
    service: S,
    poll_interval: Duration,
    max_polls: u32,
    control: Option<WalkControl>,
}

impl<S: SolveService> RemoteResolver<S> {
    pub fn new(service: S, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            service,
            poll_interval,
            max_polls,
            control: None,
        }
    }

    pub fn with_control(mut self, control: WalkControl) -> Self {
        self.control = Some(control);
        self
    }

    /// スキップ要求は走査側で消費するため、ここでは参照するだけ
    fn cancel_requested(&self) -> bool {
        self.control
            .as_ref()
            .is_some_and(|c| c.exit_requested() || c.skip_requested())
    }

    async fn drive(&self, task: &mut CaptchaTask) {
        if task.image_base64().is_empty() {
            task.fail(CaptchaError::EmptyImage("画像データが空です".into()));
            return;
        }

        info!("CAPTCHAを解決サービスへ送信中...");
        let job_id = match self.service.submit(task.image_base64()).await {
            Ok(id) => id,
            Err(e) => {
                warn!("CAPTCHA送信失敗: {}", e);
                task.fail(e);
                return;
            }
        };
        info!("CAPTCHA送信完了. ジョブID: {}", job_id);

        for attempt in 1..=self.max_polls {
            if self.cancel_requested() {
                info!("中断要求のためCAPTCHA解決を中止します");
                task.fail(CaptchaError::Cancelled);
                return;
            }
            sleep(self.poll_interval).await;
            match self.service.poll(&job_id).await {
                Ok(PollStatus::Ready(text)) => {
                    info!("CAPTCHA解決完了 (ポーリング{}回目)", attempt);
                    task.solve(text);
                    return;
                }
                Ok(PollStatus::NotReady) => {
                    debug!("CAPTCHA未解決 ({}/{})", attempt, self.max_polls);
                }
                Err(e) => {
                    warn!("CAPTCHA解決失敗: {}", e);
                    task.fail(e);
                    return;
                }
            }
        }

        task.fail(CaptchaError::TimedOut(self.max_polls));
    }
}

#[async_trait]
impl<S: SolveService> CaptchaResolver for RemoteResolver<S> {
    async fn resolve(&self, image: &CaptchaImage) -> Result<String, CaptchaError> {
        let mut task = CaptchaTask::new(image);
        self.drive(&mut task).await;
        task.into_result()
    }
}

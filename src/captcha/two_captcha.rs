//! 2Captcha 互換の解決サービスクライアント
//!
//! `in.php` にジョブを投入し、`res.php` で結果をポーリングする。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::resolver::SolveService;
use super::types::{CaptchaError, PollStatus};

const NOT_READY: &str = "CAPCHA_NOT_READY";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ServiceReply {
    status: i64,
    request: String,
}

/// サービスの JSON 応答を解釈する
///
/// `status == 1` なら `request` が結果（ジョブIDまたは解答）。
/// それ以外は `request` がエラーコード。
pub fn parse_reply(body: &str) -> Result<PollStatus, CaptchaError> {
    let reply: ServiceReply = serde_json::from_str(body)
        .map_err(|e| CaptchaError::Transport(format!("応答を解析できません: {} ({})", e, body)))?;

    if reply.status == 1 {
        Ok(PollStatus::Ready(reply.request))
    } else if reply.request.contains(NOT_READY) {
        Ok(PollStatus::NotReady)
    } else {
        Err(CaptchaError::from_code(&reply.request))
    }
}

#[derive(Debug, Clone)]
pub struct TwoCaptchaClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl TwoCaptchaClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, CaptchaError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CaptchaError::MissingKey("APIキーが設定されていません".into()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CaptchaError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn read_reply(response: reqwest::Response) -> Result<PollStatus, CaptchaError> {
        let body = response
            .error_for_status()
            .map_err(|e| CaptchaError::Transport(e.to_string()))?
            .text()
            .await
            .map_err(|e| CaptchaError::Transport(e.to_string()))?;
        debug!("解決サービス応答: {}", body);
        parse_reply(&body)
    }
}

#[async_trait]
impl SolveService for TwoCaptchaClient {
    async fn submit(&self, image_base64: &str) -> Result<String, CaptchaError> {
        let response = self
            .http
            .post(format!("{}/in.php", self.base_url))
            .form(&[
                ("key", self.api_key.as_str()),
                ("method", "base64"),
                ("body", image_base64),
                ("json", "1"),
            ])
            .send()
            .await
            .map_err(|e| CaptchaError::Transport(e.to_string()))?;

        match Self::read_reply(response).await? {
            PollStatus::Ready(job_id) => Ok(job_id),
            PollStatus::NotReady => Err(CaptchaError::Service(NOT_READY.into())),
        }
    }

    async fn poll(&self, job_id: &str) -> Result<PollStatus, CaptchaError> {
        let response = self
            .http
            .get(format!("{}/res.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", job_id),
                ("json", "1"),
            ])
            .send()
            .await
            .map_err(|e| CaptchaError::Transport(e.to_string()))?;

        Self::read_reply(response).await
    }
}

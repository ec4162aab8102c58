//! CAPTCHA 関連の型定義

use base64::Engine;
use thiserror::Error;

/// 解決サービスの終端エラー、または通信失敗
///
/// どれも呼び出し側では「未解決」として同じに扱う。リモートのコードは診断用にそのまま保持する。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptchaError {
    #[error("APIキーが無効または未設定: {0}")]
    MissingKey(String),

    #[error("残高不足: {0}")]
    ZeroBalance(String),

    #[error("解決ワーカーの空きなし: {0}")]
    NoCapacity(String),

    #[error("画像が空: {0}")]
    EmptyImage(String),

    #[error("解決サービスエラー: {0}")]
    Service(String),

    #[error("通信エラー: {0}")]
    Transport(String),

    #[error("{0}回ポーリングしても解決されませんでした")]
    TimedOut(u32),

    #[error("CAPTCHA画像を取得できません: {0}")]
    ImageUnavailable(String),

    #[error("スキップ / 終了要求により解決を中止しました")]
    Cancelled,
}

impl CaptchaError {
    /// サービスが返すエラーコードを分類する
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_string();
        match code.as_str() {
            "ERROR_WRONG_USER_KEY" | "ERROR_KEY_DOES_NOT_EXIST" => Self::MissingKey(code),
            "ERROR_ZERO_BALANCE" => Self::ZeroBalance(code),
            "ERROR_NO_SLOT_AVAILABLE" => Self::NoCapacity(code),
            "ERROR_ZERO_CAPTCHA_FILESIZE" | "ERROR_EMPTY_ACTION" => Self::EmptyImage(code),
            _ => Self::Service(code),
        }
    }
}

/// ポーリング結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Ready(String),
    NotReady,
}

/// CAPTCHA 画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaImage {
    /// `data:` URI から取り出した base64 本体
    Inline(String),
    /// ブラウザ上で撮影した生の画像バイト列
    Raw(Vec<u8>),
}

impl CaptchaImage {
    /// `<img src>` が data URI なら base64 部分を取り出す
    pub fn from_data_uri(src: &str) -> Option<Self> {
        let src = src.trim();
        if !src.starts_with("data:") || !src.contains("base64") {
            return None;
        }
        src.split_once(',')
            .map(|(_, body)| Self::Inline(body.trim().to_string()))
    }

    pub fn to_base64(&self) -> String {
        match self {
            Self::Inline(body) => body.clone(),
            Self::Raw(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Inline(body) => body.is_empty(),
            Self::Raw(bytes) => bytes.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaState {
    Pending,
    Solved(String),
    Failed(CaptchaError),
}

/// 1回のフォーム送信分のCAPTCHA。永続化しない。
#[derive(Debug, Clone)]
pub struct CaptchaTask {
    image: String,
    state: CaptchaState,
}

impl CaptchaTask {
    pub fn new(image: &CaptchaImage) -> Self {
        Self {
            image: image.to_base64(),
            state: CaptchaState::Pending,
        }
    }

    pub fn image_base64(&self) -> &str {
        &self.image
    }

    pub fn state(&self) -> &CaptchaState {
        &self.state
    }

    pub fn solve(&mut self, text: String) {
        self.state = CaptchaState::Solved(text);
    }

    pub fn fail(&mut self, error: CaptchaError) {
        self.state = CaptchaState::Failed(error);
    }

    pub fn into_result(self) -> Result<String, CaptchaError> {
        match self.state {
            CaptchaState::Solved(text) => Ok(text),
            CaptchaState::Failed(error) => Err(error),
            CaptchaState::Pending => Err(CaptchaError::Service("task left pending".into())),
        }
    }
}

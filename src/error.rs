use thiserror::Error;

use crate::captcha::CaptchaError;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("不正な識別子: {0}")]
    InvalidIdentifier(String),

    #[error("不正なセレクタ: {0}")]
    InvalidSelector(String),

    #[error("CAPTCHAエラー: {0}")]
    Captcha(#[from] CaptchaError),

    #[error("エクスポートエラー: {0}")]
    Export(#[from] csv::Error),
}

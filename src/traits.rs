use async_trait::async_trait;

use crate::captcha::{CaptchaError, CaptchaImage};
use crate::error::ScraperError;

/// 走査が必要とするブラウザページの操作
///
/// 実ブラウザ（`ChromiumSession`）とテスト用の偽ページが実装する。
#[async_trait]
pub trait FormPage: Send + Sync {
    /// URLへ遷移
    async fn open(&self, url: &str) -> Result<(), ScraperError>;

    /// セレクタに一致する要素があるか
    async fn has_element(&self, selector: &str) -> Result<bool, ScraperError>;

    /// 入力欄をクリアして値を入力
    async fn fill(&self, selector: &str, value: &str) -> Result<(), ScraperError>;

    async fn click(&self, selector: &str) -> Result<(), ScraperError>;

    async fn focus(&self, selector: &str) -> Result<(), ScraperError>;

    /// 要素の属性値
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, ScraperError>;

    /// 要素のPNGスクリーンショット
    async fn capture(&self, selector: &str) -> Result<Vec<u8>, ScraperError>;

    async fn current_url(&self) -> Result<String, ScraperError>;

    /// 現在のHTML
    async fn content(&self) -> Result<String, ScraperError>;

    /// 前回呼び出し以降に表示された alert/confirm の文言を取り出す
    async fn take_dialog(&self) -> Option<String>;
}

/// CAPTCHA画像からテキストを得る
#[async_trait]
pub trait CaptchaResolver: Send + Sync {
    async fn resolve(&self, image: &CaptchaImage) -> Result<String, CaptchaError>;
}

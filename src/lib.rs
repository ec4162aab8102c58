//! 大学試験結果ポータルのバッチ取得ライブラリ
//!
//! - 識別子範囲を1件ずつフォームに入力し、CAPTCHA を解いて結果ページを取得
//! - 結果ページから学生情報・科目表を抽出
//! - バッチ全体を1つの表（CSV）にエクスポート
//!
//! # 使用例
//!
//! ```rust,ignore
//! use exam_results_scraper::{CaptchaMode, ScrapeRequest, ScraperConfig, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::from_env().with_output_dir("./results");
//!     let mut service = ScraperService::new(config);
//!
//!     let request = ScrapeRequest::new("1", "10").with_mode(CaptchaMode::Auto);
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("Students: {}", result.students.len());
//!     println!("CSV: {:?}", result.export_path);
//! }
//! ```
//!
//! # 走査の中断
//!
//! ```rust,ignore
//! let control = service.control();
//! // 別タスクから
//! control.request_skip(); // 現在の識別子を飛ばす
//! control.request_exit(); // 終了して部分結果を保存
//! ```

pub mod browser;
pub mod captcha;
pub mod config;
pub mod control;
pub mod demo;
pub mod error;
pub mod export;
pub mod extract;
pub mod identifier;
pub mod record;
pub mod service;
pub mod traits;
pub mod walker;

#[cfg(test)]
mod testing;

// 主要な型をリエクスポート
pub use browser::ChromiumSession;
pub use captcha::{CaptchaError, CaptchaImage};
pub use config::{FormSelectors, ScraperConfig, WalkTimings};
pub use control::WalkControl;
pub use error::ScraperError;
pub use export::{ExportSchema, Exporter};
pub use extract::PageExtractor;
pub use identifier::{capped_identifier_range, identifier_range, Identifier, IdentifierFormat};
pub use record::{BatchResult, StudentRecord, StudentSummary, SubjectEntry};
pub use service::{ScrapeRequest, ScrapeResult, ScraperService};
pub use traits::{CaptchaResolver, FormPage};
pub use walker::{BatchWalker, CaptchaMode, WalkOutcome};

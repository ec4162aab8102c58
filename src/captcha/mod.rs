//! CAPTCHA 解決
//!
//! - 外部解決サービスへの投入 + ポーリング（自動）
//! - 人手による入力待ち（手動）

mod manual;
mod resolver;
mod two_captcha;
mod types;

pub use manual::{wait_for_manual_entry, ManualOutcome};
pub use resolver::{RemoteResolver, SolveService};
pub use two_captcha::{parse_reply, TwoCaptchaClient};
pub use types::{CaptchaError, CaptchaImage, CaptchaState, CaptchaTask, PollStatus};

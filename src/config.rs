use std::path::PathBuf;
use std::time::Duration;

use crate::identifier::IdentifierFormat;

const DEFAULT_FORM_URL: &str = "https://results.vtu.ac.in/DJcbcs25/index.php";
const DEFAULT_CAPTCHA_SERVICE_URL: &str = "https://2captcha.com";

/// 待機・ポーリング関連の時間設定
///
/// 値は対象サイトに合わせて経験的に決めたもの。別サイトでは調整が必要。
#[derive(Debug, Clone, PartialEq)]
pub struct WalkTimings {
    /// 入力フォームが描画されるまでの最大待機
    pub form_wait: Duration,
    /// フォーム描画確認の間隔
    pub form_poll: Duration,
    /// 送信後、ページ判定までの固定待機
    pub settle: Duration,
    /// 手動CAPTCHA入力の最大待機
    pub manual_captcha_timeout: Duration,
    /// 手動CAPTCHA入力中の状態確認間隔
    pub manual_poll: Duration,
    /// CAPTCHA解決サービスのポーリング間隔
    pub captcha_poll_interval: Duration,
    /// CAPTCHA解決サービスの最大ポーリング回数
    pub captcha_max_polls: u32,
}

impl Default for WalkTimings {
    fn default() -> Self {
        Self {
            form_wait: Duration::from_secs(10),
            form_poll: Duration::from_millis(500),
            settle: Duration::from_secs(3),
            manual_captcha_timeout: Duration::from_secs(60),
            manual_poll: Duration::from_millis(500),
            captcha_poll_interval: Duration::from_secs(5),
            captcha_max_polls: 30,
        }
    }
}

impl WalkTimings {
    /// すべての待機をゼロにした設定（テスト・デモ用）
    pub fn immediate() -> Self {
        Self {
            form_wait: Duration::ZERO,
            form_poll: Duration::ZERO,
            settle: Duration::ZERO,
            manual_captcha_timeout: Duration::ZERO,
            manual_poll: Duration::ZERO,
            captcha_poll_interval: Duration::ZERO,
            captcha_max_polls: 30,
        }
    }
}

/// フォーム要素の探索順セレクタとページ判定マーカー
#[derive(Debug, Clone, PartialEq)]
pub struct FormSelectors {
    pub identifier_input: Vec<String>,
    pub captcha_input: Vec<String>,
    pub captcha_image: Vec<String>,
    pub submit: Vec<String>,
    /// 入力フォーム上に居ることを示す文字列（どれか1つでも含まれればフォーム上）
    pub form_markers: Vec<String>,
    /// 「CAPTCHA不正」通知の文言
    pub invalid_captcha_markers: Vec<String>,
}

impl Default for FormSelectors {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            identifier_input: owned(&[
                "input[placeholder='ENTER USN']",
                "input[name='lns']",
                "input.form-control[type='text']",
                "input[minlength='10'][maxlength='10']",
            ]),
            captcha_input: owned(&[
                "input[placeholder='CAPTCHA CODE']",
                "input[name='captchacode']",
                "input.form-control[type='text']:not([placeholder='ENTER USN'])",
            ]),
            captcha_image: owned(&["img[alt='CAPTCHA code']", "img[src*='captcha']"]),
            submit: owned(&[
                "input[type='submit']",
                "button[type='submit']",
                "button.btn-primary",
                "input.btn-primary",
            ]),
            form_markers: owned(&["ENTER USN", "captchacode"]),
            invalid_captcha_markers: owned(&["Invalid captcha", "Wrong captcha"]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub form_url: String,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub identifier_format: IdentifierFormat,
    pub max_batch_size: Option<usize>,
    pub captcha_api_key: Option<String>,
    pub captcha_service_url: String,
    /// 自動解決に失敗したとき、ヘッドありなら手動入力待ちに切り替える
    pub manual_fallback: bool,
    /// 同一識別子に対するCAPTCHA再試行回数（初回を含まない）
    pub retry_budget: u32,
    pub timings: WalkTimings,
    pub selectors: FormSelectors,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            form_url: DEFAULT_FORM_URL.to_string(),
            headless: true,
            chrome_path: None,
            output_dir: PathBuf::from("./results"),
            identifier_format: IdentifierFormat::default(),
            max_batch_size: None,
            captcha_api_key: None,
            captcha_service_url: DEFAULT_CAPTCHA_SERVICE_URL.to_string(),
            manual_fallback: false,
            retry_budget: 3,
            timings: WalkTimings::default(),
            selectors: FormSelectors::default(),
        }
    }
}

impl ScraperConfig {
    pub fn new(form_url: impl Into<String>) -> Self {
        Self {
            form_url: form_url.into(),
            ..Default::default()
        }
    }

    /// 環境変数で既定値を上書きする。解析できない値は既定値のまま。
    pub fn from_env() -> Self {
        let default = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            form_url: var("RESULTS_FORM_URL").unwrap_or(default.form_url),
            headless: var("HEADLESS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.headless),
            chrome_path: var("CHROME_PATH").map(PathBuf::from).or(default.chrome_path),
            output_dir: var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.output_dir),
            identifier_format: IdentifierFormat {
                default_prefix: var("IDENTIFIER_PREFIX")
                    .unwrap_or(default.identifier_format.default_prefix),
                ..default.identifier_format
            },
            max_batch_size: var("MAX_BATCH_SIZE")
                .and_then(|v| v.parse().ok())
                .or(default.max_batch_size),
            captcha_api_key: var("CAPTCHA_API_KEY").or(default.captcha_api_key),
            captcha_service_url: var("CAPTCHA_SERVICE_URL").unwrap_or(default.captcha_service_url),
            retry_budget: var("CAPTCHA_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.retry_budget),
            ..default
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.captcha_api_key = Some(key.into());
        self
    }

    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    pub fn with_retry_budget(mut self, retries: u32) -> Self {
        self.retry_budget = retries;
        self
    }

    pub fn with_manual_fallback(mut self, enabled: bool) -> Self {
        self.manual_fallback = enabled;
        self
    }

    pub fn with_timings(mut self, timings: WalkTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_selectors(mut self, selectors: FormSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// 自動解決に使えるAPIキーが設定されているか
    pub fn has_api_key(&self) -> bool {
        self.captcha_api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

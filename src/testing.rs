//! テスト用の偽ページ・偽ソルバー

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::captcha::{CaptchaError, CaptchaImage};
use crate::control::WalkControl;
use crate::error::ScraperError;
use crate::traits::{CaptchaResolver, FormPage};

pub(crate) const FORM_URL: &str = "https://portal.test/index.php";

const FORM_PAGE: &str = r#"<html><body><form>
  <input placeholder="ENTER USN" name="lns">
  <input placeholder="CAPTCHA CODE" name="captchacode">
  <img alt="CAPTCHA code" src="/captcha_new.php">
  <input type="submit" value="SUBMIT">
</form></body></html>"#;

/// 既定セレクタで見つかるフォーム要素
pub(crate) const PORTAL_ELEMENTS: [&str; 4] = [
    "input[name='lns']",
    "input[name='captchacode']",
    "img[src*='captcha']",
    "input[type='submit']",
];

/// 1件分の科目表を持つ結果ページ
pub(crate) fn result_page(identifier: &str, name: &str) -> String {
    format!(
        r#"<html><body>
  <table>
    <tr><td>University Seat Number</td><td>: {identifier}</td></tr>
    <tr><td>Student Name</td><td>: {name}</td></tr>
  </table>
  <div><b>Semester : 5</b></div>
  <div class="divTable">
    <div class="divTableRow">
      <div class="divTableCell">Subject Code</div><div class="divTableCell">Subject Name</div>
      <div class="divTableCell">Internal</div><div class="divTableCell">External</div>
      <div class="divTableCell">Total</div><div class="divTableCell">Result</div>
    </div>
    <div class="divTableRow">
      <div class="divTableCell">21CS51</div><div class="divTableCell">Automata Theory</div>
      <div class="divTableCell">45</div><div class="divTableCell">38</div>
      <div class="divTableCell">83</div><div class="divTableCell">P</div>
    </div>
  </div>
</body></html>"#
    )
}

/// 送信に対するポータルの応答
#[derive(Debug, Clone)]
pub(crate) enum Response {
    /// 結果ページへ遷移
    Results(String),
    /// フォームに戻る（CAPTCHA不正）
    Reject,
    /// alert を出してフォームに留まる
    Alert(String),
}

/// 手動入力モードでの利用者の振る舞い（CAPTCHA欄にフォーカスした時点で起きる）
#[derive(Debug, Clone)]
pub(crate) enum ManualUser {
    Submits,
    Ignores,
    Alerts(String),
    /// 最初の識別子ではスキップ要求を出し、以降は送信する
    SkipsFirstThenSubmits(WalkControl),
}

#[derive(Debug, Default)]
struct State {
    on_form: bool,
    url: String,
    body: String,
    dialog: Option<String>,
    fills_since_open: Vec<(String, String)>,
    last_fills: HashMap<String, String>,
    opens: usize,
    focuses: usize,
    submissions: HashMap<String, usize>,
    results_served: usize,
}

/// 識別子ごとの応答を台本どおりに返す偽ポータル
pub(crate) struct FakePage {
    elements: Vec<String>,
    responses: HashMap<String, Vec<Response>>,
    manual: ManualUser,
    captcha_src: Option<String>,
    exit_after_results: Option<(usize, WalkControl)>,
    state: Mutex<State>,
}

impl FakePage {
    /// 指定した要素だけを持つフォームを表示済みのページ
    pub(crate) fn with_elements(elements: &[&str]) -> Self {
        let page = Self {
            elements: elements.iter().map(|s| s.to_string()).collect(),
            responses: HashMap::new(),
            manual: ManualUser::Ignores,
            captcha_src: None,
            exit_after_results: None,
            state: Mutex::new(State::default()),
        };
        page.show_form();
        page
    }

    /// 既定セレクタで操作できるポータル
    pub(crate) fn portal() -> Self {
        Self::with_elements(&PORTAL_ELEMENTS)
    }

    pub(crate) fn respond(mut self, identifier: &str, responses: Vec<Response>) -> Self {
        self.responses.insert(identifier.to_string(), responses);
        self
    }

    pub(crate) fn manual_user(mut self, user: ManualUser) -> Self {
        self.manual = user;
        self
    }

    pub(crate) fn captcha_src(mut self, src: &str) -> Self {
        self.captcha_src = Some(src.to_string());
        self
    }

    /// 結果ページを n 回返した時点で終了要求を出す
    pub(crate) fn exit_after_results(mut self, n: usize, control: WalkControl) -> Self {
        self.exit_after_results = Some((n, control));
        self
    }

    pub(crate) fn opens(&self) -> usize {
        self.lock().opens
    }

    pub(crate) fn submissions(&self, identifier: &str) -> usize {
        self.lock().submissions.get(identifier).copied().unwrap_or(0)
    }

    /// セレクタに最後に入力された値
    pub(crate) fn filled(&self, selector: &str) -> Option<String> {
        self.lock().last_fills.get(selector).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn show_form(&self) {
        let mut state = self.lock();
        state.on_form = true;
        state.url = FORM_URL.to_string();
        state.body = FORM_PAGE.to_string();
        state.fills_since_open.clear();
    }

    fn present(&self, selector: &str) -> bool {
        self.lock().on_form && self.elements.iter().any(|e| e == selector)
    }

    fn require(&self, selector: &str) -> Result<(), ScraperError> {
        if self.present(selector) {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound(selector.to_string()))
        }
    }

    /// 最初に入力された値を識別子とみなして台本の応答を適用する
    fn submit(&self) {
        let mut state = self.lock();
        let identifier = state
            .fills_since_open
            .first()
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        let count = state.submissions.entry(identifier.clone()).or_insert(0);
        let index = *count;
        *count += 1;

        let response = self
            .responses
            .get(&identifier)
            .and_then(|script| script.get(index).or_else(|| script.last()))
            .cloned()
            .unwrap_or_else(|| Response::Results("<html><body>No records</body></html>".into()));

        match response {
            Response::Results(html) => {
                state.on_form = false;
                state.url = format!("{}?result", FORM_URL);
                state.body = html;
                state.results_served += 1;
                if let Some((n, control)) = &self.exit_after_results {
                    if state.results_served >= *n {
                        control.request_exit();
                    }
                }
            }
            Response::Reject => {
                state.body = FORM_PAGE.to_string();
            }
            Response::Alert(message) => {
                state.dialog = Some(message);
            }
        }
    }
}

#[async_trait]
impl FormPage for FakePage {
    async fn open(&self, _url: &str) -> Result<(), ScraperError> {
        self.lock().opens += 1;
        self.show_form();
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool, ScraperError> {
        Ok(self.present(selector))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), ScraperError> {
        self.require(selector)?;
        let mut state = self.lock();
        state
            .fills_since_open
            .push((selector.to_string(), value.to_string()));
        state
            .last_fills
            .insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        self.require(selector)?;
        self.submit();
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<(), ScraperError> {
        self.require(selector)?;
        let focuses = {
            let mut state = self.lock();
            state.focuses += 1;
            state.focuses
        };
        match &self.manual {
            ManualUser::Submits => self.submit(),
            ManualUser::Ignores => {}
            ManualUser::Alerts(message) => self.lock().dialog = Some(message.clone()),
            ManualUser::SkipsFirstThenSubmits(control) if focuses == 1 => control.request_skip(),
            ManualUser::SkipsFirstThenSubmits(_) => self.submit(),
        }
        Ok(())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, ScraperError> {
        self.require(selector)?;
        Ok(match name {
            "src" => self.captcha_src.clone(),
            _ => None,
        })
    }

    async fn capture(&self, selector: &str) -> Result<Vec<u8>, ScraperError> {
        self.require(selector)?;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.lock().url.clone())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(self.lock().body.clone())
    }

    async fn take_dialog(&self) -> Option<String> {
        self.lock().dialog.take()
    }
}

/// 用意した答えを順に返す偽ソルバー（尽きたら固定の答え）
pub(crate) struct FakeResolver {
    answers: Mutex<VecDeque<Result<String, CaptchaError>>>,
    images: Mutex<Vec<CaptchaImage>>,
    calls: AtomicUsize,
    skip_first: Option<WalkControl>,
}

impl FakeResolver {
    pub(crate) fn new() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            images: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            skip_first: None,
        }
    }

    pub(crate) fn failing(error: CaptchaError) -> Self {
        let resolver = Self::new();
        resolver.answers.lock().unwrap().push_back(Err(error));
        resolver
    }

    /// 最初の解決中にスキップ要求が届く。中断された解決サービスと同じく `Cancelled` を返す。
    pub(crate) fn skipping_first(control: WalkControl) -> Self {
        Self {
            skip_first: Some(control),
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn images(&self) -> Vec<CaptchaImage> {
        self.images.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptchaResolver for FakeResolver {
    async fn resolve(&self, image: &CaptchaImage) -> Result<String, CaptchaError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.images.lock().unwrap().push(image.clone());
        if let (0, Some(control)) = (call, &self.skip_first) {
            control.request_skip();
            return Err(CaptchaError::Cancelled);
        }
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("X7K2P".to_string()))
    }
}

//! 識別子範囲の走査
//!
//! 識別子ごとにフォームを開き直し、入力 → CAPTCHA → 送信 → 判定 → 抽出を行う。
//! CAPTCHA が拒否された場合だけ同じ識別子を再試行する。それ以外の失敗は記録して次へ進む。

use std::ops::ControlFlow;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::SelectorChain;
use crate::captcha::{wait_for_manual_entry, CaptchaError, CaptchaImage, ManualOutcome};
use crate::config::{FormSelectors, ScraperConfig, WalkTimings};
use crate::control::WalkControl;
use crate::error::ScraperError;
use crate::extract::PageExtractor;
use crate::identifier::Identifier;
use crate::record::BatchResult;
use crate::traits::{CaptchaResolver, FormPage};

/// CAPTCHA の解き方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaMode {
    /// 解決サービスに任せる
    Auto,
    /// 人がブラウザ上で入力する
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    ExitRequested,
}

/// 走査の結果。終了要求で打ち切った場合も、それまでの結果を持つ。
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub result: BatchResult,
    pub abort: Option<AbortReason>,
}

impl WalkOutcome {
    pub fn aborted(&self) -> bool {
        self.abort.is_some()
    }
}

/// 1回の試行の結末
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// この識別子は終わり（取得・データなし・スキップのいずれも）
    Finished,
    /// CAPTCHA が拒否された
    Rejected,
    ExitRequested,
}

pub struct BatchWalker {
    form_url: String,
    selectors: FormSelectors,
    timings: WalkTimings,
    retry_budget: u32,
    manual_fallback: bool,
    headless: bool,
    extractor: PageExtractor,
    control: WalkControl,
}

impl BatchWalker {
    pub fn new(config: &ScraperConfig, control: WalkControl) -> Result<Self, ScraperError> {
        Ok(Self {
            form_url: config.form_url.clone(),
            selectors: config.selectors.clone(),
            timings: config.timings.clone(),
            retry_budget: config.retry_budget,
            manual_fallback: config.manual_fallback,
            headless: config.headless,
            extractor: PageExtractor::new()?,
            control,
        })
    }

    /// 実際のブラウザがヘッドレスかどうか（手動フォールバックの可否に使う）
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn control(&self) -> &WalkControl {
        &self.control
    }

    /// 識別子を順に処理する
    ///
    /// 個々の失敗は `BatchResult` のログに残るだけで、走査自体は失敗しない。
    pub async fn walk(
        &self,
        page: &dyn FormPage,
        resolver: Option<&dyn CaptchaResolver>,
        identifiers: &[Identifier],
        mode: CaptchaMode,
    ) -> WalkOutcome {
        let mut batch = BatchResult::new();
        let mut abort = None;
        let total = identifiers.len();

        batch.note(format!(
            "Starting batch of {} identifiers ({:?} CAPTCHA mode)",
            total, mode
        ));

        'identifiers: for (index, identifier) in identifiers.iter().enumerate() {
            self.control.clear_skip();
            let mut retries = 0;

            loop {
                if self.control.exit_requested() {
                    abort = Some(AbortReason::ExitRequested);
                    break 'identifiers;
                }

                if retries == 0 {
                    batch.note(format!(
                        "Processing {} ({}/{})...",
                        identifier,
                        index + 1,
                        total
                    ));
                } else {
                    batch.note(format!(
                        "Retrying {} (Attempt {}/{})...",
                        identifier,
                        retries + 1,
                        self.retry_budget + 1
                    ));
                }

                match self
                    .attempt(page, resolver, identifier, mode, &mut batch)
                    .await
                {
                    Attempt::Finished => break,
                    Attempt::Rejected if retries < self.retry_budget => retries += 1,
                    Attempt::Rejected => {
                        batch.note(format!(
                            "Maximum CAPTCHA retries ({}) reached for {}. Moving to next identifier.",
                            self.retry_budget + 1,
                            identifier
                        ));
                        break;
                    }
                    Attempt::ExitRequested => {
                        abort = Some(AbortReason::ExitRequested);
                        break 'identifiers;
                    }
                }
            }
        }

        if abort.is_some() {
            batch.note("Process terminated by user. Saving partial results.");
        }
        batch.note(format!(
            "Batch finished: {} of {} identifiers returned results",
            batch.len(),
            total
        ));

        WalkOutcome {
            result: batch,
            abort,
        }
    }

    async fn attempt(
        &self,
        page: &dyn FormPage,
        resolver: Option<&dyn CaptchaResolver>,
        identifier: &Identifier,
        mode: CaptchaMode,
        batch: &mut BatchResult,
    ) -> Attempt {
        let id = identifier.to_string();

        if let Err(e) = page.open(&self.form_url).await {
            batch.note(format!("Error loading form for {}: {}", id, e));
            return Attempt::Finished;
        }
        // 前のページで出た alert は判定に使わない
        while let Some(stale) = page.take_dialog().await {
            debug!("前ページのダイアログを破棄: {}", stale);
        }

        let id_selector = match self.wait_for_form(page).await {
            Ok(selector) => selector,
            Err(e) => {
                batch.note(format!(
                    "Could not find the identifier input for {} ({}). Skipping.",
                    id, e
                ));
                return Attempt::Finished;
            }
        };
        if let Err(e) = page.fill(id_selector, &id).await {
            batch.note(format!("Error entering identifier {}: {}", id, e));
            return Attempt::Finished;
        }

        if let ControlFlow::Break(outcome) = self.check_control(&id, batch) {
            return outcome;
        }

        let captcha_chain = SelectorChain::new("CAPTCHA input", &self.selectors.captcha_input);
        let Some(captcha_selector) = captcha_chain.locate(page).await else {
            batch.note(format!(
                "Could not find the CAPTCHA input for {}. Skipping.",
                id
            ));
            return Attempt::Finished;
        };

        let entered = match mode {
            CaptchaMode::Manual => self.await_manual(page, captcha_selector, &id, batch).await,
            CaptchaMode::Auto => {
                self.solve_and_submit(page, resolver, captcha_selector, &id, batch)
                    .await
            }
        };
        if let ControlFlow::Break(outcome) = entered {
            return outcome;
        }

        sleep(self.timings.settle).await;
        self.classify(page, &id, batch).await
    }

    /// 識別子入力欄が現れるまで待つ
    async fn wait_for_form(&self, page: &dyn FormPage) -> Result<&str, ScraperError> {
        let chain = SelectorChain::new("identifier input", &self.selectors.identifier_input);
        let started = Instant::now();
        loop {
            if let Some(selector) = chain.locate(page).await {
                return Ok(selector);
            }
            if started.elapsed() >= self.timings.form_wait {
                return Err(ScraperError::Timeout(format!(
                    "{}が{:?}以内に表示されません",
                    chain.label(),
                    self.timings.form_wait
                )));
            }
            sleep(self.timings.form_poll).await;
        }
    }

    fn check_control(&self, id: &str, batch: &mut BatchResult) -> ControlFlow<Attempt> {
        if self.control.exit_requested() {
            return ControlFlow::Break(Attempt::ExitRequested);
        }
        if self.control.take_skip() {
            batch.note(format!("Skipping {} at user request", id));
            return ControlFlow::Break(Attempt::Finished);
        }
        ControlFlow::Continue(())
    }

    /// 人の入力と送信を待つ。送信されたら `Continue`。
    async fn await_manual(
        &self,
        page: &dyn FormPage,
        captcha_selector: &str,
        id: &str,
        batch: &mut BatchResult,
    ) -> ControlFlow<Attempt> {
        batch.note(format!(
            "Waiting for manual CAPTCHA entry for {} (up to {}s)...",
            id,
            self.timings.manual_captcha_timeout.as_secs()
        ));

        let outcome = wait_for_manual_entry(
            page,
            &self.control,
            captcha_selector,
            &self.selectors.invalid_captcha_markers,
            self.timings.manual_captcha_timeout,
            self.timings.manual_poll,
            batch,
        )
        .await;

        match outcome {
            ManualOutcome::Submitted => ControlFlow::Continue(()),
            ManualOutcome::Rejected(_) => {
                batch.note(format!("Invalid CAPTCHA entered for {}", id));
                ControlFlow::Break(Attempt::Rejected)
            }
            ManualOutcome::TimedOut => {
                batch.note(format!(
                    "Manual CAPTCHA entry timed out for {}. Skipping.",
                    id
                ));
                ControlFlow::Break(Attempt::Finished)
            }
            ManualOutcome::SkipRequested => {
                batch.note(format!("Skipping {} at user request", id));
                ControlFlow::Break(Attempt::Finished)
            }
            ManualOutcome::ExitRequested => ControlFlow::Break(Attempt::ExitRequested),
        }
    }

    /// 解決サービスで解いて送信する。解けなければ手動フォールバックかスキップ。
    async fn solve_and_submit(
        &self,
        page: &dyn FormPage,
        resolver: Option<&dyn CaptchaResolver>,
        captcha_selector: &str,
        id: &str,
        batch: &mut BatchResult,
    ) -> ControlFlow<Attempt> {
        let solved = match resolver {
            Some(resolver) => match self.captcha_image(page).await {
                Ok(image) => resolver.resolve(&image).await,
                Err(e) => Err(e),
            },
            None => Err(CaptchaError::MissingKey(
                "解決サービスが設定されていません".into(),
            )),
        };

        if let ControlFlow::Break(outcome) = self.check_control(id, batch) {
            return ControlFlow::Break(outcome);
        }

        let text = match solved {
            Ok(text) => text,
            Err(e) => {
                batch.note(format!("Failed to solve CAPTCHA for {}: {}", id, e));
                if self.manual_fallback && !self.headless {
                    batch.note("Falling back to manual CAPTCHA entry");
                    return self.await_manual(page, captcha_selector, id, batch).await;
                }
                batch.note(format!("Skipping {}", id));
                return ControlFlow::Break(Attempt::Finished);
            }
        };
        batch.note(format!("CAPTCHA solved: {}", text));

        if let Err(e) = page.fill(captcha_selector, &text).await {
            batch.note(format!("Error entering CAPTCHA for {}: {}", id, e));
            return ControlFlow::Break(Attempt::Finished);
        }

        let submit_chain = SelectorChain::new("submit button", &self.selectors.submit);
        let Some(submit) = submit_chain.locate(page).await else {
            batch.note(format!(
                "Could not find the submit button for {}. Skipping.",
                id
            ));
            return ControlFlow::Break(Attempt::Finished);
        };
        if let Err(e) = page.click(submit).await {
            batch.note(format!("Error submitting form for {}: {}", id, e));
            return ControlFlow::Break(Attempt::Finished);
        }

        ControlFlow::Continue(())
    }

    /// CAPTCHA 画像。data URI ならそのまま、そうでなければ要素を撮影する。
    async fn captcha_image(&self, page: &dyn FormPage) -> Result<CaptchaImage, CaptchaError> {
        let chain = SelectorChain::new("CAPTCHA image", &self.selectors.captcha_image);
        let Some(selector) = chain.locate(page).await else {
            return Err(CaptchaError::ImageUnavailable(
                "CAPTCHA画像が見つかりません".into(),
            ));
        };

        match page.attribute(selector, "src").await {
            Ok(Some(src)) => {
                if let Some(image) = CaptchaImage::from_data_uri(&src) {
                    return Ok(image);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("CAPTCHA画像のsrc取得失敗: {}", e),
        }

        page.capture(selector)
            .await
            .map(CaptchaImage::Raw)
            .map_err(|e| CaptchaError::ImageUnavailable(e.to_string()))
    }

    /// 送信後のページを判定する。フォームに戻っていれば拒否、そうでなければ抽出。
    async fn classify(&self, page: &dyn FormPage, id: &str, batch: &mut BatchResult) -> Attempt {
        let mut rejected = false;
        if let Some(message) = page.take_dialog().await {
            batch.note(format!("Alert detected: {}", message));
            rejected = contains_any(&message, &self.selectors.invalid_captcha_markers);
        }

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                batch.note(format!("Error reading result page for {}: {}", id, e));
                return Attempt::Finished;
            }
        };

        if rejected || self.selectors.form_markers.iter().any(|m| html.contains(m.as_str())) {
            warn!("送信後も入力フォームのまま: {}", id);
            batch.note(format!("Invalid CAPTCHA for {}", id));
            return Attempt::Rejected;
        }

        let extraction = self.extractor.extract_traced(&html, id);
        for note in extraction.notes {
            batch.note(note);
        }

        let record = extraction.record;
        if record.has_data() {
            batch.note(format!("Successfully extracted results for {}", id));
            batch.push(record);
        } else {
            batch.note(format!("No results data found for {}", id));
        }
        Attempt::Finished
    }
}

fn contains_any(text: &str, markers: &[String]) -> bool {
    let lowered = text.to_lowercase();
    markers.iter().any(|m| lowered.contains(&m.to_lowercase()))
}

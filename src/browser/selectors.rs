use tracing::debug;

use crate::traits::FormPage;

/// 同じ要素を指す複数のセレクタを優先順に試す
///
/// 最初に一致したセレクタを返す。ページ側のエラーは「不一致」として扱う。
#[derive(Debug, Clone, Copy)]
pub struct SelectorChain<'a> {
    label: &'a str,
    selectors: &'a [String],
}

impl<'a> SelectorChain<'a> {
    pub fn new(label: &'a str, selectors: &'a [String]) -> Self {
        Self { label, selectors }
    }

    pub fn label(&self) -> &'a str {
        self.label
    }

    pub async fn locate(&self, page: &dyn FormPage) -> Option<&'a str> {
        for selector in self.selectors {
            match page.has_element(selector).await {
                Ok(true) => {
                    debug!("{} を検出: {}", self.label, selector);
                    return Some(selector.as_str());
                }
                Ok(false) => {}
                Err(e) => debug!("セレクタ確認失敗 '{}': {}", selector, e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;

    #[tokio::test]
    async fn test_first_matching_selector_wins() {
        let page = FakePage::with_elements(&["input[name='lns']", "input.form-control[type='text']"]);
        let selectors = vec![
            "input[placeholder='ENTER USN']".to_string(),
            "input[name='lns']".to_string(),
            "input.form-control[type='text']".to_string(),
        ];
        let chain = SelectorChain::new("identifier input", &selectors);
        assert_eq!(chain.locate(&page).await, Some("input[name='lns']"));
    }

    #[tokio::test]
    async fn test_no_match_returns_none() {
        let page = FakePage::with_elements(&[]);
        let selectors = vec!["input[name='captchacode']".to_string()];
        let chain = SelectorChain::new("captcha input", &selectors);
        assert_eq!(chain.locate(&page).await, None);
        assert_eq!(chain.label(), "captcha input");
    }
}

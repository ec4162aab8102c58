/// 名前付きの候補関数を優先順に評価し、最初に `Some` を返したものを採用する
pub struct StrategyList<'a, I: ?Sized, O> {
    strategies: Vec<(&'static str, Box<dyn Fn(&I) -> Option<O> + 'a>)>,
}

impl<'a, I: ?Sized, O> StrategyList<'a, I, O> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, name: &'static str, strategy: impl Fn(&I) -> Option<O> + 'a) -> Self {
        self.strategies.push((name, Box::new(strategy)));
        self
    }

    /// 最初に成功した戦略名と結果
    pub fn first(&self, input: &I) -> Option<(&'static str, O)> {
        self.strategies
            .iter()
            .find_map(|(name, strategy)| strategy(input).map(|out| (*name, out)))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<I: ?Sized, O> Default for StrategyList<'_, I, O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_success_wins_in_order() {
        let list = StrategyList::<str, usize>::new()
            .then("never", |_| None)
            .then("length", |s| Some(s.len()))
            .then("constant", |_| Some(99));
        assert_eq!(list.first("abcd"), Some(("length", 4)));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_all_fail_returns_none() {
        let list = StrategyList::<str, usize>::new().then("never", |_| None);
        assert_eq!(list.first("abcd"), None);
        assert!(StrategyList::<str, usize>::default().is_empty());
    }
}

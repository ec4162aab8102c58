//! ブラウザセッションとフォーム要素の探索

mod chromium;
mod selectors;

pub use chromium::ChromiumSession;
pub use selectors::SelectorChain;

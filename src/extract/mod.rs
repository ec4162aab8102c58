//! 結果ページの抽出
//!
//! ページ構造は対象サイト側で変わり得るため、複数の構造パターンを優先順に試し、
//! 取れた範囲で結果を返す。

mod grid;
mod page;
mod strategy;

pub use grid::GridPattern;
pub use page::{Extraction, PageExtractor};
pub use strategy::StrategyList;

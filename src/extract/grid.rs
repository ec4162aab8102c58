use scraper::{ElementRef, Html, Selector};

use crate::error::ScraperError;

/// 表構造のパターン（コンテナ / 行 / セル）
#[derive(Debug, Clone)]
pub struct GridPattern {
    name: &'static str,
    container: Selector,
    row: Selector,
    cell: Selector,
}

fn parse_selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::InvalidSelector(format!("{}: {}", css, e)))
}

impl GridPattern {
    pub fn new(
        name: &'static str,
        container: &str,
        row: &str,
        cell: &str,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            name,
            container: parse_selector(container)?,
            row: parse_selector(row)?,
            cell: parse_selector(cell)?,
        })
    }

    /// `div.divTable` による疑似テーブル
    pub fn div_table() -> Result<Self, ScraperError> {
        Self::new("divTable", "div.divTable", "div.divTableRow", "div.divTableCell")
    }

    /// 通常の `<table>`
    pub fn html_table() -> Result<Self, ScraperError> {
        Self::new("table", "table", "tr", "td, th")
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 文書中のコンテナを出現順に
    pub fn containers<'d>(&self, doc: &'d Html) -> Vec<ElementRef<'d>> {
        doc.select(&self.container).collect()
    }

    /// コンテナ内の行をセル文字列の列として
    pub fn rows_in(&self, container: ElementRef<'_>) -> Vec<Vec<String>> {
        container.select(&self.row).map(|row| self.cells(row)).collect()
    }

    /// 文書中のすべての行（コンテナを問わない）
    pub fn all_rows(&self, doc: &Html) -> Vec<Vec<String>> {
        doc.select(&self.row).map(|row| self.cells(row)).collect()
    }

    fn cells(&self, row: ElementRef<'_>) -> Vec<String> {
        row.select(&self.cell).map(element_text).collect()
    }
}

/// 要素のテキスト（空白を1つに詰めて前後を除去）
fn element_text(el: ElementRef<'_>) -> String {
    normalize(&el.text().collect::<String>())
}

pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

use std::collections::BTreeMap;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::grid::{normalize, GridPattern};
use super::strategy::StrategyList;
use crate::error::ScraperError;
use crate::record::{StudentRecord, SubjectEntry};

const IDENTIFIER_LABEL: &str = "University Seat Number";
const NAME_LABEL: &str = "Student Name";
const SUBJECT_CODE_HEADER: &str = "Subject Code";
const SUBJECT_NAME_HEADER: &str = "Subject Name";
const MIN_SUBJECT_CELLS: usize = 6;

/// 抽出結果と、どの戦略で取れたかの記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: StudentRecord,
    pub notes: Vec<String>,
}

/// 結果ページから学生情報・学期・科目表を取り出す
///
/// 数値範囲や合否の整合性は検証しない。セルの文字列はそのまま保持する。
pub struct PageExtractor {
    grids: Vec<GridPattern>,
    semester_re: Regex,
    div: Selector,
}

impl PageExtractor {
    /// 既定の表パターン（divTable → table の順）で作る
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_grids(vec![GridPattern::div_table()?, GridPattern::html_table()?])
    }

    pub fn with_grids(grids: Vec<GridPattern>) -> Result<Self, ScraperError> {
        let semester_re = Regex::new(r"Semester\s*:\s*(\d+)")
            .map_err(|e| ScraperError::InvalidSelector(e.to_string()))?;
        let div = Selector::parse("div")
            .map_err(|e| ScraperError::InvalidSelector(e.to_string()))?;
        Ok(Self {
            grids,
            semester_re,
            div,
        })
    }

    /// ページから1件分のレコードを作る
    pub fn extract(&self, html: &str, fallback_identifier: &str) -> StudentRecord {
        self.extract_traced(html, fallback_identifier).record
    }

    pub fn extract_traced(&self, html: &str, fallback_identifier: &str) -> Extraction {
        let doc = Html::parse_document(html);
        let mut notes = Vec::new();

        let (identifier, name) = self.student_info(&doc);
        let identifier = match identifier {
            Some(id) => {
                notes.push(format!("Found identifier: {}", id));
                id
            }
            None => fallback_identifier.to_string(),
        };
        let mut record = StudentRecord::new(identifier);

        if let Some(name) = name {
            notes.push(format!("Found student name: {}", name));
            record = record.with_name(name);
        }

        let semester = StrategyList::<Html, String>::new()
            .then("semester block", |doc| self.semester_from_blocks(doc))
            .then("page text", |doc| self.semester_from_text(doc))
            .first(&doc);
        if let Some((source, semester)) = semester {
            notes.push(format!("Found semester: {} ({})", semester, source));
            record = record.with_semester(semester);
        }

        let subjects = StrategyList::<Html, (&'static str, BTreeMap<String, SubjectEntry>)>::new()
            .then("labeled grid", |doc| self.subjects_from_labeled_grid(doc))
            .then("row scan", |doc| self.subjects_from_row_scan(doc))
            .first(&doc);
        match subjects {
            Some((strategy, (grid, subjects))) => {
                notes.push(format!(
                    "Found {} subjects via {} ({})",
                    subjects.len(),
                    strategy,
                    grid
                ));
                for (code, entry) in subjects {
                    record = record.with_subject(code, entry);
                }
            }
            None => notes.push("No subject grid found".to_string()),
        }

        debug!("抽出メモ: {:?}", notes);
        Extraction { record, notes }
    }

    /// 2セル行のラベルから識別子と氏名を探す（それぞれ最初の一致を採用）
    fn student_info(&self, doc: &Html) -> (Option<String>, Option<String>) {
        let mut identifier = None;
        let mut name = None;

        for grid in &self.grids {
            for cells in grid.all_rows(doc) {
                if cells.len() < 2 {
                    continue;
                }
                let value = strip_label(&cells[1]);
                if value.is_empty() {
                    continue;
                }
                if identifier.is_none() && cells[0].contains(IDENTIFIER_LABEL) {
                    identifier = Some(value);
                } else if name.is_none() && cells[0].contains(NAME_LABEL) {
                    name = Some(value);
                }
            }
        }

        (identifier, name)
    }

    /// 直下のテキストに "Semester" を含む div から探す
    fn semester_from_blocks(&self, doc: &Html) -> Option<String> {
        doc.select(&self.div)
            .map(own_text)
            .filter(|text| text.contains("Semester"))
            .find_map(|text| self.capture_semester(&text))
    }

    fn semester_from_text(&self, doc: &Html) -> Option<String> {
        let text = normalize(&doc.root_element().text().collect::<Vec<_>>().join(" "));
        self.capture_semester(&text)
    }

    fn capture_semester(&self, text: &str) -> Option<String> {
        self.semester_re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// 見出し行に "Subject Code" と "Subject Name" を持つ表
    fn subjects_from_labeled_grid(
        &self,
        doc: &Html,
    ) -> Option<(&'static str, BTreeMap<String, SubjectEntry>)> {
        for grid in &self.grids {
            for container in grid.containers(doc) {
                let rows = grid.rows_in(container);
                let Some(header) = rows.first() else {
                    continue;
                };
                let labeled = header.iter().any(|h| h == SUBJECT_CODE_HEADER)
                    && header.iter().any(|h| h == SUBJECT_NAME_HEADER);
                if !labeled {
                    continue;
                }

                let subjects: BTreeMap<_, _> = rows
                    .iter()
                    .skip(1)
                    .filter(|cells| cells.len() >= MIN_SUBJECT_CELLS)
                    .filter_map(|cells| subject_from_cells(cells))
                    .collect();
                if !subjects.is_empty() {
                    return Some((grid.name(), subjects));
                }
            }
        }
        None
    }

    /// 先頭セルが英数字混在の行をすべて科目行とみなす
    fn subjects_from_row_scan(
        &self,
        doc: &Html,
    ) -> Option<(&'static str, BTreeMap<String, SubjectEntry>)> {
        self.grids.iter().find_map(|grid| {
            let subjects: BTreeMap<_, _> = grid
                .all_rows(doc)
                .iter()
                .filter(|cells| cells.len() >= MIN_SUBJECT_CELLS && looks_like_code(&cells[0]))
                .filter_map(|cells| subject_from_cells(cells))
                .collect();
            (!subjects.is_empty()).then_some((grid.name(), subjects))
        })
    }
}

fn subject_from_cells(cells: &[String]) -> Option<(String, SubjectEntry)> {
    let code = cells.first()?.trim();
    if code.is_empty() {
        return None;
    }
    Some((code.to_string(), SubjectEntry::from_cells(&cells[1..])))
}

/// 英字と数字の両方を含むか
fn looks_like_code(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic()) && text.chars().any(|c| c.is_ascii_digit())
}

/// "ラベル: 値" 形式なら値部分だけ
fn strip_label(value: &str) -> String {
    match value.split_once(':') {
        Some((_, rest)) => rest.trim().to_string(),
        None => value.trim().to_string(),
    }
}

/// 子要素を除いた直下のテキスト
fn own_text(el: ElementRef<'_>) -> String {
    let text: String = el
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect();
    normalize(&text)
}

//! 結果レコード関連の型定義

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

/// 1科目分の成績。値はすべてページ上の文字列そのまま（数値とは限らない）。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubjectEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Internal")]
    pub internal: String,
    #[serde(rename = "External")]
    pub external: String,
    #[serde(rename = "Total")]
    pub total: String,
    #[serde(rename = "Result")]
    pub result: String,
}

impl SubjectEntry {
    /// 行のセル列（科目コードを除いた5セル）から作る
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            name: cell(0),
            internal: cell(1),
            external: cell(2),
            total: cell(3),
            result: cell(4),
        }
    }
}

/// 1識別子分の抽出結果
///
/// 生成後は変更しない。識別子以外のキーが無いのは「ページに無かった」ことを表す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "Identifier")]
    identifier: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "Semester", skip_serializing_if = "Option::is_none")]
    semester: Option<String>,
    #[serde(rename = "Subjects")]
    subjects: BTreeMap<String, SubjectEntry>,
}

impl StudentRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: None,
            semester: None,
            subjects: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_semester(mut self, semester: impl Into<String>) -> Self {
        self.semester = Some(semester.into());
        self
    }

    /// 科目を追加する。同じコードが既にあれば上書き。
    pub fn with_subject(mut self, code: impl Into<String>, entry: SubjectEntry) -> Self {
        self.subjects.insert(code.into(), entry);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn semester(&self) -> Option<&str> {
        self.semester.as_deref()
    }

    pub fn subjects(&self) -> &BTreeMap<String, SubjectEntry> {
        &self.subjects
    }

    pub fn subject(&self, code: &str) -> Option<&SubjectEntry> {
        self.subjects.get(code)
    }

    /// 科目が1件以上あるか
    pub fn has_data(&self) -> bool {
        !self.subjects.is_empty()
    }

    pub fn summary(&self) -> StudentSummary {
        StudentSummary::from(self)
    }
}

/// 呼び出し側向けの要約（合計点と総合判定）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    #[serde(rename = "Identifier")]
    pub identifier: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Semester")]
    pub semester: String,
    /// 数値として読める Total の合計
    #[serde(rename = "Total")]
    pub total: String,
    /// 全科目が "P" なら PASS
    #[serde(rename = "Result")]
    pub result: String,
    #[serde(rename = "Subjects")]
    pub subjects: Vec<SubjectSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(flatten)]
    pub entry: SubjectEntry,
}

impl From<&StudentRecord> for StudentSummary {
    fn from(record: &StudentRecord) -> Self {
        let total: i64 = record
            .subjects
            .values()
            .filter_map(|s| s.total.trim().parse::<i64>().ok())
            .sum();
        let passed = record.subjects.values().all(|s| s.result.trim() == "P");

        Self {
            identifier: record.identifier.clone(),
            name: record.name.clone().unwrap_or_default(),
            semester: record.semester.clone().unwrap_or_default(),
            total: total.to_string(),
            result: if passed { "PASS" } else { "FAIL" }.to_string(),
            subjects: record
                .subjects
                .iter()
                .map(|(code, entry)| SubjectSummary {
                    code: code.clone(),
                    entry: entry.clone(),
                })
                .collect(),
        }
    }
}

/// 1回の走査で蓄積した結果とログ
///
/// レコードは追記のみ。走査中に単調増加し、エクスポート時に一度だけ消費する。
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    records: Vec<StudentRecord>,
    log: Vec<String>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: StudentRecord) {
        self.records.push(record);
    }

    /// 進捗・診断行を記録する（tracing にも出す）
    pub fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.log.push(line);
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_parts(self) -> (Vec<StudentRecord>, Vec<String>) {
        (self.records, self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(total: &str, result: &str) -> SubjectEntry {
        SubjectEntry {
            name: "Subject".into(),
            internal: "18".into(),
            external: "50".into(),
            total: total.into(),
            result: result.into(),
        }
    }

    #[test]
    fn test_record_without_subjects_has_no_data() {
        let record = StudentRecord::new("1AT22CS001").with_name("Someone");
        assert!(!record.has_data());
        assert_eq!(record.identifier(), "1AT22CS001");

        let record = record.with_subject("21CS51", entry("70", "P"));
        assert!(record.has_data());
    }

    #[test]
    fn test_summary_sums_numeric_totals_and_judges_pass() {
        let record = StudentRecord::new("1AT22CS001")
            .with_subject("21CS51", entry("70", "P"))
            .with_subject("21CS52", entry("81", "P"))
            .with_subject("21CS53", entry("AB", "P"));
        let summary = record.summary();
        assert_eq!(summary.total, "151");
        assert_eq!(summary.result, "PASS");
        assert_eq!(summary.subjects.len(), 3);
        assert_eq!(summary.name, "");
    }

    #[test]
    fn test_summary_fails_on_any_non_pass_flag() {
        let record = StudentRecord::new("1AT22CS005")
            .with_subject("21CS51", entry("70", "P"))
            .with_subject("21CS54", entry("30", "F"));
        assert_eq!(record.summary().result, "FAIL");
    }

    #[test]
    fn test_subject_entry_from_short_cells_pads_empty() {
        let cells = vec!["Name".to_string(), "10".to_string()];
        let entry = SubjectEntry::from_cells(&cells);
        assert_eq!(entry.internal, "10");
        assert_eq!(entry.external, "");
        assert_eq!(entry.result, "");
    }

    #[test]
    fn test_batch_result_accumulates() {
        let mut batch = BatchResult::new();
        assert!(batch.is_empty());
        batch.note("Processing 1AT22CS001");
        batch.push(StudentRecord::new("1AT22CS001"));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.log(), ["Processing 1AT22CS001".to_string()]);

        let (records, log) = batch.into_parts();
        assert_eq!(records.len(), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_summary_serializes_with_display_keys() {
        let record = StudentRecord::new("1AT22CS001")
            .with_name("A")
            .with_subject("21CS51", entry("70", "P"));
        let json = serde_json::to_value(record.summary()).unwrap();
        assert_eq!(json["Identifier"], "1AT22CS001");
        assert_eq!(json["Subjects"][0]["Code"], "21CS51");
        assert_eq!(json["Subjects"][0]["Total"], "70");
    }
}

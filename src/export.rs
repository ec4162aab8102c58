//! 結果の正規化とCSVエクスポート
//!
//! 列構成はバッチ全体を見るまで決まらない（科目コードの和集合）ため、
//! 全レコードから先にスキーマを確定してから行を書き出す。

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::ScraperError;
use crate::record::{StudentRecord, SubjectEntry};

pub const RESERVED_COLUMNS: [&str; 3] = ["Identifier", "Name", "Semester"];
pub const SUBJECT_FIELDS: [&str; 5] = ["Name", "Internal", "External", "Total", "Result"];

/// バッチ全体から計算した列構成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSchema {
    subject_codes: Vec<String>,
}

impl ExportSchema {
    /// 全レコードの科目コードの和集合（昇順）
    pub fn from_records(records: &[StudentRecord]) -> Self {
        let codes: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.subjects().keys().map(String::as_str))
            .collect();
        Self {
            subject_codes: codes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn subject_codes(&self) -> &[String] {
        &self.subject_codes
    }

    pub fn width(&self) -> usize {
        RESERVED_COLUMNS.len() + self.subject_codes.len() * SUBJECT_FIELDS.len()
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = RESERVED_COLUMNS.iter().map(|c| c.to_string()).collect();
        for code in &self.subject_codes {
            headers.extend(SUBJECT_FIELDS.iter().map(|field| format!("{}_{}", code, field)));
        }
        headers
    }

    /// レコードを固定幅の行にする。科目が無い列は空文字。
    pub fn row(&self, record: &StudentRecord) -> ExportRow {
        let mut cells = Vec::with_capacity(self.width());
        cells.push(record.identifier().to_string());
        cells.push(record.name().unwrap_or_default().to_string());
        cells.push(record.semester().unwrap_or_default().to_string());

        for code in &self.subject_codes {
            match record.subject(code) {
                Some(entry) => cells.extend(subject_cells(entry)),
                None => cells.extend(std::iter::repeat(String::new()).take(SUBJECT_FIELDS.len())),
            }
        }

        ExportRow { cells }
    }
}

fn subject_cells(entry: &SubjectEntry) -> [String; 5] {
    [
        entry.name.clone(),
        entry.internal.clone(),
        entry.external.clone(),
        entry.total.clone(),
        entry.result.clone(),
    ]
}

/// スキーマに沿って平坦化した1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    cells: Vec<String>,
}

impl ExportRow {
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// レコード列をCSVに書き出す
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    file_prefix: String,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: "exam_results".to_string(),
        }
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 新しいファイルに書き出してパスを返す。レコードが無ければ何も作らず `None`。
    pub fn export(&self, records: &[StudentRecord]) -> Result<Option<PathBuf>, ScraperError> {
        if records.is_empty() {
            info!("取得結果がないためエクスポートしません");
            return Ok(None);
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(self.file_name());
        let file = File::create(&path)?;
        write_records(records, file)?;

        info!("エクスポート完了: {}件 -> {:?}", records.len(), path);
        Ok(Some(path))
    }

    fn file_name(&self) -> String {
        format!(
            "{}_{}.csv",
            self.file_prefix,
            Local::now().format("%Y%m%d_%H%M%S_%3f")
        )
    }
}

/// 任意の Writer に書き出す。レコードが無ければ何も書かず `false`。
pub fn write_records<W: Write>(records: &[StudentRecord], writer: W) -> Result<bool, ScraperError> {
    if records.is_empty() {
        return Ok(false);
    }

    let schema = ExportSchema::from_records(records);
    info!(
        "エクスポート開始: {}件, 科目{}種類",
        records.len(),
        schema.subject_codes().len()
    );

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(schema.headers())?;
    for record in records {
        wtr.write_record(schema.row(record).cells())?;
    }
    wtr.flush()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, total: &str) -> SubjectEntry {
        SubjectEntry {
            name: name.into(),
            internal: "40".into(),
            external: "35".into(),
            total: total.into(),
            result: "P".into(),
        }
    }

    fn batch() -> Vec<StudentRecord> {
        vec![
            StudentRecord::new("1AT22CS001")
                .with_name("ASHA")
                .with_semester("5")
                .with_subject("21CS51", entry("Automata", "75"))
                .with_subject("21CS52", entry("Networks", "80")),
            StudentRecord::new("1AT22CS003")
                .with_subject("21CS52", entry("Networks", "66"))
                .with_subject("21CSL57", entry("Lab", "90")),
        ]
    }

    #[test]
    fn test_schema_is_union_of_subject_codes() {
        let schema = ExportSchema::from_records(&batch());
        assert_eq!(schema.subject_codes(), ["21CS51", "21CS52", "21CSL57"]);
        assert_eq!(schema.width(), 3 + 3 * 5);

        let headers = schema.headers();
        assert_eq!(&headers[..3], ["Identifier", "Name", "Semester"]);
        assert_eq!(headers[3], "21CS51_Name");
        assert_eq!(headers[7], "21CS51_Result");
        assert_eq!(headers.len(), schema.width());
    }

    #[test]
    fn test_every_row_has_identical_width() {
        let records = batch();
        let schema = ExportSchema::from_records(&records);
        for record in &records {
            assert_eq!(schema.row(record).len(), schema.width());
        }
    }

    #[test]
    fn test_missing_subject_renders_five_empty_cells() {
        let records = batch();
        let schema = ExportSchema::from_records(&records);
        let row = schema.row(&records[1]);
        let cells = row.cells();
        assert_eq!(cells[0], "1AT22CS003");
        assert_eq!(cells[1], "");
        assert_eq!(cells[2], "");
        // 21CS51 の5列
        assert!(cells[3..8].iter().all(|c| c.is_empty()));
        assert_eq!(cells[8], "Networks");
        assert_eq!(cells[11], "66");
    }

    #[test]
    fn test_write_records_produces_csv() {
        let mut out = Vec::new();
        assert!(write_records(&batch(), &mut out).unwrap());
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Identifier,Name,Semester,21CS51_Name"));
        assert!(lines[2].starts_with("1AT22CS003,,,,,,,,Networks"));
    }

    #[test]
    fn test_empty_batch_produces_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let exporter = Exporter::new(&out_dir);
        assert_eq!(exporter.export(&[]).unwrap(), None);
        assert!(!out_dir.exists());

        let mut out = Vec::new();
        assert!(!write_records(&[], &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_export_writes_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).with_file_prefix("batch");
        let path = exporter.export(&batch()).unwrap().unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("batch_"));
        assert!(name.ends_with(".csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let widths: Vec<usize> = reader.records().map(|r| r.unwrap().len()).collect();
        assert_eq!(widths, vec![18, 18]);
    }
}

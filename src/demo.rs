//! ブラウザを使わないデモ用データ
//!
//! 画面やエクスポートの確認用。連番5の倍数の学生は1科目だけ不合格になる。

use crate::error::ScraperError;
use crate::identifier::{capped_identifier_range, IdentifierFormat};
use crate::record::{StudentRecord, SubjectEntry};

/// (科目コード, 科目名, 内部評価, 外部評価, 合計)
const DEMO_SUBJECTS: [(&str, &str, &str, &str, &str); 5] = [
    ("18CS51", "Management and Entrepreneurship", "18", "52", "70"),
    ("18CS52", "Computer Networks", "20", "58", "78"),
    ("18CS53", "Database Management Systems", "19", "62", "81"),
    ("18CS54", "Automata Theory and Computability", "17", "54", "71"),
    ("18CS55", "Application Development using Python", "19", "57", "76"),
];

const FAILING_SUBJECT: &str = "18CS54";

/// 範囲内の各識別子にデモ用レコードを作る（`max` 件で打ち切り）
pub fn demo_records(
    start: &str,
    end: &str,
    format: &IdentifierFormat,
    max: Option<usize>,
) -> Result<Vec<StudentRecord>, ScraperError> {
    let identifiers = capped_identifier_range(start, end, format, max)?;

    Ok(identifiers
        .iter()
        .map(|id| {
            let failing = id.number() % 5 == 0;
            DEMO_SUBJECTS.iter().fold(
                StudentRecord::new(id.to_string())
                    .with_name(format!("Demo Student {}", id.number()))
                    .with_semester("5"),
                |record, (code, name, internal, external, total)| {
                    let result = if failing && *code == FAILING_SUBJECT { "F" } else { "P" };
                    record.with_subject(
                        *code,
                        SubjectEntry {
                            name: name.to_string(),
                            internal: internal.to_string(),
                            external: external.to_string(),
                            total: total.to_string(),
                            result: result.to_string(),
                        },
                    )
                },
            )
        })
        .collect())
}

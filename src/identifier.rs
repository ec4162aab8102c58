//! 学生識別子（例: `1AT22CS001`）と範囲生成
//!
//! 識別子は「数字以外を含む接頭辞 + 固定幅ゼロ埋めの連番」。
//! バッチ対象は同じ接頭辞を持つ昇順の連続区間。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

/// 識別子の書式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierFormat {
    /// 端点が数値のみで与えられたときに使う接頭辞
    pub default_prefix: String,
    /// 連番部の桁数
    pub width: usize,
}

impl Default for IdentifierFormat {
    fn default() -> Self {
        Self {
            default_prefix: "1AT22CS".to_string(),
            width: 3,
        }
    }
}

impl IdentifierFormat {
    /// 連番の上限（width=3 なら 999）
    pub fn max_number(&self) -> u32 {
        10u32.saturating_pow(self.width as u32).saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    prefix: String,
    number: u32,
    width: usize,
}

impl Identifier {
    pub fn new(
        prefix: impl Into<String>,
        number: u32,
        format: &IdentifierFormat,
    ) -> Result<Self, ScraperError> {
        let prefix = prefix.into().trim().to_uppercase();
        if !prefix.chars().any(|c| c.is_ascii_alphabetic()) {
            return Err(ScraperError::InvalidIdentifier(format!(
                "接頭辞に英字がありません: '{}'",
                prefix
            )));
        }
        if number == 0 || number > format.max_number() {
            return Err(ScraperError::InvalidIdentifier(format!(
                "連番 {} は 1..={} の範囲外です",
                number,
                format.max_number()
            )));
        }
        Ok(Self {
            prefix,
            number,
            width: format.width,
        })
    }

    /// 完全な識別子文字列を解析する（末尾 width 桁を連番とみなす）
    pub fn parse(raw: &str, format: &IdentifierFormat) -> Result<Self, ScraperError> {
        let raw = raw.trim().to_uppercase();
        let trailing_digits = raw.chars().rev().take_while(|c| c.is_ascii_digit()).count();
        if trailing_digits < format.width {
            return Err(ScraperError::InvalidIdentifier(format!(
                "'{}' の末尾に{}桁の連番がありません",
                raw, format.width
            )));
        }

        let split = raw.len() - format.width;
        let (prefix, digits) = raw.split_at(split);
        let number = digits
            .parse::<u32>()
            .map_err(|e| ScraperError::InvalidIdentifier(format!("'{}': {}", raw, e)))?;

        Self::new(prefix, number, format)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.prefix, self.number, width = self.width)
    }
}

/// 範囲の端点。数値のみ、または完全な識別子。
enum Endpoint {
    Bare(u32),
    Full(Identifier),
}

fn parse_endpoint(raw: &str, format: &IdentifierFormat) -> Result<Endpoint, ScraperError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScraperError::InvalidIdentifier("端点が空です".into()));
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let number = trimmed
            .parse::<u32>()
            .map_err(|e| ScraperError::InvalidIdentifier(format!("'{}': {}", trimmed, e)))?;
        return Ok(Endpoint::Bare(number));
    }
    Identifier::parse(trimmed, format).map(Endpoint::Full)
}

/// 2つの端点から昇順の識別子リストを生成する（両端を含む）
///
/// 逆順で与えられた場合は入れ替える。数値のみの端点はもう一方の接頭辞、
/// 両方数値なら `default_prefix` を使う。
pub fn identifier_range(
    start: &str,
    end: &str,
    format: &IdentifierFormat,
) -> Result<Vec<Identifier>, ScraperError> {
    capped_identifier_range(start, end, format, None)
}

/// `identifier_range` と同じだが、先頭から最大 `max` 件だけ生成する
pub fn capped_identifier_range(
    start: &str,
    end: &str,
    format: &IdentifierFormat,
    max: Option<usize>,
) -> Result<Vec<Identifier>, ScraperError> {
    let start = parse_endpoint(start, format)?;
    let end = parse_endpoint(end, format)?;

    let prefix = match (&start, &end) {
        (Endpoint::Full(a), Endpoint::Full(b)) => {
            if a.prefix() != b.prefix() {
                return Err(ScraperError::InvalidIdentifier(format!(
                    "開始と終了の接頭辞が異なります: {} / {}",
                    a.prefix(),
                    b.prefix()
                )));
            }
            a.prefix().to_string()
        }
        (Endpoint::Full(a), Endpoint::Bare(_)) | (Endpoint::Bare(_), Endpoint::Full(a)) => {
            a.prefix().to_string()
        }
        (Endpoint::Bare(_), Endpoint::Bare(_)) => format.default_prefix.clone(),
    };

    let number_of = |endpoint: &Endpoint| match endpoint {
        Endpoint::Bare(n) => *n,
        Endpoint::Full(id) => id.number(),
    };
    let (mut low, mut high) = (number_of(&start), number_of(&end));
    if low > high {
        std::mem::swap(&mut low, &mut high);
    }

    (low..=high)
        .take(max.unwrap_or(usize::MAX))
        .map(|n| Identifier::new(prefix.as_str(), n, format))
        .collect()
}

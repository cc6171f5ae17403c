//! Mapping of logical fields to physical column positions.
//!
//! An explicit [`ColumnMapping`] always wins. Otherwise a field is inferred
//! from header text and sampled values, and the result carries a
//! [`Confidence`] so callers can refuse a weak guess instead of silently
//! aggregating the wrong column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Header keywords that identify a merchant-name column in traffic exports.
pub const MERCHANT_KEYWORDS: &[&str] = &[
    "merchant", "мерчант", "название", "группа", "имя", "name", "магазин", "shop", "компания",
];

/// Header fragments that rule a column out as a value column.
const NON_VALUE_KEYWORDS: &[&str] = &["id", "name", "название", "мерчант", "группа"];

/// Header keywords that identify a timestamp column in transaction lists.
pub const TIME_KEYWORDS: &[&str] = &["created", "date", "time", "timestamp", "updated", "completion"];

/// Number of non-empty cells sampled when testing a column for numbers.
const VALUE_SAMPLE_SIZE: usize = 10;

// ── Field / confidence vocabulary ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    MerchantName,
    MerchantId,
    Baseline,
    Current,
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalField::MerchantName => "merchant name",
            LogicalField::MerchantId => "merchant id",
            LogicalField::Baseline => "baseline value",
            LogicalField::Current => "current value",
        })
    }
}

/// How much an inferred column can be trusted. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl FromStr for Confidence {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(ReportError::Config(format!("unknown confidence '{other}'"))),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// What an inference was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceBasis {
    Explicit,
    HeaderKeyword,
    SampledValues,
    Position,
}

impl InferenceBasis {
    fn confidence(self) -> Confidence {
        match self {
            InferenceBasis::Explicit | InferenceBasis::HeaderKeyword => Confidence::High,
            InferenceBasis::SampledValues => Confidence::Medium,
            InferenceBasis::Position => Confidence::Low,
        }
    }
}

/// Outcome of locating one logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInference {
    pub field: LogicalField,
    pub index: usize,
    pub confidence: Confidence,
    pub basis: InferenceBasis,
}

impl ColumnInference {
    pub fn new(field: LogicalField, index: usize, basis: InferenceBasis) -> Self {
        Self {
            field,
            index,
            confidence: basis.confidence(),
            basis,
        }
    }

    /// Return the column index, or an error when the inference is weaker
    /// than `min`.
    pub fn require(&self, min: Confidence) -> Result<usize> {
        if self.confidence < min {
            return Err(ReportError::LowConfidence {
                field: self.field,
                found: self.confidence,
                required: min,
            });
        }
        Ok(self.index)
    }
}

/// Declared column positions. Any field left `None` is inferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub merchant_name: Option<usize>,
    pub merchant_id: Option<usize>,
    pub baseline: Option<usize>,
    pub current: Option<usize>,
}

impl ColumnMapping {
    pub fn get(&self, field: LogicalField) -> Option<usize> {
        match field {
            LogicalField::MerchantName => self.merchant_name,
            LogicalField::MerchantId => self.merchant_id,
            LogicalField::Baseline => self.baseline,
            LogicalField::Current => self.current,
        }
    }

    fn explicit(&self, field: LogicalField) -> Option<ColumnInference> {
        self.get(field)
            .map(|idx| ColumnInference::new(field, idx, InferenceBasis::Explicit))
    }
}

// ── Header helpers ────────────────────────────────────────────────────────────

/// Index of the first header containing any of `keywords` and none of
/// `excluded` (case-insensitive).
pub fn find_by_keywords(headers: &[String], keywords: &[&str], excluded: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let lower = h.trim().to_lowercase();
        keywords.iter().any(|k| lower.contains(k)) && !excluded.iter().any(|x| lower.contains(x))
    })
}

/// All columns whose header looks like a timestamp, with their header text.
pub fn find_time_columns(headers: &[String]) -> Vec<(usize, String)> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            let lower = h.trim().to_lowercase();
            TIME_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect()
}

/// Merchant column of a transaction list: first header mentioning
/// `merchant` or `name`.
pub fn infer_list_merchant(headers: &[String], mapping: &ColumnMapping) -> Option<ColumnInference> {
    if let Some(explicit) = mapping.explicit(LogicalField::MerchantName) {
        return Some(explicit);
    }
    find_by_keywords(headers, &["merchant", "name"], &[]).map(|idx| {
        ColumnInference::new(LogicalField::MerchantName, idx, InferenceBasis::HeaderKeyword)
    })
}

// ── Traffic exports ───────────────────────────────────────────────────────────

/// Columns located in a traffic comparison export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficColumns {
    /// `None` when the export carries no separate id column.
    pub id: Option<ColumnInference>,
    pub merchant: ColumnInference,
    pub baseline: ColumnInference,
    pub current: ColumnInference,
}

impl TrafficColumns {
    /// Every located column, for logging and confidence checks.
    pub fn all(&self) -> Vec<ColumnInference> {
        self.id
            .into_iter()
            .chain([self.merchant, self.baseline, self.current])
            .collect()
    }

    /// Id column index when it differs from the merchant column.
    pub fn separate_id(&self) -> Option<usize> {
        self.id
            .map(|id| id.index)
            .filter(|&idx| idx != self.merchant.index)
    }

    /// Fail on the first column weaker than `min`.
    pub fn require(&self, min: Confidence) -> Result<()> {
        for inference in self.all() {
            inference.require(min)?;
        }
        Ok(())
    }
}

fn column_samples<'a>(rows: &'a [Vec<String>], col: usize) -> impl Iterator<Item = &'a str> {
    rows.iter()
        .filter_map(move |r| r.get(col))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
}

fn looks_numeric(s: &str) -> bool {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned.replace(',', ".").parse::<f64>().is_ok()
}

fn is_numeric_column(rows: &[Vec<String>], col: usize) -> bool {
    let mut samples = column_samples(rows, col).take(VALUE_SAMPLE_SIZE).peekable();
    samples.peek().is_some() && samples.all(looks_numeric)
}

fn is_text_column(rows: &[Vec<String>], col: usize) -> bool {
    match rows.first().and_then(|r| r.get(col)) {
        Some(first) => {
            let sample = first.trim().to_lowercase();
            !looks_numeric(&sample)
                && sample.chars().count() > 3
                && !["date", "дата", "timestamp"].iter().any(|k| sample.contains(k))
        }
        None => false,
    }
}

/// Numeric columns outside `taken` whose header does not name an id or a
/// merchant.
fn numeric_value_columns(
    headers: &[String],
    rows: &[Vec<String>],
    width: usize,
    taken: &[usize],
) -> Vec<usize> {
    (0..width)
        .filter(|c| !taken.contains(c))
        .filter(|&c| {
            let header = headers.get(c).map(|h| h.to_lowercase()).unwrap_or_default();
            !NON_VALUE_KEYWORDS.iter().any(|k| header.contains(k))
        })
        .filter(|&c| is_numeric_column(rows, c))
        .collect()
}

/// Locate id, merchant and the two value columns of a traffic export.
///
/// A numeric column is only taken as the id when two numeric value columns
/// remain without it; otherwise the export has no id column. Fails only when
/// fewer than two value columns can be found at all.
pub fn infer_traffic_columns(
    headers: &[String],
    rows: &[Vec<String>],
    mapping: &ColumnMapping,
) -> Result<TrafficColumns> {
    let width = headers
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));

    let mut id = mapping
        .explicit(LogicalField::MerchantId)
        .or_else(|| {
            find_by_keywords(headers, &["id"], &[]).map(|idx| {
                ColumnInference::new(LogicalField::MerchantId, idx, InferenceBasis::HeaderKeyword)
            })
        })
        .or_else(|| {
            (0..width).find(|&c| is_numeric_column(rows, c)).map(|idx| {
                ColumnInference::new(LogicalField::MerchantId, idx, InferenceBasis::SampledValues)
            })
        });
    let id_index = id.map(|i| i.index);

    let merchant = mapping
        .explicit(LogicalField::MerchantName)
        .or_else(|| {
            find_by_keywords(headers, MERCHANT_KEYWORDS, &["id"]).map(|idx| {
                ColumnInference::new(LogicalField::MerchantName, idx, InferenceBasis::HeaderKeyword)
            })
        })
        .or_else(|| {
            (0..width)
                .find(|&c| Some(c) != id_index && is_text_column(rows, c))
                .map(|idx| {
                    ColumnInference::new(
                        LogicalField::MerchantName,
                        idx,
                        InferenceBasis::SampledValues,
                    )
                })
        })
        .unwrap_or_else(|| {
            let idx = match id_index {
                Some(i) if width > 1 && i != 1 => 1,
                _ => 0,
            };
            ColumnInference::new(LogicalField::MerchantName, idx, InferenceBasis::Position)
        });

    let explicit_values = (
        mapping.explicit(LogicalField::Baseline),
        mapping.explicit(LogicalField::Current),
    );

    if let Some(sampled) = id.filter(|i| i.basis == InferenceBasis::SampledValues) {
        let keeps_values = match explicit_values {
            (Some(b), Some(c)) => sampled.index != b.index && sampled.index != c.index,
            _ => {
                numeric_value_columns(headers, rows, width, &[merchant.index, sampled.index]).len()
                    >= 2
            }
        };
        if !keeps_values {
            id = None;
        }
    }

    let (baseline, current) = match explicit_values {
        (Some(b), Some(c)) => (b, c),
        _ => {
            let mut taken = vec![merchant.index];
            taken.extend(id.map(|i| i.index));
            infer_value_columns(headers, rows, width, &taken)?
        }
    };

    Ok(TrafficColumns {
        id,
        merchant,
        baseline,
        current,
    })
}

fn infer_value_columns(
    headers: &[String],
    rows: &[Vec<String>],
    width: usize,
    taken: &[usize],
) -> Result<(ColumnInference, ColumnInference)> {
    let numeric = numeric_value_columns(headers, rows, width, taken);

    let (cols, basis) = if numeric.len() >= 2 {
        (numeric, InferenceBasis::SampledValues)
    } else {
        let others: Vec<usize> = (0..width).filter(|c| !taken.contains(c)).collect();
        (others, InferenceBasis::Position)
    };

    match cols.as_slice() {
        [b, c, ..] => Ok((
            ColumnInference::new(LogicalField::Baseline, *b, basis),
            ColumnInference::new(LogicalField::Current, *c, basis),
        )),
        _ => Err(ReportError::ColumnNotFound(
            "two numeric value columns".to_string(),
        )),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

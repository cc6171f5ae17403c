use serde::{Deserialize, Serialize};
use std::fmt;

/// Status tallied as a successful payment.
pub const CAPTURED: &str = "CAPTURED";

/// Status vocabulary used by the per-file status report when none is configured.
pub const DEFAULT_STATUSES: &[&str] = &["CAPTURED", "CANCELLED", "DECLINED", "REFUNDED", "ERROR"];

/// Row count and amount sum for one transaction status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusTotals {
    /// Rows carrying this status.
    pub count: u64,
    /// Sum of the parseable amounts of those rows.
    pub amount: f64,
}

/// Baseline and current metric accumulated for one subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPair {
    pub baseline: u64,
    pub current: u64,
}

impl CountPair {
    pub fn new(baseline: u64, current: u64) -> Self {
        Self { baseline, current }
    }

    /// Add another pair's values to this one, saturating at `u64::MAX`.
    pub fn add(&mut self, other: CountPair) {
        self.baseline = self.baseline.saturating_add(other.baseline);
        self.current = self.current.saturating_add(other.current);
    }

    pub fn is_zero(&self) -> bool {
        self.baseline == 0 && self.current == 0
    }
}

/// An account whose values are supplied by the operator rather than the
/// input files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialAccount {
    pub name: String,
    /// External identifier; empty when the account has none.
    #[serde(default)]
    pub id: String,
}

impl SpecialAccount {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    /// Report label: `"{id} {name}"`, or just the name without an id.
    pub fn display_name(&self) -> String {
        if self.id.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.id, self.name)
        }
    }
}

/// Kind of traffic export, recognised from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Vp,
    KztPayouts,
    FatPagsmile,
    FatNonPagsmile,
    Other,
}

impl SourceKind {
    pub fn from_file_name(name: &str) -> Self {
        if name.contains("aggregated_data") {
            SourceKind::Vp
        } else if name.contains("19_00_00") {
            SourceKind::KztPayouts
        } else if name.contains("20_59_00") {
            SourceKind::FatPagsmile
        } else if name.contains("00_00_00") {
            SourceKind::FatNonPagsmile
        } else {
            SourceKind::Other
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::Vp => "VP",
            SourceKind::KztPayouts => "KZT payouts",
            SourceKind::FatPagsmile => "F.A.T. Pagsmile",
            SourceKind::FatNonPagsmile => "F.A.T. non-Pagsmile",
            SourceKind::Other => "Other",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_pair_add() {
        let mut pair = CountPair::new(10, 20);
        pair.add(CountPair::new(5, 1));
        assert_eq!(pair, CountPair::new(15, 21));
        assert!(!pair.is_zero());
        assert!(CountPair::default().is_zero());
    }

    #[test]
    fn test_count_pair_add_saturates() {
        let mut pair = CountPair::new(u64::MAX - 1, 7);
        pair.add(CountPair::new(5, u64::MAX));
        assert_eq!(pair, CountPair::new(u64::MAX, u64::MAX));
    }

    #[test]
    fn test_special_account_display_name() {
        assert_eq!(
            SpecialAccount::new("Carusell/WhiteBird", "AA195783946319400960").display_name(),
            "AA195783946319400960 Carusell/WhiteBird"
        );
        assert_eq!(SpecialAccount::new("AO T-Bank", "").display_name(), "AO T-Bank");
    }

    #[test]
    fn test_special_account_id_defaults_when_missing() {
        let acct: SpecialAccount = serde_json::from_str(r#"{"name":"Solo"}"#).unwrap();
        assert_eq!(acct.id, "");
    }

    #[test]
    fn test_source_kind_from_file_name() {
        assert_eq!(SourceKind::from_file_name("aggregated_data_01.csv"), SourceKind::Vp);
        assert_eq!(SourceKind::from_file_name("t_19_00_00.csv"), SourceKind::KztPayouts);
        assert_eq!(SourceKind::from_file_name("t_20_59_00.csv"), SourceKind::FatPagsmile);
        assert_eq!(SourceKind::from_file_name("t_00_00_00.csv"), SourceKind::FatNonPagsmile);
        assert_eq!(SourceKind::from_file_name("misc.csv"), SourceKind::Other);
        assert_eq!(SourceKind::KztPayouts.to_string(), "KZT payouts");
    }
}

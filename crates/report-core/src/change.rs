//! Percentage-change classification shared by every comparison report.
//!
//! A [`ChangeRecord`] is a pure function of `(baseline, current)`: building the
//! same pair twice always yields the same classification, percentage and
//! description.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ── Classification ────────────────────────────────────────────────────────────

/// Category of a baseline → current transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Zero baseline, positive current.
    NewFlow,
    /// Positive baseline, zero current.
    ClosedFlow,
    /// Percent change of exactly zero (including `0 → 0`).
    Unchanged,
    Increase,
    Decrease,
}

/// Relative change in percent, or `Undefined` when the baseline is zero and
/// the current value is not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PercentChange {
    Finite(f64),
    Undefined,
}

impl PercentChange {
    /// Sort key: `Undefined` ranks above every finite percentage.
    pub fn sort_value(self) -> f64 {
        match self {
            PercentChange::Finite(p) => p,
            PercentChange::Undefined => f64::INFINITY,
        }
    }

    pub fn finite(self) -> Option<f64> {
        match self {
            PercentChange::Finite(p) => Some(p),
            PercentChange::Undefined => None,
        }
    }
}

/// Classify a transition.
///
/// The percentage is computed unrounded as
/// `(current - baseline) * 100 / baseline`; rounding happens only when the
/// record is rendered.
pub fn classify(baseline: u64, current: u64) -> (Classification, PercentChange) {
    match (baseline, current) {
        (0, 0) => (Classification::Unchanged, PercentChange::Finite(0.0)),
        (0, _) => (Classification::NewFlow, PercentChange::Undefined),
        (_, 0) => (Classification::ClosedFlow, PercentChange::Finite(-100.0)),
        (b, c) => {
            let pct = (c as f64 - b as f64) * 100.0 / b as f64;
            let class = match c.cmp(&b) {
                Ordering::Greater => Classification::Increase,
                Ordering::Less => Classification::Decrease,
                Ordering::Equal => Classification::Unchanged,
            };
            (class, PercentChange::Finite(pct))
        }
    }
}

// ── ChangeRecord ──────────────────────────────────────────────────────────────

/// A labeled baseline/current pair with its derived classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub subject: String,
    pub baseline: u64,
    pub current: u64,
    pub classification: Classification,
    pub percent_change: PercentChange,
}

impl ChangeRecord {
    pub fn new(subject: impl Into<String>, baseline: u64, current: u64) -> Self {
        let (classification, percent_change) = classify(baseline, current);
        Self {
            subject: subject.into(),
            baseline,
            current,
            classification,
            percent_change,
        }
    }

    /// Human-readable description of the transition, e.g.
    /// `"+50.00% (100 → 150)"` or `"new flow (0 → 10)"`.
    pub fn description(&self) -> String {
        match self.classification {
            Classification::NewFlow => format!("new flow (0 → {})", self.current),
            Classification::ClosedFlow => format!("-100.00% (closed) ({} → 0)", self.baseline),
            Classification::Unchanged if self.baseline == 0 => "0 → 0 (no change)".to_string(),
            _ => {
                let pct = self.percent_change.sort_value();
                format!(
                    "{} ({} → {})",
                    format_signed_percent(pct),
                    self.baseline,
                    self.current
                )
            }
        }
    }

    /// `"{subject} — {description}"`.
    pub fn line(&self) -> String {
        format!("{} — {}", self.subject, self.description())
    }

    /// Absolute difference between current and baseline.
    pub fn abs_delta(&self) -> u64 {
        self.current.abs_diff(self.baseline)
    }

    pub fn is_flow_change(&self) -> bool {
        matches!(
            self.classification,
            Classification::NewFlow | Classification::ClosedFlow
        )
    }
}

/// Render a percentage with an explicit `+` for non-negative values and
/// exactly two decimals.
pub fn format_signed_percent(pct: f64) -> String {
    if pct >= 0.0 {
        format!("+{:.2}%", pct)
    } else {
        format!("{:.2}%", pct)
    }
}

// ── Buckets ───────────────────────────────────────────────────────────────────

/// Records partitioned into the three report sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBuckets {
    /// Positive percentages and new flows; new flows first, then descending.
    pub increasing: Vec<ChangeRecord>,
    /// Negative percentages (closed flows included), most severe first.
    pub decreasing: Vec<ChangeRecord>,
    /// Exactly zero percent, in input order.
    pub unchanged: Vec<ChangeRecord>,
}

impl ChangeBuckets {
    /// Partition and sort `records`. Ties keep their input order.
    pub fn partition(records: impl IntoIterator<Item = ChangeRecord>) -> Self {
        let mut buckets = ChangeBuckets::default();
        for record in records {
            let pct = record.percent_change.sort_value();
            if pct > 0.0 {
                buckets.increasing.push(record);
            } else if pct < 0.0 {
                buckets.decreasing.push(record);
            } else {
                buckets.unchanged.push(record);
            }
        }

        buckets.increasing.sort_by(|a, b| {
            b.percent_change
                .sort_value()
                .total_cmp(&a.percent_change.sort_value())
        });
        buckets.decreasing.sort_by(|a, b| {
            a.percent_change
                .sort_value()
                .total_cmp(&b.percent_change.sort_value())
        });
        buckets
    }

    pub fn len(&self) -> usize {
        self.increasing.len() + self.decreasing.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records in section order: increasing, decreasing, unchanged.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.increasing
            .iter()
            .chain(self.decreasing.iter())
            .chain(self.unchanged.iter())
    }
}

/// Sort by absolute delta, largest first. Stable.
pub fn sort_by_magnitude(records: &mut [ChangeRecord]) {
    records.sort_by_key(|r| std::cmp::Reverse(r.abs_delta()));
}

// ── Thresholds ────────────────────────────────────────────────────────────────

/// Growth and decline thresholds in percent. Both boundaries are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub growth_pct: f64,
    /// Magnitude of the decline; a record at `-decline_pct` is significant.
    pub decline_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            growth_pct: 50.0,
            decline_pct: 30.0,
        }
    }
}

impl Thresholds {
    /// New and closed flows are always significant; otherwise the unrounded
    /// percentage is compared against the thresholds.
    pub fn is_significant(&self, record: &ChangeRecord) -> bool {
        if record.is_flow_change() {
            return true;
        }
        match record.percent_change {
            PercentChange::Finite(p) => p >= self.growth_pct || p <= -self.decline_pct,
            PercentChange::Undefined => true,
        }
    }
}

/// Threshold-filtered view over a set of records, with the unfiltered dump
/// retained alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdReport {
    pub significant: ChangeBuckets,
    pub all: ChangeBuckets,
}

impl ThresholdReport {
    pub fn build(records: Vec<ChangeRecord>, thresholds: &Thresholds) -> Self {
        let significant = ChangeBuckets::partition(
            records
                .iter()
                .filter(|r| thresholds.is_significant(r))
                .cloned(),
        );
        let all = ChangeBuckets::partition(records);
        Self { significant, all }
    }

    pub fn has_significant(&self) -> bool {
        !self.significant.is_empty()
    }
}

/// Context line shared by the alerting-style report header and its
/// no-change sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyContext {
    pub officer: String,
    pub report_time: String,
    pub base_date: String,
    pub current_date: String,
}

impl DutyContext {
    /// Header printed above the listed changes.
    pub fn header(&self) -> String {
        format!(
            "Duty officer {}. At {} a report was made for {}; traffic changes compared with {} at {}:",
            self.officer, self.report_time, self.current_date, self.base_date, self.report_time
        )
    }

    /// Fixed sentence emitted when no record crosses a threshold.
    pub fn no_changes_sentence(&self) -> String {
        no_changes_sentence(&self.officer, &self.report_time, &self.current_date)
    }
}

/// The single sentence reported when nothing crosses the thresholds.
pub fn no_changes_sentence(officer: &str, report_time: &str, date: &str) -> String {
    format!(
        "Duty officer {officer}. At {report_time} a report was made for {date}. \
         No traffic changes crossing the growth or decline thresholds were found. \
         Everything was checked, traffic did not change."
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

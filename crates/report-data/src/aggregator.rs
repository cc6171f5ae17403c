//! Per-status and per-merchant tallies over transaction exports.

use std::collections::BTreeMap;

use report_core::error::{ReportError, Result};
use report_core::formatting::percentage;
use report_core::models::{StatusTotals, CAPTURED};
use report_core::numbers::parse_amount;
use report_core::time_utils::TimezoneHandler;
use tracing::debug;

use crate::table::Table;

fn is_blank(cell: &str) -> bool {
    let t = cell.trim();
    t.is_empty() || t.eq_ignore_ascii_case("nan")
}

// ── Status report ─────────────────────────────────────────────────────────────

/// Count and amount per status for one file, in vocabulary order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub file: String,
    pub totals: Vec<(String, StatusTotals)>,
    /// Rows with a blank status or amount.
    pub skipped_rows: u64,
    /// Rows whose status is not in the vocabulary.
    pub unknown_status_rows: u64,
}

impl StatusReport {
    pub fn get(&self, status: &str) -> Option<StatusTotals> {
        self.totals
            .iter()
            .find(|(s, _)| s == status)
            .map(|(_, t)| *t)
    }
}

/// Stateless helper that tallies headerless transaction exports by status.
pub struct StatusAggregator;

impl StatusAggregator {
    /// Tally `table` over `vocabulary`.
    ///
    /// A row counts when its trimmed, upper-cased status is in the vocabulary
    /// and neither cell is blank; its amount is added only when it parses.
    pub fn tally(
        table: &Table,
        status_col: usize,
        amount_col: usize,
        vocabulary: &[String],
    ) -> Result<StatusReport> {
        let required = status_col.max(amount_col) + 1;
        if table.width() < required {
            return Err(ReportError::TooFewColumns {
                path: table.source.clone(),
                found: table.width(),
                required,
            });
        }

        let mut totals: Vec<(String, StatusTotals)> = vocabulary
            .iter()
            .map(|s| (s.clone(), StatusTotals::default()))
            .collect();
        let mut skipped_rows = 0;
        let mut unknown_status_rows = 0;

        for row in 0..table.len() {
            let status = table.cell(row, status_col);
            let amount = table.cell(row, amount_col);
            if is_blank(status) || is_blank(amount) {
                skipped_rows += 1;
                continue;
            }
            let status = status.trim().to_uppercase();
            match totals.iter_mut().find(|(s, _)| *s == status) {
                Some((_, t)) => {
                    t.count += 1;
                    if let Some(v) = parse_amount(amount) {
                        t.amount += v;
                    }
                }
                None => unknown_status_rows += 1,
            }
        }

        debug!(
            "{}: {} rows skipped, {} with unknown status",
            table.file_name(),
            skipped_rows,
            unknown_status_rows
        );

        Ok(StatusReport {
            file: table.file_name(),
            totals,
            skipped_rows,
            unknown_status_rows,
        })
    }
}

// ── Success rate ──────────────────────────────────────────────────────────────

/// Success rate over every row of every file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SuccessSummary {
    pub total: u64,
    pub successful: u64,
    /// Sum of the amounts of successful rows.
    pub turnover: f64,
}

impl SuccessSummary {
    /// Add every row of `table`. A row is successful when its status is
    /// `CAPTURED` and its amount is numeric.
    pub fn add_table(&mut self, table: &Table, status_col: usize, amount_col: usize) {
        for row in 0..table.len() {
            self.total += 1;
            // Padding is ignored; case is not.
            if table.cell(row, status_col).trim() != CAPTURED {
                continue;
            }
            if let Some(amount) = parse_amount(table.cell(row, amount_col)) {
                self.successful += 1;
                self.turnover += amount;
            }
        }
    }

    /// `successful / total × 100`, or 0 with no rows.
    pub fn success_rate(&self) -> f64 {
        percentage(self.successful as f64, self.total as f64, 2)
    }
}

// ── Morning tally ─────────────────────────────────────────────────────────────

/// Counters for one file of the morning report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MorningFileTally {
    pub file: String,
    pub total_rows: u64,
    pub before_cutoff: u64,
    pub time_errors: u64,
    pub merchants: BTreeMap<String, u64>,
}

/// Morning counts across all files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MorningTally {
    pub files: Vec<MorningFileTally>,
    pub merchants: BTreeMap<String, u64>,
}

impl MorningTally {
    pub fn add_file(&mut self, file: MorningFileTally) {
        for (merchant, count) in &file.merchants {
            *self.merchants.entry(merchant.clone()).or_default() += count;
        }
        self.files.push(file);
    }

    /// Transactions attributed to a merchant before the cutoff.
    pub fn total(&self) -> u64 {
        self.merchants.values().sum()
    }

    /// Merchants by count, largest first; ties by name.
    pub fn merchants_by_count(&self) -> Vec<(String, u64)> {
        let mut list: Vec<(String, u64)> =
            self.merchants.iter().map(|(m, c)| (m.clone(), *c)).collect();
        list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        list
    }
}

/// Counts transactions whose local time falls before a cutoff hour.
pub struct MorningAggregator {
    handler: TimezoneHandler,
    cutoff_hour: u32,
}

impl MorningAggregator {
    pub fn new(timezone: &str, cutoff_hour: u32) -> Self {
        Self {
            handler: TimezoneHandler::new(timezone),
            cutoff_hour,
        }
    }

    /// Tally the data rows of `table` (header already removed).
    pub fn tally_file(
        &self,
        table: &Table,
        merchant_col: Option<usize>,
        time_col: usize,
    ) -> MorningFileTally {
        let mut tally = MorningFileTally {
            file: table.file_name(),
            ..Default::default()
        };

        for row in 0..table.len() {
            tally.total_rows += 1;
            let Some(hour) = self.handler.local_hour(table.cell(row, time_col)) else {
                tally.time_errors += 1;
                continue;
            };
            if hour >= self.cutoff_hour {
                continue;
            }
            tally.before_cutoff += 1;
            if let Some(col) = merchant_col {
                let merchant = table.cell(row, col).trim();
                if !is_blank(merchant) {
                    *tally.merchants.entry(merchant.to_string()).or_default() += 1;
                }
            }
        }

        tally
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

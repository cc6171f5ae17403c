//! Traffic comparison: per-file normalization and cross-file aggregation.
//!
//! Each export is reduced to `(subject, id, baseline, current)` rows, then all
//! rows are summed per subject into a [`TrafficAggregation`]. Running totals
//! live only in that context, which the caller creates and drops per run.

use std::collections::{HashMap, HashSet};

use report_core::change::{ChangeBuckets, ChangeRecord, ThresholdReport, Thresholds};
use report_core::error::Result;
use report_core::models::{CountPair, SourceKind, SpecialAccount};
use report_core::numbers::coerce_count;
use report_core::profile::TrafficProfile;
use report_core::schema::{infer_traffic_columns, ColumnMapping, Confidence, TrafficColumns};
use tracing::{debug, warn};

use crate::table::Table;

/// Prefix carried by ids embedded in account names.
const ACCOUNT_ID_PREFIX: &str = "AA";

// ── Normalization ─────────────────────────────────────────────────────────────

/// One merchant row after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRow {
    /// Display label, id-prefixed unless the id is hidden.
    pub subject: String,
    /// Cleaned id cell, empty when the file has none.
    pub merchant_id: String,
    pub values: CountPair,
}

/// A normalized traffic export.
#[derive(Debug, Clone)]
pub struct NormalizedFile {
    pub file: String,
    pub kind: SourceKind,
    pub columns: TrafficColumns,
    pub rows: Vec<TrafficRow>,
    /// Value cells that were not clean numbers and were coerced.
    pub coerced_cells: u64,
}

fn clean_cell(raw: &str) -> String {
    let cleaned = raw.trim().replace('"', "");
    let cleaned = cleaned.trim();
    if cleaned.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        cleaned.to_string()
    }
}

fn display_name(name: &str, id: &str, profile: &TrafficProfile) -> String {
    if id.is_empty() || profile.is_hidden(id) || name.starts_with(id) {
        name.to_string()
    } else {
        format!("{id} {name}")
    }
}

/// Normalize a traffic export whose first row is already the header.
///
/// Fails when the value columns cannot be located or an inferred column is
/// weaker than `min_confidence`; the caller skips such files.
pub fn normalize_table(
    table: &Table,
    mapping: &ColumnMapping,
    profile: &TrafficProfile,
    min_confidence: Confidence,
) -> Result<NormalizedFile> {
    let file = table.file_name();
    let kind = SourceKind::from_file_name(&file);
    let columns = infer_traffic_columns(&table.headers, &table.rows, mapping)?;
    for inference in columns.all() {
        debug!(
            "{}: {} → column {} ({} confidence, {:?})",
            file, inference.field, inference.index, inference.confidence, inference.basis
        );
    }
    columns.require(min_confidence)?;

    let id_col = columns.separate_id();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::new();
    let mut coerced_cells = 0;

    for row in 0..table.len() {
        let name = clean_cell(table.cell(row, columns.merchant.index));
        if name.is_empty() {
            continue;
        }
        let merchant_id = id_col
            .map(|c| clean_cell(table.cell(row, c)))
            .unwrap_or_default();

        let subject = display_name(&name, &merchant_id, profile);
        if !seen.insert(subject.clone()) {
            debug!("{}: duplicate subject '{}' ignored", file, subject);
            continue;
        }

        let baseline = coerce_count(table.cell(row, columns.baseline.index));
        let current = coerce_count(table.cell(row, columns.current.index));
        for (cell, coerced) in [
            (table.cell(row, columns.baseline.index), baseline),
            (table.cell(row, columns.current.index), current),
        ] {
            if coerced.coerced {
                coerced_cells += 1;
                warn!("{}: value '{}' for '{}' coerced to {}", file, cell, subject, coerced.value);
            }
        }

        rows.push(TrafficRow {
            subject,
            merchant_id,
            values: CountPair::new(baseline.value, current.value),
        });
    }

    debug!("{} ({}): {} rows normalized", file, kind, rows.len());

    Ok(NormalizedFile {
        file,
        kind,
        columns,
        rows,
        coerced_cells,
    })
}

// ── Aggregation context ───────────────────────────────────────────────────────

/// Per-subject sums, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectTotals {
    order: Vec<String>,
    totals: HashMap<String, CountPair>,
}

impl SubjectTotals {
    pub fn add(&mut self, subject: &str, values: CountPair) {
        match self.totals.get_mut(subject) {
            Some(existing) => existing.add(values),
            None => {
                self.order.push(subject.to_string());
                self.totals.insert(subject.to_string(), values);
            }
        }
    }

    pub fn get(&self, subject: &str) -> Option<CountPair> {
        self.totals.get(subject).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Change records in first-seen order.
    pub fn records(&self) -> Vec<ChangeRecord> {
        self.order
            .iter()
            .filter_map(|s| {
                self.totals
                    .get(s)
                    .map(|v| ChangeRecord::new(s.clone(), v.baseline, v.current))
            })
            .collect()
    }
}

/// Running totals of a traffic comparison run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficAggregation {
    /// Subjects that feed the published report.
    pub main: SubjectTotals,
    /// Subjects whose id is on the exclusion list.
    pub excluded: SubjectTotals,
    /// Subjects without an id that are not `AA` accounts.
    pub empty_id: SubjectTotals,
    /// Subjects with a hidden id, labelled with that id. Also present in `main`.
    pub hidden: SubjectTotals,
}

impl TrafficAggregation {
    pub fn add_file(&mut self, file: &NormalizedFile, profile: &TrafficProfile) {
        for row in &file.rows {
            self.add_row(row, profile);
        }
    }

    pub fn add_row(&mut self, row: &TrafficRow, profile: &TrafficProfile) {
        let id = row.merchant_id.as_str();
        if !id.is_empty() && profile.is_excluded(id) {
            self.excluded.add(&row.subject, row.values);
            return;
        }
        if id.is_empty() && !row.subject.starts_with(ACCOUNT_ID_PREFIX) {
            self.empty_id.add(&row.subject, row.values);
            return;
        }
        if !id.is_empty() && profile.is_hidden(id) {
            self.hidden.add(&format!("{id} {}", row.subject), row.values);
        }
        self.main.add(&row.subject, row.values);
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
            && self.excluded.is_empty()
            && self.empty_id.is_empty()
            && self.hidden.is_empty()
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// A special account with its operator-supplied values.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialOutcome {
    pub account: SpecialAccount,
    pub record: ChangeRecord,
    pub significant: bool,
}

/// Everything the traffic comparison prints.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficReport {
    /// Main and special subjects, unfiltered.
    pub dump: ChangeBuckets,
    pub excluded: ChangeBuckets,
    pub hidden: ChangeBuckets,
    pub empty_id: ChangeBuckets,
    pub special: Vec<SpecialOutcome>,
    /// Main and special subjects crossing the thresholds.
    pub threshold: ThresholdReport,
}

impl TrafficReport {
    pub fn build(
        aggregation: &TrafficAggregation,
        special: &[(SpecialAccount, CountPair)],
        thresholds: &Thresholds,
    ) -> Self {
        let special: Vec<SpecialOutcome> = special
            .iter()
            .map(|(account, values)| {
                let record =
                    ChangeRecord::new(account.display_name(), values.baseline, values.current);
                SpecialOutcome {
                    account: account.clone(),
                    significant: thresholds.is_significant(&record),
                    record,
                }
            })
            .collect();

        let mut published = aggregation.main.records();
        published.extend(special.iter().map(|s| s.record.clone()));

        let threshold = ThresholdReport::build(published, thresholds);

        Self {
            dump: threshold.all.clone(),
            excluded: ChangeBuckets::partition(aggregation.excluded.records()),
            hidden: ChangeBuckets::partition(aggregation.hidden.records()),
            empty_id: ChangeBuckets::partition(aggregation.empty_id.records()),
            special,
            threshold,
        }
    }

    pub fn is_special(&self, subject: &str) -> bool {
        self.special.iter().any(|s| s.record.subject == subject)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

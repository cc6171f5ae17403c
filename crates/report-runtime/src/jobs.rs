//! Report jobs: settings in, report results out.
//!
//! Every job is a sequential batch over the discovered input files. A file
//! that cannot be read or does not have the expected shape is logged and
//! skipped; the batch fails only when nothing could be read at all.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use chrono_tz::Tz;
use report_core::change::{ChangeRecord, DutyContext};
use report_core::error::ReportError;
use report_core::models::{CountPair, SourceKind, SpecialAccount};
use report_core::profile::TrafficProfile;
use report_core::schema::{find_time_columns, infer_list_merchant};
use report_core::settings::Settings;
use report_core::time_utils::parse_iso_date;
use report_data::aggregator::{
    MorningAggregator, MorningTally, StatusAggregator, StatusReport, SuccessSummary,
};
use report_data::export::{build_partner_export, default_output_name, write_xlsx, PartnerExport};
use report_data::reader::{find_files, load_table, DEFAULT_DELIMITERS};
use report_data::table::{file_name, Table};
use report_data::traffic::{normalize_table, TrafficAggregation, TrafficReport};
use report_data::watchlist::{build_lines, read_rows, WatchlistRow};
use tracing::{debug, info, warn};

use crate::providers::{ColumnChooser, SpecialValuesSource};

/// Title cell heading transaction list exports.
const MORNING_TITLE: &str = "Transactions";
/// Time column used when none can be identified.
const FALLBACK_TIME_COLUMN: usize = 2;
/// Partner exports are usually `;`-separated.
const PARTNER_DELIMITERS: &[u8] = &[b';', b',', b'\t'];

// ── Results ───────────────────────────────────────────────────────────────────

/// A file left out of a report, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusRun {
    pub reports: Vec<StatusReport>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessRun {
    pub summary: SuccessSummary,
    pub files: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorningRun {
    pub tally: MorningTally,
    pub timezone: String,
    pub cutoff_hour: u32,
    pub skipped: Vec<SkippedFile>,
}

/// Summary line for one traffic export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficFile {
    pub file: String,
    pub kind: SourceKind,
    pub rows: usize,
    pub coerced_cells: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficRun {
    pub report: TrafficReport,
    pub duty: DutyContext,
    pub files: Vec<TrafficFile>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistRun {
    pub lines: Vec<ChangeRecord>,
    pub duty: DutyContext,
    /// Watchlist rows read across all files, before filtering.
    pub rows_read: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartnerRun {
    pub export: PartnerExport,
    pub partner: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of whichever report was selected.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutput {
    Status(StatusRun),
    SuccessRate(SuccessRun),
    Morning(MorningRun),
    Traffic(TrafficRun),
    Watchlist(WatchlistRun),
    PartnerExport(PartnerRun),
}

/// Interactive collaborators handed to the jobs.
pub struct Providers<'a> {
    pub columns: &'a mut dyn ColumnChooser,
    pub special_values: &'a mut dyn SpecialValuesSource,
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Run the report selected by `settings.report`.
pub fn run(settings: &Settings, providers: Providers<'_>, now: DateTime<Tz>) -> Result<ReportOutput> {
    info!("Running {} report over {}", settings.report, settings.dir.display());
    let output = match settings.report.as_str() {
        "status" => ReportOutput::Status(status_report(settings)?),
        "success-rate" => ReportOutput::SuccessRate(success_rate(settings)?),
        "morning" => ReportOutput::Morning(morning_report(settings, providers.columns)?),
        "traffic" => ReportOutput::Traffic(traffic_report(settings, providers.special_values, now)?),
        "watchlist" => ReportOutput::Watchlist(watchlist_report(settings, now)?),
        "partner-export" => ReportOutput::PartnerExport(partner_export(settings, now)?),
        other => bail!("unknown report '{other}'"),
    };
    Ok(output)
}

// ── File handling ─────────────────────────────────────────────────────────────

/// The explicit `--input`, or every file in `--dir` matching the report's
/// pattern.
pub fn input_files(settings: &Settings) -> Result<Vec<PathBuf>> {
    if let Some(input) = &settings.input {
        if !input.is_file() {
            return Err(ReportError::NoMatchingFiles {
                pattern: file_name(input),
                dir: input
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| settings.dir.clone()),
            }
            .into());
        }
        return Ok(vec![input.clone()]);
    }
    Ok(find_files(&settings.dir, &settings.file_pattern())?)
}

struct Batch<T> {
    items: Vec<T>,
    skipped: Vec<SkippedFile>,
}

/// Load and process each file in turn, skipping the ones that fail.
fn process_files<T>(
    files: &[PathBuf],
    delimiters: &[u8],
    mut process: impl FnMut(Table) -> report_core::error::Result<T>,
) -> Result<Batch<T>> {
    let mut batch = Batch {
        items: Vec::new(),
        skipped: Vec::new(),
    };
    let mut loaded = 0;

    for path in files {
        let name = file_name(path);
        let outcome = load_table(path, delimiters).map(|table| {
            loaded += 1;
            table
        });
        match outcome.and_then(&mut process) {
            Ok(item) => batch.items.push(item),
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                batch.skipped.push(SkippedFile {
                    file: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    if loaded == 0 && !files.is_empty() {
        bail!("none of the {} input files could be read", files.len());
    }
    Ok(batch)
}

// ── Status ────────────────────────────────────────────────────────────────────

pub fn status_report(settings: &Settings) -> Result<StatusRun> {
    let files = input_files(settings)?;
    let vocabulary = settings.status_vocabulary();
    debug!("Status vocabulary: {}", vocabulary.join(", "));

    let batch = process_files(&files, DEFAULT_DELIMITERS, |table| {
        StatusAggregator::tally(
            &table,
            settings.status_column,
            settings.amount_column,
            &vocabulary,
        )
    })?;

    Ok(StatusRun {
        reports: batch.items,
        skipped: batch.skipped,
    })
}

// ── Success rate ──────────────────────────────────────────────────────────────

pub fn success_rate(settings: &Settings) -> Result<SuccessRun> {
    let files = input_files(settings)?;
    let mut summary = SuccessSummary::default();

    let batch = process_files(&files, DEFAULT_DELIMITERS, |mut table| {
        table.skip_rows(settings.skip_rows);
        table.drop_blank_rows();
        summary.add_table(&table, settings.status_column, settings.amount_column);
        debug!("{}: {} rows", table.file_name(), table.len());
        Ok(table.file_name())
    })?;

    Ok(SuccessRun {
        summary,
        files: batch.items,
        skipped: batch.skipped,
    })
}

// ── Morning ───────────────────────────────────────────────────────────────────

/// Time column for a transaction list: `--time-column` by header, then the
/// chooser over timestamp-like headers, then the fixed fallback.
fn resolve_time_column(table: &Table, settings: &Settings, chooser: &mut dyn ColumnChooser) -> usize {
    let file = table.file_name();
    if let Some(name) = &settings.time_column {
        let found = table
            .headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()));
        match found {
            Some(idx) => return idx,
            None => warn!("{}: no column named '{}'", file, name),
        }
    }

    let candidates = find_time_columns(&table.headers);
    if candidates.is_empty() {
        warn!("{}: no time column found, using column {}", file, FALLBACK_TIME_COLUMN);
        return FALLBACK_TIME_COLUMN;
    }
    match chooser.choose(&file, &candidates) {
        Some(idx) if idx < table.width() => idx,
        _ => {
            warn!("{}: no valid time column chosen, using column {}", file, FALLBACK_TIME_COLUMN);
            FALLBACK_TIME_COLUMN
        }
    }
}

pub fn morning_report(settings: &Settings, chooser: &mut dyn ColumnChooser) -> Result<MorningRun> {
    let files = input_files(settings)?;
    let aggregator = MorningAggregator::new(&settings.timezone, settings.cutoff_hour);
    let mapping = settings.column_mapping();
    let min_confidence = settings.min_confidence()?;

    let batch = process_files(&files, DEFAULT_DELIMITERS, |mut table| {
        table.drop_title_row(MORNING_TITLE);
        if table.len() < 2 {
            return Err(ReportError::TooFewRows {
                path: table.source.clone(),
                found: table.len(),
                required: 2,
            });
        }
        let table = table.with_header_row();

        let merchant_col = match infer_list_merchant(&table.headers, &mapping) {
            Some(inference) => Some(inference.require(min_confidence)?),
            None => {
                warn!("{}: no merchant column, merchants not attributed", table.file_name());
                None
            }
        };
        let time_col = resolve_time_column(&table, settings, chooser);
        debug!(
            "{}: merchant column {:?}, time column {}",
            table.file_name(),
            merchant_col,
            time_col
        );

        let tally = aggregator.tally_file(&table, merchant_col, time_col);
        if tally.time_errors > 0 {
            warn!("{}: {} rows with unreadable time", tally.file, tally.time_errors);
        }
        Ok(tally)
    })?;

    let mut tally = MorningTally::default();
    for file in batch.items {
        tally.add_file(file);
    }

    Ok(MorningRun {
        tally,
        timezone: settings.timezone.clone(),
        cutoff_hour: settings.cutoff_hour,
        skipped: batch.skipped,
    })
}

// ── Traffic ───────────────────────────────────────────────────────────────────

/// Ask `source` for every special account; accounts without values are
/// left out with a warning.
pub fn collect_special_values(
    accounts: &[SpecialAccount],
    source: &mut dyn SpecialValuesSource,
) -> Vec<(SpecialAccount, CountPair)> {
    accounts
        .iter()
        .filter_map(|account| match source.values_for(account) {
            Ok(values) => Some((account.clone(), values)),
            Err(e) => {
                warn!("Special account '{}' left out: {:#}", account.display_name(), e);
                None
            }
        })
        .collect()
}

pub fn traffic_report(
    settings: &Settings,
    special_values: &mut dyn SpecialValuesSource,
    now: DateTime<Tz>,
) -> Result<TrafficRun> {
    let profile_path = settings.profile_path();
    let profile = TrafficProfile::load(&profile_path)
        .with_context(|| format!("loading traffic profile {}", profile_path.display()))?;
    let files = input_files(settings)?;
    let mapping = settings.column_mapping();
    let min_confidence = settings.min_confidence()?;

    let mut aggregation = TrafficAggregation::default();
    let batch = process_files(&files, DEFAULT_DELIMITERS, |table| {
        let normalized = normalize_table(&table.with_header_row(), &mapping, &profile, min_confidence)?;
        info!(
            "{} ({}): {} merchants",
            normalized.file,
            normalized.kind,
            normalized.rows.len()
        );
        aggregation.add_file(&normalized, &profile);
        Ok(TrafficFile {
            file: normalized.file,
            kind: normalized.kind,
            rows: normalized.rows.len(),
            coerced_cells: normalized.coerced_cells,
        })
    })?;

    let special = collect_special_values(&profile.special_accounts, special_values);
    let report = TrafficReport::build(&aggregation, &special, &settings.thresholds());

    Ok(TrafficRun {
        report,
        duty: settings.duty_context(now),
        files: batch.items,
        skipped: batch.skipped,
    })
}

// ── Watchlist ─────────────────────────────────────────────────────────────────

pub fn watchlist_report(settings: &Settings, now: DateTime<Tz>) -> Result<WatchlistRun> {
    let watchlist: Vec<String> = settings
        .watchlist
        .iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect();
    if watchlist.is_empty() {
        return Err(ReportError::Config("--watchlist needs at least one entry".to_string()).into());
    }

    let files = input_files(settings)?;
    let batch = process_files(&files, DEFAULT_DELIMITERS, |table| read_rows(&table.with_header_row()))?;
    let rows: Vec<WatchlistRow> = batch.items.into_iter().flatten().collect();

    let lines = build_lines(
        &rows,
        &watchlist,
        &settings.thresholds(),
        settings.include_insignificant,
    );
    debug!("{} of {} watchlist rows listed", lines.len(), rows.len());

    Ok(WatchlistRun {
        lines,
        duty: settings.duty_context(now),
        rows_read: rows.len(),
        skipped: batch.skipped,
    })
}

// ── Partner export ────────────────────────────────────────────────────────────

pub fn partner_export(settings: &Settings, now: DateTime<Tz>) -> Result<PartnerRun> {
    let (Some(start), Some(end)) = (&settings.start_date, &settings.end_date) else {
        return Err(ReportError::Config(
            "partner export needs --start-date and --end-date".to_string(),
        )
        .into());
    };
    let start = parse_iso_date(start)?;
    let end = parse_iso_date(end)?;
    if end < start {
        return Err(ReportError::Config(format!("end date {end} is before start date {start}")).into());
    }

    let input = input_files(settings)?
        .into_iter()
        .next()
        .context("no input file for the partner export")?;
    info!("Partner export from {}", input.display());

    let table = load_table(&input, PARTNER_DELIMITERS)?.with_header_row();
    let export = build_partner_export(&table, &settings.partner, start, end)?;

    let output = settings
        .output
        .clone()
        .unwrap_or_else(|| settings.dir.join(default_output_name(now.naive_local())));
    write_xlsx(&export, &output).with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote {} rows to {}", export.rows.len(), output.display());

    Ok(PartnerRun {
        export,
        partner: settings.partner.clone(),
        input,
        output,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

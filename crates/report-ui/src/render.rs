//! Plain-text rendering of report results for standard output.

use report_core::change::{ChangeBuckets, ChangeRecord, DutyContext, ThresholdReport};
use report_core::formatting::{format_currency, format_number_in, Locale};
use report_data::traffic::TrafficReport;
use report_runtime::jobs::{
    MorningRun, PartnerRun, ReportOutput, SkippedFile, StatusRun, SuccessRun, TrafficRun,
    WatchlistRun,
};

use crate::components::header::Header;
use crate::components::layout::{aligned_rows, section};

/// Locale and currency used for amounts and counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub locale: Locale,
    pub currency: String,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            locale: Locale::Ru,
            currency: "RUB".to_string(),
        }
    }
}

impl NumberFormat {
    fn count(&self, n: u64) -> String {
        format_number_in(n as f64, 0, self.locale)
    }

    fn amount(&self, v: f64) -> String {
        format_currency(v, self.locale, &self.currency)
    }
}

/// Render any report result.
pub fn render(output: &ReportOutput, fmt: &NumberFormat) -> String {
    let lines = match output {
        ReportOutput::Status(run) => render_status(run, fmt),
        ReportOutput::SuccessRate(run) => render_success_rate(run, fmt),
        ReportOutput::Morning(run) => render_morning(run, fmt),
        ReportOutput::Traffic(run) => render_traffic(run),
        ReportOutput::Watchlist(run) => render_watchlist(run),
        ReportOutput::PartnerExport(run) => render_partner_export(run, fmt),
    };
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn skipped_lines(skipped: &[SkippedFile]) -> Vec<String> {
    if skipped.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![String::new()];
    lines.extend(section(&format!("Skipped files ({})", skipped.len())));
    lines.extend(skipped.iter().map(|s| format!("{}: {}", s.file, s.reason)));
    lines
}

// ── Status ────────────────────────────────────────────────────────────────────

pub fn render_status(run: &StatusRun, fmt: &NumberFormat) -> Vec<String> {
    let mut lines = Header::new("Status report").to_lines();

    for report in &run.reports {
        lines.extend(section(&report.file));
        let rows: Vec<(String, String)> = report
            .totals
            .iter()
            .map(|(status, totals)| {
                (
                    format!("{status}:"),
                    format!("{} transactions, {}", fmt.count(totals.count), fmt.amount(totals.amount)),
                )
            })
            .collect();
        lines.extend(aligned_rows(&rows));
        if report.skipped_rows > 0 || report.unknown_status_rows > 0 {
            lines.push(format!(
                "({} rows without status or amount, {} rows with other statuses)",
                report.skipped_rows, report.unknown_status_rows
            ));
        }
        lines.push(String::new());
    }

    lines.extend(skipped_lines(&run.skipped));
    lines
}

// ── Success rate ──────────────────────────────────────────────────────────────

pub fn render_success_rate(run: &SuccessRun, fmt: &NumberFormat) -> Vec<String> {
    let s = &run.summary;
    let mut lines = Header::new("Success rate").to_lines();
    let rows = vec![
        ("Files processed:".to_string(), run.files.len().to_string()),
        ("Total operations:".to_string(), fmt.count(s.total)),
        ("Successful operations:".to_string(), fmt.count(s.successful)),
        (
            "Success rate:".to_string(),
            format!("{}%", format_number_in(s.success_rate(), 2, fmt.locale)),
        ),
        ("Turnover:".to_string(), fmt.amount(s.turnover)),
    ];
    lines.extend(aligned_rows(&rows));
    lines.extend(skipped_lines(&run.skipped));
    lines
}

// ── Morning ───────────────────────────────────────────────────────────────────

pub fn render_morning(run: &MorningRun, fmt: &NumberFormat) -> Vec<String> {
    let cutoff = format!("before {:02}:00", run.cutoff_hour);
    let mut lines = Header::new("Morning transactions")
        .with_context(cutoff.clone())
        .with_context(run.timezone.clone())
        .to_lines();

    for file in &run.tally.files {
        lines.push(format!(
            "{}: {} rows, {} {}, {} with unreadable time",
            file.file,
            fmt.count(file.total_rows),
            fmt.count(file.before_cutoff),
            cutoff,
            fmt.count(file.time_errors)
        ));
    }

    lines.push(String::new());
    lines.extend(section(&format!(
        "Merchants {} (total {})",
        cutoff,
        fmt.count(run.tally.total())
    )));
    let merchants = run.tally.merchants_by_count();
    if merchants.is_empty() {
        lines.push("No transactions.".to_string());
    } else {
        let rows: Vec<(String, String)> = merchants
            .into_iter()
            .map(|(m, c)| (m, fmt.count(c)))
            .collect();
        lines.extend(aligned_rows(&rows));
    }

    lines.extend(skipped_lines(&run.skipped));
    lines
}

// ── Traffic ───────────────────────────────────────────────────────────────────

fn bucket_lines(
    buckets: &ChangeBuckets,
    label: impl Fn(&ChangeRecord) -> String,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (title, records) in [
        ("Increase", &buckets.increasing),
        ("Decrease", &buckets.decreasing),
        ("No change", &buckets.unchanged),
    ] {
        if records.is_empty() {
            continue;
        }
        lines.push(format!("{title}:"));
        lines.extend(records.iter().map(|r| format!("  {}", label(r))));
    }
    lines
}

fn dump_section(lines: &mut Vec<String>, title: &str, buckets: &ChangeBuckets) {
    if buckets.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.extend(section(&format!("{title} ({})", buckets.len())));
    lines.extend(bucket_lines(buckets, ChangeRecord::line));
}

/// Full analytics dump: every subject, specials marked.
pub fn render_dump(report: &TrafficReport) -> Vec<String> {
    let mut lines = section(&format!("Analytics dump ({})", report.dump.len()));
    if report.dump.is_empty() {
        lines.push("No merchants.".to_string());
    } else {
        lines.extend(bucket_lines(&report.dump, |r| {
            if report.is_special(&r.subject) {
                format!("[SPECIAL] {}", r.line())
            } else {
                r.line()
            }
        }));
    }
    dump_section(&mut lines, "Excluded", &report.excluded);
    dump_section(&mut lines, "Hidden ids", &report.hidden);
    dump_section(&mut lines, "Without id", &report.empty_id);
    lines
}

/// Threshold report: the duty header and the significant changes, or the
/// single no-change sentence.
pub fn render_threshold(threshold: &ThresholdReport, duty: &DutyContext) -> Vec<String> {
    if !threshold.has_significant() {
        return vec![duty.no_changes_sentence()];
    }
    let mut lines = vec![duty.header()];
    lines.extend(bucket_lines(&threshold.significant, ChangeRecord::line));
    lines
}

pub fn render_traffic(run: &TrafficRun) -> Vec<String> {
    let report = &run.report;
    let mut lines = Header::new("Traffic comparison")
        .with_context(format!("{} files", run.files.len()))
        .with_context(format!("{} → {}", run.duty.base_date, run.duty.current_date))
        .to_lines();

    for file in &run.files {
        let mut line = format!("{} ({}): {} merchants", file.file, file.kind, file.rows);
        if file.coerced_cells > 0 {
            line.push_str(&format!(", {} values coerced", file.coerced_cells));
        }
        lines.push(line);
    }
    lines.push(String::new());

    lines.extend(render_dump(report));

    if !report.special.is_empty() {
        lines.push(String::new());
        lines.extend(section("Special accounts"));
        lines.extend(report.special.iter().map(|s| {
            let mark = if s.significant {
                "crosses a threshold"
            } else {
                "below thresholds"
            };
            format!("{} [{}]", s.record.line(), mark)
        }));
    }

    lines.push(String::new());
    lines.extend(section("Threshold report"));
    lines.extend(render_threshold(&report.threshold, &run.duty));

    lines.extend(skipped_lines(&run.skipped));
    lines
}

// ── Watchlist ─────────────────────────────────────────────────────────────────

pub fn render_watchlist(run: &WatchlistRun) -> Vec<String> {
    let mut lines = if run.lines.is_empty() {
        vec![run.duty.no_changes_sentence()]
    } else {
        let mut lines = vec![run.duty.header()];
        lines.extend(run.lines.iter().map(ChangeRecord::line));
        lines
    };
    lines.extend(skipped_lines(&run.skipped));
    lines
}

// ── Partner export ────────────────────────────────────────────────────────────

pub fn render_partner_export(run: &PartnerRun, fmt: &NumberFormat) -> Vec<String> {
    let export = &run.export;
    let mut lines = Header::new("Partner export")
        .with_context(run.partner.clone())
        .to_lines();
    let rows = vec![
        ("Input:".to_string(), run.input.display().to_string()),
        ("Partner rows:".to_string(), fmt.count(export.partner_rows as u64)),
        (
            "Window:".to_string(),
            format!("{} .. {}", export.window_start, export.window_end),
        ),
        ("Exported rows:".to_string(), fmt.count(export.rows.len() as u64)),
        ("Output:".to_string(), run.output.display().to_string()),
    ];
    lines.extend(aligned_rows(&rows));
    lines
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::change::Thresholds;
    use report_core::models::{CountPair, SpecialAccount, StatusTotals};
    use report_data::aggregator::{StatusReport, SuccessSummary};
    use report_data::traffic::TrafficAggregation;

    fn duty() -> DutyContext {
        DutyContext {
            officer: "Petrov".to_string(),
            report_time: "12:00".to_string(),
            base_date: "06.01.2026".to_string(),
            current_date: "13.01.2026".to_string(),
        }
    }

    fn traffic_run(rows: &[(&str, u64, u64)], special: &[(&str, u64, u64)]) -> TrafficRun {
        let mut aggregation = TrafficAggregation::default();
        for (subject, b, c) in rows {
            aggregation.main.add(subject, CountPair::new(*b, *c));
        }
        let special: Vec<(SpecialAccount, CountPair)> = special
            .iter()
            .map(|(n, b, c)| (SpecialAccount::new(*n, ""), CountPair::new(*b, *c)))
            .collect();
        TrafficRun {
            report: TrafficReport::build(&aggregation, &special, &Thresholds::default()),
            duty: duty(),
            files: Vec::new(),
            skipped: Vec::new(),
        }
    }

    // ── Status / success rate ─────────────────────────────────────────────────

    #[test]
    fn test_render_status_amounts_in_locale() {
        let run = StatusRun {
            reports: vec![StatusReport {
                file: "Transaction-1.xlsx".to_string(),
                totals: vec![
                    (
                        "CAPTURED".to_string(),
                        StatusTotals {
                            count: 1200,
                            amount: 1234567.891,
                        },
                    ),
                    ("DECLINED".to_string(), StatusTotals::default()),
                ],
                skipped_rows: 0,
                unknown_status_rows: 0,
            }],
            skipped: vec![SkippedFile {
                file: "Transaction-2.xlsx".to_string(),
                reason: "too few columns".to_string(),
            }],
        };
        let text = render(&ReportOutput::Status(run), &NumberFormat::default());
        assert!(text.contains("CAPTURED:  1 200 transactions, 1 234 567,89 RUB"));
        assert!(text.contains("DECLINED:  0 transactions, 0,00 RUB"));
        assert!(text.contains("Transaction-2.xlsx: too few columns"));
    }

    #[test]
    fn test_render_success_rate() {
        let run = SuccessRun {
            summary: SuccessSummary {
                total: 4,
                successful: 2,
                turnover: 400.5,
            },
            files: vec!["a".to_string(), "b".to_string()],
            skipped: Vec::new(),
        };
        let fmt = NumberFormat {
            locale: Locale::En,
            currency: "USD".to_string(),
        };
        let lines = render_success_rate(&run, &fmt);
        assert!(lines.iter().any(|l| l.ends_with("50.00%")));
        assert!(lines.iter().any(|l| l.ends_with("400.50 USD")));
    }

    // ── Traffic ───────────────────────────────────────────────────────────────

    #[test]
    fn test_render_traffic_sections() {
        let run = traffic_run(
            &[("Acme", 100, 150), ("Beta", 0, 10), ("Gamma", 40, 0), ("Delta", 20, 21)],
            &[("Solo", 10, 10)],
        );
        let text = render(&ReportOutput::Traffic(run), &NumberFormat::default());

        assert!(text.contains("  Beta — new flow (0 → 10)"));
        assert!(text.contains("  Delta — +5.00% (20 → 21)"));
        assert!(text.contains("  [SPECIAL] Solo — +0.00% (10 → 10)"));
        assert!(text.contains("Solo — +0.00% (10 → 10) [below thresholds]"));

        let threshold = text.split("Threshold report").nth(1).unwrap();
        assert!(threshold.contains("Duty officer Petrov."));
        assert!(threshold.contains("Acme — +50.00% (100 → 150)"));
        assert!(threshold.contains("Gamma — -100.00% (closed) (40 → 0)"));
        assert!(!threshold.contains("Delta"));
        // New flows lead the increase section.
        assert!(threshold.find("Beta").unwrap() < threshold.find("Acme").unwrap());
    }

    #[test]
    fn test_render_threshold_no_changes() {
        let run = traffic_run(&[("Delta", 20, 21)], &[]);
        let lines = render_threshold(&run.report.threshold, &run.duty);
        assert_eq!(lines, vec![duty().no_changes_sentence()]);
    }

    // ── Watchlist ─────────────────────────────────────────────────────────────

    #[test]
    fn test_render_watchlist() {
        let run = WatchlistRun {
            lines: vec![ChangeRecord::new("3953 Acme", 1000, 2000)],
            duty: duty(),
            rows_read: 5,
            skipped: Vec::new(),
        };
        assert_eq!(
            render_watchlist(&run),
            vec![duty().header(), "3953 Acme — +100.00% (1000 → 2000)".to_string()]
        );

        let empty = WatchlistRun {
            lines: Vec::new(),
            ..run
        };
        assert_eq!(render_watchlist(&empty), vec![duty().no_changes_sentence()]);
    }
}

//! Partner payment export: filter by partner and payment date, project a
//! fixed column set and write it as a formatted workbook.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use report_core::error::{ReportError, Result};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use report_core::time_utils::parse_with_format;
use tracing::{debug, info, warn};

use crate::table::Table;

/// Output columns, in order.
pub const EXPORT_COLUMNS: [&str; 11] = [
    "id",
    "partner.id",
    "partner.name",
    "pid",
    "status",
    "phone",
    "amount",
    "created",
    "changed",
    "payment_time",
    "parameters",
];

/// Layouts tried for `payment_time`; the first that parses any row wins.
pub const PAYMENT_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y",
    "%Y-%m-%d",
];

const PARTNER_COLUMN: &str = "partner.name";
const PAYMENT_TIME_COLUMN: &str = "payment_time";
const REFORMATTED_COLUMNS: &[&str] = &["created", "changed", "payment_time"];
const SOURCE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SHEET_DATE_FORMAT: &str = "%m/%d/%y %H:%M";

const SHEET_NAME: &str = "Лист1";
/// Column widths in character units, matching `EXPORT_COLUMNS`.
const COLUMN_WIDTHS: [f64; 11] = [10.0, 10.0, 40.0, 15.0, 12.0, 15.0, 12.0, 18.0, 18.0, 18.0, 70.0];

/// Result of filtering a partner export.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerExport {
    pub rows: Vec<Vec<String>>,
    /// Rows left after the partner filter, before the date filter.
    pub partner_rows: usize,
    /// Payment time layout in use, if any parsed.
    pub time_format: Option<&'static str>,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
}

/// Rewrite `%Y-%m-%d %H:%M:%S` timestamps as `%m/%d/%y %H:%M`; anything
/// else is returned unchanged.
pub fn format_sheet_date(value: &str) -> String {
    match NaiveDateTime::parse_from_str(value.trim(), SOURCE_DATE_FORMAT) {
        Ok(dt) => dt.format(SHEET_DATE_FORMAT).to_string(),
        Err(_) => value.to_string(),
    }
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Normalize the free-form `parameters` field for spreadsheet display.
pub fn clean_parameters(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "[]" || trimmed.eq_ignore_ascii_case("nan") {
        return String::new();
    }
    let replaced = trimmed
        .replace(';', ",")
        .replace('{', "[")
        .replace('}', "]")
        .replace('\'', "\"")
        .replace("=\"", "='");
    whitespace().replace_all(&replaced, " ").into_owned()
}

/// Move `date` into `year`, keeping month and day when that date exists.
fn with_year(date: NaiveDate, year: i32) -> NaiveDate {
    date.with_year(year).unwrap_or(date)
}

fn required_column(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| ReportError::ColumnNotFound(name.to_string()))
}

/// Filter `table` (header row promoted) to `partner`'s payments between
/// `start` and `end` inclusive.
///
/// When the data's year differs from `start`'s year the window is moved to
/// the data year.
pub fn build_partner_export(
    table: &Table,
    partner: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PartnerExport> {
    let partner_col = required_column(table, PARTNER_COLUMN)?;
    let time_col = required_column(table, PAYMENT_TIME_COLUMN)?;
    let output_cols: Vec<usize> = EXPORT_COLUMNS
        .iter()
        .map(|name| required_column(table, name))
        .collect::<Result<_>>()?;

    let needle = partner.to_lowercase();
    let partner_rows: Vec<usize> = (0..table.len())
        .filter(|&r| table.cell(r, partner_col).to_lowercase().contains(&needle))
        .collect();
    info!("{} rows after filtering by partner '{}'", partner_rows.len(), partner);

    let time_format = PAYMENT_TIME_FORMATS.iter().copied().find(|fmt| {
        partner_rows
            .iter()
            .any(|&r| parse_with_format(table.cell(r, time_col), fmt).is_some())
    });
    let parsed: Vec<(usize, Option<NaiveDateTime>)> = partner_rows
        .iter()
        .map(|&r| {
            let dt = time_format.and_then(|fmt| parse_with_format(table.cell(r, time_col), fmt));
            (r, dt)
        })
        .collect();

    let (mut start, mut end) = (start, end);
    match time_format {
        Some(fmt) => debug!("payment_time parsed as {}", fmt),
        None if !partner_rows.is_empty() => warn!("payment_time matches none of the known formats"),
        None => {}
    }
    if let Some(data_year) = parsed.iter().find_map(|(_, dt)| dt.map(|d| d.year())) {
        if data_year != start.year() {
            start = with_year(start, data_year);
            end = with_year(end, data_year);
            info!("Date window moved to data year: {} .. {}", start, end);
        }
    }

    let window_start = start.and_time(NaiveTime::MIN);
    let window_end = end.and_hms_opt(23, 59, 59).unwrap_or(window_start);

    let rows: Vec<Vec<String>> = parsed
        .iter()
        .filter(|(_, dt)| dt.is_some_and(|d| d >= window_start && d <= window_end))
        .map(|(r, _)| {
            EXPORT_COLUMNS
                .iter()
                .zip(&output_cols)
                .map(|(name, &col)| {
                    let value = table.cell(*r, col);
                    if *name == "parameters" {
                        clean_parameters(value)
                    } else if REFORMATTED_COLUMNS.contains(name) {
                        format_sheet_date(value)
                    } else {
                        value.to_string()
                    }
                })
                .collect()
        })
        .collect();

    info!(
        "{} of {} partner rows inside {} .. {}",
        rows.len(),
        partner_rows.len(),
        window_start,
        window_end
    );

    Ok(PartnerExport {
        rows,
        partner_rows: partner_rows.len(),
        time_format,
        window_start,
        window_end,
    })
}

/// Default output name: `report_<YYYYmmdd_HHMMSS>.xlsx`.
pub fn default_output_name(now: NaiveDateTime) -> String {
    format!("report_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

/// Write the export as a single-sheet workbook: bold header row, thin
/// borders and wrapped text on every cell, fixed column widths.
pub fn write_xlsx(export: &PartnerExport, path: &Path) -> Result<()> {
    let xlsx_err = |e: XlsxError| ReportError::Spreadsheet {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let body = Format::new()
        .set_border(FormatBorder::Thin)
        .set_text_wrap()
        .set_align(FormatAlign::Top);
    let header = body.clone().set_bold();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(xlsx_err)?;

    for ((col, name), width) in (0u16..).zip(EXPORT_COLUMNS).zip(COLUMN_WIDTHS) {
        sheet.set_column_width(col, width).map_err(xlsx_err)?;
        sheet
            .write_string_with_format(0, col, name, &header)
            .map_err(xlsx_err)?;
    }
    for (row_idx, row) in (1u32..).zip(&export.rows) {
        for (col, value) in (0u16..).zip(row) {
            sheet
                .write_string_with_format(row_idx, col, value.as_str(), &body)
                .map_err(xlsx_err)?;
        }
    }

    workbook.save(path).map_err(xlsx_err)?;
    debug!("Wrote {} rows to sheet {}", export.rows.len(), SHEET_NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_spreadsheet;
    use tempfile::TempDir;

    fn export_table(rows: Vec<Vec<String>>) -> Table {
        let mut all = vec![EXPORT_COLUMNS.iter().map(|s| s.to_string()).collect::<Vec<_>>()];
        all.extend(rows);
        Table::new("in.csv", all).with_header_row()
    }

    fn payment(id: &str, partner: &str, time: &str, params: &str) -> Vec<String> {
        [
            id,
            "7",
            partner,
            "p1",
            "PAID",
            "+7900",
            "100.00",
            "2025-01-15 09:00:00",
            "2025-01-15 09:05:00",
            time,
            params,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_clean_parameters() {
        assert_eq!(clean_parameters("[]"), "");
        assert_eq!(clean_parameters(""), "");
        assert_eq!(
            clean_parameters("{'a': 1;  'b':   2}"),
            "[\"a\": 1, \"b\": 2]"
        );
        assert_eq!(clean_parameters("k='v'"), "k='v\"");
    }

    #[test]
    fn test_format_sheet_date() {
        assert_eq!(format_sheet_date("2026-01-15 20:21:51"), "01/15/26 20:21");
        assert_eq!(format_sheet_date("15.01.2026"), "15.01.2026");
    }

    #[test]
    fn test_partner_filter_and_window() {
        let t = export_table(vec![
            payment("1", "ООО МосТех", "2025-01-15 10:30:00", "[]"),
            payment("2", "мостех групп", "2025-01-15 23:59:59", ""),
            payment("3", "ООО МосТех", "2025-01-16 00:00:00", ""),
            payment("4", "Other", "2025-01-15 11:00:00", ""),
            payment("5", "МосТех", "bad", ""),
        ]);
        let export =
            build_partner_export(&t, "МосТех", date("2025-01-15"), date("2025-01-15")).unwrap();
        assert_eq!(export.partner_rows, 4);
        assert_eq!(export.time_format, Some("%Y-%m-%d %H:%M:%S"));
        let ids: Vec<&str> = export.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(export.rows[0][7], "01/15/25 09:00");
        assert_eq!(export.rows[0][9], "01/15/25 10:30");
        assert_eq!(export.rows[0][10], "");
    }

    #[test]
    fn test_window_moves_to_data_year() {
        let t = export_table(vec![payment("1", "МосТех", "15.01.2026 10:30", "")]);
        let export =
            build_partner_export(&t, "МосТех", date("2025-01-15"), date("2025-01-16")).unwrap();
        assert_eq!(export.time_format, Some("%d.%m.%Y %H:%M"));
        assert_eq!(export.window_start.date(), date("2026-01-15"));
        assert_eq!(export.window_end.date(), date("2026-01-16"));
        assert_eq!(export.rows.len(), 1);
        // Not in the source layout, left as is.
        assert_eq!(export.rows[0][9], "15.01.2026 10:30");
    }

    #[test]
    fn test_missing_column_is_error() {
        let t = Table::new(
            "in.csv",
            vec![vec!["id".to_string(), "partner.name".to_string()]],
        )
        .with_header_row();
        let err = build_partner_export(&t, "x", date("2025-01-01"), date("2025-01-01")).unwrap_err();
        assert!(matches!(err, ReportError::ColumnNotFound(c) if c == "payment_time"));
    }

    #[test]
    fn test_write_xlsx_round_trips_through_reader() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.xlsx");
        let t = export_table(vec![payment("1", "МосТех", "2025-01-15 10:30:00", "{'a': 1}")]);
        let export =
            build_partner_export(&t, "МосТех", date("2025-01-15"), date("2025-01-15")).unwrap();
        write_xlsx(&export, &path).unwrap();

        let sheet = read_spreadsheet(&path).unwrap().with_header_row();
        assert_eq!(sheet.headers, EXPORT_COLUMNS.to_vec());
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.cell(0, 0), "1");
        assert_eq!(sheet.cell(0, 2), "МосТех");
        assert_eq!(sheet.cell(0, 9), "01/15/25 10:30");
        assert_eq!(sheet.cell(0, 10), "[\"a\": 1]");
    }

    #[test]
    fn test_write_xlsx_reports_unwritable_path() {
        let tmp = TempDir::new().unwrap();
        let export = build_partner_export(
            &export_table(Vec::new()),
            "x",
            date("2025-01-15"),
            date("2025-01-15"),
        )
        .unwrap();
        let err = write_xlsx(&export, &tmp.path().join("missing").join("out.xlsx")).unwrap_err();
        assert!(matches!(err, ReportError::Spreadsheet { .. }));
    }

    #[test]
    fn test_default_output_name() {
        let now = NaiveDateTime::parse_from_str("2026-01-13 12:05:09", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(default_output_name(now), "report_20260113_120509.xlsx");
    }
}

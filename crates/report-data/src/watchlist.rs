//! Alerting-style comparison restricted to a watchlist of accounts.

use report_core::change::{sort_by_magnitude, ChangeRecord, Thresholds};
use report_core::error::{ReportError, Result};
use report_core::models::CountPair;
use report_core::numbers::parse_grouped_count;
use tracing::{debug, warn};

use crate::table::Table;

const ACCOUNT_HEADERS: &[&str] = &["Аккаунт", "Account"];
const ID_HEADER: &str = "ID";
const MIN_COLUMNS: usize = 4;

/// One row of a watchlist export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistRow {
    pub id: String,
    pub account: String,
    pub values: CountPair,
}

impl WatchlistRow {
    pub fn label(&self) -> String {
        if self.id.is_empty() {
            self.account.clone()
        } else {
            format!("{} {}", self.id, self.account)
        }
    }
}

/// Read rows from a header table: account and id by header name, baseline
/// and current from the last two columns.
pub fn read_rows(table: &Table) -> Result<Vec<WatchlistRow>> {
    let width = table.headers.len();
    if width < MIN_COLUMNS {
        return Err(ReportError::TooFewColumns {
            path: table.source.clone(),
            found: width,
            required: MIN_COLUMNS,
        });
    }

    let account_col = ACCOUNT_HEADERS.iter().find_map(|h| table.column_index(h));
    let id_col = table.column_index(ID_HEADER);
    if account_col.is_none() {
        warn!("{}: no account column, accounts read as empty", table.file_name());
    }
    if id_col.is_none() {
        warn!("{}: no ID column, ids read as empty", table.file_name());
    }
    let (base_col, current_col) = (width - 2, width - 1);
    debug!(
        "{}: baseline '{}', current '{}'",
        table.file_name(),
        table.headers[base_col],
        table.headers[current_col]
    );

    let text = |row: usize, col: Option<usize>| {
        col.map(|c| table.cell(row, c).trim().to_string())
            .unwrap_or_default()
    };

    Ok((0..table.len())
        .map(|row| {
            let baseline = parse_grouped_count(table.cell(row, base_col));
            let current = parse_grouped_count(table.cell(row, current_col));
            if baseline.coerced || current.coerced {
                warn!("{}: row {} has a malformed count, read as 0", table.file_name(), row + 2);
            }
            WatchlistRow {
                id: text(row, id_col),
                account: text(row, account_col),
                values: CountPair::new(baseline.value, current.value),
            }
        })
        .collect())
}

/// Exact id or account match, or any non-empty entry contained in the
/// account name.
pub fn in_watchlist(account: &str, id: &str, watchlist: &[String]) -> bool {
    watchlist.iter().any(|w| {
        let w = w.trim();
        !w.is_empty() && (w == id || w == account || account.contains(w))
    })
}

/// Watchlist rows as change records, largest absolute delta first.
///
/// Unless `include_insignificant` is set only threshold crossings are kept.
pub fn build_lines(
    rows: &[WatchlistRow],
    watchlist: &[String],
    thresholds: &Thresholds,
    include_insignificant: bool,
) -> Vec<ChangeRecord> {
    let mut records: Vec<ChangeRecord> = rows
        .iter()
        .filter(|r| in_watchlist(&r.account, &r.id, watchlist))
        .map(|r| ChangeRecord::new(r.label(), r.values.baseline, r.values.current))
        .filter(|r| include_insignificant || thresholds.is_significant(r))
        .collect();
    sort_by_magnitude(&mut records);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Table {
        let mut all = vec![vec![
            "Аккаунт".to_string(),
            "ID".to_string(),
            "06.01.2026".to_string(),
            "13.01.2026".to_string(),
        ]];
        all.extend(rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
        Table::new("Sheet1.csv", all).with_header_row()
    }

    fn watch(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_rows() {
        let rows = read_rows(&sheet(&[&["Acme", "3953", "2,345", "1 000"], &["Beta", "", "x", ""]]))
            .unwrap();
        assert_eq!(rows[0].values, CountPair::new(2345, 1000));
        assert_eq!(rows[0].label(), "3953 Acme");
        assert_eq!(rows[1].values, CountPair::new(0, 0));
        assert_eq!(rows[1].label(), "Beta");
    }

    #[test]
    fn test_read_rows_too_few_columns() {
        let t = Table::new("s.csv", vec![vec!["Account".into(), "ID".into(), "x".into()]])
            .with_header_row();
        assert!(matches!(
            read_rows(&t),
            Err(ReportError::TooFewColumns { required: 4, .. })
        ));
    }

    #[test]
    fn test_in_watchlist() {
        let list = watch(&["3953", "PAY365/ZT", ""]);
        assert!(in_watchlist("Acme", "3953", &list));
        assert!(in_watchlist("PAY365/ZT/Aghanim Inc.", "9", &list));
        assert!(!in_watchlist("Other", "1", &list));
        assert!(!in_watchlist("Other", "", &watch(&[""])));
    }

    #[test]
    fn test_build_lines_threshold_and_order() {
        let rows = read_rows(&sheet(&[
            &["Acme", "1", "100", "150"],
            &["Beta", "2", "0", "10"],
            &["Gamma", "3", "40", "0"],
            &["Delta", "4", "20", "21"],
            &["Unwatched", "5", "0", "1000"],
        ]))
        .unwrap();
        let list = watch(&["1", "2", "3", "4"]);

        let lines = build_lines(&rows, &list, &Thresholds::default(), false);
        let text: Vec<String> = lines.iter().map(ChangeRecord::line).collect();
        assert_eq!(
            text,
            vec![
                "1 Acme — +50.00% (100 → 150)",
                "3 Gamma — -100.00% (closed) (40 → 0)",
                "2 Beta — new flow (0 → 10)",
            ]
        );

        let all = build_lines(&rows, &list, &Thresholds::default(), true);
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].subject, "4 Delta");
    }
}

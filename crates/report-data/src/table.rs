//! In-memory row/column view of one loaded export file.

use std::path::{Path, PathBuf};

/// A loaded file: every cell is kept as trimmed-on-read text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Headerless table.
    pub fn new(source: impl Into<PathBuf>, rows: Vec<Vec<String>>) -> Self {
        Self {
            source: source.into(),
            headers: Vec::new(),
            rows,
        }
    }

    /// Promote the first row to the header row. No-op on an empty table.
    pub fn with_header_row(mut self) -> Self {
        if !self.rows.is_empty() {
            self.headers = self.rows.remove(0);
        }
        self
    }

    /// Cell text, or `""` when the row or column is out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Widest row (or header) in the table.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop a leading title row whose first cell equals `title`
    /// (case-insensitive). Returns whether a row was dropped.
    pub fn drop_title_row(&mut self, title: &str) -> bool {
        let matches = self
            .rows
            .first()
            .and_then(|r| r.first())
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(title));
        if matches {
            self.rows.remove(0);
        }
        matches
    }

    pub fn skip_rows(&mut self, n: usize) {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
    }

    /// Remove rows whose cells are all blank.
    pub fn drop_blank_rows(&mut self) {
        self.rows
            .retain(|r| r.iter().any(|c| !c.trim().is_empty()));
    }

    /// Index of the header equal to `name` after trimming.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn file_name(&self) -> String {
        file_name(&self.source)
    }
}

/// Final path component as a string, or the whole path when there is none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> Table {
        Table::new(
            "t.csv",
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_cell_out_of_range_is_empty() {
        let t = table(&[&["a", "b"], &["c"]]);
        assert_eq!(t.cell(0, 1), "b");
        assert_eq!(t.cell(1, 1), "");
        assert_eq!(t.cell(5, 0), "");
        assert_eq!(t.width(), 2);
    }

    #[test]
    fn test_header_and_title_rows() {
        let mut t = table(&[&["Transactions"], &["Id", "Merchant"], &["1", "Acme"]]);
        assert!(t.drop_title_row("transactions"));
        assert!(!t.drop_title_row("transactions"));
        let t = t.with_header_row();
        assert_eq!(t.headers, vec!["Id", "Merchant"]);
        assert_eq!(t.column_index("Merchant"), Some(1));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_skip_and_blank_rows() {
        let mut t = table(&[&["title"], &["", " "], &["x", "1"]]);
        t.skip_rows(1);
        t.drop_blank_rows();
        assert_eq!(t.len(), 1);
        assert_eq!(t.cell(0, 0), "x");
        t.skip_rows(10);
        assert!(t.is_empty());
    }
}

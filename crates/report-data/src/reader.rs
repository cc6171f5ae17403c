//! Export file discovery and loading.
//!
//! Delimited files are decoded by trying a list of text encodings in order,
//! then split by trying a list of delimiters. Spreadsheets are read from their
//! first worksheet. Either way the result is a [`Table`] of text cells.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, DataType, Reader};
use encoding_rs::Encoding;
use regex::Regex;
use report_core::error::{ReportError, Result};
use tracing::{debug, warn};

use crate::table::Table;

/// Encodings tried, in order, when decoding delimited files.
pub const DEFAULT_ENCODINGS: &[&str] = &[
    "utf-8-sig",
    "cp1251",
    "cp866",
    "iso-8859-5",
    "utf-16",
    "windows-1252",
];

/// Delimiters tried, in order, for traffic exports.
pub const DEFAULT_DELIMITERS: &[u8] = &[b',', b';', b'\t'];

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Translate a shell-style filename glob (`*`, `?`) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| ReportError::Config(format!("bad file pattern '{pattern}': {e}")))
}

fn dir_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Files directly inside `dir` whose name matches `pattern`, sorted by path.
///
/// Hidden files are skipped unless the pattern itself starts with a dot.
pub fn find_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let re = glob_to_regex(pattern)?;
    let allow_hidden = pattern.starts_with('.');

    let mut files: Vec<PathBuf> = dir_files(dir)
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| re.is_match(n) && (allow_hidden || !n.starts_with('.')))
        })
        .collect();

    if files.is_empty() {
        return Err(ReportError::NoMatchingFiles {
            pattern: pattern.to_string(),
            dir: dir.to_path_buf(),
        });
    }

    files.sort();
    debug!("Found {} files matching '{}' in {}", files.len(), pattern, dir.display());
    Ok(files)
}

/// Names of every regular file in `dir`, for "nothing matched" diagnostics.
pub fn available_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = dir_files(dir)
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn decode_with(label: &str, bytes: &[u8]) -> Option<String> {
    if label.eq_ignore_ascii_case("utf-8-sig") {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        return encoding_rs::UTF_8
            .decode_without_bom_handling_and_without_replacement(body)
            .map(|s| s.into_owned());
    }

    let encoding = Encoding::for_label(label.as_bytes())?;
    let body = if encoding == encoding_rs::UTF_16LE {
        bytes.strip_prefix(b"\xFF\xFE").unwrap_or(bytes)
    } else if encoding == encoding_rs::UTF_16BE {
        bytes.strip_prefix(b"\xFE\xFF").unwrap_or(bytes)
    } else {
        bytes
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|s| s.into_owned())
}

/// Decode `bytes` with the first encoding in `encodings` that accepts them.
/// Returns the text and the label that worked.
pub fn decode_bytes<'a>(path: &Path, bytes: &[u8], encodings: &[&'a str]) -> Result<(String, &'a str)> {
    for &label in encodings {
        match decode_with(label, bytes) {
            Some(text) => {
                debug!("Decoded {} as {}", path.display(), label);
                return Ok((text, label));
            }
            None => debug!("{} is not valid {}", path.display(), label),
        }
    }
    Err(ReportError::UndecodableFile {
        path: path.to_path_buf(),
        tried: encodings.join(", "),
    })
}

// ── Delimited text ────────────────────────────────────────────────────────────

fn split_rows(text: &str, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Split `text` with the first delimiter that yields at least two columns.
/// Falls back to the first delimiter that parsed at all.
pub fn parse_delimited(text: &str, delimiters: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut fallback: Option<Vec<Vec<String>>> = None;
    let mut last_err: Option<ReportError> = None;

    for &delimiter in delimiters {
        match split_rows(text, delimiter) {
            Ok(rows) => {
                let width = rows.iter().map(Vec::len).max().unwrap_or(0);
                if width >= 2 {
                    debug!("Using delimiter {:?}", delimiter as char);
                    return Ok(rows);
                }
                fallback.get_or_insert(rows);
            }
            Err(e) => last_err = Some(e),
        }
    }

    match (fallback, last_err) {
        (Some(rows), _) => Ok(rows),
        (None, Some(e)) => Err(e),
        (None, None) => Ok(Vec::new()),
    }
}

/// Read a delimited file, trying `encodings` then `delimiters`.
pub fn read_delimited(path: &Path, encodings: &[&str], delimiters: &[u8]) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|source| ReportError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, _) = decode_bytes(path, &bytes, encodings)?;
    let rows = parse_delimited(&text, delimiters)?;
    Ok(Table::new(path, rows))
}

// ── Spreadsheets ──────────────────────────────────────────────────────────────

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Text of one spreadsheet cell. Dates render as `%Y-%m-%d %H:%M:%S`;
/// error cells read as blank.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Read the first worksheet of a workbook.
pub fn read_spreadsheet(path: &Path) -> Result<Table> {
    let spreadsheet_err = |message: String| ReportError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| spreadsheet_err("workbook has no worksheets".to_string()))?
        .map_err(|e| spreadsheet_err(e.to_string()))?;

    // Keep column positions absolute even when the used range starts right of A.
    let col_offset = range.start().map(|(_, c)| c as usize).unwrap_or(0);

    let rows = range
        .rows()
        .map(|row| {
            std::iter::repeat(String::new())
                .take(col_offset)
                .chain(row.iter().map(cell_text))
                .collect()
        })
        .collect();

    Ok(Table::new(path, rows))
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SPREADSHEET_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Load any supported export, choosing the reader by file extension.
pub fn load_table(path: &Path, delimiters: &[u8]) -> Result<Table> {
    let table = if is_spreadsheet(path) {
        read_spreadsheet(path)?
    } else {
        read_delimited(path, DEFAULT_ENCODINGS, delimiters)?
    };
    if table.is_empty() {
        warn!("{} contains no rows", path.display());
    }
    Ok(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

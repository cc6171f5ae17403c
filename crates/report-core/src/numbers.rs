//! Lossy numeric coercion for spreadsheet cells.
//!
//! Malformed input never raises: it becomes zero (or `None` for amounts) and
//! the caller is told that a coercion happened so it can log it.

use std::sync::OnceLock;

use regex::Regex;

/// A parsed count together with whether the input had to be coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coerced {
    pub value: u64,
    /// `true` when the cell was non-empty but not a clean number.
    pub coerced: bool,
}

impl Coerced {
    fn clean(value: u64) -> Self {
        Self {
            value,
            coerced: false,
        }
    }

    fn lossy(value: u64) -> Self {
        Self {
            value,
            coerced: true,
        }
    }
}

/// Values at or above this do not fit a count and are coerced to zero.
const MAX_COUNT: f64 = u64::MAX as f64;

fn non_numeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\d,\-]").expect("valid regex"))
}

fn is_blank(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty() || t.eq_ignore_ascii_case("nan")
}

/// Coerce a traffic-export cell to a non-negative count.
///
/// Everything except digits, commas and minus signs is stripped, a comma is
/// read as the decimal separator and the fraction is truncated:
/// `"1 234,7"` → 1234. Blank cells are zero without counting as a coercion;
/// unparseable text, negative values and values too large for a `u64`
/// become zero with `coerced` set.
pub fn coerce_count(raw: &str) -> Coerced {
    if is_blank(raw) {
        return Coerced::clean(0);
    }
    let stripped = non_numeric().replace_all(raw.trim(), "");
    let normalised = stripped.replace(',', ".");
    if normalised.is_empty() {
        return Coerced::lossy(0);
    }
    match normalised.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v < MAX_COUNT => {
            let exact = normalised == raw.trim();
            let value = v.trunc() as u64;
            if exact {
                Coerced::clean(value)
            } else {
                // Thousands spaces are routine in these exports; only flag
                // input that lost something other than grouping.
                let grouped_only = raw
                    .trim()
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == ',' || c.is_whitespace());
                Coerced {
                    value,
                    coerced: !grouped_only,
                }
            }
        }
        Ok(_) => Coerced::lossy(0),
        Err(_) => Coerced::lossy(0),
    }
}

/// Parse a count written with comma or space thousands grouping:
/// `"2,345"` → 2345. Anything else that is not an integer becomes zero.
pub fn parse_grouped_count(raw: &str) -> Coerced {
    if raw.trim().is_empty() {
        return Coerced::clean(0);
    }
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<u64>() {
        Ok(v) => Coerced::clean(v),
        Err(_) => Coerced::lossy(0),
    }
}

/// Parse a monetary amount cell. Accepts `.` or `,` as the decimal separator
/// and ignores spaces and non-breaking spaces used for grouping. Returns
/// `None` when the cell is blank or not a number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    if is_blank(raw) {
        return None;
    }
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    let normalised = if cleaned.contains('.') {
        cleaned.replace(',', "")
    } else {
        cleaned.replace(',', ".")
    };
    normalised.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── coerce_count ──────────────────────────────────────────────────────────

    #[test]
    fn test_coerce_plain_integer() {
        assert_eq!(coerce_count("1500"), Coerced::clean(1500));
    }

    #[test]
    fn test_coerce_empty_and_nan_are_zero() {
        assert_eq!(coerce_count(""), Coerced::clean(0));
        assert_eq!(coerce_count("   "), Coerced::clean(0));
        assert_eq!(coerce_count("nan"), Coerced::clean(0));
    }

    #[test]
    fn test_coerce_non_numeric_text_is_zero() {
        let c = coerce_count("n/a");
        assert_eq!(c.value, 0);
        assert!(c.coerced);
    }

    #[test]
    fn test_coerce_decimal_comma_truncates() {
        assert_eq!(coerce_count("12,9").value, 12);
    }

    #[test]
    fn test_coerce_thousands_space_not_flagged() {
        let c = coerce_count("1 234");
        assert_eq!(c.value, 1234);
        assert!(!c.coerced);
    }

    #[test]
    fn test_coerce_negative_is_zero() {
        let c = coerce_count("-5");
        assert_eq!(c.value, 0);
        assert!(c.coerced);
    }

    #[test]
    fn test_coerce_oversized_is_zero() {
        let c = coerce_count("99999999999999999999");
        assert_eq!(c.value, 0);
        assert!(c.coerced);
        assert_eq!(coerce_count("18446744073709549568").value, 18446744073709549568);
    }

    #[test]
    fn test_coerce_suffix_flagged() {
        let c = coerce_count("300 pcs");
        assert_eq!(c.value, 300);
        assert!(c.coerced);
    }

    // ── parse_grouped_count ───────────────────────────────────────────────────

    #[test]
    fn test_grouped_count_commas() {
        assert_eq!(parse_grouped_count("2,345").value, 2345);
        assert_eq!(parse_grouped_count(" 1 000 ").value, 1000);
    }

    #[test]
    fn test_grouped_count_malformed() {
        assert_eq!(parse_grouped_count(""), Coerced::clean(0));
        let c = parse_grouped_count("12.5");
        assert_eq!(c.value, 0);
        assert!(c.coerced);
        assert!(parse_grouped_count("99,999,999,999,999,999,999").coerced);
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount("1500.50"), Some(1500.5));
        assert_eq!(parse_amount("1 500,50"), Some(1500.5));
        assert_eq!(parse_amount("1,500.50"), Some(1500.5));
        assert_eq!(parse_amount("42"), Some(42.0));
    }

    #[test]
    fn test_parse_amount_rejects_text() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("abc"), None);
    }
}

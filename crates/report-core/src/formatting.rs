use std::fmt;
use std::str::FromStr;

use crate::error::ReportError;

/// Number formatting conventions for report totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    /// Space grouping, decimal comma: `1 234 567,89`.
    #[default]
    Ru,
    /// Comma grouping, decimal point: `1,234,567.89`.
    En,
}

impl Locale {
    fn separators(self) -> (char, char) {
        match self {
            Locale::Ru => (' ', ','),
            Locale::En => (',', '.'),
        }
    }
}

impl FromStr for Locale {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ru" => Ok(Locale::Ru),
            "en" => Ok(Locale::En),
            other => Err(ReportError::Config(format!("unknown locale '{other}'"))),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::Ru => "ru",
            Locale::En => "en",
        })
    }
}

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places, using English separators.
///
/// # Examples
///
/// ```
/// use report_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    format_number_in(value, decimals, Locale::En)
}

/// Same as [`format_number`] with the separators of `locale`.
///
/// ```
/// use report_core::formatting::{format_number_in, Locale};
///
/// assert_eq!(format_number_in(1234567.891, 2, Locale::Ru), "1 234 567,89");
/// ```
pub fn format_number_in(value: f64, decimals: u32, locale: Locale) -> String {
    let (group_sep, decimal_sep) = locale.separators();

    let negative = value < 0.0;
    let abs_value = value.abs();

    // Half-ULP nudge at the target precision so exact midpoints round up.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let scaled = ((abs_value * factor) + epsilon).round() as u128;

    let divisor = 10_u128.pow(decimals);
    let integer_part = scaled / divisor;
    let frac_part = scaled % divisor;

    let grouped = group_thousands(&integer_part.to_string(), group_sep);

    let result = if decimals == 0 {
        grouped
    } else {
        format!(
            "{}{}{:0width$}",
            grouped,
            decimal_sep,
            frac_part,
            width = decimals as usize
        )
    };

    if negative && scaled != 0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a monetary amount with two decimals and a trailing currency code.
///
/// ```
/// use report_core::formatting::{format_currency, Locale};
///
/// assert_eq!(format_currency(1234567.89, Locale::Ru, "RUB"), "1 234 567,89 RUB");
/// assert_eq!(format_currency(0.0, Locale::En, "USD"), "0.00 USD");
/// ```
pub fn format_currency(amount: f64, locale: Locale, currency: &str) -> String {
    format!("{} {}", format_number_in(amount, 2, locale), currency)
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero to avoid division by zero.
///
/// ```
/// use report_core::formatting::percentage;
///
/// assert!((percentage(50.0, 200.0, 1) - 25.0).abs() < 1e-9);
/// assert_eq!(percentage(0.0, 0.0, 2), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert `sep` every three digits from the right of an integer string.
fn group_thousands(s: &str, sep: char) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(sep);
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

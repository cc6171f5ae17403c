use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{ReportError, Result};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Naive layouts seen in transaction exports, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Parses export timestamps and converts them to the report timezone.
///
/// Timestamps without an offset are taken to be UTC.
pub struct TimezoneHandler {
    tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler for the given IANA timezone name. Unknown names fall
    /// back to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Parse a timestamp cell into UTC. Returns `None` for blank cells and
    /// unrecognised formats.
    pub fn parse_timestamp(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("nan") {
            return None;
        }

        let normalised = match s.strip_suffix('Z') {
            Some(stripped) => format!("{}+00:00", stripped),
            None => s.to_string(),
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(&normalised, "%Y-%m-%d %H:%M:%S%:z") {
            return Some(dt.with_timezone(&Utc));
        }

        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive.and_utc());
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
        }

        None
    }

    pub fn to_local(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.tz)
    }

    /// Hour of day of a timestamp cell in the handler's timezone.
    pub fn local_hour(&self, s: &str) -> Option<u32> {
        self.parse_timestamp(s).map(|dt| self.to_local(dt).hour())
    }

    /// Current time in the handler's timezone.
    pub fn now(&self) -> DateTime<Tz> {
        self.to_local(Utc::now())
    }
}

// ── Calendar dates ────────────────────────────────────────────────────────────

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidDate(format!("{s} (expected YYYY-MM-DD)")))
}

/// Parse `s` with one layout. Date-only layouts yield midnight.
pub fn parse_with_format(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

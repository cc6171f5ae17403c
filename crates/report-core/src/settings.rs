use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::change::{DutyContext, Thresholds};
use crate::error::Result;
use crate::formatting::Locale;
use crate::models::DEFAULT_STATUSES;
use crate::schema::{ColumnMapping, Confidence};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Batch reports over payment transaction exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "payreport",
    about = "Batch reports over payment transaction exports",
    version
)]
pub struct Settings {
    /// Report to produce
    #[arg(long, default_value = "traffic", value_parser = [
        "status", "success-rate", "morning", "traffic", "watchlist", "partner-export",
    ])]
    pub report: String,

    /// Directory searched for input files
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Filename glob (defaults depend on the report)
    #[arg(long)]
    pub pattern: Option<String>,

    /// Explicit input file, bypassing discovery
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output file for the partner export
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Zero-based status column of headerless transaction exports
    #[arg(long, default_value = "6")]
    pub status_column: usize,

    /// Zero-based amount column of headerless transaction exports
    #[arg(long, default_value = "7")]
    pub amount_column: usize,

    /// Leading rows skipped before data (success-rate report)
    #[arg(long, default_value = "1")]
    pub skip_rows: usize,

    /// Status vocabulary, comma separated (defaults to the standard five)
    #[arg(long, value_delimiter = ',')]
    pub statuses: Vec<String>,

    /// Number formatting locale
    #[arg(long, default_value = "ru", value_parser = ["ru", "en"])]
    pub locale: String,

    /// Currency code appended to amounts
    #[arg(long, default_value = "RUB")]
    pub currency: String,

    /// Report timezone ("auto" uses the system timezone)
    #[arg(long, default_value = "Europe/Moscow")]
    pub timezone: String,

    /// Local hour before which a transaction counts as morning (0-23)
    #[arg(long, default_value = "12", value_parser = clap::value_parser!(u32).range(0..=23))]
    pub cutoff_hour: u32,

    /// Header of the timestamp column (morning report)
    #[arg(long)]
    pub time_column: Option<String>,

    /// Zero-based merchant name column
    #[arg(long)]
    pub merchant_column: Option<usize>,

    /// Zero-based merchant id column
    #[arg(long)]
    pub id_column: Option<usize>,

    /// Zero-based baseline value column
    #[arg(long)]
    pub baseline_column: Option<usize>,

    /// Zero-based current value column
    #[arg(long)]
    pub current_column: Option<usize>,

    /// Reject inferred columns below this confidence
    #[arg(long, default_value = "low", value_parser = ["low", "medium", "high"])]
    pub min_confidence: String,

    /// Growth threshold in percent
    #[arg(long, default_value = "50")]
    pub growth_threshold: f64,

    /// Decline threshold in percent (the sign is ignored)
    #[arg(long, default_value = "30", allow_negative_numbers = true)]
    pub decline_threshold: f64,

    /// Traffic profile JSON (special accounts, excluded and hidden ids)
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// JSON file with baseline/current values for special accounts
    #[arg(long)]
    pub special_values: Option<PathBuf>,

    /// Duty officer named in the threshold report
    #[arg(long, default_value = "[name]")]
    pub duty_officer: String,

    /// Report time shown in the threshold report (defaults to now)
    #[arg(long)]
    pub report_time: Option<String>,

    /// Baseline date label
    #[arg(long)]
    pub base_date: Option<String>,

    /// Current date label (defaults to today)
    #[arg(long)]
    pub current_date: Option<String>,

    /// Watchlist entries (ids, account names or name fragments), comma separated
    #[arg(long, value_delimiter = ',')]
    pub watchlist: Vec<String>,

    /// List every watchlist row, not only threshold crossings
    #[arg(long)]
    pub include_insignificant: bool,

    /// Partner name filter for the partner export
    #[arg(long, default_value = "МосТех")]
    pub partner: String,

    /// First day of the partner export window (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Last day of the partner export window (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Never prompt; use fallbacks and configured values instead
    #[arg(long)]
    pub no_prompt: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.payreport/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duty_officer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PathBuf>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&home_dir())
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".payreport").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Default location of the traffic profile.
pub fn default_profile_path() -> PathBuf {
    home_dir().join(".payreport").join("traffic_profile.json")
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with an explicit argument
    /// list and config path, so tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!("Could not clear {}: {}", config_path.display(), e);
            }
            return settings.resolve_auto_values();
        }

        let last = LastUsedParams::load_from(config_path);

        // clap ids are field names (underscores), not the long-flag spelling.
        if !is_arg_explicitly_set(&matches, "duty_officer") {
            if let Some(v) = last.duty_officer {
                settings.duty_officer = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "growth_threshold") {
            if let Some(v) = last.growth_threshold {
                settings.growth_threshold = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "decline_threshold") {
            if let Some(v) = last.decline_threshold {
                settings.decline_threshold = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "locale") {
            if let Some(v) = last.locale {
                settings.locale = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "currency") {
            if let Some(v) = last.currency {
                settings.currency = v;
            }
        }
        if settings.profile.is_none() {
            settings.profile = last.profile;
        }

        settings = settings.resolve_auto_values();

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!("Could not persist settings to {}: {}", config_path.display(), e);
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut self) -> Self {
        if self.timezone == "auto" {
            self.timezone = crate::time_utils::get_system_timezone();
        }
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    // ── Typed views ──────────────────────────────────────────────────────────

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            growth_pct: self.growth_threshold,
            decline_pct: self.decline_threshold.abs(),
        }
    }

    pub fn locale(&self) -> Result<Locale> {
        self.locale.parse()
    }

    pub fn min_confidence(&self) -> Result<Confidence> {
        self.min_confidence.parse()
    }

    pub fn column_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            merchant_name: self.merchant_column,
            merchant_id: self.id_column,
            baseline: self.baseline_column,
            current: self.current_column,
        }
    }

    /// Configured status vocabulary, upper-cased, or the default one.
    pub fn status_vocabulary(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .statuses
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if configured.is_empty() {
            DEFAULT_STATUSES.iter().map(|s| s.to_string()).collect()
        } else {
            configured
        }
    }

    /// Explicit `--pattern`, or the usual export name for the selected report.
    pub fn file_pattern(&self) -> String {
        if let Some(p) = &self.pattern {
            return p.clone();
        }
        match self.report.as_str() {
            "status" | "success-rate" => "Transaction-*.xlsx",
            "morning" => "Transaction-List-Date_*.xlsx",
            "watchlist" => "Sheet1.csv",
            _ => "*.csv",
        }
        .to_string()
    }

    pub fn profile_path(&self) -> PathBuf {
        self.profile.clone().unwrap_or_else(default_profile_path)
    }

    /// Header context for threshold reports. Missing times and dates are
    /// filled from `now` in the report timezone.
    pub fn duty_context(&self, now: chrono::DateTime<chrono_tz::Tz>) -> DutyContext {
        let today = now.format("%d.%m.%Y").to_string();
        DutyContext {
            officer: self.duty_officer.clone(),
            report_time: self
                .report_time
                .clone()
                .unwrap_or_else(|| now.format("%H:%M").to_string()),
            base_date: self.base_date.clone().unwrap_or_else(|| "baseline".to_string()),
            current_date: self.current_date.clone().unwrap_or(today),
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            duty_officer: Some(s.duty_officer.clone()),
            timezone: Some(s.timezone.clone()),
            growth_threshold: Some(s.growth_threshold),
            decline_threshold: Some(s.decline_threshold),
            locale: Some(s.locale.clone()),
            currency: Some(s.currency.clone()),
            profile: s.profile.clone(),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        std::iter::once("payreport")
            .chain(list.iter().copied())
            .map(Into::into)
            .collect()
    }

    // ── LastUsedParams ────────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            duty_officer: Some("Ivanova".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            growth_threshold: Some(40.0),
            decline_threshold: Some(25.0),
            locale: Some("en".to_string()),
            currency: Some("USD".to_string()),
            profile: Some(PathBuf::from("/srv/profile.json")),
        };
        params.save_to(&path).expect("save");

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.duty_officer.as_deref(), Some("Ivanova"));
        assert_eq!(loaded.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(loaded.growth_threshold, Some(40.0));
        assert_eq!(loaded.decline_threshold, Some(25.0));
        assert_eq!(loaded.locale.as_deref(), Some("en"));
        assert_eq!(loaded.currency.as_deref(), Some("USD"));
        assert_eq!(loaded.profile, Some(PathBuf::from("/srv/profile.json")));
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert!(LastUsedParams::load_from(&path).duty_officer.is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(LastUsedParams::load_from(&path).timezone.is_none());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());
        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
        // Clearing twice is fine.
        LastUsedParams::clear_at(&path).expect("clear again");
    }

    // ── Settings parsing ─────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["payreport"]);
        assert_eq!(settings.report, "traffic");
        assert_eq!(settings.dir, PathBuf::from("."));
        assert_eq!(settings.status_column, 6);
        assert_eq!(settings.amount_column, 7);
        assert_eq!(settings.skip_rows, 1);
        assert_eq!(settings.locale, "ru");
        assert_eq!(settings.currency, "RUB");
        assert_eq!(settings.timezone, "Europe/Moscow");
        assert_eq!(settings.cutoff_hour, 12);
        assert_eq!(settings.min_confidence, "low");
        assert_eq!(settings.partner, "МосТех");
        assert!(settings.watchlist.is_empty());
        assert!(!settings.no_prompt);
        assert_eq!(settings.log_level, "INFO");
    }

    #[test]
    fn test_settings_rejects_unknown_report() {
        assert!(Settings::try_parse_from(["payreport", "--report", "weekly"]).is_err());
    }

    #[test]
    fn test_settings_rejects_out_of_range_cutoff() {
        assert!(Settings::try_parse_from(["payreport", "--cutoff-hour", "24"]).is_err());
    }

    #[test]
    fn test_status_vocabulary() {
        let default = Settings::parse_from(["payreport"]);
        assert_eq!(default.status_vocabulary().len(), 5);

        let custom = Settings::parse_from(["payreport", "--statuses", "captured,paid_out"]);
        assert_eq!(custom.status_vocabulary(), vec!["CAPTURED", "PAID_OUT"]);
    }

    #[test]
    fn test_file_pattern_defaults_per_report() {
        let pattern = |report: &str| Settings::parse_from(["payreport", "--report", report]).file_pattern();
        assert_eq!(pattern("status"), "Transaction-*.xlsx");
        assert_eq!(pattern("morning"), "Transaction-List-Date_*.xlsx");
        assert_eq!(pattern("traffic"), "*.csv");
        assert_eq!(pattern("watchlist"), "Sheet1.csv");

        let explicit = Settings::parse_from(["payreport", "--pattern", "x*.csv"]);
        assert_eq!(explicit.file_pattern(), "x*.csv");
    }

    #[test]
    fn test_column_mapping_and_thresholds() {
        let s = Settings::parse_from([
            "payreport",
            "--merchant-column",
            "2",
            "--current-column",
            "5",
            "--decline-threshold",
            "-20",
        ]);
        let mapping = s.column_mapping();
        assert_eq!(mapping.merchant_name, Some(2));
        assert_eq!(mapping.current, Some(5));
        assert_eq!(mapping.baseline, None);
        let t = s.thresholds();
        assert_eq!(t.growth_pct, 50.0);
        assert_eq!(t.decline_pct, 20.0);
    }

    #[test]
    fn test_duty_context_fills_from_now() {
        let s = Settings::parse_from(["payreport", "--duty-officer", "Petrov"]);
        let now = chrono_tz::Europe::Moscow
            .with_ymd_and_hms(2026, 1, 13, 12, 0, 0)
            .unwrap();
        let ctx = s.duty_context(now);
        assert_eq!(ctx.officer, "Petrov");
        assert_eq!(ctx.report_time, "12:00");
        assert_eq!(ctx.current_date, "13.01.2026");
    }

    // ── load_with_last_used ───────────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_officer() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            duty_officer: Some("Smirnova".to_string()),
            growth_threshold: Some(75.0),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(args(&[]), &config_path);
        assert_eq!(settings.duty_officer, "Smirnova");
        assert_eq!(settings.growth_threshold, 75.0);
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            locale: Some("en".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(args(&["--locale", "ru"]), &config_path);
        assert_eq!(settings.locale, "ru");
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(args(&["--clear"]), &config_path);
        assert!(!config_path.exists(), "file must be gone after --clear");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings =
            Settings::load_with_last_used_impl(args(&["--debug"]), &tmp_config_path(&tmp));
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        Settings::load_with_last_used_impl(args(&["--currency", "KZT"]), &config_path);

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.currency.as_deref(), Some("KZT"));
        assert_eq!(loaded.timezone.as_deref(), Some("Europe/Moscow"));
    }
}

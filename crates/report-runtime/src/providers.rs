//! Collaborators that supply operator input to the jobs.
//!
//! Both seams have a console implementation built on `dialoguer` and
//! non-interactive ones for `--no-prompt` runs and tests.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use dialoguer::{Input, Select};
use report_core::models::{CountPair, SpecialAccount};
use report_core::numbers::parse_grouped_count;

// ── Column choice ─────────────────────────────────────────────────────────────

/// Picks one column out of several header candidates.
pub trait ColumnChooser {
    /// Return the chosen column index, or `None` when no valid choice was
    /// made. `candidates` is never empty.
    fn choose(&mut self, file: &str, candidates: &[(usize, String)]) -> Option<usize>;
}

/// Always takes the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCandidate;

impl ColumnChooser for FirstCandidate {
    fn choose(&mut self, _file: &str, candidates: &[(usize, String)]) -> Option<usize> {
        candidates.first().map(|(idx, _)| *idx)
    }
}

/// Asks on the terminal. The chosen header is remembered and reused for
/// later files that carry the same header.
#[derive(Debug, Default)]
pub struct ConsoleChooser {
    remembered: Option<String>,
}

impl ColumnChooser for ConsoleChooser {
    fn choose(&mut self, file: &str, candidates: &[(usize, String)]) -> Option<usize> {
        if let Some(header) = &self.remembered {
            if let Some((idx, _)) = candidates.iter().find(|(_, h)| h == header) {
                return Some(*idx);
            }
        }
        if candidates.len() == 1 {
            return Some(candidates[0].0);
        }

        let items: Vec<&str> = candidates.iter().map(|(_, h)| h.as_str()).collect();
        let picked = Select::new()
            .with_prompt(format!("{file}: which column holds the transaction time?"))
            .items(&items)
            .default(0)
            .interact_opt();

        match picked {
            Ok(Some(i)) => {
                let (idx, header) = candidates.get(i)?;
                self.remembered = Some(header.clone());
                Some(*idx)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Column prompt failed: {}", e);
                None
            }
        }
    }
}

// ── Special account values ────────────────────────────────────────────────────

/// Supplies baseline and current values for special accounts.
pub trait SpecialValuesSource {
    fn values_for(&mut self, account: &SpecialAccount) -> Result<CountPair>;
}

/// Parse "baseline current" entered as two numbers. Thousands groups may use
/// commas; the two numbers are separated by whitespace.
pub fn parse_value_pair(input: &str) -> Result<CountPair> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let [baseline, current] = parts.as_slice() else {
        bail!("expected two numbers, got '{}'", input.trim());
    };
    let baseline = parse_grouped_count(baseline);
    let current = parse_grouped_count(current);
    if baseline.coerced || current.coerced {
        bail!("'{}' is not a pair of whole numbers", input.trim());
    }
    Ok(CountPair::new(baseline.value, current.value))
}

/// Prompts the operator for each account.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleValues;

impl SpecialValuesSource for ConsoleValues {
    fn values_for(&mut self, account: &SpecialAccount) -> Result<CountPair> {
        let answer: String = Input::new()
            .with_prompt(format!(
                "{}: baseline and current values (two numbers)",
                account.display_name()
            ))
            .validate_with(|s: &String| parse_value_pair(s).map(|_| ()).map_err(|e| e.to_string()))
            .interact_text()?;
        parse_value_pair(&answer)
    }
}

/// Fixed values keyed by account display name or bare name.
///
/// The JSON form is an object of `{"baseline": n, "current": n}` entries:
///
/// ```json
/// { "AO T-Bank": { "baseline": 120, "current": 95 } }
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StaticValues {
    values: HashMap<String, CountPair>,
}

impl StaticValues {
    pub fn new(values: HashMap<String, CountPair>) -> Self {
        Self { values }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading special values from {}", path.display()))?;
        let values: HashMap<String, CountPair> = serde_json::from_str(&content)
            .with_context(|| format!("parsing special values in {}", path.display()))?;
        tracing::debug!("Loaded values for {} special accounts", values.len());
        Ok(Self { values })
    }
}

impl SpecialValuesSource for StaticValues {
    fn values_for(&mut self, account: &SpecialAccount) -> Result<CountPair> {
        self.values
            .get(&account.display_name())
            .or_else(|| self.values.get(&account.name))
            .copied()
            .ok_or_else(|| anyhow!("no values for special account '{}'", account.display_name()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn candidates() -> Vec<(usize, String)> {
        vec![(3, "created".to_string()), (5, "updated".to_string())]
    }

    #[test]
    fn test_first_candidate() {
        assert_eq!(FirstCandidate.choose("f.xlsx", &candidates()), Some(3));
        assert_eq!(FirstCandidate.choose("f.xlsx", &[]), None);
    }

    #[test]
    fn test_console_chooser_reuses_remembered_header() {
        let mut chooser = ConsoleChooser {
            remembered: Some("updated".to_string()),
        };
        assert_eq!(chooser.choose("f.xlsx", &candidates()), Some(5));
    }

    #[test]
    fn test_console_chooser_single_candidate_needs_no_prompt() {
        let mut chooser = ConsoleChooser::default();
        assert_eq!(chooser.choose("f.xlsx", &[(2, "date".to_string())]), Some(2));
    }

    #[test]
    fn test_parse_value_pair() {
        assert_eq!(parse_value_pair(" 100 150 ").unwrap(), CountPair::new(100, 150));
        assert_eq!(parse_value_pair("1,200 0").unwrap(), CountPair::new(1200, 0));
        assert!(parse_value_pair("100").is_err());
        assert!(parse_value_pair("1 2 3").is_err());
        assert!(parse_value_pair("ten 5").is_err());
    }

    #[test]
    fn test_static_values_lookup() {
        let mut source = StaticValues::new(HashMap::from([
            ("AA1 Carusell".to_string(), CountPair::new(5, 6)),
            ("AO T-Bank".to_string(), CountPair::new(120, 95)),
        ]));
        assert_eq!(
            source.values_for(&SpecialAccount::new("Carusell", "AA1")).unwrap(),
            CountPair::new(5, 6)
        );
        assert_eq!(
            source.values_for(&SpecialAccount::new("AO T-Bank", "")).unwrap(),
            CountPair::new(120, 95)
        );
        assert!(source.values_for(&SpecialAccount::new("Missing", "")).is_err());
    }

    #[test]
    fn test_static_values_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("special.json");
        std::fs::write(&path, r#"{"AO T-Bank": {"baseline": 120, "current": 95}}"#).unwrap();
        let mut source = StaticValues::load(&path).unwrap();
        assert_eq!(
            source.values_for(&SpecialAccount::new("AO T-Bank", "")).unwrap(),
            CountPair::new(120, 95)
        );
        assert!(StaticValues::load(&tmp.path().join("absent.json")).is_err());
    }
}

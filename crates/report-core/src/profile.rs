use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{ReportError, Result};
use crate::models::SpecialAccount;

/// Per-deployment lists used by the traffic comparison.
///
/// Stored as JSON:
///
/// ```json
/// {
///   "special_accounts": [{ "name": "AO T-Bank" }, { "name": "Carusell", "id": "AA1" }],
///   "excluded_ids": ["5084"],
///   "hidden_ids": ["1020"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficProfile {
    /// Accounts whose values come from the operator, not the input files.
    pub special_accounts: Vec<SpecialAccount>,
    /// Ids aggregated only into the excluded section.
    pub excluded_ids: BTreeSet<String>,
    /// Ids left out of published labels but kept in the analytics dump.
    pub hidden_ids: BTreeSet<String>,
}

impl TrafficProfile {
    /// Load a profile. A missing file is an empty profile; an unreadable or
    /// malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No traffic profile at {}, using empty profile", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Self = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded traffic profile: {} special, {} excluded, {} hidden",
            profile.special_accounts.len(),
            profile.excluded_ids.len(),
            profile.hidden_ids.len()
        );
        Ok(profile)
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.excluded_ids.contains(id)
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden_ids.contains(id)
    }
}

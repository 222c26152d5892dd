//! Store target configuration.
//!
//! Identifies the branch and collection roots the persistence layer writes
//! under. Which repository the object store talks to is the store
//! implementation's concern, not part of this contract.

use std::env;

use crate::{Error, Result};

const ENV_BRANCH: &str = "MOSAIC_BRANCH";
const ENV_THOUGHTS_ROOT: &str = "MOSAIC_THOUGHTS_ROOT";
const ENV_CHECKIN_ROOT: &str = "MOSAIC_CHECKIN_ROOT";
const ENV_PROBE_MONTHS: &str = "MOSAIC_PROBE_MONTHS";

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_THOUGHTS_ROOT: &str = "data/thoughts";
const DEFAULT_CHECKIN_ROOT: &str = "data/checkin";
const DEFAULT_PROBE_MONTHS: u32 = 12;

/// Branch and path layout for the persisted collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Branch whose head pointer every write advances.
    pub branch: String,
    /// Directory holding the monthly thought shards.
    pub thoughts_root: String,
    /// Directory holding the check-in aggregate document.
    pub checkin_root: String,
    /// How many months back the sharded reader probes.
    pub probe_months: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            thoughts_root: DEFAULT_THOUGHTS_ROOT.to_string(),
            checkin_root: DEFAULT_CHECKIN_ROOT.to_string(),
            probe_months: DEFAULT_PROBE_MONTHS,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<SyncConfig> {
    let probe_months = match normalize(lookup(ENV_PROBE_MONTHS)) {
        Some(raw) => {
            let months: u32 = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("{ENV_PROBE_MONTHS} must be a number, got '{raw}'"))
            })?;
            if months == 0 {
                return Err(Error::InvalidInput(format!(
                    "{ENV_PROBE_MONTHS} must be at least 1"
                )));
            }
            months
        }
        None => DEFAULT_PROBE_MONTHS,
    };

    Ok(SyncConfig {
        branch: normalize(lookup(ENV_BRANCH)).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        thoughts_root: normalize(lookup(ENV_THOUGHTS_ROOT))
            .unwrap_or_else(|| DEFAULT_THOUGHTS_ROOT.to_string()),
        checkin_root: normalize(lookup(ENV_CHECKIN_ROOT))
            .unwrap_or_else(|| DEFAULT_CHECKIN_ROOT.to_string()),
        probe_months,
    })
}

fn normalize(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim().trim_end_matches('/');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

//! Engine configuration (thresholds, history bound, warning policy).

use serde::{Deserialize, Serialize};

use forgeerp_core::{DomainError, DomainResult};

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::validation::{ValidationConfig, WarningPolicy};

pub const ENV_MAX_DEPTH: &str = "FORGEERP_BOM_MAX_DEPTH";
pub const ENV_LARGE_SUBTREE: &str = "FORGEERP_BOM_LARGE_SUBTREE";
pub const ENV_HISTORY_LIMIT: &str = "FORGEERP_BOM_HISTORY_LIMIT";
pub const ENV_WARNING_POLICY: &str = "FORGEERP_BOM_WARNING_POLICY";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub validation: ValidationConfig,
    /// Snapshots retained for undo/redo, including the initial state.
    pub history_capacity: usize,
    /// Policy used by the convenience mutation methods.
    pub warning_policy: WarningPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation: ValidationConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            warning_policy: WarningPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.warning_policy = policy;
        self
    }

    /// Defaults overridden by `FORGEERP_BOM_*` environment variables.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            config.validation.max_depth = parse_count(ENV_MAX_DEPTH, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LARGE_SUBTREE) {
            config.validation.large_subtree = parse_count(ENV_LARGE_SUBTREE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_HISTORY_LIMIT) {
            let limit = parse_count(ENV_HISTORY_LIMIT, &raw)?;
            if limit == 0 {
                return Err(DomainError::validation(format!(
                    "{ENV_HISTORY_LIMIT} must be at least 1"
                )));
            }
            config.history_capacity = limit;
        }
        if let Some(raw) = lookup(ENV_WARNING_POLICY) {
            config.warning_policy = raw
                .parse()
                .map_err(|e: String| DomainError::validation(format!("{ENV_WARNING_POLICY}: {e}")))?;
        }
        Ok(config)
    }
}

fn parse_count(key: &str, raw: &str) -> DomainResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| DomainError::validation(format!("{key}='{raw}': {e}")))
}

/*!
 * Configuration
 * Orchestrator settings read from `PIPEWORK_*` environment variables
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default input file for the `scores` pipeline
pub const DEFAULT_SCORES_FILE: &str = "scores";

/// Default suffix the exchange worker appends
pub const DEFAULT_WORKER_SUFFIX: &str = "howard.edu";

/// Default suffix the exchange coordinator appends
pub const DEFAULT_COORDINATOR_SUFFIX: &str = "gobison.org";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct OrchestratorConfig {
    /// Emit logs as JSON
    pub trace_json: bool,
    /// Print `Input : ` prompts and intermediate results
    pub prompts: bool,
    /// Input file for the `scores` pipeline
    pub scores_file: PathBuf,
    pub worker_suffix: String,
    pub coordinator_suffix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            trace_json: false,
            prompts: true,
            scores_file: PathBuf::from(DEFAULT_SCORES_FILE),
            worker_suffix: DEFAULT_WORKER_SUFFIX.to_string(),
            coordinator_suffix: DEFAULT_COORDINATOR_SUFFIX.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        let defaults = Self::default();
        Self {
            trace_json: flag("PIPEWORK_TRACE_JSON", defaults.trace_json),
            prompts: flag("PIPEWORK_PROMPTS", defaults.prompts),
            scores_file: lookup("PIPEWORK_SCORES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.scores_file),
            worker_suffix: lookup("PIPEWORK_WORKER_SUFFIX").unwrap_or(defaults.worker_suffix),
            coordinator_suffix: lookup("PIPEWORK_COORDINATOR_SUFFIX")
                .unwrap_or(defaults.coordinator_suffix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::from_lookup(|_| None);
        assert_eq!(config, OrchestratorConfig::default());
        assert!(config.prompts);
        assert_eq!(config.scores_file, PathBuf::from("scores"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PIPEWORK_TRACE_JSON", "1"),
            ("PIPEWORK_PROMPTS", "false"),
            ("PIPEWORK_SCORES_FILE", "/tmp/grades"),
            ("PIPEWORK_WORKER_SUFFIX", "-w"),
        ]
        .into_iter()
        .collect();
        let config = OrchestratorConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert!(config.trace_json);
        assert!(!config.prompts);
        assert_eq!(config.scores_file, PathBuf::from("/tmp/grades"));
        assert_eq!(config.worker_suffix, "-w");
        assert_eq!(config.coordinator_suffix, DEFAULT_COORDINATOR_SUFFIX);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: OrchestratorConfig = serde_json::from_str(r#"{"prompts": false}"#).unwrap();
        assert!(!config.prompts);
        assert_eq!(config.worker_suffix, DEFAULT_WORKER_SUFFIX);
    }
}

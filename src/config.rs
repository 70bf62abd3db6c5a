// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Configuration recognized by the assessment core.
//!
//! Loaded from TOML. Every field except `action_policy` has a default, so a
//! minimal config only names the policy; [`FlareConfig::reference`] supplies
//! the shipped reference policy for callers with no config file at all.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::assessment::ActionPolicy;

/// Root configuration for the analysis pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct FlareConfig {
    /// Total RiskLevel -> Action map; must name all five levels
    pub action_policy: ActionPolicy,
    /// Extra sensitive-path globs (added to the built-in tiers)
    #[serde(default)]
    pub sensitive_patterns: Vec<String>,
    /// Extra hostnames the network analyzer treats as safe
    #[serde(default)]
    pub safe_hosts: Vec<String>,
    /// Per-query OSV lookup timeout in milliseconds
    #[serde(default = "default_osv_timeout_ms")]
    pub osv_timeout_ms: u64,
    /// Packages (`name` or `name@version`) that skip the oracle entirely
    #[serde(default)]
    pub package_allowlist: Vec<String>,
    /// Command prefixes that bypass all analyzers
    #[serde(default)]
    pub command_allowlist: Vec<String>,
}

fn default_osv_timeout_ms() -> u64 {
    1500
}

impl FlareConfig {
    /// Defaults plus the reference action policy.
    pub fn reference() -> Self {
        Self {
            action_policy: ActionPolicy::reference(),
            sensitive_patterns: Vec::new(),
            safe_hosts: Vec::new(),
            osv_timeout_ms: default_osv_timeout_ms(),
            package_allowlist: Vec::new(),
            command_allowlist: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: FlareConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::Action;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: FlareConfig = toml::from_str(
            r#"
[action_policy]
none = "run"
low = "run"
medium = "warn"
high = "ask"
critical = "ask"
"#,
        )
        .unwrap();
        assert_eq!(config.osv_timeout_ms, 1500);
        assert!(config.sensitive_patterns.is_empty());
        assert!(config.safe_hosts.is_empty());
        assert!(config.package_allowlist.is_empty());
        assert!(config.command_allowlist.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let config: FlareConfig = toml::from_str(
            r#"
sensitive_patterns = ["*.tfstate"]
safe_hosts = ["internal.corp"]
osv_timeout_ms = 3000
package_allowlist = ["lodash@4.17.21"]
command_allowlist = ["git status", "ls"]

[action_policy]
none = "run"
low = "warn"
medium = "warn"
high = "ask"
critical = "ask"
"#,
        )
        .unwrap();
        assert_eq!(config.action_policy.low, Action::Warn);
        assert_eq!(config.osv_timeout_ms, 3000);
        assert_eq!(config.safe_hosts, vec!["internal.corp"]);
        assert_eq!(config.command_allowlist.len(), 2);
    }

    #[test]
    fn test_incomplete_policy_rejected() {
        // The policy is total: omitting a level is an error, not a default.
        let parsed: Result<FlareConfig, _> = toml::from_str(
            r#"
[action_policy]
none = "run"
low = "run"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_policy_rejected() {
        let parsed: Result<FlareConfig, _> = toml::from_str("safe_hosts = []");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flare.toml");
        std::fs::write(
            &path,
            r#"
[action_policy]
none = "run"
low = "run"
medium = "warn"
high = "ask"
critical = "ask"
"#,
        )
        .unwrap();
        let config = FlareConfig::load(&path).unwrap();
        assert_eq!(config.action_policy.medium, Action::Warn);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = FlareConfig::load(Path::new("/nonexistent/flare.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}

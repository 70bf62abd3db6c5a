// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Assessment engine: the orchestrator behind `assess(command, cwd)`.
//!
//! Owns the configured analyzer set and the vulnerability oracle. One
//! request flows: command allowlist check -> parse -> concurrent analyzer
//! fan-out -> finding aggregation (analyzer order preserved) -> scorer.
//! The engine is cheap to share and holds no per-request state; the oracle
//! cache is the only mutable resource behind it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::analyzers::code_injection::CodeInjectionAnalyzer;
use crate::analyzers::destructive::DestructiveAnalyzer;
use crate::analyzers::network::NetworkAnalyzer;
use crate::analyzers::package_vuln::PackageVulnAnalyzer;
use crate::analyzers::permissions::PermissionsAnalyzer;
use crate::analyzers::sensitive_path::SensitivePathAnalyzer;
use crate::analyzers::Analyzer;
use crate::assessment::{Action, RiskAssessment, RiskLevel};
use crate::config::FlareConfig;
use crate::osv::{OsvClient, VulnerabilityOracle};
use crate::parser;
use crate::scorer;

pub struct AssessmentEngine {
    config: FlareConfig,
    analyzers: Vec<Box<dyn Analyzer>>,
    home: String,
}

impl AssessmentEngine {
    /// Build an engine with the production OSV oracle.
    pub fn new(config: FlareConfig) -> Self {
        let oracle: Arc<dyn VulnerabilityOracle> = Arc::new(OsvClient::new(
            Duration::from_millis(config.osv_timeout_ms),
        ));
        Self::with_oracle(config, oracle)
    }

    /// Build an engine around an injected oracle (tests use a stub).
    pub fn with_oracle(config: FlareConfig, oracle: Arc<dyn VulnerabilityOracle>) -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
        Self::with_oracle_and_home(config, oracle, home)
    }

    /// Fully explicit constructor; `home` drives tilde expansion.
    pub fn with_oracle_and_home(
        config: FlareConfig,
        oracle: Arc<dyn VulnerabilityOracle>,
        home: impl Into<String>,
    ) -> Self {
        let home = home.into();
        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(DestructiveAnalyzer::new(home.as_str())),
            Box::new(PermissionsAnalyzer::new()),
            Box::new(SensitivePathAnalyzer::new(
                &config.sensitive_patterns,
                home.as_str(),
            )),
            Box::new(NetworkAnalyzer::new(&config.safe_hosts)),
            Box::new(CodeInjectionAnalyzer::new()),
            Box::new(PackageVulnAnalyzer::new(oracle, &config.package_allowlist)),
        ];
        Self {
            config,
            analyzers,
            home,
        }
    }

    /// Assess one command. The only error is the parser's length cap;
    /// callers surface it with [`error_assessment`].
    pub async fn assess(&self, command: &str, cwd: &str) -> Result<RiskAssessment> {
        let trimmed = command.trim();
        if self
            .config
            .command_allowlist
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
        {
            debug!(command = %trimmed, "command allowlisted, skipping analysis");
            return Ok(allowlisted_assessment());
        }

        let segments = parser::parse(command, &self.home)?;
        let cwd = Path::new(cwd);

        let passes = self.analyzers.iter().map(|a| a.analyze(&segments, cwd));
        let mut results = futures::future::join_all(passes).await;

        for (analyzer, result) in self.analyzers.iter().zip(results.iter_mut()) {
            for finding in &mut result.findings {
                finding.analyzer = Some(analyzer.name().to_string());
            }
        }

        Ok(scorer::score(&results, &self.config.action_policy))
    }
}

/// Synthetic assessment for an allowlisted command: no analysis is run.
fn allowlisted_assessment() -> RiskAssessment {
    RiskAssessment {
        risk_level: RiskLevel::None,
        action: Action::Run,
        summary: "Command is in the allowlist.".to_string(),
        details: Vec::new(),
        recommendation: "This command prefix is allowlisted; no analysis was performed."
            .to_string(),
        partial: false,
    }
}

/// Synthetic assessment rendered when the core rejects the input (length
/// cap). Advisory callers degrade to "proceed with caution" rather than
/// failing the request.
pub fn error_assessment(message: &str) -> RiskAssessment {
    RiskAssessment {
        risk_level: RiskLevel::None,
        action: Action::Run,
        summary: format!("Analysis error: {}", message),
        details: Vec::new(),
        recommendation: "Could not analyze this command. Proceed with caution.".to_string(),
        partial: false,
    }
}

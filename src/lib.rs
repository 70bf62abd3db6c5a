//! Flare — advisory risk assessment for shell commands.
//!
//! Given a command string and a working directory, Flare parses the command
//! into segments (lifting subshell, process-substitution, and interpreter
//! heredoc bodies into first-class segments), runs a fixed set of analyzers
//! over the parsed structure, and folds their findings into a single
//! [`assessment::RiskAssessment`] with an advisory action. It is consumed by
//! AI coding agents *before* they execute shell commands; it never executes
//! or blocks anything itself.
//!
//! The pipeline:
//!
//! - **parser**: quote-aware operator splitting, redirect extraction,
//!   recursive subshell/heredoc lifting
//! - **analyzers**: destructive operations, privilege changes,
//!   sensitive-path access, network/exfiltration, code injection, and
//!   package vulnerabilities (backed by the OSV oracle)
//! - **scorer**: severity amplification and policy mapping
//! - **osv**: bounded HTTP oracle with per-query timeouts and an in-memory
//!   LRU cache
//!
//! The `flare` binary wraps [`engine::AssessmentEngine`] in a small CLI; RPC
//! transports and other integrations are expected to embed the engine the
//! same way.

pub mod analyzers;
pub mod assessment;
pub mod config;
pub mod engine;
pub mod osv;
pub mod parser;
pub mod scorer;

#[cfg(test)]
mod testing;

pub use assessment::{
    Action, ActionPolicy, AnalyzerResult, Finding, FindingCategory, RiskAssessment, RiskLevel,
};
pub use config::FlareConfig;
pub use engine::{error_assessment, AssessmentEngine};
pub use osv::{OsvClient, QueryOutcome, VulnerabilityOracle};

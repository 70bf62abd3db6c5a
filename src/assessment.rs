//! Core assessment types shared across the analysis pipeline.
//!
//! Every analyzer produces [`Finding`] values with a [`RiskLevel`] severity
//! and a [`FindingCategory`]. These flow through the scorer, which folds them
//! into a single [`RiskAssessment`] — the value returned to callers and
//! serialized over the wire. An [`ActionPolicy`] maps the aggregate risk
//! level to the advisory [`Action`] conveyed to the agent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate risk verdict, ordered from lowest to highest.
///
/// Implements `Ord` so `Critical > High > Medium > Low > None`. Used both as
/// a per-finding severity and as the overall assessment level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::None => write!(f, "none"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

impl RiskLevel {
    /// Human-readable prefix used in assessment summaries.
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::None => "No issues",
            RiskLevel::Low => "Low risk",
            RiskLevel::Medium => "Medium risk",
            RiskLevel::High => "High risk",
            RiskLevel::Critical => "Critical risk",
        }
    }
}

/// Advisory disposition conveyed to the caller. Flare never executes or
/// blocks commands; the consuming agent decides what to do with this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Run,
    Warn,
    Ask,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Run => write!(f, "run"),
            Action::Warn => write!(f, "warn"),
            Action::Ask => write!(f, "ask"),
        }
    }
}

/// Total mapping from every [`RiskLevel`] to an [`Action`].
///
/// There are no per-field defaults: a policy supplied in configuration must
/// name all five levels, and callers that don't care use [`ActionPolicy::reference`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    pub none: Action,
    pub low: Action,
    pub medium: Action,
    pub high: Action,
    pub critical: Action,
}

impl ActionPolicy {
    /// The reference policy shipped with the core: run on none/low, warn on
    /// medium, ask on high/critical.
    pub fn reference() -> Self {
        Self {
            none: Action::Run,
            low: Action::Run,
            medium: Action::Warn,
            high: Action::Ask,
            critical: Action::Ask,
        }
    }

    /// Look up the action for a risk level.
    pub fn action_for(&self, level: RiskLevel) -> Action {
        match level {
            RiskLevel::None => self.none,
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
            RiskLevel::Critical => self.critical,
        }
    }
}

/// Closed set of finding categories. The wire strings are stable and consumed
/// by downstream tooling; new categories require a contract change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    Destructive,
    Permissions,
    SensitivePath,
    Network,
    CodeInjection,
    PackageVulnerability,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Destructive => write!(f, "destructive"),
            FindingCategory::Permissions => write!(f, "permissions"),
            FindingCategory::SensitivePath => write!(f, "sensitive-path"),
            FindingCategory::Network => write!(f, "network"),
            FindingCategory::CodeInjection => write!(f, "code-injection"),
            FindingCategory::PackageVulnerability => write!(f, "package-vulnerability"),
        }
    }
}

/// One atomic risk signal emitted by one analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: FindingCategory,
    pub severity: RiskLevel,
    /// Human-readable description of what was detected
    pub description: String,
    /// Name of the analyzer that emitted this finding, tagged by the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
}

impl Finding {
    pub fn new(category: FindingCategory, severity: RiskLevel, description: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            description: description.into(),
            analyzer: None,
        }
    }
}

/// Output of a single analyzer pass over the parsed segments.
///
/// `partial` propagates from the vulnerability oracle when any lookup failed;
/// pure analyzers always leave it false.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerResult {
    pub findings: Vec<Finding>,
    pub partial: bool,
}

impl AnalyzerResult {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings, partial: false }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The assessment returned for one command. Constructed once per request,
/// immutable, and never retained by the core.
///
/// The serialized shape is a stable contract: `partial` appears only when
/// true, and `details` preserves (analyzer order, per-analyzer emission
/// order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub action: Action,
    pub summary: String,
    pub details: Vec<Finding>,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub partial: bool,
}

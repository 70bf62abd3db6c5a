// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Risk scorer: folds analyzer findings into one assessment.
//!
//! The aggregate level starts at the worst individual finding and is
//! amplified by volume and by dangerous category combinations: any critical
//! finding, two highs, or a high plus a medium across a permissions/network/
//! sensitive-path pair all escalate to critical; three mediums escalate to
//! high. The level then maps to an advisory action through the caller's
//! [`ActionPolicy`].

use std::collections::HashSet;

use crate::assessment::{
    ActionPolicy, AnalyzerResult, Finding, FindingCategory, RiskAssessment, RiskLevel,
};

/// Category pairs whose combination is worse than either alone.
const DANGEROUS_CATEGORY_PAIRS: &[(FindingCategory, FindingCategory)] = &[
    (FindingCategory::Permissions, FindingCategory::Network),
    (FindingCategory::Permissions, FindingCategory::SensitivePath),
    (FindingCategory::Network, FindingCategory::SensitivePath),
];

/// Fold analyzer results into a [`RiskAssessment`].
///
/// Finding order is preserved as (analyzer order, per-analyzer emission
/// order); `partial` is set when any analyzer reported a degraded result.
pub fn score(results: &[AnalyzerResult], policy: &ActionPolicy) -> RiskAssessment {
    let partial = results.iter().any(|r| r.partial);
    let findings: Vec<Finding> = results.iter().flat_map(|r| r.findings.clone()).collect();

    let risk_level = determine_level(&findings);
    let action = policy.action_for(risk_level);
    let summary = build_summary(risk_level, &findings);
    let recommendation = build_recommendation(risk_level, &findings);

    RiskAssessment {
        risk_level,
        action,
        summary,
        details: findings,
        recommendation,
        partial,
    }
}

fn determine_level(findings: &[Finding]) -> RiskLevel {
    if findings.is_empty() {
        return RiskLevel::None;
    }
    let max_individual = findings
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(RiskLevel::None);

    let criticals = count(findings, RiskLevel::Critical);
    let highs = count(findings, RiskLevel::High);
    let mediums = count(findings, RiskLevel::Medium);

    if criticals >= 1 {
        RiskLevel::Critical
    } else if highs >= 2 {
        RiskLevel::Critical
    } else if highs >= 1 && mediums >= 1 && has_dangerous_pair(findings) {
        RiskLevel::Critical
    } else if mediums >= 3 {
        RiskLevel::High
    } else {
        max_individual
    }
}

fn count(findings: &[Finding], severity: RiskLevel) -> usize {
    findings.iter().filter(|f| f.severity == severity).count()
}

fn has_dangerous_pair(findings: &[Finding]) -> bool {
    let categories: HashSet<FindingCategory> = findings.iter().map(|f| f.category).collect();
    DANGEROUS_CATEGORY_PAIRS
        .iter()
        .any(|(a, b)| categories.contains(a) && categories.contains(b))
}

fn build_summary(level: RiskLevel, findings: &[Finding]) -> String {
    let prefix = level.label();
    match findings.len() {
        0 => prefix.to_string(),
        1 => format!("{}: {}", prefix, findings[0].description),
        n => {
            let mut ranked: Vec<&Finding> = findings.iter().collect();
            // Stable sort keeps emission order within a severity.
            ranked.sort_by(|a, b| b.severity.cmp(&a.severity));
            let top: Vec<String> = ranked
                .iter()
                .take(3)
                .map(|f| format!("- {}", f.description))
                .collect();
            format!("{} — {} issues found:\n{}", prefix, n, top.join("\n"))
        }
    }
}

fn build_recommendation(level: RiskLevel, findings: &[Finding]) -> String {
    let has = |category: FindingCategory| findings.iter().any(|f| f.category == category);

    match level {
        RiskLevel::Critical if has(FindingCategory::Destructive) => {
            "This command performs irreversible destructive operations. Verify the targets \
             carefully before running it."
                .to_string()
        }
        RiskLevel::Critical
            if has(FindingCategory::Network) && has(FindingCategory::SensitivePath) =>
        {
            "This command may exfiltrate sensitive data over the network. Do not run it unless \
             you fully trust the destination."
                .to_string()
        }
        RiskLevel::Critical if has(FindingCategory::PackageVulnerability) => {
            let first = findings
                .iter()
                .find(|f| f.category == FindingCategory::PackageVulnerability)
                .map(|f| f.description.as_str())
                .unwrap_or_default();
            format!("Consider upgrading to a patched version. {}", first)
        }
        RiskLevel::Critical => {
            "This command raises critical security concerns and should not be run as-is."
                .to_string()
        }
        RiskLevel::High if has(FindingCategory::PackageVulnerability) => {
            "The requested package versions have known vulnerabilities. Consider newer releases."
                .to_string()
        }
        RiskLevel::High if has(FindingCategory::Permissions) => {
            "This command changes privileges or system permissions. Make sure that is intended."
                .to_string()
        }
        RiskLevel::High if has(FindingCategory::Network) => {
            "This command contacts external hosts. Verify the destination before running it."
                .to_string()
        }
        RiskLevel::High => "Review the flagged issues before running this command.".to_string(),
        RiskLevel::Medium => {
            "Minor concerns detected. Review the details before proceeding.".to_string()
        }
        RiskLevel::None => "No security concerns detected.".to_string(),
        RiskLevel::Low => "Low-risk issues noted. Proceed normally.".to_string(),
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Package-vulnerability analyzer.
//!
//! Extracts exact-versioned packages from `npm install`, `pip install`, and
//! `cargo add`/`install` invocations, queries the vulnerability oracle for
//! each (bounded fan-out), and maps the highest CVSS score of the known
//! vulnerabilities to a finding severity. Packages without a pinned version
//! are not queryable and are skipped; packages on the configured allowlist
//! skip the oracle entirely.
//!
//! A failed lookup degrades to a medium "status unknown" finding and marks
//! the whole assessment partial -- other packages are unaffected.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{binary_name, is_flag, Analyzer};
use crate::assessment::{AnalyzerResult, Finding, FindingCategory, RiskLevel};
use crate::osv::{cvss_score, QueryOutcome, Vulnerability, VulnerabilityOracle};
use crate::parser::Segment;

/// Concurrent oracle lookups per request.
const MAX_CONCURRENT_LOOKUPS: usize = 10;

/// Listed CVE/GHSA ids per finding before "and N more".
const MAX_LISTED_IDS: usize = 3;

/// `name<op>version` pin in pip requirement syntax.
static PIP_REQUIREMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^=<>!]+?)(==|>=|<=|~=|!=)(.+)$").expect("pip requirement regex"));

/// One exact-versioned package extracted from an install command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackageSpec {
    pub ecosystem: &'static str,
    pub name: String,
    pub version: String,
}

pub struct PackageVulnAnalyzer {
    oracle: Arc<dyn VulnerabilityOracle>,
    allowlist: HashSet<String>,
}

impl PackageVulnAnalyzer {
    /// `allowlist` entries are `name` or `name@version`; matching packages
    /// are never looked up and emit no finding.
    pub fn new(oracle: Arc<dyn VulnerabilityOracle>, allowlist: &[String]) -> Self {
        Self {
            oracle,
            allowlist: allowlist.iter().cloned().collect(),
        }
    }

    fn is_allowlisted(&self, pkg: &PackageSpec) -> bool {
        self.allowlist.contains(&pkg.name)
            || self
                .allowlist
                .contains(&format!("{}@{}", pkg.name, pkg.version))
    }
}

/// Split `name@version` at the last `@`, keeping scoped npm names
/// (`@scope/pkg@1.0.0`) intact. A leading `@` alone is a scope marker, not a
/// version separator.
fn split_at_version(token: &str) -> Option<(String, String)> {
    let at = token.rfind('@')?;
    if at == 0 {
        return None;
    }
    let (name, version) = token.split_at(at);
    let version = &version[1..];
    if version.is_empty() {
        return None;
    }
    Some((name.to_string(), version.to_string()))
}

/// Extract exact-versioned packages from every segment.
pub(crate) fn extract_packages(segments: &[Segment]) -> Vec<PackageSpec> {
    let mut packages = Vec::new();
    for segment in segments {
        let mut verb = binary_name(&segment.verb);
        let mut args = segment.args.as_slice();
        if verb == "sudo" {
            let Some(inner) = args.first() else { continue };
            verb = binary_name(inner);
            args = &args[1..];
        }
        let Some(subcommand) = args.first().map(String::as_str) else {
            continue;
        };
        let operands = args[1..].iter().filter(|a| !is_flag(a));

        match verb {
            "npm" if matches!(subcommand, "install" | "i" | "add") => {
                for token in operands {
                    if let Some((name, version)) = split_at_version(token) {
                        packages.push(PackageSpec {
                            ecosystem: "npm",
                            name,
                            version,
                        });
                    }
                }
            }
            "pip" | "pip3" if subcommand == "install" => {
                for token in operands {
                    if let Some(caps) = PIP_REQUIREMENT_RE.captures(token) {
                        packages.push(PackageSpec {
                            ecosystem: "PyPI",
                            name: caps[1].to_string(),
                            version: caps[3].to_string(),
                        });
                    }
                }
            }
            "cargo" if matches!(subcommand, "add" | "install") => {
                for token in operands {
                    if let Some((name, version)) = split_at_version(token) {
                        packages.push(PackageSpec {
                            ecosystem: "crates.io",
                            name,
                            version,
                        });
                    }
                }
            }
            _ => {}
        }
    }
    packages
}

/// CVSS score to finding severity. An unscored vulnerability is medium.
fn severity_for_score(score: Option<f64>) -> RiskLevel {
    match score {
        Some(s) if s >= 9.0 => RiskLevel::Critical,
        Some(s) if s >= 7.0 => RiskLevel::High,
        Some(s) if s >= 4.0 => RiskLevel::Medium,
        Some(_) => RiskLevel::Low,
        None => RiskLevel::Medium,
    }
}

fn vulnerability_finding(pkg: &PackageSpec, vulns: &[Vulnerability]) -> Finding {
    let highest = vulns.iter().filter_map(cvss_score).fold(None, |best, s| {
        Some(best.map_or(s, |b: f64| b.max(s)))
    });

    let ids: Vec<&str> = vulns
        .iter()
        .map(|v| v.id.as_str())
        .filter(|id| id.starts_with("CVE-") || id.starts_with("GHSA-"))
        .collect();

    let mut description = format!(
        "`{}@{}` has {} known {}",
        pkg.name,
        pkg.version,
        vulns.len(),
        if vulns.len() == 1 {
            "vulnerability"
        } else {
            "vulnerabilities"
        }
    );
    if !ids.is_empty() {
        let mut listed = ids[..ids.len().min(MAX_LISTED_IDS)].join(", ");
        if ids.len() > MAX_LISTED_IDS {
            listed.push_str(&format!(" and {} more", ids.len() - MAX_LISTED_IDS));
        }
        description.push_str(&format!(" including {}", listed));
    }
    if let Some(score) = highest {
        description.push_str(&format!(" (CVSS {:.1})", score));
    }

    Finding::new(
        FindingCategory::PackageVulnerability,
        severity_for_score(highest),
        description,
    )
}

#[async_trait]
impl Analyzer for PackageVulnAnalyzer {
    fn name(&self) -> &'static str {
        "package-vulnerability"
    }

    async fn analyze(&self, segments: &[Segment], _cwd: &Path) -> AnalyzerResult {
        let packages: Vec<PackageSpec> = extract_packages(segments)
            .into_iter()
            .filter(|pkg| !self.is_allowlisted(pkg))
            .collect();
        if packages.is_empty() {
            return AnalyzerResult::default();
        }
        debug!(count = packages.len(), "querying vulnerability oracle");

        let outcomes: Vec<(PackageSpec, QueryOutcome)> = stream::iter(packages)
            .map(|pkg| {
                let oracle = Arc::clone(&self.oracle);
                async move {
                    let outcome = oracle.query(pkg.ecosystem, &pkg.name, &pkg.version).await;
                    (pkg, outcome)
                }
            })
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        let mut findings = Vec::new();
        let mut partial = false;
        for (pkg, outcome) in outcomes {
            if let Some(error) = outcome.error {
                partial = true;
                findings.push(Finding::new(
                    FindingCategory::PackageVulnerability,
                    RiskLevel::Medium,
                    format!(
                        "`{}@{}` — {}; vulnerability status unknown",
                        pkg.name, pkg.version, error
                    ),
                ));
                continue;
            }
            if outcome.vulns.is_empty() {
                continue;
            }
            findings.push(vulnerability_finding(&pkg, &outcome.vulns));
        }

        AnalyzerResult { findings, partial }
    }
}

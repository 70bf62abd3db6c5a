// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Privilege and permission-change analyzer.
//!
//! Covers `sudo` escalation (graded by what runs underneath), dangerous
//! `chmod` modes, and `chown` ownership transfers. Mode/target combinations
//! on system paths escalate: a world-writable mode on `/etc/` is critical,
//! the same mode on a scratch file is high, and a benign mode on a system
//! path is medium.

use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{binary_name, is_flag, Analyzer};
use crate::assessment::{AnalyzerResult, Finding, FindingCategory, RiskLevel};
use crate::parser::Segment;

/// Commands that are dangerous to run under sudo.
const DANGEROUS_SUDO_TARGETS: &[&str] = &[
    "rm", "chmod", "chown", "mkfs", "dd", "kill", "shutdown", "reboot",
];

/// Package managers whose install commands run arbitrary scripts; under sudo
/// those scripts run as root.
const PACKAGE_MANAGERS: &[&str] = &["npm", "pip", "pip3", "cargo", "apt", "apt-get", "yum", "dnf", "brew"];
const INSTALL_SUBCOMMANDS: &[&str] = &["install", "i", "add"];

/// Octal (`755`, `4755`) or symbolic (`o+w`, `a+rwx`) chmod mode.
static MODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-7]{3,4}|[ugoa][+-][rwxst]+)$").expect("chmod mode regex"));

/// Modes that open files to every local user.
const DANGEROUS_MODES: &[&str] = &["777", "666", "o+w", "a+w", "o+rwx", "a+rwx"];

/// System path prefixes where permission changes matter most.
const SENSITIVE_SYSTEM_PREFIXES: &[&str] = &[
    "/etc/",
    "/usr/bin/",
    "/usr/local/bin/",
    "/usr/sbin/",
    "/var/log/",
    "/boot/",
    "/sys/",
    "/proc/",
];

#[derive(Default)]
pub struct PermissionsAnalyzer;

impl PermissionsAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn check_segment(&self, segment: &Segment, findings: &mut Vec<Finding>) {
        let verb = binary_name(&segment.verb);
        match verb {
            "sudo" => self.check_sudo(segment, findings),
            "chmod" => {
                if let Some(finding) = chmod_finding(&segment.args) {
                    findings.push(finding);
                }
            }
            "chown" => {
                if let Some(finding) = chown_finding(&segment.args) {
                    findings.push(finding);
                }
            }
            _ => {}
        }
    }

    fn check_sudo(&self, segment: &Segment, findings: &mut Vec<Finding>) {
        let Some(inner_raw) = segment.args.first() else {
            return;
        };
        let inner = binary_name(inner_raw);
        let stripped = &segment.args[1..];

        let installs_software = PACKAGE_MANAGERS.contains(&inner)
            && stripped
                .first()
                .is_some_and(|sub| INSTALL_SUBCOMMANDS.contains(&sub.as_str()));

        if DANGEROUS_SUDO_TARGETS.contains(&inner) {
            findings.push(Finding::new(
                FindingCategory::Permissions,
                RiskLevel::High,
                format!("sudo runs `{}` with root privileges", inner),
            ));
        } else if installs_software {
            findings.push(Finding::new(
                FindingCategory::Permissions,
                RiskLevel::High,
                format!("sudo {} install runs package scripts as root", inner),
            ));
        } else {
            findings.push(Finding::new(
                FindingCategory::Permissions,
                RiskLevel::Low,
                "command runs under sudo",
            ));
        }

        // The chmod/chown rules also apply to the stripped arguments.
        match inner {
            "chmod" => {
                if let Some(finding) = chmod_finding(stripped) {
                    findings.push(finding);
                }
            }
            "chown" => {
                if let Some(finding) = chown_finding(stripped) {
                    findings.push(finding);
                }
            }
            _ => {}
        }
    }
}

fn is_sensitive_system_path(path: &str) -> bool {
    SENSITIVE_SYSTEM_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn chmod_finding(args: &[String]) -> Option<Finding> {
    let mode = args.iter().find(|a| MODE_RE.is_match(a))?;
    let dangerous_mode = DANGEROUS_MODES.contains(&mode.as_str());
    let sensitive_target = args
        .iter()
        .filter(|a| !is_flag(a) && !MODE_RE.is_match(a))
        .any(|a| is_sensitive_system_path(a));

    match (dangerous_mode, sensitive_target) {
        (true, true) => Some(Finding::new(
            FindingCategory::Permissions,
            RiskLevel::Critical,
            format!("chmod {} opens a system path to all users", mode),
        )),
        (true, false) => Some(Finding::new(
            FindingCategory::Permissions,
            RiskLevel::High,
            format!("chmod {} makes files world-accessible", mode),
        )),
        (false, true) => Some(Finding::new(
            FindingCategory::Permissions,
            RiskLevel::Medium,
            "chmod changes permissions on a system path",
        )),
        (false, false) => None,
    }
}

fn chown_finding(args: &[String]) -> Option<Finding> {
    let mut operands = args.iter().filter(|a| !is_flag(a));
    // First non-flag token is the user[:group] spec, not a target.
    operands.next()?;
    let sensitive = operands.any(|a| is_sensitive_system_path(a));
    if sensitive {
        Some(Finding::new(
            FindingCategory::Permissions,
            RiskLevel::High,
            "chown changes ownership of a system path",
        ))
    } else {
        Some(Finding::new(
            FindingCategory::Permissions,
            RiskLevel::Medium,
            "chown transfers file ownership",
        ))
    }
}

#[async_trait]
impl Analyzer for PermissionsAnalyzer {
    fn name(&self) -> &'static str {
        "permissions"
    }

    async fn analyze(&self, segments: &[Segment], _cwd: &Path) -> AnalyzerResult {
        let mut findings = Vec::new();
        for segment in segments {
            self.check_segment(segment, &mut findings);
        }
        AnalyzerResult::new(findings)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Destructive-operation analyzer.
//!
//! Flags irreversible operations on the filesystem (`rm -rf`, `shred`,
//! `truncate`), raw disks (`dd`, `mkfs`), version control (`git push -f`,
//! `reset --hard`, `clean -f`), and databases (destructive SQL embedded in a
//! segment). Escalation depends on the target: wiping `/` or the home
//! directory is critical, a glob target is high, and a scoped directory is
//! medium.

use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{binary_name, is_flag, Analyzer};
use crate::assessment::{AnalyzerResult, Finding, FindingCategory, RiskLevel};
use crate::parser::Segment;

/// Destructive SQL statements scanned for in raw segment text.
static SQL_DESTRUCTIVE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bDROP\s+(DATABASE|TABLE|SCHEMA|INDEX)\b").expect("sql drop regex"),
        Regex::new(r"(?i)\bTRUNCATE\s+TABLE\b").expect("sql truncate regex"),
        Regex::new(r"(?i)\bDELETE\s+FROM\s+\S+.*\bWHERE\b.*=.*\bOR\b").expect("sql delete regex"),
    ]
});

/// Git argument tuples that rewrite or discard history.
const GIT_FORCE_PUSH_FLAGS: &[&str] = &["-f", "--force", "--force-with-lease"];

pub struct DestructiveAnalyzer {
    home: String,
}

impl DestructiveAnalyzer {
    pub fn new(home: impl Into<String>) -> Self {
        Self { home: home.into() }
    }

    fn check_segment(&self, segment: &Segment, findings: &mut Vec<Finding>) {
        let verb = binary_name(&segment.verb);

        match verb {
            "rm" => self.check_rm(segment, findings),
            "truncate" => findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Medium,
                "truncate discards file contents",
            )),
            "shred" => findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::High,
                "shred irrecoverably overwrites file contents",
            )),
            "dd" => self.check_dd(segment, findings),
            "git" => self.check_git(segment, findings),
            v if v == "mkfs" || v.starts_with("mkfs.") => findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Critical,
                "mkfs formats a filesystem, destroying all data on the device",
            )),
            _ => {}
        }

        for pattern in SQL_DESTRUCTIVE.iter() {
            if pattern.is_match(&segment.raw) {
                findings.push(Finding::new(
                    FindingCategory::Destructive,
                    RiskLevel::Critical,
                    format!(
                        "destructive SQL statement: {}",
                        truncate_chars(&segment.raw, 80)
                    ),
                ));
                break;
            }
        }
    }

    fn check_rm(&self, segment: &Segment, findings: &mut Vec<Finding>) {
        let (force, recursive) = rm_flags(&segment.args);
        if !force && !recursive {
            return;
        }
        if force != recursive {
            // Only one of the two is present.
            let flag = if force { "--force" } else { "--recursive" };
            findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Low,
                format!("rm with {} deletes without full confirmation", flag),
            ));
            return;
        }

        // Both flags: escalate by the worst target.
        let mut worst: Option<Finding> = None;
        for target in segment.args.iter().filter(|a| !is_flag(a)) {
            let candidate = self.rm_target_finding(target);
            let dominated = worst
                .as_ref()
                .is_none_or(|w| candidate.severity > w.severity);
            if dominated {
                worst = Some(candidate);
            }
        }
        findings.push(worst.unwrap_or_else(|| {
            Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Medium,
                "rm -rf deletes recursively without confirmation",
            )
        }));
    }

    fn rm_target_finding(&self, target: &str) -> Finding {
        let home_prefix = format!("{}/", self.home.trim_end_matches('/'));
        if target == "/" || target == "/*" {
            Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Critical,
                "rm -rf / would irreversibly delete the entire filesystem",
            )
        } else if target == "~"
            || target == "$HOME"
            || target == self.home
            || target.starts_with("~/")
            || target.starts_with(&home_prefix)
        {
            Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Critical,
                "rm -rf ~ would irreversibly delete the home directory",
            )
        } else if target == "*" {
            Finding::new(
                FindingCategory::Destructive,
                RiskLevel::High,
                "rm -rf * deletes everything in the working directory",
            )
        } else {
            Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Medium,
                format!("rm -rf {} is irreversible", target),
            )
        }
    }

    fn check_dd(&self, segment: &Segment, findings: &mut Vec<Finding>) {
        let device_write = segment
            .args
            .iter()
            .any(|a| a.strip_prefix("of=").is_some_and(|t| t.starts_with("/dev/")));
        if device_write {
            findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::Critical,
                "dd writes directly to a raw device, destroying its contents",
            ));
        } else {
            findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::High,
                "dd performs low-level copies that can overwrite data",
            ));
        }
    }

    fn check_git(&self, segment: &Segment, findings: &mut Vec<Finding>) {
        let args = &segment.args;
        let has = |t: &str| args.iter().any(|a| a == t);

        if has("push") && GIT_FORCE_PUSH_FLAGS.iter().any(|&f| has(f)) {
            let protected_branch = args.iter().any(|a| {
                a == "main" || a == "master" || a.ends_with("/main") || a.ends_with("/master")
            });
            if protected_branch {
                findings.push(Finding::new(
                    FindingCategory::Destructive,
                    RiskLevel::Critical,
                    "force-push to main/master rewrites shared branch history",
                ));
            } else {
                findings.push(Finding::new(
                    FindingCategory::Destructive,
                    RiskLevel::High,
                    "git push --force rewrites remote history",
                ));
            }
        } else if has("reset") && has("--hard") {
            findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::High,
                "git reset --hard discards uncommitted changes",
            ));
        } else if has("clean") && has("-f") {
            findings.push(Finding::new(
                FindingCategory::Destructive,
                RiskLevel::High,
                "git clean -f permanently deletes untracked files",
            ));
        }
    }
}

/// Scan flag-shaped args for force/recursive intent. Only tokens starting
/// with `-` count, so a filename containing the letter `f` never reads as a
/// force flag.
fn rm_flags(args: &[String]) -> (bool, bool) {
    let mut force = false;
    let mut recursive = false;
    for arg in args {
        if arg == "--force" {
            force = true;
        } else if arg == "--recursive" {
            recursive = true;
        } else if arg.starts_with('-') && !arg.starts_with("--") && arg.len() > 1 {
            let flags = &arg[1..];
            if flags.contains('f') {
                force = true;
            }
            if flags.contains('r') || flags.contains('R') {
                recursive = true;
            }
        }
    }
    (force, recursive)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[async_trait]
impl Analyzer for DestructiveAnalyzer {
    fn name(&self) -> &'static str {
        "destructive"
    }

    async fn analyze(&self, segments: &[Segment], _cwd: &Path) -> AnalyzerResult {
        let mut findings = Vec::new();
        for segment in segments {
            self.check_segment(segment, &mut findings);
        }
        AnalyzerResult::new(findings)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Sensitive-path access analyzer.
//!
//! Matches the file operands of known read/write commands (and every
//! redirect target) against a tiered set of glob patterns: credentials (SSH
//! and cloud keys), agent identity files, system auth databases, and a
//! catch-all tier that includes user-supplied patterns. Writes to
//! credential or auth files are critical; reads are graded lower.
//!
//! Globs are compiled to anchored regexes (`**` crosses separators, `*`
//! stays within one, `?` is a single character) and each candidate is tried
//! as the resolved full path, the literal argument, and the basename.

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{binary_name, is_flag, Analyzer};
use crate::assessment::{AnalyzerResult, Finding, FindingCategory, RiskLevel};
use crate::parser::{expand_tilde, Segment};

/// Sensitivity tier of a matched pattern; drives the severity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitivityTier {
    Credential,
    Agent,
    SystemAuth,
    Other,
}

impl SensitivityTier {
    fn label(&self) -> &'static str {
        match self {
            SensitivityTier::Credential => "credential",
            SensitivityTier::Agent => "agent",
            SensitivityTier::SystemAuth => "system-auth",
            SensitivityTier::Other => "other",
        }
    }
}

/// Built-in pattern set, ordered most-sensitive first so the first match on
/// a path is also the worst one.
const DEFAULT_PATTERNS: &[(&str, SensitivityTier)] = &[
    ("/etc/shadow", SensitivityTier::SystemAuth),
    ("/etc/sudoers", SensitivityTier::SystemAuth),
    ("~/.ssh/*", SensitivityTier::Credential),
    ("~/.aws/*", SensitivityTier::Credential),
    ("~/.config/gcloud/*", SensitivityTier::Credential),
    ("*id_rsa*", SensitivityTier::Credential),
    ("*.pem", SensitivityTier::Credential),
    ("*.key", SensitivityTier::Credential),
    ("~/.claude/*", SensitivityTier::Agent),
    (".cursorrules", SensitivityTier::Agent),
    ("CLAUDE.md", SensitivityTier::Agent),
    ("/etc/passwd", SensitivityTier::Other),
    (".env", SensitivityTier::Other),
    ("/usr/bin/*", SensitivityTier::Other),
    ("/usr/local/bin/*", SensitivityTier::Other),
];

/// Commands treated as reads of their file operands.
const READ_VERBS: &[&str] = &[
    "cat", "head", "tail", "less", "more", "bat", "grep", "rg", "awk", "sed", "wc", "sort", "uniq",
];

/// Commands treated as writes to their file operands.
const WRITE_VERBS: &[&str] = &[
    "cp", "mv", "tee", "dd", "install", "rsync", "sed", "awk", "nano", "vim", "vi", "emacs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

struct CompiledPattern {
    tier: SensitivityTier,
    regex: Regex,
}

pub struct SensitivePathAnalyzer {
    patterns: Vec<CompiledPattern>,
    home: String,
}

impl SensitivePathAnalyzer {
    /// Build the analyzer from the default tier table plus user-supplied
    /// globs (which land in the `other` tier). Invalid user globs are
    /// skipped rather than failing construction.
    pub fn new(extra_patterns: &[String], home: impl Into<String>) -> Self {
        let home = home.into();
        let mut patterns = Vec::new();
        for (glob, tier) in DEFAULT_PATTERNS {
            if let Some(compiled) = compile_pattern(glob, *tier, &home) {
                patterns.push(compiled);
            }
        }
        for glob in extra_patterns {
            match compile_pattern(glob, SensitivityTier::Other, &home) {
                Some(compiled) => patterns.push(compiled),
                None => debug!(pattern = %glob, "skipping unparseable sensitive pattern"),
            }
        }
        Self { patterns, home }
    }

    fn match_path(&self, path: &str, cwd: &Path) -> Option<(&CompiledPattern, String)> {
        let expanded = resolve_path(path, &self.home, cwd);
        let basename = path.rsplit('/').next().unwrap_or(path);
        for pattern in &self.patterns {
            for candidate in [expanded.as_str(), path, basename] {
                if pattern.regex.is_match(candidate) {
                    return Some((pattern, expanded.clone()));
                }
            }
        }
        None
    }

    fn check_access(
        &self,
        path: &str,
        access: Access,
        cwd: &Path,
        findings: &mut Vec<Finding>,
    ) {
        let Some((pattern, resolved)) = self.match_path(path, cwd) else {
            return;
        };
        let severity = severity_for(access, pattern.tier);
        let verb_word = match access {
            Access::Read => "read of",
            Access::Write => "write to",
        };
        findings.push(Finding::new(
            FindingCategory::SensitivePath,
            severity,
            format!(
                "{} {} file {}",
                verb_word,
                pattern.tier.label(),
                resolved
            ),
        ));
    }
}

/// Severity matrix: writes to credential/auth files are critical, agent
/// files high; reads of auth files high, everything else medium.
fn severity_for(access: Access, tier: SensitivityTier) -> RiskLevel {
    match (access, tier) {
        (Access::Write, SensitivityTier::Credential | SensitivityTier::SystemAuth) => {
            RiskLevel::Critical
        }
        (Access::Write, SensitivityTier::Agent) => RiskLevel::High,
        (Access::Write, SensitivityTier::Other) => RiskLevel::Medium,
        (Access::Read, SensitivityTier::SystemAuth) => RiskLevel::High,
        (Access::Read, _) => RiskLevel::Medium,
    }
}

/// Resolve a candidate path for full-path matching: tildes expand to home
/// and relative paths are joined onto the working directory.
fn resolve_path(path: &str, home: &str, cwd: &Path) -> String {
    let expanded = expand_tilde(path, home);
    if expanded.starts_with('/') {
        expanded
    } else {
        cwd.join(&expanded).to_string_lossy().into_owned()
    }
}

/// Compile one glob to an anchored regex. `**` matches across separators,
/// `*` within a segment, `?` one character; everything else is literal.
fn compile_pattern(glob: &str, tier: SensitivityTier, home: &str) -> Option<CompiledPattern> {
    let expanded = expand_tilde(glob, home);
    let mut regex_src = String::from("^");
    let chars: Vec<char> = expanded.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    regex_src.push_str(".*");
                    i += 2;
                } else {
                    regex_src.push_str("[^/]*");
                    i += 1;
                }
            }
            '?' => {
                regex_src.push('.');
                i += 1;
            }
            c => {
                regex_src.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    regex_src.push('$');
    let regex = Regex::new(&regex_src).ok()?;
    Some(CompiledPattern { tier, regex })
}

#[async_trait]
impl Analyzer for SensitivePathAnalyzer {
    fn name(&self) -> &'static str {
        "sensitive-path"
    }

    async fn analyze(&self, segments: &[Segment], cwd: &Path) -> AnalyzerResult {
        let mut findings = Vec::new();
        for segment in segments {
            let verb = binary_name(&segment.verb);
            let access = if READ_VERBS.contains(&verb) {
                Some(Access::Read)
            } else if WRITE_VERBS.contains(&verb) {
                Some(Access::Write)
            } else {
                None
            };

            if let Some(access) = access {
                for arg in segment.args.iter().filter(|a| !is_flag(a)) {
                    self.check_access(arg, access, cwd, &mut findings);
                }
            }

            // Redirect targets are writes regardless of the verb.
            for redirect in &segment.redirects {
                self.check_access(&redirect.target, Access::Write, cwd, &mut findings);
            }
        }
        AnalyzerResult::new(findings)
    }
}

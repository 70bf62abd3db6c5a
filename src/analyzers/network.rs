// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Network and exfiltration analyzer.
//!
//! Watches transfer tools (`curl`, `wget`, `nc`, `ssh`, ...) for uploads to
//! non-allowlisted hosts, credential-bearing headers, clear-text HTTP, and
//! raw socket use; watches DNS tools for command-substituted hostnames (a
//! classic exfiltration channel); and scans pipe chains that end in a
//! network verb for sensitive data flowing into them.
//!
//! A host allowlist (package registries, github, loopback, plus
//! user-supplied hosts) suppresses findings for well-known destinations.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{binary_name, Analyzer};
use crate::assessment::{AnalyzerResult, Finding, FindingCategory, RiskLevel};
use crate::parser::{ChainOperator, Segment};

/// Outbound transfer tools.
pub(crate) const NETWORK_VERBS: &[&str] = &[
    "curl", "wget", "nc", "netcat", "ncat", "ssh", "scp", "rsync", "ftp", "sftp",
];

/// DNS lookup tools, usable as a covert channel.
const DNS_VERBS: &[&str] = &["nslookup", "dig", "host", "drill"];

/// Hosts that never trigger upload/header findings.
const DEFAULT_SAFE_HOSTS: &[&str] = &[
    "registry.npmjs.org",
    "pypi.org",
    "crates.io",
    "github.com",
    "raw.githubusercontent.com",
    "api.github.com",
    "localhost",
    "127.0.0.1",
    "::1",
];

/// Flags that send local data with the request.
const UPLOAD_FLAGS: &[&str] = &[
    "-d", "--data", "--data-binary", "-F", "--form", "-T", "--upload-file",
];

/// Indicators of sensitive material in raw segment text or upload payloads.
static SENSITIVE_DATA_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/etc/passwd",
        r"/etc/shadow",
        r"\.ssh/",
        r"\.aws/",
        r"\.env",
        r"id_rsa",
        r"\.pem$",
        r"\.key$",
        r"credentials",
        r"(?i)secret",
        r"(?i)token",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("sensitive data regex"))
    .collect()
});

/// Header values that carry credentials.
static CREDENTIAL_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(Authorization|Bearer|Token|Cookie|X-Api-Key|X-Auth-Token)\b")
        .expect("credential header regex")
});

pub struct NetworkAnalyzer {
    safe_hosts: HashSet<String>,
}

impl NetworkAnalyzer {
    pub fn new(extra_hosts: &[String]) -> Self {
        let mut safe_hosts: HashSet<String> =
            DEFAULT_SAFE_HOSTS.iter().map(|h| h.to_string()).collect();
        safe_hosts.extend(extra_hosts.iter().cloned());
        Self { safe_hosts }
    }

    fn host_is_safe(&self, host: Option<&str>) -> bool {
        host.is_some_and(|h| self.safe_hosts.contains(h))
    }
}

fn matches_sensitive(text: &str) -> bool {
    SENSITIVE_DATA_PATTERNS.iter().any(|re| re.is_match(text))
}

/// First URL-shaped argument and its parsed hostname. A parse failure
/// yields no host.
fn extract_url(segment: &Segment) -> (Option<&String>, Option<String>) {
    let url_arg = segment.args.iter().find(|a| {
        a.starts_with("http://") || a.starts_with("https://") || a.starts_with("ftp://")
    });
    let host = url_arg
        .and_then(|u| Url::parse(u).ok())
        .and_then(|u| u.host_str().map(str::to_string));
    (url_arg, host)
}

/// Value of the first `-H`/`--header` option, covering both the split
/// (`-H value`) and combined (`--header=value`) spellings.
fn extract_header_value(args: &[String]) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if arg == "-H" || arg == "--header" {
            return args.get(i + 1).cloned();
        }
        if let Some(value) = arg.strip_prefix("--header=") {
            return Some(value.to_string());
        }
    }
    None
}

/// Upload payload, if an upload flag is present. The payload is the value
/// following the flag (or embedded after `=` for long options).
fn extract_upload(args: &[String]) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if UPLOAD_FLAGS.contains(&arg.as_str()) {
            return Some(args.get(i + 1).cloned().unwrap_or_default());
        }
        for flag in UPLOAD_FLAGS.iter().filter(|f| f.starts_with("--")) {
            if let Some(value) = arg.strip_prefix(&format!("{}=", flag)) {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[async_trait]
impl Analyzer for NetworkAnalyzer {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn analyze(&self, segments: &[Segment], _cwd: &Path) -> AnalyzerResult {
        let mut findings = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let verb = binary_name(&segment.verb);

            if DNS_VERBS.contains(&verb) {
                if segment.raw.contains("$(") || segment.raw.contains('`') {
                    findings.push(Finding::new(
                        FindingCategory::Network,
                        RiskLevel::Critical,
                        format!("possible DNS exfiltration: {} resolves command-derived data", verb),
                    ));
                } else {
                    findings.push(Finding::new(
                        FindingCategory::Network,
                        RiskLevel::Low,
                        format!("DNS lookup tool ({})", verb),
                    ));
                }
                continue;
            }

            if !NETWORK_VERBS.contains(&verb) {
                continue;
            }

            // Final receiver of a pipe whose producer touches sensitive data.
            if segment.operator.is_none() && idx > 0 {
                let prev = &segments[idx - 1];
                if prev.operator == Some(ChainOperator::Pipe) && matches_sensitive(&prev.raw) {
                    findings.push(Finding::new(
                        FindingCategory::Network,
                        RiskLevel::Critical,
                        format!("piping sensitive data into {} (possible exfiltration)", verb),
                    ));
                    continue;
                }
            }

            let upload = extract_upload(&segment.args);
            let (url_arg, host) = extract_url(segment);
            let safe = self.host_is_safe(host.as_deref());
            let host_label = host.clone().unwrap_or_else(|| "unknown host".to_string());

            if (verb == "curl" || verb == "wget") && !safe {
                if let Some(header) = extract_header_value(&segment.args) {
                    if CREDENTIAL_HEADER_RE.is_match(&header) {
                        findings.push(Finding::new(
                            FindingCategory::Network,
                            RiskLevel::High,
                            format!("credential header sent to non-allowlisted {}", host_label),
                        ));
                    }
                }
            }

            if let Some(payload) = upload {
                if !safe {
                    if matches_sensitive(&payload) {
                        findings.push(Finding::new(
                            FindingCategory::Network,
                            RiskLevel::Critical,
                            format!("sends sensitive data to non-allowlisted {}", host_label),
                        ));
                    } else {
                        findings.push(Finding::new(
                            FindingCategory::Network,
                            RiskLevel::High,
                            format!("uploads data to non-allowlisted {}", host_label),
                        ));
                    }
                }
            } else if let Some(url) = url_arg {
                if url.starts_with("http://") && !safe {
                    findings.push(Finding::new(
                        FindingCategory::Network,
                        RiskLevel::Medium,
                        format!("unencrypted HTTP transfer to {}", host_label),
                    ));
                }
            }

            if matches!(verb, "nc" | "netcat" | "ncat") {
                findings.push(Finding::new(
                    FindingCategory::Network,
                    RiskLevel::High,
                    format!("{} opens raw network sockets", verb),
                ));
            }
        }

        // Chain exfiltration: a pipeline that ends in a network verb after
        // touching sensitive data anywhere upstream.
        if let Some(last) = segments.last() {
            let last_verb = binary_name(&last.verb);
            if NETWORK_VERBS.contains(&last_verb) && segments.len() > 1 {
                let earlier = &segments[..segments.len() - 1];
                let piped = earlier.iter().any(|s| s.operator == Some(ChainOperator::Pipe));
                let sensitive = earlier.iter().any(|s| matches_sensitive(&s.raw));
                let already_critical =
                    findings.iter().any(|f| f.severity == RiskLevel::Critical);
                if piped && sensitive && !already_critical {
                    findings.push(Finding::new(
                        FindingCategory::Network,
                        RiskLevel::Critical,
                        format!(
                            "command chain pipes sensitive data into {} (possible exfiltration)",
                            last_verb
                        ),
                    ));
                }
            }
        }

        AnalyzerResult::new(findings)
    }
}

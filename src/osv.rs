// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Bounded vulnerability oracle backed by the OSV.dev database.
//!
//! A single operation: query one `(ecosystem, name, version)` tuple and get
//! back the known vulnerabilities. Lookups are cached in a bounded in-memory
//! LRU (500 entries, process-local) and cancelled at a wall-clock timeout so
//! a slow or unreachable database degrades one package lookup, never the
//! whole assessment. Failures are returned in-band as an `error` string --
//! the oracle itself never raises.
//!
//! The [`VulnerabilityOracle`] trait is the seam the package analyzer
//! depends on; tests substitute a stub implementation.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Production OSV query endpoint.
pub const OSV_QUERY_URL: &str = "https://api.osv.dev/v1/query";

/// Maximum cached lookups; the eldest entry is evicted on insert at capacity.
const CACHE_CAPACITY: usize = 500;

/// One vulnerability record as returned by the OSV API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Vec<SeverityEntry>>,
}

/// A scored severity entry attached to a vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub score: String,
}

/// Result of one oracle lookup. A failed lookup carries `error` and an empty
/// vulnerability list; callers surface it as a degraded (partial) result.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub vulns: Vec<Vulnerability>,
    pub error: Option<String>,
}

/// The oracle seam: one async lookup per package.
#[async_trait]
pub trait VulnerabilityOracle: Send + Sync {
    async fn query(&self, ecosystem: &str, name: &str, version: &str) -> QueryOutcome;
}

#[derive(Serialize)]
struct QueryBody<'a> {
    package: PackageRef<'a>,
    version: &'a str,
}

#[derive(Serialize)]
struct PackageRef<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    vulns: Vec<Vulnerability>,
}

/// HTTP client for OSV.dev with a per-query wall-clock timeout and a bounded
/// LRU cache keyed by `ecosystem:name@version`.
///
/// The cache is the only shared mutable state in a long-running server;
/// access is serialized behind a single lock. Entries are never mutated
/// after insert. Duplicate in-flight queries for the same key are permitted.
pub struct OsvClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    cache: Mutex<LruCache<String, Vec<Vulnerability>>>,
}

impl OsvClient {
    /// Create a client against the production OSV endpoint.
    pub fn new(timeout: Duration) -> Self {
        Self::with_endpoint(OSV_QUERY_URL, timeout)
    }

    /// Create a client against an arbitrary endpoint (tests point this at a
    /// local mock server).
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).expect("cache capacity is nonzero"),
            )),
        }
    }

    /// Number of cached lookups.
    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    async fn lookup(
        &self,
        ecosystem: &str,
        name: &str,
        version: &str,
    ) -> Result<Vec<Vulnerability>, String> {
        let body = QueryBody {
            package: PackageRef { name, ecosystem },
            version,
        };
        let fetch = async {
            let response = self
                .http
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|_| "OSV lookup failed: network error".to_string())?;
            if !response.status().is_success() {
                return Err(format!(
                    "OSV API returned HTTP {}",
                    response.status().as_u16()
                ));
            }
            let parsed: QueryResponse = response
                .json()
                .await
                .map_err(|_| "OSV lookup failed: network error".to_string())?;
            Ok(parsed.vulns)
        };
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err("OSV lookup failed: request timed out".to_string()),
        }
    }
}

#[async_trait]
impl VulnerabilityOracle for OsvClient {
    async fn query(&self, ecosystem: &str, name: &str, version: &str) -> QueryOutcome {
        let key = format!("{}:{}@{}", ecosystem, name, version);

        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!(key = %key, "OSV cache hit");
            return QueryOutcome {
                vulns: hit.clone(),
                error: None,
            };
        }

        match self.lookup(ecosystem, name, version).await {
            Ok(vulns) => {
                self.cache.lock().await.put(key, vulns.clone());
                QueryOutcome { vulns, error: None }
            }
            Err(error) => {
                warn!(key = %key, error = %error, "OSV lookup failed");
                QueryOutcome {
                    vulns: Vec::new(),
                    error: Some(error),
                }
            }
        }
    }
}

/// Highest CVSS score across a vulnerability's severity entries, considering
/// `CVSS_V3` and `CVSS_V2` only. A score field may be a numeric literal in
/// `[0, 10]` or a `CVSS:`-prefixed vector, which is approximated.
pub fn cvss_score(vuln: &Vulnerability) -> Option<f64> {
    let entries = vuln.severity.as_ref()?;
    let mut best: Option<f64> = None;
    for entry in entries {
        if entry.kind != "CVSS_V3" && entry.kind != "CVSS_V2" {
            continue;
        }
        let score = if let Ok(n) = entry.score.parse::<f64>() {
            (0.0..=10.0).contains(&n).then_some(n)
        } else if entry.score.starts_with("CVSS:") {
            Some(approximate_vector_score(&entry.score))
        } else {
            None
        };
        if let Some(s) = score {
            best = Some(best.map_or(s, |b: f64| b.max(s)));
        }
    }
    best
}

/// Approximate a CVSS base score from a vector string.
///
/// Impact letters map N=0, L=1, H=2; the maximum of C/I/A (preferring the
/// v4-style VC/VI/VA keys when present) sets the base (2 → 7.0, 1 → 4.0,
/// 0 → 0.0), with bumps for low attack complexity (+1.0), no privileges
/// required (+1.0), and changed scope (+0.5), capped at 10.0.
fn approximate_vector_score(vector: &str) -> f64 {
    let mut metrics: HashMap<&str, &str> = HashMap::new();
    for pair in vector.split('/') {
        if let Some((key, value)) = pair.split_once(':') {
            metrics.insert(key, value);
        }
    }

    let impact = |primary: &str, fallback: &str| -> u8 {
        let letter = metrics
            .get(primary)
            .or_else(|| metrics.get(fallback))
            .copied()
            .unwrap_or("N");
        match letter {
            "H" => 2,
            "L" => 1,
            _ => 0,
        }
    };

    let max_impact = impact("VC", "C").max(impact("VI", "I")).max(impact("VA", "A"));
    let mut score = match max_impact {
        2 => 7.0,
        1 => 4.0,
        _ => 0.0,
    };
    if metrics.get("AC") == Some(&"L") {
        score += 1.0;
    }
    if metrics.get("PR") == Some(&"N") {
        score += 1.0;
    }
    if metrics.get("S") == Some(&"C") {
        score += 0.5;
    }
    f64::min(score, 10.0)
}

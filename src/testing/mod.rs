// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Shared test scaffolding plus cross-module test suites.
//!
//! `integration` exercises full command-to-assessment scenarios against a
//! stubbed oracle; `adversarial` holds false-positive-immunity cases: inputs
//! that merely look dangerous and must stay quiet.

mod adversarial;
mod integration;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::osv::{QueryOutcome, SeverityEntry, Vulnerability, VulnerabilityOracle};

/// Canned oracle keyed by `ecosystem:name@version`. Unknown keys resolve to
/// an empty (no vulnerabilities) outcome. Records every query it receives so
/// tests can assert on lookup counts.
pub(crate) struct StubOracle {
    responses: HashMap<String, QueryOutcome>,
    queries: Mutex<Vec<String>>,
}

impl StubOracle {
    pub(crate) fn empty() -> Self {
        Self {
            responses: HashMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with(mut self, key: &str, outcome: QueryOutcome) -> Self {
        self.responses.insert(key.to_string(), outcome);
        self
    }

    pub(crate) async fn query_count(&self) -> usize {
        self.queries.lock().await.len()
    }
}

#[async_trait]
impl VulnerabilityOracle for StubOracle {
    async fn query(&self, ecosystem: &str, name: &str, version: &str) -> QueryOutcome {
        let key = format!("{}:{}@{}", ecosystem, name, version);
        self.queries.lock().await.push(key.clone());
        self.responses.get(&key).cloned().unwrap_or_default()
    }
}

/// One vulnerability with a single CVSS_V3 score entry.
pub(crate) fn vuln(id: &str, score: &str) -> Vulnerability {
    Vulnerability {
        id: id.to_string(),
        summary: None,
        severity: Some(vec![SeverityEntry {
            kind: "CVSS_V3".to_string(),
            score: score.to_string(),
        }]),
    }
}

pub(crate) fn vulns_outcome(vulns: Vec<Vulnerability>) -> QueryOutcome {
    QueryOutcome { vulns, error: None }
}

pub(crate) fn error_outcome(message: &str) -> QueryOutcome {
    QueryOutcome {
        vulns: Vec::new(),
        error: Some(message.to_string()),
    }
}

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Signal;
use crate::error::AppError;
use crate::svcb::SvcbHttpsRecord;

/// DNS record types the crawler queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Svcb,
    Https,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Svcb => "SVCB",
            RecordType::Https => "HTTPS",
        }
    }

    /// IANA RR type code.
    pub fn code(&self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Aaaa => 28,
            RecordType::Svcb => 64,
            RecordType::Https => 65,
        }
    }

    pub fn is_svcb_compatible(&self) -> bool {
        matches!(self, RecordType::Svcb | RecordType::Https)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "SVCB" => Ok(RecordType::Svcb),
            "HTTPS" => Ok(RecordType::Https),
            _ => Err(format!("Unsupported record type: {}", s)),
        }
    }
}

/// Identifies one execution of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Measurement work for a single domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTask {
    pub domain: String,
    pub run_id: RunId,
    pub worker_id: String,
}

impl DomainTask {
    pub fn new(domain: impl Into<String>, run_id: RunId, worker_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            run_id,
            worker_id: worker_id.into(),
        }
    }
}

/// Error side of a [`QueryOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    pub kind: &'static str,
    pub message: String,
}

impl From<AppError> for OutcomeError {
    fn from(err: AppError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for OutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Result of one independent lookup. Failures are values, never raised
/// past the call site that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryOutcome<T> {
    #[serde(rename = "ok")]
    Ok(T),
    #[serde(rename = "error")]
    Err(OutcomeError),
}

impl<T> QueryOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, QueryOutcome::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, QueryOutcome::Err(_))
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            QueryOutcome::Ok(value) => Some(value),
            QueryOutcome::Err(_) => None,
        }
    }

    pub fn err(&self) -> Option<&OutcomeError> {
        match self {
            QueryOutcome::Ok(_) => None,
            QueryOutcome::Err(err) => Some(err),
        }
    }
}

impl<T> From<Result<T, AppError>> for QueryOutcome<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => QueryOutcome::Ok(value),
            Err(err) => QueryOutcome::Err(err.into()),
        }
    }
}

/// Everything measured for one domain in one run.
///
/// Signals that were not configured for the run are `None`; a configured
/// signal always carries an outcome, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub run_id: RunId,
    pub worker_id: String,
    pub domain: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_a: Option<QueryOutcome<Vec<IpAddr>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_aaaa: Option<QueryOutcome<Vec<IpAddr>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_svcb: Option<QueryOutcome<Vec<SvcbHttpsRecord>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_https: Option<QueryOutcome<Vec<SvcbHttpsRecord>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<QueryOutcome<serde_json::Value>>,
}

impl CrawlResult {
    /// Opens a result for `task`, stamping the start time now.
    pub fn started(task: &DomainTask) -> Self {
        let now = Utc::now();
        Self {
            run_id: task.run_id,
            worker_id: task.worker_id.clone(),
            domain: task.domain.clone(),
            started_at: now,
            ended_at: now,
            dns_a: None,
            dns_aaaa: None,
            dns_svcb: None,
            dns_https: None,
            probe: None,
        }
    }

    /// Stamps the end time. Called once, after every signal has resolved.
    pub fn seal(mut self) -> Self {
        self.ended_at = Utc::now().max(self.started_at);
        self
    }

    /// Errors recorded for this domain, by signal.
    pub fn failures(&self) -> Vec<(Signal, &OutcomeError)> {
        [
            (Signal::A, self.dns_a.as_ref().and_then(QueryOutcome::err)),
            (Signal::Aaaa, self.dns_aaaa.as_ref().and_then(QueryOutcome::err)),
            (Signal::Svcb, self.dns_svcb.as_ref().and_then(QueryOutcome::err)),
            (Signal::Https, self.dns_https.as_ref().and_then(QueryOutcome::err)),
            (Signal::Probe, self.probe.as_ref().and_then(QueryOutcome::err)),
        ]
        .into_iter()
        .filter_map(|(signal, err)| err.map(|e| (signal, e)))
        .collect()
    }

    /// Whether any SVCB/HTTPS record for this domain advertises an ECH config.
    pub fn advertises_ech(&self) -> bool {
        [&self.dns_svcb, &self.dns_https]
            .into_iter()
            .filter_map(|outcome| outcome.as_ref().and_then(QueryOutcome::ok))
            .flatten()
            .any(|record| record.params().is_some_and(|p| p.has_ech()))
    }
}

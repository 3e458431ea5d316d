use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::RecordType;

/// One independently collected measurement per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    A,
    Aaaa,
    Svcb,
    Https,
    Probe,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::A,
        Signal::Aaaa,
        Signal::Svcb,
        Signal::Https,
        Signal::Probe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::A => "a",
            Signal::Aaaa => "aaaa",
            Signal::Svcb => "svcb",
            Signal::Https => "https",
            Signal::Probe => "probe",
        }
    }

    /// The DNS record type behind a DNS signal; `None` for the probe.
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            Signal::A => Some(RecordType::A),
            Signal::Aaaa => Some(RecordType::Aaaa),
            Signal::Svcb => Some(RecordType::Svcb),
            Signal::Https => Some(RecordType::Https),
            Signal::Probe => None,
        }
    }

    /// Parses a comma-separated signal list such as `a,aaaa,https`.
    pub fn parse_list(s: &str) -> Result<Vec<Signal>, AppError> {
        let mut signals = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let signal: Signal = part.parse().map_err(AppError::ConfigError)?;
            if !signals.contains(&signal) {
                signals.push(signal);
            }
        }
        if signals.is_empty() {
            return Err(AppError::ConfigError("No signals selected".into()));
        }
        Ok(signals)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a" => Ok(Signal::A),
            "aaaa" => Ok(Signal::Aaaa),
            "svcb" => Ok(Signal::Svcb),
            "https" => Ok(Signal::Https),
            "probe" => Ok(Signal::Probe),
            _ => Err(format!("Unknown signal: {}", s)),
        }
    }
}

/// Deterministic prefix skip and length cap applied to the domain list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainSlice {
    /// Leading entries to skip.
    pub start_at: usize,
    /// Maximum number of entries to keep; `None` keeps everything.
    pub num_domains: Option<usize>,
}

impl DomainSlice {
    pub fn new(start_at: usize, num_domains: Option<usize>) -> Self {
        Self {
            start_at,
            num_domains,
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let kept = items.into_iter().skip(self.start_at);
        match self.num_domains {
            Some(cap) => kept.take(cap).collect(),
            None => kept.collect(),
        }
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Identifies the machine or node running the crawl.
    pub worker_id: String,
    /// Upper bound on concurrently processed domains.
    pub worker_count: usize,
    /// Flush threshold for the batch sink.
    pub batch_size: usize,
    pub slice: DomainSlice,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_id: "node-0".to_string(),
            worker_count: 16,
            batch_size: 100,
            slice: DomainSlice::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_slice(mut self, slice: DomainSlice) -> Self {
        self.slice = slice;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker_count == 0 {
            return Err(AppError::ConfigError(
                "Worker count must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::ConfigError("Batch size must be at least 1".into()));
        }
        if self.worker_id.trim().is_empty() {
            return Err(AppError::ConfigError("Worker id must not be empty".into()));
        }
        Ok(())
    }
}

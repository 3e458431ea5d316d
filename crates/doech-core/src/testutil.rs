//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{CrawlResult, DomainTask, RecordType, RunId};
use crate::svcb::{self, SvcbHttpsRecord};
use crate::traits::{Probe, Resolver, ResultSink};
use crate::worker::{CrawlEvent, CrawlReporter};

// ---------------------------------------------------------------------------
// MockResolver
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Canned {
    Addresses(Vec<IpAddr>),
    Svcb(Vec<SvcbHttpsRecord>),
    Failure(AppError),
    Panic,
}

/// Mock resolver answering from a per-(domain, type) table.
///
/// Lookups with no entry answer with an empty record set. Failures are
/// handed out once; later lookups for the same key see an empty answer.
#[derive(Clone, Default)]
pub struct MockResolver {
    answers: Arc<Mutex<HashMap<(String, RecordType), Canned>>>,
    pub calls: Arc<Mutex<Vec<(String, RecordType)>>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addresses(self, domain: &str, rr_type: RecordType, addrs: Vec<IpAddr>) -> Self {
        self.set(domain, rr_type, Canned::Addresses(addrs))
    }

    pub fn with_svcb(
        self,
        domain: &str,
        rr_type: RecordType,
        records: Vec<SvcbHttpsRecord>,
    ) -> Self {
        self.set(domain, rr_type, Canned::Svcb(records))
    }

    pub fn with_failure(self, domain: &str, rr_type: RecordType, error: AppError) -> Self {
        self.set(domain, rr_type, Canned::Failure(error))
    }

    /// Lookups for this key panic, taking the calling task down.
    pub fn with_panic(self, domain: &str, rr_type: RecordType) -> Self {
        self.set(domain, rr_type, Canned::Panic)
    }

    fn set(self, domain: &str, rr_type: RecordType, canned: Canned) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert((domain.to_string(), rr_type), canned);
        self
    }

    fn answer(&self, domain: &str, rr_type: RecordType) -> Option<Canned> {
        self.calls
            .lock()
            .unwrap()
            .push((domain.to_string(), rr_type));

        let mut answers = self.answers.lock().unwrap();
        let key = (domain.to_string(), rr_type);
        if matches!(answers.get(&key), Some(Canned::Failure(_))) {
            return answers.remove(&key);
        }
        match answers.get(&key) {
            Some(Canned::Addresses(addrs)) => Some(Canned::Addresses(addrs.clone())),
            Some(Canned::Svcb(records)) => Some(Canned::Svcb(records.clone())),
            Some(Canned::Panic) => Some(Canned::Panic),
            Some(Canned::Failure(_)) | None => None,
        }
    }
}

impl Resolver for MockResolver {
    async fn lookup_addresses(
        &self,
        domain: &str,
        rr_type: RecordType,
    ) -> Result<Vec<IpAddr>, AppError> {
        match self.answer(domain, rr_type) {
            Some(Canned::Addresses(addrs)) => Ok(addrs),
            Some(Canned::Failure(e)) => Err(e),
            Some(Canned::Panic) => panic!("resolver blew up on {domain} {rr_type}"),
            Some(Canned::Svcb(_)) | None => Ok(vec![]),
        }
    }

    async fn lookup_svcb(
        &self,
        domain: &str,
        rr_type: RecordType,
    ) -> Result<Vec<SvcbHttpsRecord>, AppError> {
        match self.answer(domain, rr_type) {
            Some(Canned::Svcb(records)) => Ok(records),
            Some(Canned::Failure(e)) => Err(e),
            Some(Canned::Panic) => panic!("resolver blew up on {domain} {rr_type}"),
            Some(Canned::Addresses(_)) | None => Ok(vec![]),
        }
    }
}

// ---------------------------------------------------------------------------
// MockProbe
// ---------------------------------------------------------------------------

/// Mock probe returning a fixed export and recording visited URLs.
#[derive(Clone)]
pub struct MockProbe {
    response: Arc<Mutex<Option<Result<serde_json::Value, AppError>>>>,
    payload: serde_json::Value,
    pub urls: Arc<Mutex<Vec<String>>>,
}

impl MockProbe {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            response: Arc::new(Mutex::new(None)),
            payload,
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails the first probe with `error`, then returns `null`.
    pub fn with_error(error: AppError) -> Self {
        Self {
            response: Arc::new(Mutex::new(Some(Err(error)))),
            payload: serde_json::Value::Null,
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Probe for MockProbe {
    async fn probe(&self, url: &str) -> Result<serde_json::Value, AppError> {
        self.urls.lock().unwrap().push(url.to_string());
        match self.response.lock().unwrap().take() {
            Some(response) => response,
            None => Ok(self.payload.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock sink storing every inserted batch.
#[derive(Clone, Default)]
pub struct MockSink {
    pub batches: Arc<Mutex<Vec<Vec<CrawlResult>>>>,
    failures: Arc<Mutex<Vec<AppError>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error for the next insert. Queued errors are consumed in order.
    pub fn fail_next(&self, error: AppError) {
        self.failures.lock().unwrap().push(error);
    }

    /// Domains of each stored batch, in insertion order.
    pub fn domains(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.iter().map(|r| r.domain.clone()).collect())
            .collect()
    }

    /// Number of insert attempts, failed ones included.
    pub fn insert_calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl ResultSink for MockSink {
    async fn insert_batch(&self, batch: &[CrawlResult]) -> Result<(), AppError> {
        *self.calls.lock().unwrap() += 1;

        let mut failures = self.failures.lock().unwrap();
        if !failures.is_empty() {
            return Err(failures.remove(0));
        }
        drop(failures);

        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Records event variant names in arrival order.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
    /// `(domains, workers)` of the last `RunStarted` event.
    pub run_started: Arc<Mutex<Option<(usize, usize)>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match event {
            CrawlEvent::RunStarted {
                domains, workers, ..
            } => {
                *self.run_started.lock().unwrap() = Some((domains, workers));
                "RunStarted"
            }
            CrawlEvent::TaskStarted { .. } => "TaskStarted",
            CrawlEvent::SignalFailed { .. } => "SignalFailed",
            CrawlEvent::TaskCompleted { .. } => "TaskCompleted",
            CrawlEvent::BatchFlushed { .. } => "BatchFlushed",
            CrawlEvent::FlushFailed { .. } => "FlushFailed",
            CrawlEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A ServiceMode HTTPS record for `owner`: priority 1, target `.`,
/// `alpn=h2` and a 4-byte `ech` value.
pub fn make_https_record(owner: &str) -> SvcbHttpsRecord {
    let rdata = [
        0x00, 0x01, // priority
        0x00, // target "."
        0x00, 0x01, 0x00, 0x03, 0x02, b'h', b'2', // alpn=h2
        0x00, 0x05, 0x00, 0x04, 0xde, 0xad, 0xbe, 0xef, // ech
    ];
    svcb::decode(owner, RecordType::Https, &rdata).unwrap()
}

/// A sealed result for `domain` with no signals recorded.
pub fn make_test_result(domain: &str) -> CrawlResult {
    CrawlResult::started(&DomainTask::new(domain, RunId::new(), "node-0")).seal()
}

pub mod batch;
pub mod config;
pub mod domains;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod svcb;
pub mod traits;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{BatchSink, FlushReport};
pub use config::{DomainSlice, PipelineConfig, Signal};
pub use error::AppError;
pub use models::{CrawlResult, DomainTask, OutcomeError, QueryOutcome, RecordType, RunId};
pub use orchestrator::{Orchestrator, RunSummary, SinkFailure};
pub use svcb::{DecodeError, SvcParamKey, SvcParamValue, SvcParams, SvcbHttpsRecord, SvcbMode};
pub use traits::{NoProbe, NullSink, Probe, Resolver, ResultSink};
pub use worker::{CrawlEvent, CrawlReporter, CrawlWorker, TracingCrawlReporter};

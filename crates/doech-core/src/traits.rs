use std::future::Future;
use std::net::IpAddr;

use crate::error::AppError;
use crate::models::{CrawlResult, RecordType};
use crate::svcb::SvcbHttpsRecord;

/// Resolves DNS records for a domain.
pub trait Resolver: Send + Sync + Clone {
    /// Address literals from the A or AAAA answers for `domain`.
    ///
    /// An empty list means the name has no such records, which is not an error.
    fn lookup_addresses(
        &self,
        domain: &str,
        rr_type: RecordType,
    ) -> impl Future<Output = Result<Vec<IpAddr>, AppError>> + Send;

    /// Decoded SVCB or HTTPS records for `domain`.
    fn lookup_svcb(
        &self,
        domain: &str,
        rr_type: RecordType,
    ) -> impl Future<Output = Result<Vec<SvcbHttpsRecord>, AppError>> + Send;
}

/// Collects what a browser observed while loading a URL.
///
/// The payload is opaque to the pipeline.
pub trait Probe: Send + Sync + Clone {
    fn probe(&self, url: &str) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Persists batches of crawl results.
///
/// An insert either stores the whole batch or fails as a whole.
pub trait ResultSink: Send + Sync + Clone {
    fn insert_batch(
        &self,
        batch: &[CrawlResult],
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Placeholder probe for runs that do not collect browser exports.
#[derive(Debug, Clone)]
pub struct NoProbe;

impl Probe for NoProbe {
    async fn probe(&self, _url: &str) -> Result<serde_json::Value, AppError> {
        Err(AppError::ConfigError("No browser probe configured".into()))
    }
}

/// A sink that accepts and discards every batch.
#[derive(Debug, Clone)]
pub struct NullSink;

impl ResultSink for NullSink {
    async fn insert_batch(&self, _batch: &[CrawlResult]) -> Result<(), AppError> {
        Ok(())
    }
}

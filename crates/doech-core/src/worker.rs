use std::net::IpAddr;

use crate::config::Signal;
use crate::domains::probe_url;
use crate::error::AppError;
use crate::models::{CrawlResult, DomainTask, OutcomeError, QueryOutcome, RecordType, RunId};
use crate::svcb::SvcbHttpsRecord;
use crate::traits::{Probe, Resolver};

/// Events emitted during a crawl for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    RunStarted {
        run_id: RunId,
        domains: usize,
        workers: usize,
    },
    TaskStarted {
        domain: &'a str,
    },
    SignalFailed {
        domain: &'a str,
        signal: Signal,
        error: &'a OutcomeError,
    },
    TaskCompleted {
        domain: &'a str,
        failed_signals: usize,
        elapsed_ms: i64,
    },
    BatchFlushed {
        generation: u64,
        records: usize,
    },
    FlushFailed {
        records: usize,
        error: &'a str,
    },
    RunFinished {
        run_id: RunId,
        processed: usize,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::RunStarted {
                run_id,
                domains,
                workers,
            } => {
                tracing::info!(%run_id, %domains, %workers, "Run started");
            }
            CrawlEvent::TaskStarted { domain } => {
                tracing::debug!(%domain, "Processing domain");
            }
            CrawlEvent::SignalFailed {
                domain,
                signal,
                error,
            } => {
                tracing::debug!(%domain, %signal, %error, "Signal failed");
            }
            CrawlEvent::TaskCompleted {
                domain,
                failed_signals,
                elapsed_ms,
            } => {
                tracing::info!(%domain, %failed_signals, %elapsed_ms, "Domain completed");
            }
            CrawlEvent::BatchFlushed {
                generation,
                records,
            } => {
                tracing::info!(%generation, %records, "Batch flushed");
            }
            CrawlEvent::FlushFailed { records, error } => {
                tracing::error!(%records, %error, "Batch flush failed");
            }
            CrawlEvent::RunFinished { run_id, processed } => {
                tracing::info!(%run_id, %processed, "Run finished");
            }
        }
    }
}

/// Executes the full measurement for one domain.
///
/// Every configured signal is attempted; a failing signal is recorded in the
/// result and never prevents the others from running.
pub struct CrawlWorker<R, P>
where
    R: Resolver,
    P: Probe,
{
    resolver: R,
    probe: Option<P>,
    signals: Vec<Signal>,
}

impl<R, P> CrawlWorker<R, P>
where
    R: Resolver,
    P: Probe,
{
    /// Fails with a configuration error if the probe signal is selected
    /// without a probe.
    pub fn new(resolver: R, probe: Option<P>, signals: Vec<Signal>) -> Result<Self, AppError> {
        if signals.contains(&Signal::Probe) && probe.is_none() {
            return Err(AppError::ConfigError(
                "The probe signal requires a browser probe".into(),
            ));
        }
        Ok(Self {
            resolver,
            probe,
            signals,
        })
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub async fn execute<CR: CrawlReporter + ?Sized>(
        &self,
        task: DomainTask,
        reporter: &CR,
    ) -> CrawlResult {
        reporter.report(CrawlEvent::TaskStarted {
            domain: &task.domain,
        });

        let mut result = CrawlResult::started(&task);
        let domain = task.domain.as_str();

        let (dns_a, dns_aaaa, dns_svcb, dns_https, probe) = tokio::join!(
            self.addresses(domain, Signal::A),
            self.addresses(domain, Signal::Aaaa),
            self.svcb(domain, Signal::Svcb),
            self.svcb(domain, Signal::Https),
            self.run_probe(domain),
        );
        result.dns_a = dns_a;
        result.dns_aaaa = dns_aaaa;
        result.dns_svcb = dns_svcb;
        result.dns_https = dns_https;
        result.probe = probe;

        let result = result.seal();

        let failures = result.failures();
        for &(signal, error) in &failures {
            reporter.report(CrawlEvent::SignalFailed {
                domain,
                signal,
                error,
            });
        }
        reporter.report(CrawlEvent::TaskCompleted {
            domain,
            failed_signals: failures.len(),
            elapsed_ms: (result.ended_at - result.started_at).num_milliseconds(),
        });

        result
    }

    fn enabled(&self, signal: Signal) -> Option<RecordType> {
        if self.signals.contains(&signal) {
            signal.record_type()
        } else {
            None
        }
    }

    async fn addresses(&self, domain: &str, signal: Signal) -> Option<QueryOutcome<Vec<IpAddr>>> {
        let rr_type = self.enabled(signal)?;
        Some(self.resolver.lookup_addresses(domain, rr_type).await.into())
    }

    async fn svcb(
        &self,
        domain: &str,
        signal: Signal,
    ) -> Option<QueryOutcome<Vec<SvcbHttpsRecord>>> {
        let rr_type = self.enabled(signal)?;
        Some(self.resolver.lookup_svcb(domain, rr_type).await.into())
    }

    async fn run_probe(&self, domain: &str) -> Option<QueryOutcome<serde_json::Value>> {
        if !self.signals.contains(&Signal::Probe) {
            return None;
        }
        let probe = self.probe.as_ref()?;
        Some(probe.probe(&probe_url(domain)).await.into())
    }
}

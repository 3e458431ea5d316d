use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchSink, FlushReport};
use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::models::{CrawlResult, DomainTask, RunId};
use crate::traits::{Probe, Resolver, ResultSink};
use crate::worker::{CrawlEvent, CrawlReporter, CrawlWorker};

/// A batch the sink rejected. The batch is dropped after being recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkFailure {
    pub records: usize,
    pub domains: Vec<String>,
    pub error: String,
}

/// What a run did, returned once every worker has finished.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Domains whose result reached the batch sink.
    pub processed: usize,
    pub batches_flushed: usize,
    pub records_flushed: usize,
    pub sink_failures: Vec<SinkFailure>,
    /// Worker tasks that panicked. Each one loses the domain it was holding.
    pub worker_panics: usize,
    /// Domains still queued when the pool stopped.
    pub unprocessed: usize,
    /// True if the run was interrupted before the domain list was exhausted.
    pub cancelled: bool,
}

impl RunSummary {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            processed: 0,
            batches_flushed: 0,
            records_flushed: 0,
            sink_failures: Vec::new(),
            worker_panics: 0,
            unprocessed: 0,
            cancelled: false,
        }
    }

    /// Every domain was processed and every batch was stored.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.sink_failures.is_empty()
            && self.worker_panics == 0
            && self.unprocessed == 0
    }
}

/// Runs a [`CrawlWorker`] over a domain list with a fixed-size pool of tasks.
///
/// Workers pull from a shared queue and send finished results over a channel
/// to the orchestrator, which is the only owner of the [`BatchSink`].
pub struct Orchestrator<R, P, S>
where
    R: Resolver + 'static,
    P: Probe + 'static,
    S: ResultSink,
{
    worker: Arc<CrawlWorker<R, P>>,
    sink: S,
    config: PipelineConfig,
}

impl<R, P, S> Orchestrator<R, P, S>
where
    R: Resolver + 'static,
    P: Probe + 'static,
    S: ResultSink,
{
    pub fn new(worker: CrawlWorker<R, P>, sink: S, config: PipelineConfig) -> Self {
        Self {
            worker: Arc::new(worker),
            sink,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes the configured slice of `domains`.
    ///
    /// Only configuration errors are returned; per-domain failures live in
    /// the results and sink failures in the summary.
    pub async fn run<CR>(
        &self,
        domains: Vec<String>,
        run_id: RunId,
        reporter: Arc<CR>,
        cancel_token: CancellationToken,
    ) -> Result<RunSummary, AppError>
    where
        CR: CrawlReporter + 'static,
    {
        self.config.validate()?;
        let mut batch = BatchSink::new(self.sink.clone(), self.config.batch_size)?;

        let tasks: VecDeque<DomainTask> = self
            .config
            .slice
            .apply(domains)
            .into_iter()
            .map(|domain| DomainTask::new(domain, run_id, self.config.worker_id.clone()))
            .collect();
        let workers = self.config.worker_count.min(tasks.len());

        reporter.report(CrawlEvent::RunStarted {
            run_id,
            domains: tasks.len(),
            workers,
        });

        let queue = Arc::new(Mutex::new(tasks));
        let (tx, mut rx) = mpsc::channel::<CrawlResult>(self.config.worker_count.max(1) * 2);

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let worker = Arc::clone(&self.worker);
            let queue = Arc::clone(&queue);
            let reporter = Arc::clone(&reporter);
            let cancel_token = cancel_token.clone();
            let tx = tx.clone();
            pool.spawn(async move {
                loop {
                    if cancel_token.is_cancelled() {
                        break;
                    }
                    let Some(task) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let result = worker.execute(task, reporter.as_ref()).await;
                    if tx.send(result).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut summary = RunSummary::new(run_id);
        while let Some(result) = rx.recv().await {
            summary.processed += 1;
            let outcome = batch.accept(result).await;
            record_flush(outcome, &mut batch, &mut summary, reporter.as_ref());
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                summary.worker_panics += 1;
                tracing::error!(error = %e, "Crawl worker task failed, its domain is lost");
            }
        }

        let outcome = batch.flush().await;
        record_flush(outcome, &mut batch, &mut summary, reporter.as_ref());

        summary.unprocessed = queue.lock().await.len();
        summary.cancelled = cancel_token.is_cancelled() && summary.unprocessed > 0;
        if summary.cancelled {
            tracing::warn!(%run_id, processed = summary.processed, "Run interrupted");
        } else if summary.unprocessed > 0 {
            tracing::error!(
                %run_id,
                unprocessed = summary.unprocessed,
                "Worker pool stopped with domains left"
            );
        }

        reporter.report(CrawlEvent::RunFinished {
            run_id,
            processed: summary.processed,
        });

        Ok(summary)
    }
}

fn record_flush<S, CR>(
    outcome: Result<Option<FlushReport>, AppError>,
    batch: &mut BatchSink<S>,
    summary: &mut RunSummary,
    reporter: &CR,
) where
    S: ResultSink,
    CR: CrawlReporter + ?Sized,
{
    match outcome {
        Ok(Some(report)) => {
            summary.batches_flushed += 1;
            summary.records_flushed += report.records;
            reporter.report(CrawlEvent::BatchFlushed {
                generation: report.generation,
                records: report.records,
            });
        }
        Ok(None) => {}
        Err(e) => {
            let error = e.to_string();
            let dropped = batch.discard();
            reporter.report(CrawlEvent::FlushFailed {
                records: dropped.len(),
                error: &error,
            });
            summary.sink_failures.push(SinkFailure {
                records: dropped.len(),
                domains: dropped.into_iter().map(|r| r.domain).collect(),
                error,
            });
        }
    }
}

use crate::error::AppError;
use crate::models::CrawlResult;
use crate::traits::ResultSink;

/// Outcome of a successful flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Buffer generation that was written. A generation ends with a
    /// successful flush or a discard; failed flush attempts leave it open.
    pub generation: u64,
    pub records: usize,
}

/// Buffers crawl results and writes them to a [`ResultSink`] in batches.
///
/// Access is through `&mut self`, so a single owner serializes `accept`
/// and `flush` and at most one flush of a buffer generation is in flight.
pub struct BatchSink<S: ResultSink> {
    sink: S,
    batch_size: usize,
    buffer: Vec<CrawlResult>,
    generation: u64,
}

impl<S: ResultSink> BatchSink<S> {
    pub fn new(sink: S, batch_size: usize) -> Result<Self, AppError> {
        if batch_size == 0 {
            return Err(AppError::ConfigError("Batch size must be at least 1".into()));
        }
        Ok(Self {
            sink,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            generation: 0,
        })
    }

    /// Buffers `result`, flushing once the buffer reaches the batch size.
    ///
    /// On flush failure the buffer keeps its records; the caller decides
    /// whether to retry with [`flush`](Self::flush) or drop them with
    /// [`discard`](Self::discard).
    pub async fn accept(&mut self, result: CrawlResult) -> Result<Option<FlushReport>, AppError> {
        self.buffer.push(result);
        if self.buffer.len() >= self.batch_size {
            return self.flush().await;
        }
        Ok(None)
    }

    /// Writes all buffered results. A no-op on an empty buffer.
    pub async fn flush(&mut self) -> Result<Option<FlushReport>, AppError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        self.sink
            .insert_batch(&self.buffer)
            .await
            .map_err(AppError::into_sink_error)?;

        let report = FlushReport {
            generation: self.generation,
            records: self.buffer.len(),
        };
        self.buffer.clear();
        self.generation += 1;
        Ok(Some(report))
    }

    /// Drops the buffered results and hands them back to the caller.
    pub fn discard(&mut self) -> Vec<CrawlResult> {
        self.generation += 1;
        std::mem::take(&mut self.buffer)
    }

    pub fn pending(&self) -> &[CrawlResult] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

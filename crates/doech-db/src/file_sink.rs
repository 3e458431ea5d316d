use std::path::{Path, PathBuf};
use std::sync::Arc;

use doech_core::error::AppError;
use doech_core::models::CrawlResult;
use doech_core::traits::ResultSink;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends crawl results to a file, one JSON object per line.
///
/// Each batch is written with a single write and flushed before the insert
/// returns. A write that fails partway is cut back to the last complete
/// batch, so a retried batch never follows half a line.
#[derive(Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                AppError::ConfigError(format!("Cannot open output {}: {e}", path.display()))
            })?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonLinesSink {
    async fn insert_batch(&self, batch: &[CrawlResult]) -> Result<(), AppError> {
        let mut buf = Vec::new();
        for result in batch {
            serde_json::to_writer(&mut buf, result)?;
            buf.push(b'\n');
        }

        let mut file = self.file.lock().await;
        let committed = file.metadata().await?.len();
        let written = match file.write_all(&buf).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(truncate_err) = truncate_to(&mut file, committed).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "Failed to cut back a partial batch"
                );
            }
            return Err(AppError::SinkError(format!(
                "Write to {} failed: {e}",
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// Drops anything past `len` bytes; later appends continue from there.
async fn truncate_to(file: &mut File, len: u64) -> std::io::Result<()> {
    file.flush().await.ok();
    file.set_len(len).await
}

use chrono::{DateTime, Utc};
use doech_core::error::AppError;
use doech_core::models::{CrawlResult, RunId};
use doech_core::traits::ResultSink;
use serde::Serialize;
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Columns bound per inserted row.
const COLUMNS_PER_ROW: usize = 10;

/// Postgres caps a statement at 65535 bind parameters.
const MAX_ROWS_PER_STATEMENT: usize = 65535 / COLUMNS_PER_ROW;

/// Repository for crawl results in PostgreSQL.
#[derive(Clone)]
pub struct CrawlResultRepository {
    pool: Pool<Postgres>,
}

impl CrawlResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts `batch` in one transaction: either every row lands or none does.
    pub async fn insert_batch(&self, batch: &[CrawlResult]) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }

        let rows = batch
            .iter()
            .map(CrawlResultRow::from_result)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::SinkError(e.to_string()))?;

        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut query = QueryBuilder::<Postgres>::new(
                "INSERT INTO crawl_results (worker_id, run_id, domain, started_at, ended_at, \
                 dns_a, dns_aaaa, dns_svcb, dns_https, probe) ",
            );
            query.push_values(chunk, |mut b, row| {
                b.push_bind(row.worker_id.clone())
                    .push_bind(row.run_id)
                    .push_bind(row.domain.clone())
                    .push_bind(row.started_at)
                    .push_bind(row.ended_at)
                    .push_bind(row.dns_a.clone())
                    .push_bind(row.dns_aaaa.clone())
                    .push_bind(row.dns_svcb.clone())
                    .push_bind(row.dns_https.clone())
                    .push_bind(row.probe.clone());
            });

            query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::SinkError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::SinkError(e.to_string()))?;

        tracing::debug!(records = batch.len(), "Inserted crawl results");
        Ok(())
    }

    pub async fn count_for_run(&self, run_id: RunId) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_results WHERE run_id = $1")
            .bind(run_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::SinkError(e.to_string()))?;
        Ok(row.0)
    }

    /// Stored results of one run, ordered by domain.
    pub async fn list_for_run(&self, run_id: RunId) -> Result<Vec<StoredCrawlResult>, AppError> {
        sqlx::query_as::<_, StoredCrawlResult>(
            r#"
            SELECT id, worker_id, run_id, domain, started_at, ended_at,
                   dns_a, dns_aaaa, dns_svcb, dns_https, probe, created_at
            FROM crawl_results
            WHERE run_id = $1
            ORDER BY domain
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::SinkError(e.to_string()))
    }

    /// Most recent stored result for a domain across all runs.
    pub async fn get_latest(&self, domain: &str) -> Result<Option<StoredCrawlResult>, AppError> {
        sqlx::query_as::<_, StoredCrawlResult>(
            r#"
            SELECT id, worker_id, run_id, domain, started_at, ended_at,
                   dns_a, dns_aaaa, dns_svcb, dns_https, probe, created_at
            FROM crawl_results
            WHERE domain = $1
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::SinkError(e.to_string()))
    }
}

impl ResultSink for CrawlResultRepository {
    async fn insert_batch(&self, batch: &[CrawlResult]) -> Result<(), AppError> {
        CrawlResultRepository::insert_batch(self, batch).await
    }
}

/// A crawl result as read back from the database; signal columns keep their
/// serialized outcome form.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredCrawlResult {
    pub id: Uuid,
    pub worker_id: String,
    pub run_id: Uuid,
    pub domain: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub dns_a: Option<serde_json::Value>,
    pub dns_aaaa: Option<serde_json::Value>,
    pub dns_svcb: Option<serde_json::Value>,
    pub dns_https: Option<serde_json::Value>,
    pub probe: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// -- Internal row type for binding --

struct CrawlResultRow {
    worker_id: String,
    run_id: Uuid,
    domain: String,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    dns_a: Option<serde_json::Value>,
    dns_aaaa: Option<serde_json::Value>,
    dns_svcb: Option<serde_json::Value>,
    dns_https: Option<serde_json::Value>,
    probe: Option<serde_json::Value>,
}

impl CrawlResultRow {
    fn from_result(result: &CrawlResult) -> Result<Self, AppError> {
        Ok(Self {
            worker_id: result.worker_id.clone(),
            run_id: result.run_id.as_uuid(),
            domain: result.domain.clone(),
            started_at: result.started_at,
            ended_at: result.ended_at,
            dns_a: to_json(&result.dns_a)?,
            dns_aaaa: to_json(&result.dns_aaaa)?,
            dns_svcb: to_json(&result.dns_svcb)?,
            dns_https: to_json(&result.dns_https)?,
            probe: to_json(&result.probe)?,
        })
    }
}

fn to_json<T: Serialize>(outcome: &Option<T>) -> Result<Option<serde_json::Value>, AppError> {
    Ok(outcome.as_ref().map(serde_json::to_value).transpose()?)
}

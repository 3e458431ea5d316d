pub mod config;
pub mod database;
pub mod file_sink;
pub mod repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use file_sink::JsonLinesSink;
pub use repository::{CrawlResultRepository, StoredCrawlResult};

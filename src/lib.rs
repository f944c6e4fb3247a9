//! farecrawl - flight fare crawler
//!
//! Generates crawl tasks from fixed monthly windows and holiday calendars,
//! queries provider search APIs for outbound and return fares and runs the
//! tasks through a bounded-concurrency scheduler with retry.
//!
//! # Architecture
//!
//! - [`config`] - Configuration file and environment overrides
//! - [`generator`] - Fixed-month and holiday task generation
//! - [`crawler`] - Provider API client and per-task orchestration
//! - [`parser`] - Provider response parsing
//! - [`scheduler`] - FIFO task queue with concurrency bound and retries
//! - [`storage`] - Result persistence (local JSON, remote with fallback)
//! - [`models`] - Core data structures and types
//! - [`utils`] - Retry policy, domain errors and helpers
//!
//! # Example
//!
//! ```no_run
//! use farecrawl::config::Config;
//! use farecrawl::crawler::CrawlJob;
//! use farecrawl::generator::{generate_all, StaticHolidayCalendar};
//! use farecrawl::scheduler::TaskScheduler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let calendar = StaticHolidayCalendar::from_entries(&config.generator.holidays);
//!     let today = chrono::Local::now().date_naive();
//!
//!     let tasks = generate_all(&config, &calendar, today).await?;
//!     let scheduler = TaskScheduler::new(&config, CrawlJob::from_config(&config)?)?;
//!     let summary = scheduler.run_batch(tasks).await;
//!     println!("{} of {} tasks completed", summary.completed, summary.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod generator;
pub mod models;
pub mod parser;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{CrawlJob, CrawlOrchestrator, FlightApi, RestApiClient};
    pub use crate::error::{CrawlErrorTrait, Error, ErrorKind, Result};
    pub use crate::generator::{generate_all, HolidayCalendar};
    pub use crate::models::{CrawlTask, FlightInfo, ProviderSystem, Route, TaskParameters, TaskStatus};
    pub use crate::scheduler::{SchedulerBuilder, TaskExecutor, TaskScheduler};
    pub use crate::storage::{LocalJsonStorage, ResultSink};
}

// Direct re-exports for convenience
pub use models::{CrawlTask, FlightInfo, TaskParameters, TaskStatus};

//! Flight fare crawling
//!
//! - [`client`] - provider search API client with rate limiting
//! - [`orchestrator`] - outbound/inbound pipeline for one task
//! - [`CrawlJob`] - the scheduler's executor: crawl, then store

pub mod client;
pub mod orchestrator;

pub use client::{ApiResponse, FlightApi, FlightQuery, RestApiClient};
pub use orchestrator::{CrawlOrchestrator, InboundPacing};

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::models::{CrawlTask, FlightInfo};
use crate::parser::{FlightParser, ProviderJsonParser};
use crate::scheduler::TaskExecutor;
use crate::storage::{sink_from_config, ResultSink, StoredLocation};

/// Executes a crawl task and persists its results
///
/// Storage failures are logged and never fail the task; the flights are
/// still returned to the scheduler.
pub struct CrawlJob<A, P, S> {
    orchestrator: CrawlOrchestrator<A, P>,
    sink: S,
}

impl<A, P, S> CrawlJob<A, P, S>
where
    A: FlightApi,
    P: FlightParser,
    S: ResultSink,
{
    pub fn new(orchestrator: CrawlOrchestrator<A, P>, sink: S) -> Self {
        Self { orchestrator, sink }
    }

    pub fn orchestrator(&self) -> &CrawlOrchestrator<A, P> {
        &self.orchestrator
    }
}

impl CrawlJob<RestApiClient, ProviderJsonParser, Box<dyn ResultSink>> {
    /// Wire the REST client, JSON parser and configured sink together
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = RestApiClient::new(&config.api, &config.retry)?;
        let orchestrator = CrawlOrchestrator::new(api, ProviderJsonParser::new())
            .with_pacing(InboundPacing::from_config(&config.api));
        let sink = sink_from_config(&config.storage, config.request_timeout())?;

        Ok(Self::new(orchestrator, sink))
    }
}

#[async_trait]
impl<A, P, S> TaskExecutor for CrawlJob<A, P, S>
where
    A: FlightApi + 'static,
    P: FlightParser + 'static,
    S: ResultSink + 'static,
{
    #[instrument(skip(self, task), fields(task_id = %task.id, route = %task.parameters.route))]
    async fn execute(&self, task: &CrawlTask) -> Result<Vec<FlightInfo>> {
        let flights = self.orchestrator.execute(&task.parameters).await?;

        match self.sink.store(&task.id, &task.parameters, &flights).await {
            Ok(StoredLocation::Local(path)) => {
                debug!(path = %path.display(), "Results persisted");
            }
            Ok(StoredLocation::Remote(url)) => {
                debug!(url = %url, "Results persisted");
            }
            Err(e) => {
                error!(error = %e, flights = flights.len(), "Failed to persist results");
            }
        }

        Ok(flights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{ProviderSystem, Route, TaskParameters};
    use crate::storage::LocalJsonStorage;
    use crate::utils::error::FetchError;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    struct OneWayApi;

    #[async_trait]
    impl FlightApi for OneWayApi {
        async fn send_request(&self, _query: &FlightQuery) -> std::result::Result<ApiResponse, FetchError> {
            Ok(ApiResponse::new(json!([{
                "departureDate": "2025-07-21",
                "sectors": [{"airlineCode": "TR", "flightNo": "875", "cabinDesc": "Economy", "bookingClass": "V"}],
                "seats": [{"routeSearchToken": "r1", "outboundToken": "o1", "adultPrice": 4200, "adultTax": 900}]
            }])))
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ResultSink for FailingSink {
        async fn store(
            &self,
            _task_id: &str,
            _params: &TaskParameters,
            _flights: &[FlightInfo],
        ) -> Result<StoredLocation> {
            Err(Error::other("disk full"))
        }
    }

    fn task() -> CrawlTask {
        CrawlTask::new(
            TaskParameters::one_way(
                Route::new("TPE", "SIN"),
                NaiveDate::from_ymd_opt(2025, 7, 21).unwrap(),
            )
            .with_systems(vec![ProviderSystem::Eztravel]),
        )
    }

    #[tokio::test]
    async fn test_job_stores_results() {
        let dir = TempDir::new().unwrap();
        let job = CrawlJob::new(
            CrawlOrchestrator::new(OneWayApi, ProviderJsonParser::new()),
            LocalJsonStorage::new(dir.path()),
        );

        let task = task();
        let flights = job.execute(&task).await.unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].outbound_segments[0].flight_number, "TR875");

        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_fail_task() {
        let job = CrawlJob::new(
            CrawlOrchestrator::new(OneWayApi, ProviderJsonParser::new()),
            FailingSink,
        );

        let flights = job.execute(&task()).await.unwrap();
        assert_eq!(flights.len(), 1);
    }
}

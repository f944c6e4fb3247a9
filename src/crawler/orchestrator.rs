//! Per-task crawl pipeline
//!
//! For each provider system of a task, in order:
//!
//! ```text
//! outbound query ──▶ parse candidates ──▶ flight-number filter
//!                                              │
//!                    one-way ◀────────────────┤
//!                                              ▼
//!                    inbound query per candidate (tokens) ──▶ combine
//! ```
//!
//! Any transport, API or parse error aborts the task; partial results are
//! discarded and the scheduler decides whether to retry.

use futures::stream::{self, StreamExt, TryStreamExt};
use governor::{Quota, RateLimiter};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::{FlightApi, FlightQuery};
use crate::config::ApiConfig;
use crate::error::Result;
use crate::models::{FlightInfo, ProviderSystem, TaskParameters};
use crate::parser::FlightParser;

/// Pacing of inbound queries within one system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundPacing {
    /// Inbound queries in flight at once
    pub concurrency: usize,
    /// Minimum gap between the starts of consecutive inbound queries,
    /// shared by all in-flight queries; zero disables pacing
    pub delay: Duration,
}

impl Default for InboundPacing {
    fn default() -> Self {
        Self {
            concurrency: 1,
            delay: Duration::from_millis(2000),
        }
    }
}

impl InboundPacing {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            concurrency: config.inbound_concurrency.max(1),
            delay: Duration::from_millis(config.inbound_delay_ms),
        }
    }

    /// No delay, sequential
    pub fn immediate() -> Self {
        Self {
            concurrency: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Runs one task against the provider systems
pub struct CrawlOrchestrator<A, P> {
    api: A,
    parser: P,
    pacing: InboundPacing,
}

impl<A, P> CrawlOrchestrator<A, P>
where
    A: FlightApi,
    P: FlightParser,
{
    pub fn new(api: A, parser: P) -> Self {
        Self {
            api,
            parser,
            pacing: InboundPacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: InboundPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Crawl every system of `params` and concatenate the results in
    /// system order
    pub async fn execute(&self, params: &TaskParameters) -> Result<Vec<FlightInfo>> {
        let mut results = Vec::new();

        for &system in &params.systems {
            let flights = self.crawl_system(params, system).await?;
            info!(
                task = %params.name,
                system = %system,
                flights = flights.len(),
                "System crawled"
            );
            results.extend(flights);
        }

        Ok(results)
    }

    async fn crawl_system(
        &self,
        params: &TaskParameters,
        system: ProviderSystem,
    ) -> Result<Vec<FlightInfo>> {
        let query = FlightQuery::outbound(params, system);
        let response = self.api.send_request(&query).await?;
        let mut candidates = self.parser.parse_outbound(&response)?;

        if let Some(filter) = params.flight_number.as_deref() {
            let before = candidates.len();
            candidates.retain(|flight| matches_flight_number(flight, filter));
            debug!(
                system = %system,
                filter = filter,
                kept = candidates.len(),
                dropped = before - candidates.len(),
                "Applied flight number filter"
            );
        }

        match params.return_date {
            None => Ok(candidates.into_iter().map(into_one_way).collect()),
            Some(_) => self.crawl_inbound(params, system, candidates).await,
        }
    }

    async fn crawl_inbound(
        &self,
        params: &TaskParameters,
        system: ProviderSystem,
        candidates: Vec<FlightInfo>,
    ) -> Result<Vec<FlightInfo>> {
        let queries: Vec<(FlightQuery, FlightInfo)> = candidates
            .into_iter()
            .filter_map(|outbound| match FlightQuery::inbound(params, system, &outbound) {
                Some(query) => Some((query, outbound)),
                None => {
                    warn!(
                        system = %system,
                        flight = outbound
                            .outbound_segments
                            .first()
                            .map(|s| s.flight_number.as_str())
                            .unwrap_or(""),
                        "Outbound candidate has no inbound tokens, skipping"
                    );
                    None
                }
            })
            .collect();

        // Single-cell quota: the first query starts at once, each later one
        // waits for the previous start plus `delay`
        let pacer = Quota::with_period(self.pacing.delay).map(RateLimiter::direct);
        let pacer = pacer.as_ref();

        let combined: Vec<Vec<FlightInfo>> = stream::iter(queries)
            .map(|(query, outbound)| async move {
                if let Some(pacer) = pacer {
                    pacer.until_ready().await;
                }

                let response = self.api.send_request(&query).await?;
                let flights = self.parser.parse_inbound(&response, &outbound)?;
                Ok::<_, crate::error::Error>(flights)
            })
            .buffered(self.pacing.concurrency.max(1))
            .try_collect()
            .await?;

        Ok(combined
            .into_iter()
            .flatten()
            .filter(|flight| {
                let valid = match (flight.departure_date, flight.return_date) {
                    (Some(depart), Some(ret)) => ret >= depart,
                    _ => false,
                };
                if !valid {
                    debug!(
                        departure = ?flight.departure_date,
                        ret = ?flight.return_date,
                        "Dropping combination with return before departure"
                    );
                }
                valid
            })
            .collect())
    }
}

/// Whether any outbound segment carries the requested flight number
fn matches_flight_number(flight: &FlightInfo, filter: &str) -> bool {
    let filter = filter.trim();
    filter.is_empty()
        || flight
            .outbound_segments
            .iter()
            .any(|s| s.flight_number.eq_ignore_ascii_case(filter))
}

fn into_one_way(mut flight: FlightInfo) -> FlightInfo {
    flight.inbound_segments.clear();
    flight.return_date = None;
    flight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::client::ApiResponse;
    use crate::error::{CrawlErrorTrait, ErrorKind};
    use crate::models::Route;
    use crate::parser::ProviderJsonParser;
    use crate::utils::error::FetchError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Canned responses keyed by (system, outbound token)
    #[derive(Default)]
    struct ScriptedApi {
        responses: HashMap<(ProviderSystem, String), Value>,
        fail_system: Option<ProviderSystem>,
        calls: Mutex<Vec<(ProviderSystem, String)>>,
        inbound_starts: Mutex<Vec<Instant>>,
    }

    impl ScriptedApi {
        fn respond(mut self, system: ProviderSystem, token: &str, data: Value) -> Self {
            self.responses.insert((system, token.to_string()), data);
            self
        }
    }

    #[async_trait]
    impl FlightApi for ScriptedApi {
        async fn send_request(&self, query: &FlightQuery) -> std::result::Result<ApiResponse, FetchError> {
            let token = query.outbound_token.clone().unwrap_or_default();
            self.calls.lock().unwrap().push((query.system, token.clone()));
            if query.is_inbound() {
                self.inbound_starts.lock().unwrap().push(Instant::now());
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            if self.fail_system == Some(query.system) {
                return Err(FetchError::Timeout);
            }

            Ok(ApiResponse::new(
                self.responses
                    .get(&(query.system, token))
                    .cloned()
                    .unwrap_or(Value::Null),
            ))
        }
    }

    fn item(flight_no: &str, departure: &str, token: Option<&str>, price: f64) -> Value {
        json!({
            "departureDate": departure,
            "sectors": [{"airlineCode": "TR", "flightNo": flight_no, "cabinDesc": "Economy", "bookingClass": "V"}],
            "seats": [{
                "routeSearchToken": token.map(|_| "rst"),
                "outboundToken": token,
                "adultPrice": price,
                "adultTax": 100
            }]
        })
    }

    fn orchestrator(api: ScriptedApi) -> CrawlOrchestrator<ScriptedApi, ProviderJsonParser> {
        CrawlOrchestrator::new(api, ProviderJsonParser::with_reference_date(date(2025, 6, 1)))
            .with_pacing(InboundPacing::immediate())
    }

    fn round_trip() -> TaskParameters {
        TaskParameters::round_trip(Route::new("TPE", "SIN"), date(2025, 7, 21), date(2025, 7, 27))
    }

    #[tokio::test]
    async fn test_round_trip_combines_in_order() {
        let api = ScriptedApi::default()
            .respond(
                ProviderSystem::Eztravel,
                "",
                json!([
                    item("875", "2025-07-21", Some("a1"), 5000.0),
                    item("877", "2025-07-21", None, 5100.0),
                    item("879", "2025-07-21", Some("a3"), 5200.0),
                ]),
            )
            .respond(
                ProviderSystem::Eztravel,
                "a1",
                json!([item("874", "2025-07-27", None, 6000.0), item("876", "2025-07-20", None, 6100.0)]),
            )
            .respond(
                ProviderSystem::Eztravel,
                "a3",
                json!([item("878", "2025-07-27", None, 6200.0)]),
            )
            .respond(
                ProviderSystem::Ct,
                "",
                json!([item("875", "2025-07-21", Some("b1"), 4900.0)]),
            )
            .respond(
                ProviderSystem::Ct,
                "b1",
                json!([item("874", "2025-07-28", None, 5800.0)]),
            );

        let orchestrator = orchestrator(api);
        let flights = orchestrator.execute(&round_trip()).await.unwrap();

        // a1 yields one valid combination (the other returns before departure),
        // a2 has no tokens, a3 yields one, b1 yields one
        let inbound: Vec<&str> = flights
            .iter()
            .map(|f| f.inbound_segments[0].flight_number.as_str())
            .collect();
        assert_eq!(inbound, vec!["TR874", "TR878", "TR874"]);
        assert!(flights
            .iter()
            .all(|f| f.return_date.unwrap() >= f.departure_date.unwrap()));
        assert_eq!(flights[2].return_date, Some(date(2025, 7, 28)));

        let calls = orchestrator.api().calls.lock().unwrap().clone();
        assert_eq!(calls[0], (ProviderSystem::Eztravel, String::new()));
        assert_eq!(calls.len(), 5);
    }

    #[tokio::test]
    async fn test_one_way_has_no_inbound() {
        let api = ScriptedApi::default().respond(
            ProviderSystem::Eztravel,
            "",
            json!([item("875", "2025-07-21", Some("a1"), 5000.0)]),
        );

        let params = TaskParameters::one_way(Route::new("TPE", "SIN"), date(2025, 7, 21))
            .with_systems(vec![ProviderSystem::Eztravel]);
        let flights = orchestrator(api).execute(&params).await.unwrap();

        assert_eq!(flights.len(), 1);
        assert!(flights[0].inbound_segments.is_empty());
        assert!(flights[0].return_date.is_none());
    }

    #[tokio::test]
    async fn test_flight_number_filter() {
        let api = ScriptedApi::default().respond(
            ProviderSystem::Ct,
            "",
            json!([
                item("875", "2025-07-21", None, 5000.0),
                item("877", "2025-07-21", None, 5100.0),
            ]),
        );

        let params = TaskParameters::one_way(Route::new("TPE", "SIN"), date(2025, 7, 21))
            .with_systems(vec![ProviderSystem::Ct])
            .with_flight_number("tr877");
        let flights = orchestrator(api).execute(&params).await.unwrap();

        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].outbound_segments[0].flight_number, "TR877");
    }

    #[tokio::test]
    async fn test_empty_data_is_not_an_error() {
        let flights = orchestrator(ScriptedApi::default())
            .execute(&round_trip())
            .await
            .unwrap();
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_error_aborts_whole_task() {
        let api = ScriptedApi {
            fail_system: Some(ProviderSystem::Ct),
            ..Default::default()
        }
        .respond(
            ProviderSystem::Eztravel,
            "",
            json!([item("875", "2025-07-21", None, 5000.0)]),
        );

        let params = TaskParameters::one_way(Route::new("TPE", "SIN"), date(2025, 7, 21));
        let err = orchestrator(api).execute(&params).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_malformed_data_is_parse_error() {
        let api = ScriptedApi::default().respond(ProviderSystem::Eztravel, "", json!({"oops": 1}));
        let err = orchestrator(api).execute(&round_trip()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_concurrent_inbound_keeps_order() {
        let outbound: Vec<Value> = (0..6)
            .map(|i| item(&format!("8{i}0"), "2025-07-21", Some(&format!("t{i}")), 5000.0))
            .collect();
        let mut api = ScriptedApi::default().respond(ProviderSystem::Eztravel, "", Value::Array(outbound));
        for i in 0..6 {
            api = api.respond(
                ProviderSystem::Eztravel,
                &format!("t{i}"),
                json!([item(&format!("9{i}0"), "2025-07-27", None, 6000.0)]),
            );
        }

        let params = round_trip().with_systems(vec![ProviderSystem::Eztravel]);
        let flights = orchestrator(api)
            .with_pacing(InboundPacing {
                concurrency: 3,
                delay: Duration::ZERO,
            })
            .execute(&params)
            .await
            .unwrap();

        let inbound: Vec<String> = flights
            .iter()
            .map(|f| f.inbound_segments[0].flight_number.clone())
            .collect();
        assert_eq!(inbound, vec!["TR900", "TR910", "TR920", "TR930", "TR940", "TR950"]);
    }

    #[tokio::test]
    async fn test_pacing_spaces_concurrent_inbound_starts() {
        let outbound: Vec<Value> = (0..4)
            .map(|i| item(&format!("8{i}0"), "2025-07-21", Some(&format!("t{i}")), 5000.0))
            .collect();
        let api = ScriptedApi::default().respond(ProviderSystem::Eztravel, "", Value::Array(outbound));

        let params = round_trip().with_systems(vec![ProviderSystem::Eztravel]);
        let orchestrator = orchestrator(api).with_pacing(InboundPacing {
            concurrency: 4,
            delay: Duration::from_millis(60),
        });
        orchestrator.execute(&params).await.unwrap();

        let starts = orchestrator.api().inbound_starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(50));
        }
    }
}

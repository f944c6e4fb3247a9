//! Provider flight search API client
//!
//! This module provides:
//! - [`FlightQuery`] - one outbound or inbound search
//! - [`FlightApi`] - the seam the orchestrator talks to
//! - [`RestApiClient`] - reqwest implementation with rate limiting
//!   (governor), configured headers and short transport retries

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::ApiConfig;
use crate::models::{FlightInfo, ProviderSystem, Route, TaskParameters};
use crate::utils::error::{ConfigError, FetchError};
use crate::utils::retry::{with_retry_if, RetryConfig};
use crate::utils::{carrier_prefix, truncate_text};

// ============================================================================
// Query and response
// ============================================================================

/// One search against a provider system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightQuery {
    pub system: ProviderSystem,
    pub route: Route,
    pub depart_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub flight_number: Option<String>,
    pub route_search_token: Option<String>,
    pub outbound_token: Option<String>,
}

impl FlightQuery {
    /// Outbound search for a task on one system
    pub fn outbound(params: &TaskParameters, system: ProviderSystem) -> Self {
        Self {
            system,
            route: params.route.clone(),
            depart_date: params.depart_date,
            return_date: params.return_date,
            flight_number: params.flight_number.clone(),
            route_search_token: None,
            outbound_token: None,
        }
    }

    /// Inbound search for a selected outbound candidate
    ///
    /// Returns `None` when the candidate lacks either token.
    pub fn inbound(
        params: &TaskParameters,
        system: ProviderSystem,
        outbound: &FlightInfo,
    ) -> Option<Self> {
        let (search, outbound_token) = outbound.inbound_tokens()?;

        Some(Self {
            route_search_token: Some(search.to_string()),
            outbound_token: Some(outbound_token.to_string()),
            ..Self::outbound(params, system)
        })
    }

    pub fn is_inbound(&self) -> bool {
        self.outbound_token.is_some()
    }

    /// Request body sent to the provider
    pub fn to_payload(&self, head: &Value) -> Value {
        let journey_type = if self.return_date.is_some() { 2 } else { 1 };
        let airline_code = self
            .flight_number
            .as_deref()
            .map(carrier_prefix)
            .unwrap_or_default();

        json!({
            "head": head,
            "data": {
                "journeyType": journey_type,
                "cabinType": "any",
                "airlineCode": airline_code,
                "adultCnt": 1,
                "childCnt": 0,
                "infantCnt": 0,
                "isDirectFlight": false,
                "outboundDate": self.depart_date.format("%Y-%m-%d").to_string(),
                "inboundDate": self
                    .return_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                "fromCityCode": self.route.from_city,
                "toCityCode": self.route.to_city,
                "fromAirportCode": "",
                "toAirportCode": "",
                "resourceType": self.system.resource_type(),
                "routeSearchToken": self.route_search_token.clone().unwrap_or_default(),
                "outboundToken": self.outbound_token.clone().unwrap_or_default(),
            }
        })
    }
}

/// Validated provider response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub head: Value,
    /// `data` field, possibly null
    pub data: Value,
}

impl ApiResponse {
    pub fn new(data: Value) -> Self {
        Self {
            head: json!({"code": 0}),
            data,
        }
    }

    /// Validate a raw response body
    ///
    /// Fails on non-200 status, invalid JSON, a non-zero `head.code` or a
    /// missing `data` field. A null `data` is accepted.
    pub fn from_http(status: StatusCode, body: &str) -> Result<Self, FetchError> {
        if status != StatusCode::OK {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
                body: truncate_text(body, 200),
            });
        }

        let mut value: Value = serde_json::from_str(body).map_err(|e| {
            FetchError::InvalidResponse(format!(
                "invalid JSON ({}): {}",
                e,
                truncate_text(body, 200)
            ))
        })?;

        let head = value.get("head").cloned().unwrap_or(Value::Null);
        if let Some(code) = head_code(&head) {
            let message = head
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider error")
                .to_string();
            return Err(FetchError::Api { code, message });
        }

        let data = match value.get_mut("data") {
            Some(data) => data.take(),
            None => {
                return Err(FetchError::InvalidResponse(String::from(
                    "response is missing the 'data' field",
                )))
            }
        };

        if data.is_null() {
            warn!(head = %head, "Provider reported success with null data");
        }

        Ok(Self { head, data })
    }
}

/// Non-zero `head.code`, if any; codes that are not integers map to -1
fn head_code(head: &Value) -> Option<i64> {
    let code = match head.get("code")? {
        Value::Null => return None,
        Value::Number(n) => n.as_i64().unwrap_or(-1),
        Value::String(s) => s.trim().parse().unwrap_or(-1),
        _ => -1,
    };
    (code != 0).then_some(code)
}

// ============================================================================
// Client
// ============================================================================

/// Transport for flight searches
#[async_trait]
pub trait FlightApi: Send + Sync {
    /// Send a search and return the validated response
    async fn send_request(&self, query: &FlightQuery) -> Result<ApiResponse, FetchError>;
}

/// REST client for the provider search endpoint
pub struct RestApiClient {
    client: Client,
    endpoint_url: Option<String>,
    payload_head: Value,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    retry: RetryConfig,
    transport_retries: u32,
}

impl RestApiClient {
    /// Create a client from the `[api]` and `[retry]` sections
    pub fn new(config: &ApiConfig, retry: &RetryConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(build_headers(config)?)
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .gzip(true)
            .build()
            .map_err(|e| ConfigError::invalid("api", e.to_string()))?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone().filter(|u| !u.trim().is_empty()),
            payload_head: config.payload_head.clone(),
            rate_limiter: RateLimiter::direct(build_quota(config.requests_per_second)?),
            retry: retry.clone(),
            transport_retries: config.transport_retries,
        })
    }

    async fn post_once(&self, url: &str, payload: &Value) -> Result<ApiResponse, FetchError> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        debug!(
            status = status.as_u16(),
            body = %truncate_text(&body, 500),
            "Provider response"
        );

        ApiResponse::from_http(status, &body)
    }
}

#[async_trait]
impl FlightApi for RestApiClient {
    #[instrument(skip(self, query), fields(system = %query.system, inbound = query.is_inbound()))]
    async fn send_request(&self, query: &FlightQuery) -> Result<ApiResponse, FetchError> {
        let url = self
            .endpoint_url
            .as_deref()
            .ok_or(FetchError::MissingEndpoint)?;
        let payload = query.to_payload(&self.payload_head);

        with_retry_if(
            &self.retry,
            self.transport_retries,
            || self.post_once(url, &payload),
            FetchError::is_transport,
        )
        .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(e)
    }
}

fn build_quota(requests_per_second: f64) -> Result<Quota, ConfigError> {
    let invalid = || ConfigError::invalid("api.requests_per_second", "must be positive");

    if requests_per_second.is_nan() || requests_per_second <= 0.0 {
        return Err(invalid());
    }

    if requests_per_second >= 1.0 {
        let rate = NonZeroU32::new(requests_per_second.round() as u32).ok_or_else(invalid)?;
        Ok(Quota::per_second(rate))
    } else {
        Quota::with_period(Duration::from_secs_f64(1.0 / requests_per_second)).ok_or_else(invalid)
    }
}

fn build_headers(config: &ApiConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

    for (name, value) in &config.headers {
        let field = format!("api.headers.{name}");
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::invalid(&field, e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| ConfigError::invalid(&field, e.to_string()))?;
        headers.insert(name, value);
    }

    if let Some(token) = config.auth_token.as_deref().filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ConfigError::invalid("api.auth_token", e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

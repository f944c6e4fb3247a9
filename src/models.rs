// Core data structures for the fare crawler

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

/// One leg of an itinerary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlightSegment {
    pub flight_number: String, // e.g. "TR875", always upper case with carrier prefix
    pub cabin_class: String,
}

impl FlightSegment {
    pub fn new(flight_number: impl Into<String>, cabin_class: impl Into<String>) -> Self {
        Self {
            flight_number: flight_number.into(),
            cabin_class: cabin_class.into(),
        }
    }
}

/// A priced itinerary (one-way or round trip)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlightInfo {
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub price: f64,
    pub tax: f64,
    pub outbound_segments: Vec<FlightSegment>,
    pub inbound_segments: Vec<FlightSegment>,
    #[serde(rename = "routeSearchToken")]
    pub route_search_token: Option<String>,
    #[serde(rename = "outboundToken")]
    pub outbound_token: Option<String>,
    pub product_desc: bool, // offered by an overseas supplier
}

impl FlightInfo {
    /// Serialize to a JSON value; dates render as `YYYY-MM-DD`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "departure_date": self.departure_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "return_date": self.return_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "price": self.price,
            "tax": self.tax,
            "outbound_segments": self.outbound_segments,
            "inbound_segments": self.inbound_segments,
            "routeSearchToken": self.route_search_token,
            "outboundToken": self.outbound_token,
            "product_desc": self.product_desc,
        })
    }

    /// Both tokens needed to query the inbound leg
    pub fn inbound_tokens(&self) -> Option<(&str, &str)> {
        match (&self.route_search_token, &self.outbound_token) {
            (Some(search), Some(outbound)) if !search.is_empty() && !outbound.is_empty() => {
                Some((search.as_str(), outbound.as_str()))
            }
            _ => None,
        }
    }

    /// Whether this record is a one-way itinerary
    pub fn is_one_way(&self) -> bool {
        self.inbound_segments.is_empty() && self.return_date.is_none()
    }

    /// Total price including tax
    pub fn total_price(&self) -> f64 {
        self.price + self.tax
    }
}

/// Provider backend queried for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSystem {
    Eztravel,
    Ct,
}

impl ProviderSystem {
    /// Value sent as `resourceType` in the request body
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Eztravel => "eztravel",
            Self::Ct => "ct",
        }
    }

    /// All systems in query order
    pub fn all() -> Vec<Self> {
        vec![Self::Eztravel, Self::Ct]
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "eztravel" | "a" => Some(Self::Eztravel),
            "ct" | "b" => Some(Self::Ct),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resource_type())
    }
}

/// Origin and destination of a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Route {
    pub from_city: String, // IATA city code, e.g. "TPE"
    pub to_city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_country: Option<String>,
}

impl Route {
    pub fn new(from_city: impl Into<String>, to_city: impl Into<String>) -> Self {
        Self {
            from_city: from_city.into(),
            to_city: to_city.into(),
            ..Default::default()
        }
    }

    /// Key used to compare routes across generators (countries ignored)
    pub fn key(&self) -> (String, String) {
        (self.from_city.to_uppercase(), self.to_city.to_uppercase())
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.from_city, self.to_city)
    }
}

fn default_systems() -> Vec<ProviderSystem> {
    ProviderSystem::all()
}

/// Everything the orchestrator needs to run one crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParameters {
    pub name: String,
    pub route: Route,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    pub depart_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    #[serde(default = "default_systems")]
    pub systems: Vec<ProviderSystem>,
}

impl TaskParameters {
    /// Round trip parameters querying both systems
    pub fn round_trip(route: Route, depart_date: NaiveDate, return_date: NaiveDate) -> Self {
        Self {
            name: default_name(&route, depart_date, Some(return_date)),
            route,
            flight_number: None,
            depart_date,
            return_date: Some(return_date),
            systems: default_systems(),
        }
    }

    /// One-way parameters querying both systems
    pub fn one_way(route: Route, depart_date: NaiveDate) -> Self {
        Self {
            name: default_name(&route, depart_date, None),
            route,
            flight_number: None,
            depart_date,
            return_date: None,
            systems: default_systems(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_flight_number(mut self, flight_number: impl Into<String>) -> Self {
        self.flight_number = Some(flight_number.into().trim().to_uppercase());
        self
    }

    pub fn with_systems(mut self, systems: Vec<ProviderSystem>) -> Self {
        self.systems = systems;
        self
    }

    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }
}

fn default_name(route: &Route, depart: NaiveDate, ret: Option<NaiveDate>) -> String {
    match ret {
        Some(ret) => format!("{} {} -> {}", route, depart, ret),
        None => format!("{} {}", route, depart),
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

impl TaskStatus {
    /// Completed and failed tasks never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified failure attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// One entry of a task's retry history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRecord {
    pub attempt: u32,
    pub error: ErrorInfo,
    pub delay_ms: u64,
    pub scheduled_at: DateTime<Utc>,
}

/// One unit of crawl work tracked by the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlTask {
    pub id: String,
    pub parameters: TaskParameters,
    pub status: TaskStatus,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub first_started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result: Vec<FlightInfo>,
    pub error_info: Option<ErrorInfo>,
    pub retry_history: Vec<RetryRecord>,
}

impl CrawlTask {
    /// Create a pending task with a fresh id
    pub fn new(parameters: TaskParameters) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parameters,
            status: TaskStatus::Pending,
            attempt_count: 0,
            created_at: Utc::now(),
            started_at: None,
            first_started_at: None,
            ended_at: None,
            result: Vec::new(),
            error_info: None,
            retry_history: Vec::new(),
        }
    }

    pub fn mark_running(&mut self) {
        let now = Utc::now();
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
        self.first_started_at.get_or_insert(now);
        self.ended_at = None;
    }

    pub fn mark_completed(&mut self, result: Vec<FlightInfo>) {
        self.status = TaskStatus::Completed;
        self.result = result;
        self.ended_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: ErrorInfo) {
        self.status = TaskStatus::Failed;
        self.result.clear();
        self.error_info = Some(error);
        self.ended_at = Some(Utc::now());
    }

    /// Record a failed attempt that will be retried after `delay_ms`
    pub fn mark_retrying(&mut self, attempt: u32, error: ErrorInfo, delay_ms: u64) {
        self.status = TaskStatus::Retrying;
        self.attempt_count = self.attempt_count.max(attempt);
        self.ended_at = Some(Utc::now());
        self.retry_history.push(RetryRecord {
            attempt,
            error: error.clone(),
            delay_ms,
            scheduled_at: Utc::now(),
        });
        self.error_info = Some(error);
    }

    /// Back in the queue after the retry delay elapsed
    pub fn mark_requeued(&mut self) {
        self.status = TaskStatus::Pending;
    }

    /// Wall time from the first start to the last end, across retries
    pub fn total_execution_secs(&self) -> Option<f64> {
        let start = self.first_started_at?;
        let end = self.ended_at?;
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }
}

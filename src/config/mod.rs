//! Configuration management for farecrawl
//!
//! This module handles loading and validating configuration from a TOML file
//! and `FARECRAWL_*` environment variables. The resulting [`Config`] is built
//! once in `main` and handed to the components that need it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generator::holiday::HolidayWindowRules;
use crate::models::{ProviderSystem, Route, TaskParameters};
use crate::utils::error::ConfigError;
use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Retry policy for failed tasks
    pub retry: RetryConfig,

    /// Provider API configuration
    pub api: ApiConfig,

    /// Result storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Holiday calendar sources
    pub generator: GeneratorConfig,

    /// Tasks generated from a month offset and fixed days
    pub fixed_month_tasks: Vec<FixedMonthTaskConfig>,

    /// Tasks generated around public holidays
    pub holiday_tasks: HolidayTasksConfig,

    /// Explicit dated tasks, run before the generated ones
    pub flight_tasks: Vec<TaskParameters>,
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks executing at once
    pub max_concurrent_tasks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
        }
    }
}

/// Provider API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Flight search endpoint (POST)
    pub endpoint_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User agent string
    pub user_agent: String,

    /// Extra request headers (Origin, Referer, ...)
    pub headers: BTreeMap<String, String>,

    /// Bearer token sent as `Authorization`
    pub auth_token: Option<String>,

    /// `head` object of every request body
    pub payload_head: serde_json::Value,

    /// Rate limit (requests per second)
    pub requests_per_second: f64,

    /// In-client retries for transport failures
    pub transport_retries: u32,

    /// Minimum gap between inbound query starts of one system, in
    /// milliseconds, regardless of `inbound_concurrency`
    pub inbound_delay_ms: u64,

    /// Inbound queries in flight per system
    pub inbound_concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            timeout_secs: 30,
            user_agent: format!("farecrawl/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
            auth_token: None,
            payload_head: serde_json::json!({}),
            requests_per_second: 2.0,
            transport_retries: 1,
            inbound_delay_ms: 2000,
            inbound_concurrency: 1,
        }
    }
}

/// Result storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for local JSON results
    pub output_dir: PathBuf,

    /// Remote storage endpoint; local only when unset
    pub remote_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            remote_url: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// A holiday listed directly in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayEntry {
    pub name: String,
    pub date: NaiveDate,
}

/// Holiday calendar sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Holiday calendar API; the static list is used when unset
    pub holiday_api_url: Option<String>,

    /// Static holiday list
    pub holidays: Vec<HolidayEntry>,
}

/// Fixed-month task template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedMonthTaskConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub route: Route,
    pub month_offset: u32,
    pub depart_day: u32,
    pub return_day: u32,
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default = "ProviderSystem::all")]
    pub systems: Vec<ProviderSystem>,
}

/// Holiday task template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayRouteConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub route: Route,
    pub month_offset: u32,
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default = "ProviderSystem::all")]
    pub systems: Vec<ProviderSystem>,
}

/// Holiday-based generation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HolidayTasksConfig {
    pub routes: Vec<HolidayRouteConfig>,
    pub rules: HolidayWindowRules,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: String::from("<inline>"),
            reason: e.to_string(),
        })
    }

    /// Load from `path` when given (defaults otherwise), then apply the
    /// environment and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from `FARECRAWL_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override values using an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FARECRAWL_MAX_CONCURRENT_TASKS") {
            self.scheduler.max_concurrent_tasks = value.parse().map_err(|_| {
                ConfigError::invalid("FARECRAWL_MAX_CONCURRENT_TASKS", "expected an integer")
            })?;
        }

        if let Some(value) = lookup("FARECRAWL_MAX_ATTEMPTS") {
            self.retry.max_attempts = value.parse().map_err(|_| {
                ConfigError::invalid("FARECRAWL_MAX_ATTEMPTS", "expected an integer")
            })?;
        }

        if let Some(value) = lookup("FARECRAWL_API_ENDPOINT") {
            self.api.endpoint_url = Some(value);
        }

        if let Some(value) = lookup("FARECRAWL_AUTH_TOKEN") {
            self.api.auth_token = Some(value);
        }

        if let Some(value) = lookup("FARECRAWL_HOLIDAY_API_URL") {
            self.generator.holiday_api_url = Some(value);
        }

        if let Some(value) = lookup("FARECRAWL_OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(value);
        }

        if let Some(value) = lookup("FARECRAWL_REMOTE_STORAGE_URL") {
            self.storage.remote_url = Some(value);
        }

        if let Some(value) = lookup("FARECRAWL_LOG_LEVEL") {
            self.logging.level = value;
        }

        if let Some(value) = lookup("FARECRAWL_LOG_FORMAT") {
            self.logging.format = value;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.max_concurrent_tasks == 0 {
            return Err(ConfigError::invalid(
                "scheduler.max_concurrent_tasks",
                "must be greater than 0",
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }

        if self.api.requests_per_second <= 0.0 {
            return Err(ConfigError::invalid(
                "api.requests_per_second",
                "must be positive",
            ));
        }

        if self.api.inbound_concurrency == 0 {
            return Err(ConfigError::invalid(
                "api.inbound_concurrency",
                "must be greater than 0",
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::invalid(
                "logging.format",
                format!("unknown format '{}'", self.logging.format),
            ));
        }

        for (i, task) in self.fixed_month_tasks.iter().enumerate() {
            let field = |name: &str| format!("fixed_month_tasks[{i}].{name}");

            if task.month_offset == 0 {
                return Err(ConfigError::invalid(field("month_offset"), "must be at least 1"));
            }
            for (name, day) in [("depart_day", task.depart_day), ("return_day", task.return_day)] {
                if !(1..=31).contains(&day) {
                    return Err(ConfigError::invalid(field(name), "must be between 1 and 31"));
                }
            }
            if task.return_day < task.depart_day {
                return Err(ConfigError::invalid(
                    field("return_day"),
                    "must not be earlier than depart_day",
                ));
            }
        }

        for (i, route) in self.holiday_tasks.routes.iter().enumerate() {
            if route.month_offset == 0 {
                return Err(ConfigError::invalid(
                    format!("holiday_tasks.routes[{i}].month_offset"),
                    "must be at least 1",
                ));
            }
        }

        for (i, task) in self.flight_tasks.iter().enumerate() {
            if task.return_date.is_some_and(|r| r < task.depart_date) {
                return Err(ConfigError::invalid(
                    format!("flight_tasks[{i}].return_date"),
                    "must not be earlier than depart_date",
                ));
            }
        }

        Ok(())
    }

    /// Checks that only matter when tasks will actually be crawled
    pub fn validate_for_crawl(&self) -> Result<(), ConfigError> {
        self.validate()?;

        match self.api.endpoint_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::Missing(String::from("api.endpoint_url"))),
        }
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.max_concurrent_tasks, 4);
    }

    #[test]
    fn test_invalid_concurrency() {
        let mut config = Config::default();
        config.scheduler.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::from_toml_str(
            r#"
            [scheduler]
            max_concurrent_tasks = 2

            [retry]
            max_attempts = 5

            [api]
            endpoint_url = "https://example.test/search"

            [[fixed_month_tasks]]
            route = { from_city = "TPE", to_city = "SIN" }
            month_offset = 2
            depart_day = 5
            return_day = 10

            [[holiday_tasks.routes]]
            route = { from_city = "TPE", to_city = "NRT" }
            month_offset = 3

            [[flight_tasks]]
            name = "TPE to SIN"
            route = { from_city = "TPE", to_city = "SIN" }
            depart_date = "2025-07-21"
            return_date = "2025-07-27"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.max_concurrent_tasks, 2);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.parse_max_attempts, 1);
        assert_eq!(config.fixed_month_tasks.len(), 1);
        assert_eq!(config.fixed_month_tasks[0].systems.len(), 2);
        assert_eq!(config.holiday_tasks.routes[0].month_offset, 3);
        assert_eq!(config.flight_tasks.len(), 1);
        assert!(config.validate_for_crawl().is_ok());
    }

    #[test]
    fn test_return_day_before_depart_day_rejected() {
        let mut config = Config::default();
        config.fixed_month_tasks.push(FixedMonthTaskConfig {
            name: None,
            route: Route::new("TPE", "SIN"),
            month_offset: 1,
            depart_day: 10,
            return_day: 5,
            flight_number: None,
            systems: ProviderSystem::all(),
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("return_day"));
    }

    #[test]
    fn test_zero_month_offset_rejected() {
        let mut config = Config::default();
        config.holiday_tasks.routes.push(HolidayRouteConfig {
            name: None,
            route: Route::new("TPE", "SIN"),
            month_offset: 0,
            flight_number: None,
            systems: ProviderSystem::all(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_endpoint_for_crawl() {
        let config = Config::default();
        assert!(matches!(
            config.validate_for_crawl(),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_apply_env_from_lookup() {
        let mut config = Config::default();
        config
            .apply_env_from(|key| match key {
                "FARECRAWL_MAX_CONCURRENT_TASKS" => Some("8".to_string()),
                "FARECRAWL_LOG_FORMAT" => Some("json".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.scheduler.max_concurrent_tasks, 8);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_apply_env_rejects_garbage() {
        let mut config = Config::default();
        let result = config.apply_env_from(|key| {
            (key == "FARECRAWL_MAX_CONCURRENT_TASKS").then(|| "many".to_string())
        });
        assert!(result.is_err());
    }
}

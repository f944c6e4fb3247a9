//! Scheduler behavior through the public API

mod common;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use farecrawl::error::{Error, Result};
use farecrawl::models::{CrawlTask, FlightInfo, Route, TaskParameters, TaskStatus};
use farecrawl::scheduler::{SchedulerBuilder, TaskExecutor};
use farecrawl::utils::error::{FetchError, ParseError};
use farecrawl::utils::retry::RetryConfig;

use common::date;

/// Fails each task a scripted number of times with a scripted error, then
/// returns one flight; tracks concurrency
#[derive(Default)]
struct ScriptedExecutor {
    failures: HashMap<String, (usize, fn() -> Error)>,
    calls: Mutex<HashMap<String, usize>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    fn fail(mut self, name: &str, times: usize, error: fn() -> Error) -> Self {
        self.failures.insert(name.to_string(), (times, error));
        self
    }

    fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, task: &CrawlTask) -> Result<Vec<FlightInfo>> {
        let name = task.parameters.name.clone();
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(name.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        match self.failures.get(&name) {
            Some((times, error)) if call <= *times => Err(error()),
            _ => Ok(vec![FlightInfo::default()]),
        }
    }
}

fn task(name: &str) -> TaskParameters {
    TaskParameters::round_trip(Route::new("TPE", "SIN"), date(2025, 7, 21), date(2025, 7, 27))
        .with_name(name)
}

fn network() -> Error {
    Error::Fetch(FetchError::Timeout)
}

fn parse() -> Error {
    Error::Parse(ParseError::NoSegments)
}

fn config_error() -> Error {
    Error::config("api.endpoint_url")
}

#[tokio::test]
async fn test_mixed_batch_outcomes() {
    let executor = Arc::new(
        ScriptedExecutor::default()
            .fail("flaky", 2, network)
            .fail("broken", 10, network)
            .fail("garbled", 10, parse)
            .fail("misconfigured", 10, config_error),
    );

    let scheduler = SchedulerBuilder::new()
        .max_concurrent_tasks(3)
        .retry(RetryConfig::with_delays(3, 1, 5))
        .execution_callback(Arc::clone(&executor))
        .build()
        .unwrap();

    let names = ["ok", "flaky", "broken", "garbled", "misconfigured"];
    let summary = scheduler
        .run_batch(names.iter().map(|n| task(n)).collect())
        .await;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 3);

    let by_name: HashMap<&str, _> = summary
        .tasks
        .iter()
        .map(|t| (t.name.as_str(), t))
        .collect();

    assert_eq!(by_name["ok"].status, TaskStatus::Completed);
    assert_eq!(by_name["ok"].attempts, 0);
    assert_eq!(by_name["flaky"].status, TaskStatus::Completed);
    assert_eq!(by_name["flaky"].attempts, 2);
    assert_eq!(by_name["broken"].attempts, 3);
    assert_eq!(by_name["garbled"].attempts, 1);
    assert_eq!(by_name["misconfigured"].attempts, 0);

    assert_eq!(executor.calls("broken"), 4);
    assert_eq!(executor.calls("garbled"), 2);
    assert_eq!(executor.calls("misconfigured"), 1);

    let stats = scheduler.stats();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.finished(), 5);
    assert_eq!(stats.slots_acquired, stats.slots_released);
    assert!(stats.peak_concurrency <= 3);
    assert!(executor.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_summary_serializes() {
    let scheduler = SchedulerBuilder::new()
        .retry(RetryConfig::with_delays(1, 1, 5))
        .execution_callback(ScriptedExecutor::default().fail("bad", 5, network))
        .build()
        .unwrap();

    let summary = scheduler.run_batch(vec![task("good"), task("bad")]).await;
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["total"], 2);
    assert_eq!(json["tasks"][0]["status"], "completed");
    assert_eq!(json["tasks"][1]["status"], "failed");
    assert_eq!(json["tasks"][1]["error"]["kind"], "network");
    assert!(json["tasks"][0].get("error").is_none());
}

#[tokio::test]
async fn test_scheduler_reusable_across_batches() {
    let scheduler = SchedulerBuilder::new()
        .max_concurrent_tasks(2)
        .execution_callback(ScriptedExecutor::default())
        .build()
        .unwrap();

    let first = scheduler.process_batch(vec![task("a"), task("b")]).await;
    let second = scheduler.process_batch(vec![task("c")]).await;

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(scheduler.task_ids().len(), 3);
    assert!(scheduler.is_queue_empty());
    assert_eq!(scheduler.available_slots(), 2);
}

#[tokio::test]
async fn test_empty_batch_returns_immediately() {
    let scheduler = SchedulerBuilder::new()
        .execution_callback(ScriptedExecutor::default())
        .build()
        .unwrap();

    let statuses = scheduler.process_batch(Vec::new()).await;
    assert!(statuses.is_empty());
}

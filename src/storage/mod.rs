//! Result storage
//!
//! Completed tasks hand their flights to a [`ResultSink`]:
//! - [`LocalJsonStorage`] - one JSON document per task in an output directory
//! - [`FallbackStorage`] - POST to a remote endpoint, local file on failure

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::models::{FlightInfo, TaskParameters};
use crate::utils::error::FetchError;
use crate::utils::{sanitize_filename, truncate_text};

/// Where a result set ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredLocation {
    Local(PathBuf),
    Remote(String),
}

/// Document written for one completed task
#[derive(Debug, Clone, Serialize)]
pub struct ResultDocument {
    pub task_id: String,
    pub task_name: String,
    pub parameters: TaskParameters,
    pub crawled_at: DateTime<Utc>,
    pub flight_count: usize,
    pub flights: Vec<serde_json::Value>,
}

impl ResultDocument {
    pub fn new(task_id: &str, params: &TaskParameters, flights: &[FlightInfo]) -> Self {
        Self {
            task_id: task_id.to_string(),
            task_name: params.name.clone(),
            parameters: params.clone(),
            crawled_at: Utc::now(),
            flight_count: flights.len(),
            flights: flights.iter().map(FlightInfo::to_json).collect(),
        }
    }
}

/// Destination for crawl results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(
        &self,
        task_id: &str,
        params: &TaskParameters,
        flights: &[FlightInfo],
    ) -> Result<StoredLocation>;
}

/// Writes each result set to `<output_dir>/<name>_<task_id>.json`
#[derive(Debug, Clone)]
pub struct LocalJsonStorage {
    output_dir: PathBuf,
}

impl LocalJsonStorage {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path used for a task
    pub fn path_for(&self, task_id: &str, params: &TaskParameters) -> PathBuf {
        let stem = sanitize_filename(&format!(
            "{}_{}_{}",
            params.route.from_city, params.route.to_city, params.depart_date
        ));
        self.output_dir.join(format!("{stem}_{task_id}.json"))
    }

    /// Write a document atomically (temp file + rename)
    pub async fn write_document(&self, path: &Path, document: &ResultDocument) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let content = serde_json::to_string_pretty(document)?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultSink for LocalJsonStorage {
    async fn store(
        &self,
        task_id: &str,
        params: &TaskParameters,
        flights: &[FlightInfo],
    ) -> Result<StoredLocation> {
        let path = self.path_for(task_id, params);
        let document = ResultDocument::new(task_id, params, flights);
        self.write_document(&path, &document).await?;

        info!(
            task_id = task_id,
            flights = flights.len(),
            path = %path.display(),
            "Stored results locally"
        );
        Ok(StoredLocation::Local(path))
    }
}

/// Remote storage with a local fallback
pub struct FallbackStorage {
    client: reqwest::Client,
    remote_url: String,
    local: LocalJsonStorage,
}

impl FallbackStorage {
    pub fn new(remote_url: impl Into<String>, local: LocalJsonStorage, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            remote_url: remote_url.into(),
            local,
        })
    }

    async fn post(&self, document: &ResultDocument) -> Result<()> {
        let response = self
            .client
            .post(&self.remote_url)
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(FetchError::ServerError {
                status: status.as_u16(),
                body: truncate_text(&body, 200),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl ResultSink for FallbackStorage {
    async fn store(
        &self,
        task_id: &str,
        params: &TaskParameters,
        flights: &[FlightInfo],
    ) -> Result<StoredLocation> {
        let document = ResultDocument::new(task_id, params, flights);

        match self.post(&document).await {
            Ok(()) => {
                debug!(task_id = task_id, url = %self.remote_url, "Stored results remotely");
                Ok(StoredLocation::Remote(self.remote_url.clone()))
            }
            Err(e) => {
                warn!(
                    task_id = task_id,
                    error = %e,
                    "Remote storage failed, falling back to local file"
                );
                let path = self.local.path_for(task_id, params);
                self.local.write_document(&path, &document).await?;
                Ok(StoredLocation::Local(path))
            }
        }
    }
}

/// Build the sink described by `[storage]`
pub fn sink_from_config(config: &StorageConfig, timeout: Duration) -> Result<Box<dyn ResultSink>> {
    let local = LocalJsonStorage::new(&config.output_dir);

    match config.remote_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Ok(Box::new(FallbackStorage::new(url, local, timeout)?)),
        None => Ok(Box::new(local)),
    }
}

#[async_trait]
impl<T: ResultSink + ?Sized> ResultSink for Box<T> {
    async fn store(
        &self,
        task_id: &str,
        params: &TaskParameters,
        flights: &[FlightInfo],
    ) -> Result<StoredLocation> {
        (**self).store(task_id, params, flights).await
    }
}

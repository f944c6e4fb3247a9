//! Task execution seam

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{CrawlTask, FlightInfo};

/// Runs one attempt of a task
///
/// Errors are classified by the scheduler through
/// [`CrawlErrorTrait::kind`](crate::error::CrawlErrorTrait::kind) to decide on
/// a retry; the executor itself never retries.
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    async fn execute(&self, task: &CrawlTask) -> Result<Vec<FlightInfo>>;
}

#[async_trait]
impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    async fn execute(&self, task: &CrawlTask) -> Result<Vec<FlightInfo>> {
        (**self).execute(task).await
    }
}

/// Adapts an async closure into a [`TaskExecutor`]
///
/// ```no_run
/// use farecrawl::error::Error;
/// use farecrawl::models::{CrawlTask, FlightInfo};
/// use farecrawl::scheduler::FnExecutor;
///
/// let executor = FnExecutor::new(|task: CrawlTask| async move {
///     tracing::info!(task_id = %task.id, "running");
///     Ok::<Vec<FlightInfo>, Error>(Vec::new())
/// });
/// ```
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(CrawlTask) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<FlightInfo>>> + Send + 'static,
{
    async fn execute(&self, task: &CrawlTask) -> Result<Vec<FlightInfo>> {
        (self.f)(task.clone()).await
    }
}

//! Batch summary reported after `run_batch`

use serde::Serialize;
use std::time::Duration;

use crate::models::{CrawlTask, ErrorInfo, TaskStatus};

/// Outcome of one task in a batch
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub name: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub result_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_execution_secs: Option<f64>,
}

impl From<&CrawlTask> for TaskSummary {
    fn from(task: &CrawlTask) -> Self {
        Self {
            task_id: task.id.clone(),
            name: task.parameters.name.clone(),
            status: task.status,
            attempts: task.attempt_count,
            result_count: task.result.len(),
            error: match task.status {
                TaskStatus::Completed => None,
                _ => task.error_info.clone(),
            },
            total_execution_secs: task.total_execution_secs(),
        }
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
    pub tasks: Vec<TaskSummary>,
}

impl BatchSummary {
    /// Build from task snapshots in submission order
    pub fn new(batch_id: impl Into<String>, tasks: &[CrawlTask], elapsed: Duration) -> Self {
        let tasks: Vec<TaskSummary> = tasks.iter().map(TaskSummary::from).collect();

        Self {
            batch_id: batch_id.into(),
            total: tasks.len(),
            completed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            failed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Failed)
                .count(),
            elapsed_secs: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
            tasks,
        }
    }

    /// Total flights across all completed tasks
    pub fn total_flights(&self) -> usize {
        self.tasks.iter().map(|t| t.result_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{FlightInfo, Route, TaskParameters};
    use chrono::NaiveDate;

    #[test]
    fn test_summary_counts() {
        let params = TaskParameters::one_way(
            Route::new("TPE", "SIN"),
            NaiveDate::from_ymd_opt(2025, 7, 21).unwrap(),
        );

        let mut ok = CrawlTask::new(params.clone());
        ok.mark_running();
        ok.mark_completed(vec![FlightInfo::default(), FlightInfo::default()]);

        let mut bad = CrawlTask::new(params);
        bad.mark_running();
        bad.mark_failed(ErrorInfo::new(ErrorKind::Configuration, "no endpoint"));

        let summary = BatchSummary::new("b1", &[ok, bad], Duration::from_millis(1234));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_flights(), 2);
        assert_eq!(summary.elapsed_secs, 1.23);
        assert!(summary.tasks[0].error.is_none());
        assert!(summary.tasks[1].error.is_some());
    }
}

use anyhow::{Context, Result};
use chrono::NaiveDate;

use farecrawl::config::Config;
use farecrawl::generator::generate_all;

use super::{holiday_calendar, print_json, resolve_today};

/// Print the tasks `run` would crawl for `today`
pub async fn plan(config: Config, today: Option<NaiveDate>) -> Result<()> {
    let today = resolve_today(today);
    let calendar = holiday_calendar(&config)?;

    let tasks = generate_all(&config, calendar.as_ref(), today)
        .await
        .context("Failed to generate crawl tasks")?;

    tracing::info!(today = %today, tasks = tasks.len(), "Plan generated");
    print_json(&tasks)
}

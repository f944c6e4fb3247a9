use anyhow::{Context, Result};
use chrono::NaiveDate;

use farecrawl::config::Config;
use farecrawl::crawler::CrawlJob;
use farecrawl::generator::generate_all;
use farecrawl::scheduler::TaskScheduler;

use super::{holiday_calendar, print_json, resolve_today};

/// Generate every configured task, crawl them and print the batch summary
pub async fn run(config: Config, today: Option<NaiveDate>) -> Result<()> {
    config
        .validate_for_crawl()
        .context("Configuration is not usable for crawling")?;

    let today = resolve_today(today);
    let calendar = holiday_calendar(&config)?;
    let tasks = generate_all(&config, calendar.as_ref(), today)
        .await
        .context("Failed to generate crawl tasks")?;

    if tasks.is_empty() {
        tracing::warn!(today = %today, "No tasks generated, nothing to crawl");
        return Ok(());
    }

    let job = CrawlJob::from_config(&config).context("Failed to build crawl job")?;
    let scheduler = TaskScheduler::new(&config, job).context("Failed to build scheduler")?;

    let summary = scheduler.run_batch(tasks).await;
    let stats = scheduler.stats();

    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        flights = summary.total_flights(),
        retries = stats.retries,
        success_rate = %format!("{:.1}%", stats.success_rate()),
        "Run finished"
    );

    print_json(&summary)
}

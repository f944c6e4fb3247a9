use anyhow::{Context, Result};
use chrono::NaiveDate;

use farecrawl::config::Config;
use farecrawl::crawler::CrawlJob;
use farecrawl::models::{ProviderSystem, Route, TaskParameters};
use farecrawl::scheduler::TaskScheduler;

use super::print_json;

/// Ad-hoc crawl arguments from the command line
pub struct CrawlParams {
    pub from: String,
    pub to: String,
    pub depart: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub flight: Option<String>,
    pub systems: Vec<ProviderSystem>,
}

impl CrawlParams {
    fn into_task(self) -> Result<TaskParameters> {
        let route = Route::new(self.from.trim().to_uppercase(), self.to.trim().to_uppercase());

        let mut task = match self.return_date {
            Some(ret) => {
                anyhow::ensure!(
                    ret >= self.depart,
                    "Return date {ret} is before departure date {}",
                    self.depart
                );
                TaskParameters::round_trip(route, self.depart, ret)
            }
            None => TaskParameters::one_way(route, self.depart),
        };

        if let Some(flight) = self.flight {
            task = task.with_flight_number(flight);
        }
        if !self.systems.is_empty() {
            task = task.with_systems(self.systems);
        }
        Ok(task)
    }
}

/// Crawl a single task through the scheduler and print its summary
pub async fn crawl(config: Config, params: CrawlParams) -> Result<()> {
    config
        .validate_for_crawl()
        .context("Configuration is not usable for crawling")?;

    let task = params.into_task()?;
    println!("Crawling {} ({})", task.name, task.route);

    let job = CrawlJob::from_config(&config).context("Failed to build crawl job")?;
    let scheduler = TaskScheduler::new(&config, job).context("Failed to build scheduler")?;

    let summary = scheduler.run_batch(vec![task]).await;
    print_json(&summary)?;

    anyhow::ensure!(summary.failed == 0, "Crawl task failed");
    Ok(())
}

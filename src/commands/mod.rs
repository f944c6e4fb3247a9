pub mod crawl;
pub mod plan;
pub mod run;

// Re-export command functions for convenience
pub use crawl::{crawl, CrawlParams};
pub use plan::plan;
pub use run::run;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use farecrawl::config::Config;
use farecrawl::generator::{HolidayCalendar, HttpHolidayCalendar, StaticHolidayCalendar};

/// Holiday source for generation: the calendar API when configured,
/// otherwise the static list from the configuration
fn holiday_calendar(config: &Config) -> Result<Box<dyn HolidayCalendar>> {
    match config
        .generator
        .holiday_api_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
    {
        Some(url) => {
            let calendar = HttpHolidayCalendar::new(url, config.request_timeout())
                .context("Failed to create holiday calendar client")?;
            Ok(Box::new(calendar))
        }
        None => Ok(Box::new(StaticHolidayCalendar::from_entries(
            &config.generator.holidays,
        ))),
    }
}

fn resolve_today(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| chrono::Local::now().date_naive())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

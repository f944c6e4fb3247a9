//! Holiday calendar sources

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::TargetMonth;
use crate::config::HolidayEntry;
use crate::error::{Error, Result};
use crate::utils::error::FetchError;
use crate::utils::truncate_text;

/// A public holiday, optionally with a travel window suggested by the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    #[serde(alias = "holiday_name")]
    pub name: String,
    #[serde(alias = "holiday_date")]
    pub date: NaiveDate,
    #[serde(default, alias = "departure_date")]
    pub suggested_depart: Option<NaiveDate>,
    #[serde(default, alias = "return_date")]
    pub suggested_return: Option<NaiveDate>,
}

impl Holiday {
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
            suggested_depart: None,
            suggested_return: None,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }
}

/// Source of holidays for a month
#[async_trait]
pub trait HolidayCalendar: Send + Sync {
    /// Holidays falling in `target`, in date order
    async fn holidays(&self, target: TargetMonth) -> Result<Vec<Holiday>>;
}

/// Holidays listed in the configuration
#[derive(Debug, Clone, Default)]
pub struct StaticHolidayCalendar {
    holidays: Vec<Holiday>,
}

impl StaticHolidayCalendar {
    pub fn new(mut holidays: Vec<Holiday>) -> Self {
        holidays.sort_by_key(|h| h.date);
        Self { holidays }
    }

    pub fn from_entries(entries: &[HolidayEntry]) -> Self {
        Self::new(
            entries
                .iter()
                .map(|e| Holiday::new(e.name.clone(), e.date))
                .collect(),
        )
    }
}

#[async_trait]
impl HolidayCalendar for StaticHolidayCalendar {
    async fn holidays(&self, target: TargetMonth) -> Result<Vec<Holiday>> {
        Ok(self
            .holidays
            .iter()
            .filter(|h| target.contains(h.date))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<CalendarData>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarData {
    #[serde(default)]
    holidays: Vec<Holiday>,
}

/// Holiday calendar API client
///
/// POSTs `{"month_offset", "year", "month"}` and expects
/// `{"success": true, "data": {"holidays": [{"holiday_name", "holiday_date", ...}]}}`.
#[derive(Debug, Clone)]
pub struct HttpHolidayCalendar {
    client: reqwest::Client,
    url: String,
}

impl HttpHolidayCalendar {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HolidayCalendar for HttpHolidayCalendar {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn holidays(&self, target: TargetMonth) -> Result<Vec<Holiday>> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "month_offset": target.offset,
                "year": target.year,
                "month": target.month,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
                body: truncate_text(&body, 200),
            }
            .into());
        }

        let parsed: CalendarResponse = serde_json::from_str(&body)?;
        if !parsed.success {
            return Err(Error::Fetch(FetchError::Api {
                code: -1,
                message: parsed
                    .error
                    .unwrap_or_else(|| String::from("holiday calendar reported failure")),
            }));
        }

        let mut holidays: Vec<Holiday> = parsed
            .data
            .unwrap_or_default()
            .holidays
            .into_iter()
            .filter(|h| target.contains(h.date))
            .collect();
        holidays.sort_by_key(|h| h.date);

        debug!(month = %target, count = holidays.len(), "Fetched holidays");
        Ok(holidays)
    }
}

//! Calendar-driven task generation
//!
//! Two generators turn configuration templates into dated
//! [`TaskParameters`](crate::models::TaskParameters):
//!
//! - [`fixed_month`] - fixed depart/return days N months from today
//! - [`holiday`] - windows around public holidays in a target month
//!
//! Both only depend on the configuration, "today" and (for holidays) a
//! [`HolidayCalendar`](calendar::HolidayCalendar), which keeps them testable
//! without a clock or network.

pub mod calendar;
pub mod fixed_month;
pub mod holiday;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::models::TaskParameters;

pub use calendar::{Holiday, HolidayCalendar, HttpHolidayCalendar, StaticHolidayCalendar};
pub use fixed_month::FixedMonthGenerator;
pub use holiday::{HolidayGenerator, HolidayWindowRules};

/// Year and month reached by adding an offset to a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetMonth {
    pub year: i32,
    pub month: u32,
    pub offset: u32,
}

impl TargetMonth {
    /// Month `offset` months after `today`'s month, rolling over years
    pub fn from_offset(today: NaiveDate, offset: u32) -> Self {
        let zero_based = today.month0() as i64 + offset as i64;
        let year = today.year() + (zero_based / 12) as i32;
        let month = (zero_based % 12) as u32 + 1;

        Self {
            year,
            month,
            offset,
        }
    }

    /// Last calendar day of the month
    pub fn last_day(&self) -> u32 {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };

        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .map(|d| d.day())
            .unwrap_or(28)
    }

    /// Date on `day`, clipped to the last day of the month
    pub fn clipped_date(&self, day: u32) -> Option<NaiveDate> {
        let day = day.clamp(1, self.last_day());
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// Whether `date` falls in this month
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl std::fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Inclusive depart/return date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub depart: NaiveDate,
    pub ret: NaiveDate,
}

impl DateWindow {
    pub fn new(depart: NaiveDate, ret: NaiveDate) -> Self {
        Self { depart, ret }
    }

    /// Inclusive intersection test
    pub fn overlaps(&self, other: &DateWindow) -> bool {
        self.depart <= other.ret && other.depart <= self.ret
    }
}

/// Generate every configured task for `today`
///
/// Order: predefined `flight_tasks`, fixed-month tasks, then holiday tasks.
pub async fn generate_all<C>(
    config: &Config,
    calendar: &C,
    today: NaiveDate,
) -> Result<Vec<TaskParameters>>
where
    C: HolidayCalendar + ?Sized,
{
    let fixed = FixedMonthGenerator::new(&config.fixed_month_tasks).generate(today);
    let holidays = HolidayGenerator::new(&config.holiday_tasks)
        .generate(calendar, &fixed, today)
        .await?;

    let mut tasks = config.flight_tasks.clone();
    tasks.extend(fixed);
    tasks.extend(holidays);

    info!(
        predefined = config.flight_tasks.len(),
        total = tasks.len(),
        "Generated crawl tasks"
    );

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_target_month_rollover() {
        let target = TargetMonth::from_offset(date(2025, 11, 20), 3);
        assert_eq!((target.year, target.month), (2026, 2));

        let target = TargetMonth::from_offset(date(2025, 1, 15), 2);
        assert_eq!((target.year, target.month), (2025, 3));

        let target = TargetMonth::from_offset(date(2025, 12, 1), 12);
        assert_eq!((target.year, target.month), (2026, 12));
    }

    #[test]
    fn test_last_day() {
        assert_eq!(TargetMonth::from_offset(date(2024, 1, 1), 1).last_day(), 29);
        assert_eq!(TargetMonth::from_offset(date(2025, 1, 1), 1).last_day(), 28);
        assert_eq!(TargetMonth::from_offset(date(2025, 11, 1), 1).last_day(), 31);
        assert_eq!(TargetMonth::from_offset(date(2025, 3, 1), 1).last_day(), 30);
    }

    #[test]
    fn test_clipped_date() {
        let feb = TargetMonth::from_offset(date(2025, 1, 31), 1);
        assert_eq!(feb.clipped_date(31), Some(date(2025, 2, 28)));
        assert_eq!(feb.clipped_date(5), Some(date(2025, 2, 5)));
    }

    #[test]
    fn test_window_overlap_inclusive() {
        let a = DateWindow::new(date(2025, 3, 5), date(2025, 3, 10));
        let b = DateWindow::new(date(2025, 3, 10), date(2025, 3, 12));
        let c = DateWindow::new(date(2025, 3, 11), date(2025, 3, 12));

        assert!(a.overlaps(&a));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_display() {
        let target = TargetMonth::from_offset(date(2025, 1, 15), 2);
        assert_eq!(target.to_string(), "2025-03");
    }
}

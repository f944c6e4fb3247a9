//! Holiday-based task generator
//!
//! For every configured route the generator looks up holidays in the target
//! month, turns each one into a travel window with [`HolidayWindowRules`] and
//! drops windows already covered by a fixed-month task on the same route.

use chrono::{Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::calendar::{Holiday, HolidayCalendar};
use super::{DateWindow, TargetMonth};
use crate::config::HolidayTasksConfig;
use crate::error::Result;
use crate::models::{Route, TaskParameters};

/// Day offsets from the holiday date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowOffsets {
    pub depart_offset_days: i64,
    pub return_offset_days: i64,
}

impl WindowOffsets {
    pub const fn new(depart_offset_days: i64, return_offset_days: i64) -> Self {
        Self {
            depart_offset_days,
            return_offset_days,
        }
    }
}

/// Offsets applied to holidays on a weekday, optionally only for one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRule {
    pub weekday: Weekday,
    #[serde(default)]
    pub label: Option<String>,
    pub depart_offset_days: i64,
    pub return_offset_days: i64,
}

impl WindowRule {
    fn offsets(&self) -> WindowOffsets {
        WindowOffsets::new(self.depart_offset_days, self.return_offset_days)
    }

    fn matches_label(&self, name: &str) -> bool {
        self.label
            .as_deref()
            .is_some_and(|label| label.trim().eq_ignore_ascii_case(name.trim()))
    }
}

/// Weekday-keyed table mapping a holiday to a depart/return window
///
/// Lookup order: a rule with matching label and weekday, then a rule with
/// matching weekday and no label, then `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HolidayWindowRules {
    /// Use the window suggested by the calendar source when it has one
    pub prefer_suggested: bool,
    pub default: WindowOffsets,
    pub rules: Vec<WindowRule>,
}

impl Default for HolidayWindowRules {
    fn default() -> Self {
        let rule = |weekday, depart, ret| WindowRule {
            weekday,
            label: None,
            depart_offset_days: depart,
            return_offset_days: ret,
        };

        Self {
            prefer_suggested: true,
            default: WindowOffsets::new(-1, 1),
            rules: vec![
                // Long weekend leaving the Friday before
                rule(Weekday::Mon, -3, 0),
                rule(Weekday::Tue, -4, 0),
                rule(Weekday::Wed, 0, 4),
                rule(Weekday::Thu, -4, 0),
                rule(Weekday::Fri, 0, 2),
                rule(Weekday::Sat, -1, 1),
                rule(Weekday::Sun, -2, 0),
            ],
        }
    }
}

impl HolidayWindowRules {
    /// Offsets for a holiday
    pub fn offsets_for(&self, holiday: &Holiday) -> WindowOffsets {
        let weekday = holiday.weekday();

        self.rules
            .iter()
            .find(|r| r.weekday == weekday && r.matches_label(&holiday.name))
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|r| r.weekday == weekday && r.label.is_none())
            })
            .map(WindowRule::offsets)
            .unwrap_or(self.default)
    }

    /// Travel window for a holiday, `None` if the offsets produce a return
    /// before the departure
    pub fn window_for(&self, holiday: &Holiday) -> Option<DateWindow> {
        if self.prefer_suggested {
            if let (Some(depart), Some(ret)) = (holiday.suggested_depart, holiday.suggested_return)
            {
                return (ret >= depart).then_some(DateWindow::new(depart, ret));
            }
        }

        let offsets = self.offsets_for(holiday);
        let depart = holiday
            .date
            .checked_add_signed(Duration::days(offsets.depart_offset_days))?;
        let ret = holiday
            .date
            .checked_add_signed(Duration::days(offsets.return_offset_days))?;

        (ret >= depart).then_some(DateWindow::new(depart, ret))
    }
}

/// Whether a holiday window on `route` overlaps any fixed-month task for the
/// same route
pub fn is_skip_holiday(route: &Route, window: &DateWindow, fixed_tasks: &[TaskParameters]) -> bool {
    let key = route.key();

    fixed_tasks.iter().any(|task| {
        task.route.key() == key && {
            let fixed = DateWindow::new(
                task.depart_date,
                task.return_date.unwrap_or(task.depart_date),
            );
            fixed.overlaps(window)
        }
    })
}

/// Generates round-trip tasks around holidays
pub struct HolidayGenerator<'a> {
    config: &'a HolidayTasksConfig,
}

impl<'a> HolidayGenerator<'a> {
    pub fn new(config: &'a HolidayTasksConfig) -> Self {
        Self { config }
    }

    /// Generate tasks for `today`, skipping windows covered by `fixed_tasks`
    pub async fn generate<C>(
        &self,
        calendar: &C,
        fixed_tasks: &[TaskParameters],
        today: NaiveDate,
    ) -> Result<Vec<TaskParameters>>
    where
        C: HolidayCalendar + ?Sized,
    {
        let mut by_month: HashMap<TargetMonth, Vec<Holiday>> = HashMap::new();
        let mut seen: HashSet<((String, String), DateWindow)> = HashSet::new();
        let mut tasks = Vec::new();

        for template in &self.config.routes {
            if template.month_offset == 0 {
                continue;
            }

            let target = TargetMonth::from_offset(today, template.month_offset);
            if !by_month.contains_key(&target) {
                let holidays = calendar.holidays(target).await?;
                by_month.insert(target, holidays);
            }
            let holidays = by_month.get(&target).map(Vec::as_slice).unwrap_or_default();

            for holiday in holidays {
                let Some(window) = self.config.rules.window_for(holiday) else {
                    debug!(holiday = %holiday.name, "Holiday rule produced no window");
                    continue;
                };

                if is_skip_holiday(&template.route, &window, fixed_tasks) {
                    info!(
                        route = %template.route,
                        holiday = %holiday.name,
                        depart = %window.depart,
                        "Holiday window overlaps a fixed-month task, skipping"
                    );
                    continue;
                }

                if !seen.insert((template.route.key(), window)) {
                    continue;
                }

                let mut task =
                    TaskParameters::round_trip(template.route.clone(), window.depart, window.ret)
                        .with_systems(template.systems.clone());
                if let Some(flight_number) = &template.flight_number {
                    task = task.with_flight_number(flight_number);
                }
                task.name = format!(
                    "{} {} {} depart {} return",
                    template
                        .name
                        .clone()
                        .unwrap_or_else(|| format!(
                            "{} to {}",
                            template.route.from_city, template.route.to_city
                        )),
                    holiday.name,
                    window.depart,
                    window.ret
                );

                tasks.push(task);
            }
        }

        Ok(tasks)
    }
}

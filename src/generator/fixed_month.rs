//! Fixed-month task generator

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{DateWindow, TargetMonth};
use crate::config::FixedMonthTaskConfig;
use crate::models::TaskParameters;

/// Builds one round-trip task per template: depart and return on fixed days
/// of the month `month_offset` months from today
pub struct FixedMonthGenerator<'a> {
    templates: &'a [FixedMonthTaskConfig],
}

impl<'a> FixedMonthGenerator<'a> {
    pub fn new(templates: &'a [FixedMonthTaskConfig]) -> Self {
        Self { templates }
    }

    /// Generate dated tasks relative to `today`
    pub fn generate(&self, today: NaiveDate) -> Vec<TaskParameters> {
        self.templates
            .iter()
            .filter_map(|template| {
                let task = build_task(template, today);
                if task.is_none() {
                    warn!(
                        route = %template.route,
                        month_offset = template.month_offset,
                        "Skipping fixed-month template with invalid offset or days"
                    );
                }
                task
            })
            .collect()
    }
}

/// Depart/return window for a template, `None` when the template is invalid
pub fn window_for(template: &FixedMonthTaskConfig, today: NaiveDate) -> Option<DateWindow> {
    if template.month_offset == 0
        || !(1..=31).contains(&template.depart_day)
        || !(1..=31).contains(&template.return_day)
        || template.return_day < template.depart_day
    {
        return None;
    }

    let target = TargetMonth::from_offset(today, template.month_offset);
    let depart = target.clipped_date(template.depart_day)?;
    let ret = target.clipped_date(template.return_day)?;

    Some(DateWindow::new(depart, ret))
}

fn build_task(template: &FixedMonthTaskConfig, today: NaiveDate) -> Option<TaskParameters> {
    let window = window_for(template, today)?;

    let mut task = TaskParameters::round_trip(template.route.clone(), window.depart, window.ret)
        .with_systems(template.systems.clone());

    if let Some(flight_number) = &template.flight_number {
        task = task.with_flight_number(flight_number);
    }

    task.name = match &template.name {
        Some(name) => format!("{} {} -> {}", name, window.depart, window.ret),
        None => format!(
            "{} to {} {} depart {} return",
            template.route.from_city, template.route.to_city, window.depart, window.ret
        ),
    };

    debug!(name = %task.name, "Generated fixed-month task");
    Some(task)
}

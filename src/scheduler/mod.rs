// src/scheduler/mod.rs
//! Cron-driven trigger loop.
//!
//! Expressions are evaluated in UTC. Both the classic five-field form
//! (`minute hour day-of-month month day-of-week`) and the six/seven-field
//! form with a leading seconds column are accepted, as are shorthands such
//! as `@daily`.
//!
//! The five-field form keeps classic cron rules: weekdays are numbered 0-7
//! with Sunday as 0 or 7, and when both day-of-month and day-of-week are
//! restricted a day matching either one fires. The seconds-first form is
//! handed to the `cron` crate as written, with its own numbering and rules.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{BackupError, Result};

pub struct CronScheduler {
    expression: String,
    // Fires on the earliest occurrence of any of these.
    schedules: Vec<Schedule>,
}

impl CronScheduler {
    /// Parses `expression`, failing with [`BackupError::InvalidCron`].
    pub fn new(expression: &str) -> Result<Self> {
        let invalid = |reason: String| BackupError::InvalidCron {
            expr: expression.to_string(),
            reason,
        };

        let schedules = normalize_expression(expression)
            .map_err(|reason| invalid(reason))?
            .iter()
            .map(|normalized| Schedule::from_str(normalized).map_err(|e| invalid(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedules,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&after).next())
            .min()
    }

    /// Spawns the trigger loop. Every occurrence runs `job` in its own task,
    /// so a slow run does not delay the next trigger and runs may overlap.
    pub fn start<F, Fut>(self, job: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut last_fired: Option<DateTime<Utc>> = None;

            loop {
                let now = Utc::now();
                let from = match last_fired {
                    Some(last) if last > now => last,
                    _ => now,
                };
                let Some(next) = self.next_after(from) else {
                    warn!("Cron expression '{}' has no further occurrences, scheduler stopping", self.expression);
                    break;
                };

                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!("Next backup at {} (in {:?})", next, wait);
                tokio::time::sleep(wait).await;

                info!("Cron trigger fired for {}", next);
                last_fired = Some(next);
                tokio::spawn(job());
            }
        })
    }
}

/// Converts the classic five-field form into one or two seconds-first
/// expressions for the `cron` crate. Other forms pass through untouched.
///
/// The crate requires day-of-month and day-of-week to both match, so a
/// classic expression restricting both is split into one schedule per field.
fn normalize_expression(expression: &str) -> std::result::Result<Vec<String>, String> {
    let expression = expression.trim();
    if expression.starts_with('@') {
        return Ok(vec![expression.to_string()]);
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    let [minute, hour, day_of_month, month, day_of_week] = fields[..] else {
        return Ok(vec![fields.join(" ")]);
    };

    let day_of_week = shift_weekdays(day_of_week)?;
    if is_unrestricted(day_of_month) || is_unrestricted(&day_of_week) {
        return Ok(vec![format!(
            "0 {} {} {} {} {}",
            minute, hour, day_of_month, month, day_of_week
        )]);
    }

    Ok(vec![
        format!("0 {} {} {} {} *", minute, hour, day_of_month, month),
        format!("0 {} {} * {} {}", minute, hour, month, day_of_week),
    ])
}

fn is_unrestricted(field: &str) -> bool {
    field == "*" || field == "?"
}

/// Classic cron numbers weekdays 0-7 with Sunday as 0 or 7; the `cron`
/// crate uses 1-7 with Sunday as 1. Numeric items are expanded to an
/// explicit day list, so ranges and steps keep their classic meaning.
/// Names like `MON` and `*` items are left alone.
fn shift_weekdays(field: &str) -> std::result::Result<String, String> {
    let mut days = BTreeSet::new();
    let mut kept = Vec::new();

    for item in field.split(',') {
        match classic_weekdays(item)? {
            Some(classic) => days.extend(classic.into_iter().map(|day| day % 7 + 1)),
            None => kept.push(item.to_string()),
        }
    }

    let mut items: Vec<String> = days.iter().map(u8::to_string).collect();
    items.extend(kept);
    Ok(items.join(","))
}

/// Expands a numeric day-of-week item (`3`, `1-5`, `5-7/2`, `1/2`) into
/// classic day numbers. `None` means the item is not numeric.
fn classic_weekdays(item: &str) -> std::result::Result<Option<Vec<u8>>, String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    let (start, end) = match base.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (base, None),
    };

    let Ok(start) = start.parse::<u8>() else {
        return Ok(None);
    };
    let end = match end {
        Some(end) => end
            .parse::<u8>()
            .map_err(|_| format!("invalid day-of-week range '{}'", item))?,
        // "N/step" runs to Saturday.
        None if step.is_some() => 6,
        None => start,
    };
    let step = match step {
        Some(step) => step
            .parse::<usize>()
            .ok()
            .filter(|step| *step > 0)
            .ok_or_else(|| format!("invalid day-of-week step '{}'", item))?,
        None => 1,
    };

    if end > 7 || start > end {
        return Err(format!("day-of-week '{}' is outside 0-7", item));
    }
    Ok(Some((start..=end).step_by(step).collect()))
}

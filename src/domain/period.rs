use crate::utils::error::{BatchError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const MONTHS_PER_YEAR: u32 = 12;

/// One calendar month of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=MONTHS_PER_YEAR).contains(&month) {
            return Err(BatchError::InvalidConfigValueError {
                field: "month".to_string(),
                value: month.to_string(),
                reason: "Month must be 1-12".to_string(),
            });
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(BatchError::InvalidConfigValueError {
                field: "year".to_string(),
                value: year.to_string(),
                reason: "Year is outside the supported calendar".to_string(),
            });
        }
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> NaiveDate {
        // Both fields are checked in `new`, and the window only yields valid ones.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        let next = if self.month == MONTHS_PER_YEAR {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        next.and_then(|d| d.pred_opt()).unwrap_or(first)
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    /// Start and end dates in the `MM-DD-YYYY` form AppEEARS expects.
    pub fn date_range_mmddyyyy(&self) -> (String, String) {
        (
            self.first_day().format("%m-%d-%Y").to_string(),
            self.last_day().format("%m-%d-%Y").to_string(),
        )
    }

    pub fn task_name(&self, layer: &str) -> String {
        format!("ECOSTRESS_{}_{}_{:02}", layer, self.year, self.month)
    }

    /// Hive-style partition, `year=YYYY/month=MM`.
    pub fn partition_key(&self) -> String {
        format!("year={}/month={:02}", self.year, self.month)
    }

    pub fn partition_dir(&self, base: &Path) -> PathBuf {
        base.join(self.partition_key())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// A fixed run of whole years, addressed by 1-based scheduler array task ids.
///
/// Task `t` maps to year `start_year + (t-1)/12` and month `(t-1)%12 + 1`, so
/// the mapping is a bijection between `1..=12*years` and the window's months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start_year: i32,
    pub years: u32,
}

impl PeriodWindow {
    pub fn new(start_year: i32, years: u32) -> Result<Self> {
        if years == 0 {
            return Err(BatchError::InvalidConfigValueError {
                field: "window.years".to_string(),
                value: years.to_string(),
                reason: "Window must span at least one year".to_string(),
            });
        }
        let too_long = || BatchError::InvalidConfigValueError {
            field: "window.years".to_string(),
            value: years.to_string(),
            reason: format!("Window starting {} is too long", start_year),
        };
        years.checked_mul(MONTHS_PER_YEAR).ok_or_else(too_long)?;
        let end_year = i32::try_from(years)
            .ok()
            .and_then(|y| start_year.checked_add(y - 1))
            .ok_or_else(too_long)?;

        // Reject windows whose last month would not be a valid calendar date.
        Period::new(start_year, 1)?;
        Period::new(end_year, MONTHS_PER_YEAR)?;
        Ok(Self { start_year, years })
    }

    pub fn task_count(&self) -> u32 {
        self.years * MONTHS_PER_YEAR
    }

    pub fn end_year(&self) -> i32 {
        self.start_year + (self.years as i32 - 1)
    }

    pub fn period_for_task(&self, task_id: u32) -> Result<Period> {
        let max = self.task_count();
        if task_id == 0 || task_id > max {
            return Err(BatchError::TaskOutOfRange { task_id, max });
        }
        let offset = task_id - 1;
        Ok(Period {
            year: self.start_year + (offset / MONTHS_PER_YEAR) as i32,
            month: offset % MONTHS_PER_YEAR + 1,
        })
    }

    pub fn task_for_period(&self, period: Period) -> Result<u32> {
        let period = Period::new(period.year, period.month)?;
        if period.year < self.start_year || period.year > self.end_year() {
            return Err(BatchError::InvalidConfigValueError {
                field: "period".to_string(),
                value: period.to_string(),
                reason: format!(
                    "Outside the window {}-{}",
                    self.start_year,
                    self.end_year()
                ),
            });
        }
        let years_in = (period.year - self.start_year) as u32;
        Ok(years_in * MONTHS_PER_YEAR + period.month)
    }

    pub fn periods(&self) -> impl Iterator<Item = Period> {
        let window = *self;
        (1..=window.task_count()).filter_map(move |t| window.period_for_task(t).ok())
    }

    /// Value for the scheduler's `--array` directive.
    pub fn array_range(&self) -> String {
        format!("1-{}", self.task_count())
    }
}

//! Reporting window and the file names derived from it.
//!
//! The window is always the calendar month before the run date. Monthly data
//! covers the whole month; daily XML files are only pulled for the final
//! stretch of the month, starting at [`FIRST_DAILY_DAY`].

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use chrono_tz::America::Toronto;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FIRST_DAILY_DAY: u32 = 22;
pub const HOURS_PER_DAY: u32 = 24;

const MONTHLY_PREFIX: &str = "PUB_GenOutputCapabilityMonth_";
const INTERTIE_PREFIX: &str = "PUB_IntertieScheduleFlow_";
const LOAD_PREFIX: &str = "PUB_DAConstTotals_";
const TRANSFORMED_PREFIX: &str = "transformed_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid reporting month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyFileNames {
    pub intertie: Vec<String>,
    pub load: Vec<String>,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyFilePair {
    pub date: NaiveDate,
    pub intertie: String,
    pub load: String,
}

/// Calendar month immediately before the month containing `today`.
pub fn last_reporting_month(today: NaiveDate) -> (i32, u32) {
    if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    }
}

impl ReportingWindow {
    pub fn from_year_month(year: i32, month: u32) -> Result<Self, WindowError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(WindowError::InvalidMonth { year, month })?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(WindowError::InvalidMonth { year, month })?;
        let days_in_month = next.signed_duration_since(first).num_days() as u32;

        Ok(Self {
            year,
            month,
            days_in_month,
        })
    }

    pub fn for_run_date(today: NaiveDate) -> Self {
        let (year, month) = last_reporting_month(today);
        // The day before the first of `today`'s month closes the reporting month.
        let closing_day = today - ChronoDuration::days(i64::from(today.day()));
        debug_assert_eq!((closing_day.year(), closing_day.month()), (year, month));

        Self {
            year,
            month,
            days_in_month: closing_day.day(),
        }
    }

    /// Window for the current date as seen in the grid operator's time zone.
    pub fn current() -> Self {
        let today = Utc::now().with_timezone(&Toronto).date_naive();
        Self::for_run_date(today)
    }

    /// `<YYYY><MM>` token shared by every file name of the window.
    pub fn period_token(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    pub fn monthly_file_name(&self) -> String {
        format!("{MONTHLY_PREFIX}{}.csv", self.period_token())
    }

    pub fn transformed_monthly_file_name(&self) -> String {
        transformed_file_name(&self.monthly_file_name())
    }

    pub fn window_output_file_name(&self) -> String {
        format!(
            "{TRANSFORMED_PREFIX}intertie_load_{}.csv",
            self.period_token()
        )
    }

    pub fn daily_dates(&self) -> Vec<NaiveDate> {
        (FIRST_DAILY_DAY..=self.days_in_month)
            .filter_map(|day| NaiveDate::from_ymd_opt(self.year, self.month, day))
            .collect()
    }

    pub fn daily_file_names(&self) -> DailyFileNames {
        let period = self.period_token();
        let days = FIRST_DAILY_DAY..=self.days_in_month;

        DailyFileNames {
            intertie: days
                .clone()
                .map(|day| format!("{INTERTIE_PREFIX}{period}{day:02}.xml"))
                .collect(),
            load: days
                .map(|day| format!("{LOAD_PREFIX}{period}{day:02}.xml"))
                .collect(),
            year: self.year,
            month: self.month,
        }
    }

    pub fn daily_pairs(&self) -> Vec<DailyFilePair> {
        let names = self.daily_file_names();
        self.daily_dates()
            .into_iter()
            .zip(names.intertie)
            .zip(names.load)
            .map(|((date, intertie), load)| DailyFilePair {
                date,
                intertie,
                load,
            })
            .collect()
    }
}

pub fn transformed_file_name(original: &str) -> String {
    format!("{TRANSFORMED_PREFIX}{original}")
}

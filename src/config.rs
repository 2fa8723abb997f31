//! Run configuration read from the environment.

use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::daily_merge::MergeConfig;
use crate::observability::parse_bool;

pub const DATA_ROOT_ENV: &str = "ONTARIO_ENERGY_DATA_ROOT";
pub const RUN_DATE_ENV: &str = "ONTARIO_ENERGY_RUN_DATE";
pub const DAY_FAILURE_POLICY_ENV: &str = "ONTARIO_ENERGY_DAY_FAILURE_POLICY";
pub const FILL_MISSING_ZERO_ENV: &str = "ONTARIO_ENERGY_FILL_MISSING_ZERO";

const MONTHLY_DIR: &str = "output";
const DAILY_DIR: &str = "intertie_load";

/// What a day whose files fail to extract or merge does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayFailurePolicy {
    #[default]
    AbortRun,
    SkipDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_root: PathBuf,
    /// Replaces the clock when picking the reporting window.
    pub run_date: Option<NaiveDate>,
    pub day_failure_policy: DayFailurePolicy,
    pub merge: MergeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            run_date: None,
            day_failure_policy: DayFailurePolicy::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Monthly wide CSV in, long CSV out.
    pub fn monthly_dir(&self) -> PathBuf {
        self.data_root.join(MONTHLY_DIR)
    }

    /// Daily XML documents in, window table out.
    pub fn daily_dir(&self) -> PathBuf {
        self.data_root.join(DAILY_DIR)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ONTARIO_ENERGY_RUN_DATE must be YYYY-MM-DD, got '{0}'")]
    InvalidRunDate(String),
}

pub fn pipeline_config_from_env() -> Result<PipelineConfig, ConfigError> {
    let mut config = PipelineConfig::default();

    if let Ok(root) = env::var(DATA_ROOT_ENV) {
        let trimmed = root.trim();
        if !trimmed.is_empty() {
            config.data_root = PathBuf::from(trimmed);
        }
    }

    if let Ok(run_date) = env::var(RUN_DATE_ENV) {
        let trimmed = run_date.trim();
        if !trimmed.is_empty() {
            let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map_err(|_| ConfigError::InvalidRunDate(trimmed.to_string()))?;
            config.run_date = Some(parsed);
        }
    }

    if let Ok(policy) = env::var(DAY_FAILURE_POLICY_ENV) {
        if let Some(parsed) = parse_day_failure_policy(&policy) {
            config.day_failure_policy = parsed;
        }
    }

    if let Ok(fill) = env::var(FILL_MISSING_ZERO_ENV) {
        if let Some(parsed) = parse_bool(&fill) {
            config.merge.fill_missing_with_zero = parsed;
        }
    }

    Ok(config)
}

fn parse_day_failure_policy(raw: &str) -> Option<DayFailurePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "abort" | "abort_run" => Some(DayFailurePolicy::AbortRun),
        "skip" | "skip_day" => Some(DayFailurePolicy::SkipDay),
        _ => None,
    }
}

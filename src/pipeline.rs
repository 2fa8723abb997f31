//! One run over a reporting window: validation gates, then the monthly and
//! daily branches.
//!
//! A failed check halts only its own branch and is reported in the
//! [`RunReport`]. Hard errors (unreadable data after validation, write
//! failures, a broken day under [`DayFailurePolicy::AbortRun`]) end the run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::OutputArtifact;
use crate::config::{DayFailurePolicy, PipelineConfig};
use crate::daily_merge::{
    concat_days, merge_day_files, write_window_table, DayMergeStats, MergeError,
};
use crate::reshape::{transform_output_file, ReshapeError, ReshapeStats};
use crate::validation::{
    check_intertie_files, check_load_files, check_output_columns, CheckReport,
};
use crate::window::ReportingWindow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchOutcome<S> {
    Completed { artifact: OutputArtifact, stats: S },
    Halted { checks: Vec<CheckReport> },
}

impl<S> BranchOutcome<S> {
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }

    pub fn artifact(&self) -> Option<&OutputArtifact> {
        match self {
            Self::Completed { artifact, .. } => Some(artifact),
            Self::Halted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowMergeStats {
    pub days: Vec<DayMergeStats>,
    pub skipped_days: Vec<SkippedDay>,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub window: ReportingWindow,
    pub monthly: BranchOutcome<ReshapeStats>,
    pub intertie_load: BranchOutcome<WindowMergeStats>,
}

impl RunReport {
    pub fn any_halted(&self) -> bool {
        self.monthly.is_halted() || self.intertie_load.is_halted()
    }

    /// Rendered failures of every halted check, one per line.
    pub fn failure_lines(&self) -> Vec<String> {
        let monthly: &[CheckReport] = match &self.monthly {
            BranchOutcome::Halted { checks } => checks.as_slice(),
            BranchOutcome::Completed { .. } => &[],
        };
        let daily: &[CheckReport] = match &self.intertie_load {
            BranchOutcome::Halted { checks } => checks.as_slice(),
            BranchOutcome::Completed { .. } => &[],
        };
        monthly
            .iter()
            .chain(daily)
            .flat_map(|report| report.failures.iter().map(ToString::to_string))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("monthly transform failed: {0}")]
    Reshape(#[from] ReshapeError),
    #[error("day {date} failed: {source}")]
    Day {
        date: NaiveDate,
        #[source]
        source: MergeError,
    },
    #[error("window table failed: {0}")]
    WindowTable(#[source] MergeError),
}

pub fn run_pipeline(
    window: &ReportingWindow,
    config: &PipelineConfig,
) -> Result<RunReport, PipelineError> {
    info!(
        component = "pipeline",
        event = "pipeline.start",
        year = window.year,
        month = window.month,
        data_root = %config.data_root.display(),
        day_failure_policy = ?config.day_failure_policy
    );

    let monthly = run_monthly_branch(window, config)?;
    let intertie_load = run_intertie_load_branch(window, config)?;
    let report = RunReport {
        window: *window,
        monthly,
        intertie_load,
    };

    info!(
        component = "pipeline",
        event = "pipeline.finish",
        monthly_halted = report.monthly.is_halted(),
        intertie_load_halted = report.intertie_load.is_halted()
    );
    Ok(report)
}

pub fn run_monthly_branch(
    window: &ReportingWindow,
    config: &PipelineConfig,
) -> Result<BranchOutcome<ReshapeStats>, PipelineError> {
    let dir = config.monthly_dir();
    let input = dir.join(window.monthly_file_name());

    let check = check_output_columns(&input);
    if !check.passed() {
        log_halted("monthly", &[&check]);
        return Ok(BranchOutcome::Halted {
            checks: vec![check],
        });
    }

    let output = dir.join(window.transformed_monthly_file_name());
    let (artifact, stats) = transform_output_file(&input, &output)?;
    Ok(BranchOutcome::Completed { artifact, stats })
}

pub fn run_intertie_load_branch(
    window: &ReportingWindow,
    config: &PipelineConfig,
) -> Result<BranchOutcome<WindowMergeStats>, PipelineError> {
    let dir = config.daily_dir();
    let names = window.daily_file_names();

    let intertie_check = check_intertie_files(&dir, &names.intertie);
    let load_check = check_load_files(&dir, &names.load);
    if !intertie_check.passed() || !load_check.passed() {
        log_halted("intertie_load", &[&intertie_check, &load_check]);
        let checks = [intertie_check, load_check]
            .into_iter()
            .filter(|check| !check.passed())
            .collect();
        return Ok(BranchOutcome::Halted { checks });
    }

    let mut merged = BTreeMap::new();
    let mut stats = WindowMergeStats::default();
    for pair in window.daily_pairs() {
        match merge_day_files(&dir.join(&pair.intertie), &dir.join(&pair.load), &config.merge) {
            Ok(day) => {
                merged.insert(pair.date, day);
            }
            Err(source) => match config.day_failure_policy {
                DayFailurePolicy::AbortRun => {
                    return Err(PipelineError::Day {
                        date: pair.date,
                        source,
                    })
                }
                DayFailurePolicy::SkipDay => {
                    warn!(
                        component = "pipeline",
                        event = "pipeline.day.skipped",
                        date = %pair.date,
                        error = %source
                    );
                    stats.skipped_days.push(SkippedDay {
                        date: pair.date,
                        reason: source.to_string(),
                    });
                }
            },
        }
    }

    stats.days = merged.values().map(|day| day.stats.clone()).collect();
    let records = concat_days(merged);
    let output = dir.join(window.window_output_file_name());
    let artifact = write_window_table(&output, &records).map_err(PipelineError::WindowTable)?;
    stats.rows = artifact.rows;

    Ok(BranchOutcome::Completed { artifact, stats })
}

fn log_halted(branch: &str, checks: &[&CheckReport]) {
    let failures: usize = checks.iter().map(|check| check.failures.len()).sum();
    warn!(
        component = "pipeline",
        event = "pipeline.branch.halted",
        branch,
        failures
    );
}

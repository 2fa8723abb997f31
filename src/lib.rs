//! Ontario grid-report transform crate.
//!
//! Current implemented scope:
//! - reporting window and expected file names for the prior month
//! - schema gates for the monthly CSV and the daily XML documents
//! - wide-to-long reshape of the monthly generator output/capability report
//! - intertie/load extraction, daily merge and window concatenation
//! - run driver with per-branch halting and a serializable run report

mod artifacts;
mod config;
mod daily_merge;
mod extract;
mod observability;
mod pipeline;
mod report_xml;
mod reshape;
mod validation;
mod window;

pub use artifacts::{
    file_sha256_hex, write_csv_atomic, ArtifactError, OutputArtifact, DATE_TIME_FORMAT,
};
pub use config::{
    pipeline_config_from_env, ConfigError, DayFailurePolicy, PipelineConfig, DATA_ROOT_ENV,
    DAY_FAILURE_POLICY_ENV, FILL_MISSING_ZERO_ENV, RUN_DATE_ENV,
};
pub use daily_merge::{
    concat_days, date_from_file_name, merge_day, merge_day_files, write_window_table, DayMerge,
    DayMergeStats, IntertieLoadRecord, MergeConfig, MergeError, WINDOW_HEADERS,
};
pub use extract::{
    extract_intertie, extract_intertie_file, extract_load, extract_load_file, ExtractError,
    IntertieField, IntertieHourRecord, IntertieLayout, LoadHourRecord, LoadLayout, LoadQuantity,
    INTERTIE_LAYOUT, INTERTIE_NAMESPACE, LOAD_LAYOUT, LOAD_NAMESPACE,
};
pub use observability::{
    init_logging, log_run_start, log_window_selected, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError, LOG_FORMAT_ENV, LOG_LEVEL_ENV, LOG_TARGET_ENV,
};
pub use pipeline::{
    run_intertie_load_branch, run_monthly_branch, run_pipeline, BranchOutcome, PipelineError,
    RunReport, SkippedDay, WindowMergeStats,
};
pub use report_xml::{parse_document, read_document, NodePath, XmlElement, XmlError};
pub use reshape::{
    canonical_output_columns, hour_column_name, parse_hour_label, reshape_output_csv,
    strip_preamble, transform_output_file, Measurement, MeasurementValues, OutputRecord,
    ReshapeError, ReshapeStats, OUTPUT_COLUMN_COUNT, OUTPUT_HEADERS, OUTPUT_PREAMBLE_ROWS,
};
pub use validation::{
    check_intertie_files, check_load_files, check_output_columns, check_output_header,
    missing_intertie_fields, missing_load_quantities, CheckFailure, CheckKind, CheckReport,
    FailureReason,
};
pub use window::{
    last_reporting_month, transformed_file_name, DailyFileNames, DailyFilePair, ReportingWindow,
    WindowError, FIRST_DAILY_DAY, HOURS_PER_DAY,
};

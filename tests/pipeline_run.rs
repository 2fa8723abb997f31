mod support;

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use ontario_energy::{
    merge_day_files, run_intertie_load_branch, run_pipeline, BranchOutcome, DayFailurePolicy,
    MergeConfig, MergeError, PipelineConfig, PipelineError, ReportingWindow, WINDOW_HEADERS,
};
use support::{all_hours, intertie_xml, load_xml, monthly_csv, write_file, WideRow};
use tempfile::tempdir;

/// February 2024 (leap year): daily files for the 22nd through the 29th.
fn february() -> ReportingWindow {
    ReportingWindow::for_run_date(NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid run date"))
}

fn config(root: &Path, policy: DayFailurePolicy) -> PipelineConfig {
    PipelineConfig {
        data_root: root.to_path_buf(),
        day_failure_policy: policy,
        ..PipelineConfig::default()
    }
}

fn seed_daily_files(cfg: &PipelineConfig, window: &ReportingWindow) {
    for pair in window.daily_pairs() {
        let hours = all_hours();
        write_file(
            &cfg.daily_dir().join(&pair.intertie),
            &intertie_xml(pair.date, &hours),
        );
        write_file(&cfg.daily_dir().join(&pair.load), &load_xml(pair.date, &hours));
    }
}

fn seed_monthly_file(cfg: &PipelineConfig, window: &ReportingWindow) {
    let report = monthly_csv(&[
        WideRow {
            date: "2024-02-01",
            generator: "BRUCE-A-G1",
            fuel_type: "NUCLEAR",
            measurement: "Output",
            hours: &[(1, "750")],
        },
        WideRow {
            date: "2024-02-01",
            generator: "BRUCE-A-G1",
            fuel_type: "NUCLEAR",
            measurement: "Capability",
            hours: &[(1, "1500")],
        },
    ]);
    write_file(&cfg.monthly_dir().join(window.monthly_file_name()), &report);
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<csv::StringRecord>) {
    let body = fs::read_to_string(path).expect("window table should exist");
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .expect("header should parse")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("rows should parse");
    (headers, rows)
}

#[test]
fn full_run_produces_both_outputs() {
    let temp = tempdir().expect("temp dir should be created");
    let window = february();
    let cfg = config(temp.path(), DayFailurePolicy::AbortRun);
    seed_monthly_file(&cfg, &window);
    seed_daily_files(&cfg, &window);

    let report = run_pipeline(&window, &cfg).expect("run should succeed");

    assert!(!report.any_halted());
    let monthly = report.monthly.artifact().expect("monthly branch should complete");
    assert_eq!(monthly.rows, 1);
    assert!(monthly
        .path
        .ends_with("output/transformed_PUB_GenOutputCapabilityMonth_202402.csv"));

    let BranchOutcome::Completed { artifact, stats } = &report.intertie_load else {
        panic!("daily branch should complete");
    };
    assert_eq!(stats.days.len(), 8);
    assert_eq!(stats.rows, 24 * 8);
    assert!(artifact
        .path
        .ends_with("intertie_load/transformed_intertie_load_202402.csv"));

    let (headers, rows) = read_rows(&artifact.path);
    assert_eq!(headers, WINDOW_HEADERS);
    assert_eq!(rows.len(), 192);
    assert_eq!(&rows[0][5], "2024-02-22 00:00:00");
    assert_eq!(&rows[191][5], "2024-02-29 23:00:00");
    let stamps: Vec<&str> = rows.iter().map(|row| &row[5]).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(rows[0][0].parse::<f64>().ok(), Some(1001.0));
    assert_eq!(rows[0][3].parse::<f64>().ok(), Some(310.2));
}

#[test]
fn short_day_is_padded_to_24_rows() {
    let temp = tempdir().expect("temp dir should be created");
    let date = NaiveDate::from_ymd_opt(2024, 2, 22).expect("valid date");
    let hours: Vec<u32> = (1..=22).collect();
    let intertie = temp.path().join("PUB_IntertieScheduleFlow_20240222.xml");
    let load = temp.path().join("PUB_DAConstTotals_20240222.xml");
    write_file(&intertie, &intertie_xml(date, &hours));
    write_file(&load, &load_xml(date, &hours));

    let day = merge_day_files(&intertie, &load, &MergeConfig::default())
        .expect("day should merge");

    assert_eq!(day.date, date);
    assert_eq!(day.records.len(), 24);
    assert_eq!(day.stats.placeholder_offsets, vec![22, 23]);
    assert_eq!(day.records[23].import, None);
    assert_eq!(day.records[23].total_load, None);
}

#[test]
fn broken_day_aborts_run_by_default() {
    let temp = tempdir().expect("temp dir should be created");
    let window = february();
    let cfg = config(temp.path(), DayFailurePolicy::AbortRun);
    seed_daily_files(&cfg, &window);
    let broken = NaiveDate::from_ymd_opt(2024, 2, 25).expect("valid date");
    write_file(
        &cfg.daily_dir().join("PUB_IntertieScheduleFlow_20240225.xml"),
        &intertie_xml(broken, &[1, 2, 2, 3]),
    );

    let err = run_intertie_load_branch(&window, &cfg).expect_err("duplicate hour should abort");

    match err {
        PipelineError::Day { date, source } => {
            assert_eq!(date, broken);
            assert!(matches!(source, MergeError::DuplicateHour { hour: 2, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!cfg
        .daily_dir()
        .join(window.window_output_file_name())
        .exists());
}

#[test]
fn skip_policy_excludes_the_broken_day() {
    let temp = tempdir().expect("temp dir should be created");
    let window = february();
    let cfg = config(temp.path(), DayFailurePolicy::SkipDay);
    seed_daily_files(&cfg, &window);
    let broken = NaiveDate::from_ymd_opt(2024, 2, 25).expect("valid date");
    write_file(
        &cfg.daily_dir().join("PUB_DAConstTotals_20240225.xml"),
        &load_xml(broken, &[1, 25]),
    );

    let outcome = run_intertie_load_branch(&window, &cfg).expect("skip policy should continue");

    let BranchOutcome::Completed { artifact, stats } = outcome else {
        panic!("daily branch should complete");
    };
    assert_eq!(stats.skipped_days.len(), 1);
    assert_eq!(stats.skipped_days[0].date, broken);
    assert_eq!(stats.days.len(), 7);
    assert_eq!(artifact.rows, 24 * 7);

    let (_, rows) = read_rows(&artifact.path);
    assert!(rows.iter().all(|row| !row[5].starts_with("2024-02-25")));
}

#[test]
fn day_with_no_shared_hours_is_never_padded_into_the_table() {
    let temp = tempdir().expect("temp dir should be created");
    let window = february();
    let cfg = config(temp.path(), DayFailurePolicy::SkipDay);
    seed_daily_files(&cfg, &window);
    let date = NaiveDate::from_ymd_opt(2024, 2, 23).expect("valid date");
    let early: Vec<u32> = (1..=12).collect();
    let late: Vec<u32> = (13..=24).collect();
    write_file(
        &cfg.daily_dir().join("PUB_IntertieScheduleFlow_20240223.xml"),
        &intertie_xml(date, &early),
    );
    write_file(
        &cfg.daily_dir().join("PUB_DAConstTotals_20240223.xml"),
        &load_xml(date, &late),
    );

    let outcome = run_intertie_load_branch(&window, &cfg).expect("skip policy should continue");

    let BranchOutcome::Completed { artifact, stats } = outcome else {
        panic!("daily branch should complete");
    };
    assert_eq!(stats.skipped_days.len(), 1);
    assert_eq!(stats.skipped_days[0].date, date);
    assert!(stats.skipped_days[0].reason.contains("share no delivery hour"));
    assert_eq!(artifact.rows, 24 * 7);

    let abort = config(temp.path(), DayFailurePolicy::AbortRun);
    match run_intertie_load_branch(&window, &abort).expect_err("abort policy should fail") {
        PipelineError::Day { date: failed, source } => {
            assert_eq!(failed, date);
            assert!(matches!(source, MergeError::NoMatchingHours { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_check_halts_only_its_branch() {
    let temp = tempdir().expect("temp dir should be created");
    let window = february();
    let cfg = config(temp.path(), DayFailurePolicy::AbortRun);
    seed_monthly_file(&cfg, &window);
    seed_daily_files(&cfg, &window);
    fs::remove_file(cfg.daily_dir().join("PUB_DAConstTotals_20240228.xml"))
        .expect("fixture should be removable");

    let report = run_pipeline(&window, &cfg).expect("halt is not an error");

    assert!(report.any_halted());
    assert!(report.monthly.artifact().is_some());
    let BranchOutcome::Halted { checks } = &report.intertie_load else {
        panic!("daily branch should halt");
    };
    assert_eq!(checks.len(), 1);
    assert_eq!(
        report.failure_lines(),
        vec![format!(
            "load_structure failed for PUB_DAConstTotals_20240228.xml: file unavailable ({} does not exist)",
            cfg.daily_dir().join("PUB_DAConstTotals_20240228.xml").display()
        )]
    );
    assert!(!cfg
        .daily_dir()
        .join(window.window_output_file_name())
        .exists());

    let json = serde_json::to_value(&report).expect("report should serialize");
    assert_eq!(json["intertie_load"]["status"], "halted");
    assert_eq!(json["monthly"]["status"], "completed");
    assert_eq!(json["window"]["days_in_month"], 29);
}

#[test]
fn zero_fill_switch_fills_placeholders() {
    let temp = tempdir().expect("temp dir should be created");
    let window = february();
    let mut cfg = config(temp.path(), DayFailurePolicy::AbortRun);
    cfg.merge.fill_missing_with_zero = true;
    seed_daily_files(&cfg, &window);
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date");
    let hours: Vec<u32> = (1..=23).collect();
    write_file(
        &cfg.daily_dir().join("PUB_IntertieScheduleFlow_20240229.xml"),
        &intertie_xml(date, &hours),
    );

    let outcome = run_intertie_load_branch(&window, &cfg).expect("run should succeed");
    let BranchOutcome::Completed { artifact, .. } = outcome else {
        panic!("daily branch should complete");
    };

    let (_, rows) = read_rows(&artifact.path);
    let last = &rows[rows.len() - 1];
    assert_eq!(&last[5], "2024-02-29 23:00:00");
    assert_eq!(last[0].parse::<f64>().ok(), Some(0.0));
    assert_eq!(last[4].parse::<f64>().ok(), Some(0.0));
}

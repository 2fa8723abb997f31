use ontario_energy::{
    init_logging, log_run_start, log_window_selected, logging_config_from_env,
    pipeline_config_from_env, run_pipeline, ReportingWindow,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_run_start("transform_reports", &logging_cfg);

    let cfg = pipeline_config_from_env()?;
    let window = match cfg.run_date {
        Some(run_date) => {
            let window = ReportingWindow::for_run_date(run_date);
            log_window_selected(&window, "override");
            window
        }
        None => {
            let window = ReportingWindow::current();
            log_window_selected(&window, "clock");
            window
        }
    };

    let report = run_pipeline(&window, &cfg)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.any_halted() {
        for line in report.failure_lines() {
            eprintln!("{line}");
        }
        return Err("one or more validation checks failed".into());
    }

    Ok(())
}

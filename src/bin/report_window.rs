use ontario_energy::{pipeline_config_from_env, DailyFileNames, ReportingWindow};
use serde::Serialize;

/// Everything the fetch step needs to know about the window.
#[derive(Serialize)]
struct WindowManifest {
    window: ReportingWindow,
    monthly_file: String,
    transformed_monthly_file: String,
    daily_files: DailyFileNames,
    window_output_file: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = pipeline_config_from_env()?;
    let window = cfg
        .run_date
        .map(ReportingWindow::for_run_date)
        .unwrap_or_else(ReportingWindow::current);

    let manifest = WindowManifest {
        window,
        monthly_file: window.monthly_file_name(),
        transformed_monthly_file: window.transformed_monthly_file_name(),
        daily_files: window.daily_file_names(),
        window_output_file: window.window_output_file_name(),
    };
    println!("{}", serde_json::to_string_pretty(&manifest)?);

    Ok(())
}

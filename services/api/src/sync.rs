use crate::infra::Backend;
use clap::Args;
use leave_desk::config::{AppConfig, ConfigError};
use leave_desk::error::AppError;
use leave_desk::leave::LifecyclePolicy;
use leave_desk::sync::{CsvExportSource, HrSync};
use leave_desk::telemetry;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Default)]
pub(crate) struct SyncArgs {
    /// Directory holding departments.csv, employees.csv and the optional
    /// entitlements.csv / holidays.csv. Defaults to HR_EXPORT_DIR.
    #[arg(long)]
    pub(crate) export_dir: Option<PathBuf>,
}

pub(crate) fn run_sync(args: SyncArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let export_dir = args
        .export_dir
        .or(config.sync.export_dir)
        .ok_or(ConfigError::MissingExportDir)?;

    let backend = Backend::in_memory(LifecyclePolicy::from(&config.leave));
    let source = CsvExportSource::from_dir(&export_dir);
    let report = HrSync::new(backend.store).run(&source)?;

    info!(dir = %source.dir().display(), "hr export imported");

    println!("HR export: {}", export_dir.display());
    println!("  departments applied: {}", report.departments);
    println!(
        "  employees applied:   {} (skipped {})",
        report.employees, report.skipped_employees
    );
    println!(
        "  ledgers applied:     {} (skipped {})",
        report.ledgers, report.skipped_ledgers
    );
    println!("  calendars applied:   {}", report.calendars);
    Ok(())
}

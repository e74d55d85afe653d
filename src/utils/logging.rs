// casesync/src/utils/logging.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Builds the per-run log file name, e.g. `etl_cases_20251018_142501.log`.
pub fn log_file_name(started_at: DateTime<Local>) -> String {
    format!("etl_cases_{}.log", started_at.format("%Y%m%d_%H%M%S"))
}

/// Writes every log line to stdout and to the run's log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.file.flush()
    }
}

/// Installs the process logger. Called once from `main`; the sync logic only
/// uses the `log` macros and runs fine without it.
///
/// Returns the path of the log file created for this run.
pub fn init_logging(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    let log_path = log_dir.join(log_file_name(Local::now()));
    let file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

    let env = env_logger::Env::default().filter_or("LOG_LEVEL", DEFAULT_LOG_LEVEL);
    env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()
        .context("Logger was already initialised")?;

    Ok(log_path)
}

use std::fs::{create_dir_all, File};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::{APP_NAME, ENV_LOG};

lazy_static::lazy_static! {
    static ref LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Send logs to a per-run file under the cache directory, and to stderr
/// when `debug` is set. `LINEAR_LOG` overrides the filter.
pub fn init_logging(debug: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join("logs");

    create_dir_all(&log_dir)?;

    let log_file = log_dir.join(format!("linear-{}.log", Local::now().format("%Y%m%d-%H%M%S")));
    let file = File::create(&log_file)?;

    *LOG_FILE.lock().unwrap_or_else(|p| p.into_inner()) = Some(log_file.clone());

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
    let stderr_layer = debug.then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    tracing::info!("Logging initialized to: {}", log_file.display());

    Ok(())
}

pub fn get_log_file_path() -> Option<PathBuf> {
    LOG_FILE.lock().unwrap_or_else(|p| p.into_inner()).clone()
}

#[allow(deprecated)]
pub fn log_panic_info(info: &std::panic::PanicInfo) {
    let mut message = String::from("PANIC: ");

    if let Some(location) = info.location() {
        message.push_str(&format!(
            "at {}:{}:{} - ",
            location.file(),
            location.line(),
            location.column()
        ));
    }

    if let Some(s) = info.payload().downcast_ref::<&str>() {
        message.push_str(s);
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        message.push_str(s);
    } else {
        message.push_str("Unknown panic payload");
    }

    error!("{}", message);

    let backtrace = std::backtrace::Backtrace::capture();
    tracing::debug!("Backtrace:\n{}", backtrace);
}

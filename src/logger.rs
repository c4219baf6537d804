use std::path::Path;
use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Build the filter for `log_level`, an `EnvFilter` directive such as `"info"`
/// or `"glow=trace"`. `RUST_LOG` wins when it is set.
pub fn log_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Install the global tracing subscriber.
///
/// Without a log file, logs go to stderr so that stdout stays free for the
/// debug output of `print` gadgets. With one, logs go to a daily rolling file
/// next to the given path instead.
pub fn init_tracing(log_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = log_filter(log_level);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file `{}` has no file name", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory `{}`", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, file_name);
            let file_layer = fmt::layer().with_writer(appender).with_ansi(false);
            Registry::default()
                .with(filter)
                .with(file_layer)
                .try_init()
                .context("tracing subscriber already installed")?;
        }
        None => {
            let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
            Registry::default()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .context("tracing subscriber already installed")?;
        }
    }
    Ok(())
}

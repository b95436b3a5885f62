use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialise logging. Without `debug` the level is fixed at `info`; with it
/// the default is `debug` and `RUST_LOG` may override it.
///
/// When `log_file` is given, output is appended to that file instead of
/// stderr. Calling this more than once keeps the first subscriber.
pub fn init(debug: bool, log_file: Option<&Path>) -> Result<()> {
    // Ignore RUST_LOG unless debug logging was asked for, so a stray variable
    // in the user's environment cannot make release output verbose.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let Some(log_file) = log_file else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        return Ok(());
    };

    let directory = log_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .ok_or_else(|| anyhow!("log file path has no file name: {}", log_file.display()))?;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("create log folder {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(appender)
        .try_init();
    Ok(())
}

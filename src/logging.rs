use color_eyre::Result;
use std::path::PathBuf;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

lazy_static::lazy_static! {
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

/// Log file used when no explicit path is given
pub fn default_log_path() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(LOG_FILE.as_str()))
}

/// Initialize logging with custom path and/or level.
///
/// The CLI level wins over `RUST_LOG`; without either, WARN is used. Logs go
/// to a file so they never interleave with the interactive prompt.
pub fn init_with(custom_log_path: Option<PathBuf>, level: Option<tracing::Level>) -> Result<()> {
    let log_path = match custom_log_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            path
        }
        None => default_log_path()?,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.unwrap_or(tracing::Level::WARN).into())
        .from_env_lossy();

    // Open once up front so a bad path surfaces as an error here
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_subscriber = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_named_after_package() {
        assert_eq!(LOG_FILE.as_str(), "showroom.log");
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        assert!(init_with(Some(dir.path().to_path_buf()), None).is_err());
    }
}

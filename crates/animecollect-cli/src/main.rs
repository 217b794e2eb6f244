mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use animecollect_core::config::AppConfig;
use animecollect_core::error::CollectError;
use animecollect_runtime::Runtime;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("animecollect: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = cli.database.clone() {
        config.storage.database_path = Some(path);
    }
    if cli.demo {
        config.catalog.offline_demo = true;
    }

    let _guard = init_logging(&config);

    let rt = match Runtime::open(&config) {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to open runtime: {e}");
            eprintln!("animecollect: {e}");
            return ExitCode::from(exit_status(&e));
        }
    };

    let result = commands::run(&rt, &config, cli.command, cli.json).await;
    if let Err(e) = rt.close().await {
        tracing::warn!("Failed to close database cleanly: {e}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {e}");
            eprintln!("animecollect: {e}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// 2 when the local store itself failed, 1 for anything the user can correct.
fn exit_status(err: &CollectError) -> u8 {
    if err.is_storage_failure() {
        2
    } else {
        1
    }
}

/// Warnings and errors go to stderr; everything the filter admits also goes
/// to a daily log file. The returned guard flushes the file on drop.
fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.general.log_filter))
    };

    let stderr_layer = || fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("animecollect")
        .filename_suffix("log")
        .build(AppConfig::log_dir());

    match file_appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer().with_filter(EnvFilter::new("warn")))
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(filter()),
                )
                .init();
            Some(guard)
        }
        Err(e) => {
            // No file to carry the configured detail, so stderr takes it.
            tracing_subscriber::registry()
                .with(stderr_layer().with_filter(filter()))
                .init();
            tracing::warn!("File logging disabled: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animecollect_core::error::ValidationError;

    #[test]
    fn test_exit_status_separates_storage_failures() {
        assert_eq!(exit_status(&CollectError::StorageUnavailable("DB actor closed".into())), 2);
        assert_eq!(exit_status(&CollectError::Validation(ValidationError::Title)), 1);
        assert_eq!(exit_status(&CollectError::RemoteUnavailable("timeout".into())), 1);
    }
}

//! Tracing subscriber wiring
//!
//! Log lines go to a rolling file; in text mode they are mirrored to stdout.
//! The returned guard owns the background writer and must live as long as
//! the process; dropping it flushes and stops file logging.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// `RUST_LOG` wins when set. Otherwise the configured level applies to the
/// whole crate while sqlx is capped at warn: at info it logs one line per
/// statement and drowns the ledger's own events.
fn build_filter(level: &str) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("{},sqlx=warn,hyper=warn", level)),
    }
}

fn rotation(name: &str) -> Rotation {
    match name {
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let appender =
        RollingFileAppender::new(rotation(&config.rotation), &config.log_dir, &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let registry = tracing_subscriber::registry().with(build_filter(&config.log_level));

    if config.use_json {
        registry
            .with(fmt::layer().json().with_writer(file_writer).with_ansi(false))
            .init();
    } else {
        // plain file copy plus a colored stdout mirror
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(file_writer)
                    .with_ansi(false),
            )
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_names_map_to_schedules() {
        assert_eq!(rotation("hourly"), Rotation::HOURLY);
        assert_eq!(rotation("daily"), Rotation::DAILY);
        assert_eq!(rotation("never"), Rotation::NEVER);
        assert_eq!(rotation(""), Rotation::NEVER);
    }
}

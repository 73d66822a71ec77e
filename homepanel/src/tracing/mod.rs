/*
 *     Copyright 2025 The Homepanel Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use homepanel_core::error::{ErrorType, OrErr};
use homepanel_core::Result;
use rolling_file::*;
use std::fs::{self, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{time::ChronoLocal, Layer},
    prelude::*,
    EnvFilter, Registry,
};

/// init_tracing installs the global subscriber writing to a daily rolling log
/// file, and to stdout in verbose mode. The returned guards flush the writers
/// when dropped, keep them alive until exit.
pub fn init_tracing(
    name: &str,
    log_dir: &Path,
    log_level: Level,
    log_max_files: usize,
    redirect_stderr: bool,
    verbose: bool,
) -> Result<Vec<WorkerGuard>> {
    let mut guards = vec![];

    // Setup stdout layer.
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_filter = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    };
    let stdout_logging_layer = Layer::new()
        .with_writer(stdout_writer)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_timer(ChronoLocal::rfc_3339())
        .pretty()
        .with_filter(stdout_filter);
    guards.push(stdout_guard);

    // Setup file layer.
    fs::create_dir_all(log_dir).or_context(ErrorType::LoggingError, "create log directory")?;
    let rolling_appender = BasicRollingFileAppender::new(
        log_dir.join(name).with_extension("log"),
        RollingConditionBasic::new().daily(),
        log_max_files,
    )
    .or_context(ErrorType::LoggingError, "create rolling file appender")?;

    let (rolling_writer, rolling_writer_guard) = tracing_appender::non_blocking(rolling_appender);
    let file_logging_layer = Layer::new()
        .with_writer(rolling_writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_timer(ChronoLocal::rfc_3339())
        .compact();
    guards.push(rolling_writer_guard);

    // Setup env filter for log level.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(file_logging_layer)
        .with(stdout_logging_layer);
    tracing::subscriber::set_global_default(subscriber)
        .or_context(ErrorType::LoggingError, "set global subscriber")?;

    LogTracer::init().or_context(ErrorType::LoggingError, "init log tracer")?;

    // Log panics through the subscriber.
    std::panic::set_hook(Box::new(tracing_panic::panic_hook));

    info!(
        "tracing initialized directory: {}, level: {}",
        log_dir.display(),
        log_level
    );

    // Redirect stderr to file.
    if redirect_stderr {
        redirect_stderr_to_file(log_dir)?;
    }

    Ok(guards)
}

// Redirect stderr to file.
fn redirect_stderr_to_file(log_dir: &Path) -> Result<()> {
    let log_path = log_dir.join("stderr.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    unsafe {
        libc::dup2(file.as_raw_fd(), libc::STDERR_FILENO);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_tracing_creates_log_file() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("log");

        let guards = init_tracing("hpsampler", &log_dir, Level::INFO, 2, false, false).unwrap();
        assert_eq!(guards.len(), 2);
        drop(guards);

        assert!(log_dir.join("hpsampler.log").exists());
    }
}

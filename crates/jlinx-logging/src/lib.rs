//! Logging setup for the jlinx client
//!
//! # Features
//!
//! - **JSONL Output**: structured JSON lines on the console (default)
//! - **Pretty Output**: human-readable console output for development
//! - **File Output**: JSON lines to a rolling file via tracing-appender
//! - **Document Spans**: attribute replay and append logs to one document
//!
//! # Quick Start
//!
//! ```ignore
//! use jlinx_logging::{JlinxSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = JlinxSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! let _guard = JlinxSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod spans;

pub use config::{ConsoleConfig, FileConfig, LogConfig, RotationStrategy};
pub use spans::{document_span, replay_span};

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(String),

    #[error("cannot create log directory {}: {source}", directory.display())]
    LogDirectory {
        directory: PathBuf,
        source: std::io::Error,
    },
}

/// Builder for configuring and installing the global subscriber
pub struct JlinxSubscriberBuilder {
    config: LogConfig,
}

impl JlinxSubscriberBuilder {
    /// Default: JSONL output to console
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally.
    ///
    /// The returned guard keeps the file writer alive and must be held for
    /// the life of the program when file output is configured.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogInitError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.filter()));

        let console = &self.config.console;
        let location = self.config.include_location;

        let pretty_console = (console.enabled && console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
        });

        let json_console = (console.enabled && !console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .flatten_event(true)
                .with_file(location)
                .with_line_number(location)
        });

        let (file_sink, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let file_layer = file_sink.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .flatten_event(true)
                .with_file(location)
                .with_line_number(location)
                .with_writer(writer)
        });

        Registry::default()
            .with(env_filter)
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|e| LogInitError::AlreadyInstalled(e.to_string()))?;

        Ok(guard)
    }

    /// Install the subscriber, ignoring an already installed one
    pub fn init(self) -> Option<WorkerGuard> {
        self.try_init().ok().flatten()
    }
}

impl Default for JlinxSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogInitError> {
    let rotation = match config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };
    std::fs::create_dir_all(&config.directory).map_err(|source| LogInitError::LogDirectory {
        directory: config.directory.clone(),
        source,
    })?;
    let appender = RollingFileAppender::new(rotation, &config.directory, &config.prefix);
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for tests (warn level, pretty); safe to call repeatedly
pub fn init_testing() {
    let _ = JlinxSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = JlinxSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty);
    }

    #[test]
    fn test_builder_with_level_and_console() {
        let builder = JlinxSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false);
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
    }

    #[test]
    fn test_second_install_is_reported() {
        init_testing();
        let result = JlinxSubscriberBuilder::new().try_init();
        assert!(matches!(result, Err(LogInitError::AlreadyInstalled(_))));
        assert!(JlinxSubscriberBuilder::new().init().is_none());
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().join("logs"),
            prefix: "test".into(),
            rotation: RotationStrategy::Never,
        };
        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(dir.path().join("logs").exists());
    }

    #[test]
    fn test_unusable_log_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"file").unwrap();

        let config = FileConfig {
            directory: blocker.join("logs"),
            prefix: "test".into(),
            rotation: RotationStrategy::Never,
        };
        match file_writer(&config) {
            Err(LogInitError::LogDirectory { directory, .. }) => {
                assert_eq!(directory, blocker.join("logs"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("directory under a file should not be created"),
        }

        let result = JlinxSubscriberBuilder::new()
            .with_console(false)
            .with_file_output(config)
            .try_init();
        assert!(matches!(result, Err(LogInitError::LogDirectory { .. })));
    }
}

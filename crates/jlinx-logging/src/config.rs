//! Logging configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Subscriber settings. `RUST_LOG`, when set, replaces [`LogConfig::filter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for every target without its own directive
    pub default_level: String,

    /// Extra `target=level` directives, e.g. `jlinx_host_client=trace`
    #[serde(default)]
    pub directives: Vec<String>,

    pub console: ConsoleConfig,

    /// Rolling JSONL file, off unless set
    pub file: Option<FileConfig>,

    /// Source file and line on JSON lines
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            directives: Vec::new(),
            console: ConsoleConfig::default(),
            file: None,
            include_location: true,
        }
    }
}

impl LogConfig {
    /// Debug-level pretty console, HTTP stack kept quiet
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            directives: vec!["hyper=info".to_string(), "reqwest=info".to_string()],
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            ..Default::default()
        }
    }

    /// Warnings only, so skipped replay events still show up in test output
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: false,
            },
            include_location: false,
            ..Default::default()
        }
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// `EnvFilter` directive string built from the level and directives
    pub fn filter(&self) -> String {
        std::iter::once(self.default_level.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines; JSON lines otherwise
    pub pretty: bool,
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false,
            ansi: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; rotation appends the date
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "jlinx".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file for the life of the process
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.filter(), "info");
        assert!(config.console.enabled);
        assert!(!config.console.pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_presets() {
        let development = LogConfig::development();
        assert!(development.console.pretty);
        assert_eq!(development.filter(), "debug,hyper=info,reqwest=info");

        let testing = LogConfig::testing();
        assert_eq!(testing.filter(), "warn");
        assert!(!testing.console.ansi);
        assert!(!testing.include_location);
    }

    #[test]
    fn test_directives_extend_filter() {
        let config = LogConfig::default()
            .with_directive("jlinx_client::machine=trace")
            .with_directive("jlinx_ledger=debug");
        assert_eq!(
            config.filter(),
            "info,jlinx_client::machine=trace,jlinx_ledger=debug"
        );
    }

    #[test]
    fn test_config_from_json() {
        let config: LogConfig = serde_json::from_value(serde_json::json!({
            "default_level": "debug",
            "console": { "enabled": false, "pretty": false, "ansi": false },
            "file": { "directory": "/var/log/jlinx", "prefix": "client", "rotation": "hourly" },
            "include_location": false
        }))
        .unwrap();
        assert!(config.directives.is_empty());
        let file = config.file.unwrap();
        assert_eq!(file.rotation, RotationStrategy::Hourly);
        assert_eq!(file.prefix, "client");
    }
}

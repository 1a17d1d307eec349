//! Service configuration.
//!
//! Settings come from an optional JSON file, then environment variables
//! (a `.env` file is loaded first when present). Environment wins.
//!
//! | Variable                    | Setting                            |
//! |-----------------------------|------------------------------------|
//! | `SLACK_BOT_TOKEN`           | `slack.bot_token`                  |
//! | `SLACK_SIGNING_SECRET`      | `slack.signing_secret`             |
//! | `REPORT_CHANNEL_ID`         | `slack.report_channel_id`          |
//! | `THREAD_SUMMARY_CHANNEL_ID` | `slack.thread_summary_channel_id`  |
//! | `SLACK_API_BASE`            | `slack.api_base`                   |
//! | `DB_HOST`                   | `database.host`                    |
//! | `DB_PORT`                   | `database.port`                    |
//! | `DB_USER`                   | `database.user`                    |
//! | `DB_PASSWORD`               | `database.password`                |
//! | `DB_NAME`                   | `database.name`                    |
//! | `DB_ENABLE_SSL`             | `database.enable_ssl`              |
//! | `PORT`                      | `server.port`                      |
//! | `REPORT_CRON`               | `schedule.cron`                    |
//! | `REPORT_TIMEZONE`           | `schedule.timezone`                |

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::channels::SlackConfig;
use crate::error::ConfigError;
use crate::report::{PipelineOptions, DEFAULT_PAGE_SIZE};
use crate::store::DatabaseConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// When the daily report runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression with a seconds field: `sec min hour day month weekday`.
    #[serde(default = "default_cron")]
    pub cron: String,

    /// IANA timezone the cron expression and report dates are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// Report run tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Whole-run timeout in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// History page size.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Show the channel member count in the summary.
    #[serde(default = "default_true")]
    pub include_member_count: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON logging format
    #[serde(default)]
    pub json_format: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_cron() -> String {
    "0 0 9 * * *".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_run_timeout() -> u64 {
    120
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_cron(),
            timezone: default_timezone(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: default_run_timeout(),
            page_size: default_page_size(),
            include_member_count: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load from `path` (or defaults), then apply the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Override settings from environment variables. Blank values are
    /// treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = v;
        }
        if let Some(v) = var("SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = v;
        }
        if let Some(v) = var("REPORT_CHANNEL_ID") {
            self.slack.report_channel_id = Some(v);
        }
        if let Some(v) = var("THREAD_SUMMARY_CHANNEL_ID") {
            self.slack.thread_summary_channel_id = Some(v);
        }
        if let Some(v) = var("SLACK_API_BASE") {
            self.slack.api_base = v.trim_end_matches('/').to_string();
        }

        if let Some(v) = var("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = var("DB_PORT") {
            self.database.port = parse_port("DB_PORT", &v)?;
        }
        if let Some(v) = var("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = var("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = var("DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = var("DB_ENABLE_SSL") {
            self.database.enable_ssl = parse_flag("DB_ENABLE_SSL", &v)?;
        }

        if let Some(v) = var("PORT") {
            self.server.port = parse_port("PORT", &v)?;
        }
        if let Some(v) = var("REPORT_CRON") {
            self.schedule.cron = v;
        }
        if let Some(v) = var("REPORT_TIMEZONE") {
            self.schedule.timezone = v;
        }

        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Missing Slack or database settings are not errors here; they disable
    /// the features that need them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;

        let fields = self.schedule.cron.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            return Err(ConfigError::InvalidValue {
                key: "schedule.cron".to_string(),
                reason: format!(
                    "expected 6 or 7 fields (sec min hour day month weekday [year]), got {}",
                    fields
                ),
            });
        }

        if self.report.run_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "report.run_timeout_secs".to_string(),
                reason: "Run timeout must be positive".to_string(),
            });
        }

        if self.report.page_size == 0 || self.report.page_size > DEFAULT_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "report.page_size".to_string(),
                reason: format!("Page size must be between 1 and {}", DEFAULT_PAGE_SIZE),
            });
        }

        Ok(())
    }

    /// The configured report timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.schedule
            .timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "schedule.timezone".to_string(),
                reason: e.to_string(),
            })
    }

    /// Pipeline options derived from `report` and `schedule`.
    pub fn pipeline_options(&self) -> Result<PipelineOptions, ConfigError> {
        Ok(PipelineOptions {
            page_size: self.report.page_size,
            run_timeout: Duration::from_secs(self.report.run_timeout_secs),
            include_member_count: self.report.include_member_count,
            timezone: self.timezone()?,
        })
    }

    /// Get the server address string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// The report channel, if one is set and non-blank.
    pub fn report_channel(&self) -> Option<&str> {
        self.slack
            .report_channel_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }

    /// A copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.slack.bot_token = mask(&copy.slack.bot_token);
        copy.slack.signing_secret = mask(&copy.slack.signing_secret);
        copy.database.password = mask(&copy.database.password);
        copy
    }

    /// Create a configuration for testing.
    pub fn for_testing() -> Self {
        Self {
            slack: SlackConfig::new("xoxb-test")
                .with_signing_secret("test-signing-secret")
                .with_report_channel("C0TEST"),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // OS will assign a port
            },
            ..Default::default()
        }
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{}' is not a valid port", value),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{}' is not a boolean", value),
        }),
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.schedule.cron, "0 0 9 * * *");
        assert_eq!(config.schedule.timezone, "Asia/Kolkata");
        assert_eq!(config.report.run_timeout_secs, 120);
        assert_eq!(config.database.port, 3306);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("SLACK_BOT_TOKEN", "xoxb-abc"),
                ("REPORT_CHANNEL_ID", "C123"),
                ("DB_HOST", "db.internal"),
                ("DB_PORT", "3307"),
                ("DB_ENABLE_SSL", "true"),
                ("PORT", "8081"),
                ("REPORT_TIMEZONE", "UTC"),
                ("THREAD_SUMMARY_CHANNEL_ID", ""),
            ]))
            .unwrap();

        assert_eq!(config.slack.bot_token, "xoxb-abc");
        assert_eq!(config.report_channel(), Some("C123"));
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 3307);
        assert!(config.database.enable_ssl);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.timezone().unwrap(), Tz::UTC);
        assert_eq!(config.slack.thread_summary_channel_id, None);
    }

    #[test]
    fn test_bad_env_values_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("PORT", "http")])).is_err());
        assert!(config.apply_env(env(&[("DB_ENABLE_SSL", "maybe")])).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.schedule.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.schedule.cron = "0 9 * * *".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.report.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_options() {
        let options = AppConfig::default().pipeline_options().unwrap();
        assert_eq!(options.run_timeout, Duration::from_secs(120));
        assert_eq!(options.page_size, 1000);
        assert_eq!(options.timezone, chrono_tz::Asia::Kolkata);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channel-digest.json");

        let mut config = AppConfig::for_testing();
        config.database.host = "localhost".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.slack.report_channel_id.as_deref(), Some("C0TEST"));
        assert_eq!(loaded.database.host, "localhost");
        assert_eq!(loaded.server.port, 0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"schedule": {"timezone": "UTC"}}"#).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.schedule.timezone, "UTC");
        assert_eq!(loaded.schedule.cron, "0 0 9 * * *");
        assert_eq!(loaded.server.port, 3000);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("/nonexistent/channel-digest.json").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = AppConfig::for_testing();
        config.database.password = "hunter2".to_string();
        let shown = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("test-signing-secret"));
        assert!(shown.contains("C0TEST"));
    }
}

//! MySQL-backed report store.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE dailyreport (
//!     report_date DATE NOT NULL PRIMARY KEY,
//!     people_joined INT NOT NULL,
//!     total_reactions INT NOT NULL,
//!     words_used INT NOT NULL
//! );
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{MySqlPool, Row};
use std::time::Duration;

use super::{ReportStore, UpsertOutcome};
use crate::error::StoreError;
use crate::types::DailyReportRow;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS dailyreport (
        report_date DATE NOT NULL PRIMARY KEY,
        people_joined INT NOT NULL DEFAULT 0,
        total_reactions INT NOT NULL DEFAULT 0,
        words_used INT NOT NULL DEFAULT 0
    )
"#;

const UPSERT_SQL: &str = r#"
    INSERT INTO dailyreport (report_date, people_joined, total_reactions, words_used)
    VALUES (?, ?, ?, ?)
    ON DUPLICATE KEY UPDATE
        people_joined = VALUES(people_joined),
        total_reactions = VALUES(total_reactions),
        words_used = VALUES(words_used)
"#;

const SELECT_SQL: &str = r#"
    SELECT report_date, people_joined, total_reactions, words_used
    FROM dailyreport
    WHERE report_date = ?
"#;

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Database (schema) name
    #[serde(default)]
    pub name: String,

    /// Require a verified TLS connection. When false, TLS is not attempted.
    #[serde(default)]
    pub enable_ssl: bool,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_port() -> u16 {
    3306
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            name: String::new(),
            enable_ssl: false,
            connect_timeout_secs: default_connect_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Names of required settings that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_empty() {
            missing.push("database.host");
        }
        if self.user.is_empty() {
            missing.push("database.user");
        }
        if self.name.is_empty() {
            missing.push("database.name");
        }
        missing
    }

    pub fn is_configured(&self) -> bool {
        self.missing_fields().is_empty()
    }

    fn ssl_mode(&self) -> MySqlSslMode {
        if self.enable_ssl {
            MySqlSslMode::VerifyIdentity
        } else {
            MySqlSslMode::Disabled
        }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(self.ssl_mode())
    }
}

/// Report store over a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlReportStore {
    pool: MySqlPool,
}

impl MySqlReportStore {
    /// Connect and make sure the `dailyreport` table exists.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if !config.is_configured() {
            return Err(StoreError::NotConfigured);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(config.connect_options())
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;

        tracing::info!(host = %config.host, database = %config.name, "Connected to report database");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Table names in the configured database.
    pub async fn tables(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SHOW TABLES").fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<String, StoreError> {
                let raw: Vec<u8> = row.try_get(0)?;
                Ok(String::from_utf8_lossy(&raw).into_owned())
            })
            .collect()
    }

    fn row_to_report(row: &MySqlRow) -> Result<DailyReportRow, StoreError> {
        let counter = |column: &str| -> Result<u64, StoreError> {
            let value: i64 = row.try_get(column)?;
            u64::try_from(value)
                .map_err(|_| StoreError::Query(format!("negative value in {}: {}", column, value)))
        };

        Ok(DailyReportRow {
            report_date: row.try_get("report_date")?,
            people_joined: counter("people_joined")?,
            total_reactions: counter("total_reactions")?,
            words_used: counter("words_used")?,
        })
    }
}

/// MySQL reports 1 affected row for an insert, 2 for an update and 0 when
/// the duplicate row already held the same values.
fn outcome_from_rows_affected(rows: u64) -> UpsertOutcome {
    match rows {
        0 => UpsertOutcome::Unchanged,
        2 => UpsertOutcome::Updated,
        _ => UpsertOutcome::Inserted,
    }
}

#[async_trait]
impl ReportStore for MySqlReportStore {
    async fn upsert(&self, row: &DailyReportRow) -> Result<UpsertOutcome, StoreError> {
        let result = sqlx::query(UPSERT_SQL)
            .bind(row.report_date)
            .bind(row.people_joined)
            .bind(row.total_reactions)
            .bind(row.words_used)
            .execute(&self.pool)
            .await?;

        let outcome = outcome_from_rows_affected(result.rows_affected());
        tracing::info!(date = %row.report_date, ?outcome, "Report row upserted");
        Ok(outcome)
    }

    async fn get(&self, date: NaiveDate) -> Result<Option<DailyReportRow>, StoreError> {
        let row = sqlx::query(SELECT_SQL)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_report).transpose()
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Report database pool closed");
    }

    fn name(&self) -> &'static str {
        "mysql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_overwrites_not_sums() {
        assert!(UPSERT_SQL.contains("ON DUPLICATE KEY UPDATE"));
        assert!(UPSERT_SQL.contains("words_used = VALUES(words_used)"));
        assert!(!UPSERT_SQL.contains("words_used + "));
    }

    #[test]
    fn test_outcome_from_rows_affected() {
        assert_eq!(outcome_from_rows_affected(1), UpsertOutcome::Inserted);
        assert_eq!(outcome_from_rows_affected(2), UpsertOutcome::Updated);
        assert_eq!(outcome_from_rows_affected(0), UpsertOutcome::Unchanged);
    }

    #[test]
    fn test_missing_fields() {
        let config = DatabaseConfig::default();
        assert_eq!(
            config.missing_fields(),
            vec!["database.host", "database.user", "database.name"]
        );
        assert_eq!(config.port, 3306);
    }

    #[test]
    fn test_ssl_mode_follows_flag() {
        let mut config = DatabaseConfig::default();
        assert!(matches!(config.ssl_mode(), MySqlSslMode::Disabled));

        config.enable_ssl = true;
        assert!(matches!(config.ssl_mode(), MySqlSslMode::VerifyIdentity));
    }

    #[tokio::test]
    async fn test_open_without_config_is_not_configured() {
        let err = MySqlReportStore::open(&DatabaseConfig::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotConfigured));
    }
}

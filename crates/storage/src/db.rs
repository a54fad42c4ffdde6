use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("failed to encode criteria: {0}")]
    CriteriaJson(#[from] serde_json::Error),
    #[error("category not found: {0}")]
    CategoryNotFound(String),
    #[error("property not found: {0}")]
    PropertyNotFound(String),
    #[error("rule not found: {0}")]
    RuleNotFound(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("suggestion not found: {0}")]
    SuggestionNotFound(String),
    #[error("suggestion already applied: {0}")]
    SuggestionApplied(String),
    #[error("invalid rule criteria: {0}")]
    InvalidCriteria(String),
    #[error("corrupt {column} value in stored row: {value}")]
    Corrupt { column: &'static str, value: String },
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS properties (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_transactions (
            id TEXT PRIMARY KEY,
            bank_account_id TEXT NOT NULL,
            date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            description TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            category_id TEXT REFERENCES categories(id),
            property_id TEXT REFERENCES properties(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categorization_rules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            priority INTEGER NOT NULL DEFAULT 0,
            category_id TEXT NOT NULL REFERENCES categories(id),
            property_id TEXT REFERENCES properties(id),
            criteria TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transaction_suggestions (
            id TEXT PRIMARY KEY,
            processed_transaction_id TEXT NOT NULL REFERENCES processed_transactions(id),
            rule_id TEXT NOT NULL REFERENCES categorization_rules(id) ON DELETE CASCADE,
            suggested_category_id TEXT NOT NULL,
            suggested_property_id TEXT,
            confidence REAL NOT NULL,
            is_applied INTEGER NOT NULL DEFAULT 0,
            applied_at TEXT,
            is_dismissed INTEGER NOT NULL DEFAULT 0,
            dismissed_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (processed_transaction_id, rule_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_suggestions_rule ON transaction_suggestions(rule_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_date(column: &'static str, value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| StorageError::Corrupt {
        column,
        value: value.to_string(),
    })
}

pub(crate) fn parse_timestamp(
    column: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::Corrupt {
            column,
            value: value.to_string(),
        })
}

pub(crate) fn parse_opt_timestamp(
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.map(|v| parse_timestamp(column, v)).transpose()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let (_dir, pool) = testutil::test_db().await;
        run_migrations(&pool).await.unwrap();
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("date", "2024-05-20").is_ok());
        assert!(matches!(
            parse_date("date", "20/05/2024"),
            Err(StorageError::Corrupt { column: "date", .. })
        ));
    }

    #[test]
    fn parse_timestamp_round_trips_rfc3339() {
        let now = Utc::now();
        let parsed = parse_timestamp("created_at", &now.to_rfc3339()).unwrap();
        assert_eq!(parsed, now);
    }
}

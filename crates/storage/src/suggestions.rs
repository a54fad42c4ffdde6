//! Suggestion store: idempotent persistence of rule matches plus the
//! apply/dismiss bookkeeping the review flow records. One row per
//! `(processed_transaction_id, rule_id)` pair, enforced by a unique index
//! and an atomic upsert.

use chrono::Utc;
use saldo_core::{RuleStats, TransactionSuggestion};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::db::{format_timestamp, parse_opt_timestamp, parse_timestamp, DbPool, StorageError};

/// Payload for persisting one rule match.
#[derive(Debug, Clone)]
pub struct SuggestionUpsert<'a> {
    pub processed_transaction_id: &'a str,
    pub rule_id: &'a str,
    pub suggested_category_id: &'a str,
    pub suggested_property_id: Option<&'a str>,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub id: String,
    pub newly_created: bool,
}

const SUGGESTION_COLUMNS: &str = "id, processed_transaction_id, rule_id, suggested_category_id, suggested_property_id, confidence, is_applied, applied_at, is_dismissed, dismissed_at, created_at";

fn map_row(row: &SqliteRow) -> Result<TransactionSuggestion, StorageError> {
    let applied_at: Option<String> = row.try_get("applied_at")?;
    let dismissed_at: Option<String> = row.try_get("dismissed_at")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(TransactionSuggestion {
        id: row.try_get("id")?,
        processed_transaction_id: row.try_get("processed_transaction_id")?,
        rule_id: row.try_get("rule_id")?,
        suggested_category_id: row.try_get("suggested_category_id")?,
        suggested_property_id: row.try_get("suggested_property_id")?,
        confidence: row.try_get("confidence")?,
        is_applied: row.try_get::<i64, _>("is_applied")? != 0,
        applied_at: parse_opt_timestamp("applied_at", applied_at.as_deref())?,
        is_dismissed: row.try_get::<i64, _>("is_dismissed")? != 0,
        dismissed_at: parse_opt_timestamp("dismissed_at", dismissed_at.as_deref())?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

/// Idempotent upsert: re-evaluating the same transaction against the same
/// rule refreshes the targets and confidence of the existing row instead of
/// minting a duplicate. Review state (`is_applied`/`is_dismissed`) is never
/// touched here.
pub async fn upsert_suggestion(
    pool: &DbPool,
    upsert: &SuggestionUpsert<'_>,
) -> Result<UpsertOutcome, StorageError> {
    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM transaction_suggestions WHERE processed_transaction_id = ? AND rule_id = ?",
    )
    .bind(upsert.processed_transaction_id)
    .bind(upsert.rule_id)
    .fetch_optional(pool)
    .await?;

    let id = existing
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // ON CONFLICT keeps the write atomic when a pool runs more than one
    // connection; the pre-read only decides created-vs-refreshed.
    sqlx::query(
        r#"
        INSERT INTO transaction_suggestions
            (id, processed_transaction_id, rule_id, suggested_category_id, suggested_property_id, confidence, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (processed_transaction_id, rule_id) DO UPDATE SET
            suggested_category_id = excluded.suggested_category_id,
            suggested_property_id = excluded.suggested_property_id,
            confidence = excluded.confidence
        "#,
    )
    .bind(&id)
    .bind(upsert.processed_transaction_id)
    .bind(upsert.rule_id)
    .bind(upsert.suggested_category_id)
    .bind(upsert.suggested_property_id)
    .bind(upsert.confidence)
    .bind(format_timestamp(Utc::now()))
    .execute(pool)
    .await?;

    Ok(UpsertOutcome {
        id,
        newly_created: existing.is_none(),
    })
}

pub async fn get_suggestion(
    pool: &DbPool,
    id: &str,
) -> Result<Option<TransactionSuggestion>, StorageError> {
    let row = sqlx::query(&format!(
        "SELECT {SUGGESTION_COLUMNS} FROM transaction_suggestions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(|r| map_row(&r)).transpose()
}

pub async fn get_suggestions_for_rule(
    pool: &DbPool,
    rule_id: &str,
) -> Result<Vec<TransactionSuggestion>, StorageError> {
    let rows = sqlx::query(&format!(
        "SELECT {SUGGESTION_COLUMNS} FROM transaction_suggestions WHERE rule_id = ? ORDER BY created_at ASC, id ASC"
    ))
    .bind(rule_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_row).collect()
}

/// All suggestions attached to one transaction, highest confidence first;
/// the shape the review tooling ranks.
pub async fn get_suggestions_for_transaction(
    pool: &DbPool,
    transaction_id: &str,
) -> Result<Vec<TransactionSuggestion>, StorageError> {
    let rows = sqlx::query(&format!(
        "SELECT {SUGGESTION_COLUMNS} FROM transaction_suggestions WHERE processed_transaction_id = ? ORDER BY confidence DESC, created_at ASC"
    ))
    .bind(transaction_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_row).collect()
}

/// Marks a suggestion accepted. Re-applying a dismissed suggestion clears
/// its dismissal.
pub async fn apply_suggestion(pool: &DbPool, id: &str) -> Result<(), StorageError> {
    let result = sqlx::query(
        "UPDATE transaction_suggestions SET is_applied = 1, applied_at = ?, is_dismissed = 0, dismissed_at = NULL WHERE id = ?",
    )
    .bind(format_timestamp(Utc::now()))
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::SuggestionNotFound(id.to_string()));
    }
    Ok(())
}

/// Marks a suggestion rejected by review. Applied suggestions cannot be
/// dismissed; undo the application first.
pub async fn dismiss_suggestion(pool: &DbPool, id: &str) -> Result<(), StorageError> {
    let Some(suggestion) = get_suggestion(pool, id).await? else {
        return Err(StorageError::SuggestionNotFound(id.to_string()));
    };
    if suggestion.is_applied {
        return Err(StorageError::SuggestionApplied(id.to_string()));
    }
    sqlx::query("UPDATE transaction_suggestions SET is_dismissed = 1, dismissed_at = ? WHERE id = ?")
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_rule_stats(pool: &DbPool, rule_id: &str) -> Result<RuleStats, StorageError> {
    let (total, applied, dismissed): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(is_applied), 0), COALESCE(SUM(is_dismissed), 0) FROM transaction_suggestions WHERE rule_id = ?",
    )
    .bind(rule_id)
    .fetch_one(pool)
    .await?;
    Ok(RuleStats::from_counts(total, applied, dismissed))
}

pub async fn average_confidence_for_rule(
    pool: &DbPool,
    rule_id: &str,
) -> Result<f64, StorageError> {
    let average: f64 = sqlx::query_scalar(
        "SELECT COALESCE(AVG(confidence), 0.0) FROM transaction_suggestions WHERE rule_id = ?",
    )
    .bind(rule_id)
    .fetch_one(pool)
    .await?;
    Ok(average)
}

/// `(month, total, applied)` rows grouped by the suggestion's creation
/// month (`YYYY-MM`), oldest first.
pub async fn monthly_suggestion_counts(
    pool: &DbPool,
    rule_id: &str,
) -> Result<Vec<(String, i64, i64)>, StorageError> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT substr(created_at, 1, 7), COUNT(*), COALESCE(SUM(is_applied), 0)
        FROM transaction_suggestions
        WHERE rule_id = ?
        GROUP BY substr(created_at, 1, 7)
        ORDER BY substr(created_at, 1, 7) ASC
        "#,
    )
    .bind(rule_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

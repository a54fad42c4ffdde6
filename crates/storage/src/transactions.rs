//! Read-side access to imported transactions, plus the insert/assignment
//! plumbing the service layer and tests need. Transactions are immutable
//! after import apart from the category/property assignment recorded when a
//! suggestion is accepted.

use chrono::NaiveDate;
use saldo_core::ProcessedTransaction;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::db::{parse_date, DbPool, StorageError};

/// Filter for resolving retroactive-generation candidates.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub bank_account_ids: Option<Vec<String>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Excludes transactions that already carry a category or property.
    pub skip_categorized: bool,
}

const TRANSACTION_COLUMNS: &str = "id, bank_account_id, date, amount_cents, description, year, month, category_id, property_id";

fn map_row(row: &SqliteRow) -> Result<ProcessedTransaction, StorageError> {
    let date: String = row.try_get("date")?;
    Ok(ProcessedTransaction {
        id: row.try_get("id")?,
        bank_account_id: row.try_get("bank_account_id")?,
        date: parse_date("date", &date)?,
        amount_cents: row.try_get("amount_cents")?,
        description: row.try_get("description")?,
        year: row.try_get::<i64, _>("year")? as i32,
        month: row.try_get::<i64, _>("month")? as u32,
        category_id: row.try_get("category_id")?,
        property_id: row.try_get("property_id")?,
    })
}

pub async fn insert_transaction(
    pool: &DbPool,
    tx: &ProcessedTransaction,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO processed_transactions
            (id, bank_account_id, date, amount_cents, description, year, month, category_id, property_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.bank_account_id)
    .bind(tx.date.to_string())
    .bind(tx.amount_cents)
    .bind(&tx.description)
    .bind(tx.year as i64)
    .bind(tx.month as i64)
    .bind(&tx.category_id)
    .bind(&tx.property_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_transaction(
    pool: &DbPool,
    id: &str,
) -> Result<Option<ProcessedTransaction>, StorageError> {
    let row = sqlx::query(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM processed_transactions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(|r| map_row(&r)).transpose()
}

/// Most recent transactions first; the preview service's dry-run corpus.
pub async fn recent_transactions(
    pool: &DbPool,
    limit: i64,
) -> Result<Vec<ProcessedTransaction>, StorageError> {
    let rows = sqlx::query(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM processed_transactions ORDER BY date DESC, id DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_row).collect()
}

/// Resolves a retroactive filter to candidate transaction ids, oldest first.
pub async fn find_transaction_ids(
    pool: &DbPool,
    filter: &TransactionFilter,
) -> Result<Vec<String>, StorageError> {
    let mut sql = String::from("SELECT id FROM processed_transactions WHERE 1=1");

    if let Some(accounts) = filter.bank_account_ids.as_ref().filter(|a| !a.is_empty()) {
        let placeholders = vec!["?"; accounts.len()].join(", ");
        sql.push_str(&format!(" AND bank_account_id IN ({placeholders})"));
    }
    if filter.date_from.is_some() {
        sql.push_str(" AND date >= ?");
    }
    if filter.date_to.is_some() {
        sql.push_str(" AND date <= ?");
    }
    if filter.skip_categorized {
        sql.push_str(" AND category_id IS NULL AND property_id IS NULL");
    }
    sql.push_str(" ORDER BY date ASC, id ASC");

    let mut query = sqlx::query_scalar::<_, String>(&sql);
    if let Some(accounts) = filter.bank_account_ids.as_ref().filter(|a| !a.is_empty()) {
        for account in accounts {
            query = query.bind(account);
        }
    }
    if let Some(from) = filter.date_from {
        query = query.bind(from.to_string());
    }
    if let Some(to) = filter.date_to {
        query = query.bind(to.to_string());
    }

    Ok(query.fetch_all(pool).await?)
}

/// Records an accepted categorization on the transaction itself.
pub async fn assign_categorization(
    pool: &DbPool,
    id: &str,
    category_id: Option<&str>,
    property_id: Option<&str>,
) -> Result<(), StorageError> {
    let result = sqlx::query(
        "UPDATE processed_transactions SET category_id = ?, property_id = ? WHERE id = ?",
    )
    .bind(category_id)
    .bind(property_id)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::TransactionNotFound(id.to_string()));
    }
    Ok(())
}

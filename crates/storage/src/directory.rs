//! Category and property directories. Their lifecycle belongs to the wider
//! bookkeeping system; the rule engine only needs existence checks when
//! validating rule targets, plus enough plumbing to seed them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{DbPool, StorageError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub name: String,
}

pub async fn insert_category(
    pool: &DbPool,
    id: Option<&str>,
    name: &str,
) -> Result<String, StorageError> {
    let id = id
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn insert_property(
    pool: &DbPool,
    id: Option<&str>,
    name: &str,
) -> Result<String, StorageError> {
    let id = id
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    sqlx::query("INSERT INTO properties (id, name) VALUES (?, ?)")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn category_exists(pool: &DbPool, id: &str) -> Result<bool, StorageError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub async fn property_exists(pool: &DbPool, id: &str) -> Result<bool, StorageError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM properties WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub async fn get_categories(pool: &DbPool) -> Result<Vec<Category>, StorageError> {
    let rows = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM categories ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name)| Category { id, name })
        .collect())
}

pub async fn get_properties(pool: &DbPool) -> Result<Vec<Property>, StorageError> {
    let rows = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM properties ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name)| Property { id, name })
        .collect())
}

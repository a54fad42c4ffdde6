//! Rule repository: validated CRUD over persisted categorization rules.
//! Criteria are stored as a JSON column and re-hydrated through serde, so
//! the repository and the matcher always agree on the criteria shape.

use chrono::Utc;
use saldo_core::{CategorizationRule, ItemError, NewRule, RuleCriteria, RuleUpdate};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, DbPool, StorageError};
use crate::directory::{category_exists, property_exists};

/// Listing filter; results are ordered `priority DESC, created_at ASC`.
#[derive(Debug, Clone, Default)]
pub struct RuleListFilter {
    pub is_active: Option<bool>,
    pub category_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct BulkToggleOutcome {
    pub updated: usize,
    pub errors: Vec<ItemError>,
}

const RULE_COLUMNS: &str = "id, name, description, is_active, priority, category_id, property_id, criteria, created_at, updated_at";

fn map_row(row: &SqliteRow) -> Result<CategorizationRule, StorageError> {
    let criteria_json: String = row.try_get("criteria")?;
    let criteria: RuleCriteria =
        serde_json::from_str(&criteria_json).map_err(|_| StorageError::Corrupt {
            column: "criteria",
            value: criteria_json.clone(),
        })?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(CategorizationRule {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        priority: row.try_get::<i64, _>("priority")? as i32,
        category_id: row.try_get("category_id")?,
        property_id: row.try_get("property_id")?,
        criteria,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

async fn check_targets(
    pool: &DbPool,
    category_id: &str,
    property_id: Option<&str>,
) -> Result<(), StorageError> {
    if !category_exists(pool, category_id).await? {
        return Err(StorageError::CategoryNotFound(category_id.to_string()));
    }
    if let Some(property_id) = property_id {
        if !property_exists(pool, property_id).await? {
            return Err(StorageError::PropertyNotFound(property_id.to_string()));
        }
    }
    Ok(())
}

fn check_criteria(criteria: &RuleCriteria) -> Result<(), StorageError> {
    let report = criteria.validate();
    if !report.is_valid() {
        return Err(StorageError::InvalidCriteria(report.messages().join("; ")));
    }
    Ok(())
}

pub async fn save_rule(pool: &DbPool, new: &NewRule) -> Result<CategorizationRule, StorageError> {
    check_criteria(&new.criteria)?;
    check_targets(pool, &new.category_id, new.property_id.as_deref()).await?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let criteria_json = serde_json::to_string(&new.criteria)?;

    sqlx::query(
        r#"
        INSERT INTO categorization_rules
            (id, name, description, is_active, priority, category_id, property_id, criteria, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(i64::from(new.is_active))
    .bind(i64::from(new.priority))
    .bind(&new.category_id)
    .bind(&new.property_id)
    .bind(&criteria_json)
    .bind(format_timestamp(now))
    .bind(format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(CategorizationRule {
        id,
        name: new.name.clone(),
        description: new.description.clone(),
        is_active: new.is_active,
        priority: new.priority,
        category_id: new.category_id.clone(),
        property_id: new.property_id.clone(),
        criteria: new.criteria.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_rule(
    pool: &DbPool,
    id: &str,
) -> Result<Option<CategorizationRule>, StorageError> {
    let row = sqlx::query(&format!(
        "SELECT {RULE_COLUMNS} FROM categorization_rules WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(|r| map_row(&r)).transpose()
}

pub async fn list_rules(
    pool: &DbPool,
    filter: &RuleListFilter,
) -> Result<Vec<CategorizationRule>, StorageError> {
    let mut sql = format!("SELECT {RULE_COLUMNS} FROM categorization_rules WHERE 1=1");
    if filter.is_active.is_some() {
        sql.push_str(" AND is_active = ?");
    }
    if filter.category_id.is_some() {
        sql.push_str(" AND category_id = ?");
    }
    sql.push_str(" ORDER BY priority DESC, created_at ASC");
    if filter.limit.is_some() {
        sql.push_str(" LIMIT ?");
    }
    if filter.offset.is_some() {
        // SQLite requires LIMIT when OFFSET is present.
        if filter.limit.is_none() {
            sql.push_str(" LIMIT -1");
        }
        sql.push_str(" OFFSET ?");
    }

    let mut query = sqlx::query(&sql);
    if let Some(active) = filter.is_active {
        query = query.bind(i64::from(active));
    }
    if let Some(category_id) = &filter.category_id {
        query = query.bind(category_id);
    }
    if let Some(limit) = filter.limit {
        query = query.bind(limit);
    }
    if let Some(offset) = filter.offset {
        query = query.bind(offset);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(map_row).collect()
}

/// Shorthand for the engine's default rule set.
pub async fn list_active_rules(pool: &DbPool) -> Result<Vec<CategorizationRule>, StorageError> {
    list_rules(
        pool,
        &RuleListFilter {
            is_active: Some(true),
            ..Default::default()
        },
    )
    .await
}

/// Partial update; unspecified fields keep their stored values. The merged
/// criteria and any new target ids are re-validated before writing.
pub async fn update_rule(
    pool: &DbPool,
    id: &str,
    update: &RuleUpdate,
) -> Result<CategorizationRule, StorageError> {
    let Some(existing) = get_rule(pool, id).await? else {
        return Err(StorageError::RuleNotFound(id.to_string()));
    };

    let mut rule = existing;
    if let Some(name) = &update.name {
        rule.name = name.clone();
    }
    if let Some(description) = &update.description {
        rule.description = Some(description.clone());
    }
    if let Some(is_active) = update.is_active {
        rule.is_active = is_active;
    }
    if let Some(priority) = update.priority {
        rule.priority = priority;
    }
    if let Some(category_id) = &update.category_id {
        rule.category_id = category_id.clone();
    }
    if let Some(property_id) = &update.property_id {
        rule.property_id = Some(property_id.clone());
    }
    if let Some(criteria) = &update.criteria {
        rule.criteria = criteria.clone();
    }

    check_criteria(&rule.criteria)?;
    check_targets(pool, &rule.category_id, rule.property_id.as_deref()).await?;

    rule.updated_at = Utc::now();
    let criteria_json = serde_json::to_string(&rule.criteria)?;

    sqlx::query(
        r#"
        UPDATE categorization_rules
        SET name = ?, description = ?, is_active = ?, priority = ?,
            category_id = ?, property_id = ?, criteria = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&rule.name)
    .bind(&rule.description)
    .bind(i64::from(rule.is_active))
    .bind(i64::from(rule.priority))
    .bind(&rule.category_id)
    .bind(&rule.property_id)
    .bind(&criteria_json)
    .bind(format_timestamp(rule.updated_at))
    .bind(id)
    .execute(pool)
    .await?;

    Ok(rule)
}

/// Deletes the rule; its suggestions go with it via the cascading foreign
/// key, so no orphaned suggestions survive.
pub async fn delete_rule(pool: &DbPool, id: &str) -> Result<(), StorageError> {
    let result = sqlx::query("DELETE FROM categorization_rules WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::RuleNotFound(id.to_string()));
    }
    Ok(())
}

/// Bulk activate/deactivate. Unknown ids become per-item errors; the rest
/// are still updated.
pub async fn set_rules_active(
    pool: &DbPool,
    ids: &[String],
    active: bool,
) -> Result<BulkToggleOutcome, StorageError> {
    let mut outcome = BulkToggleOutcome::default();
    let now = format_timestamp(Utc::now());

    for id in ids {
        let result =
            sqlx::query("UPDATE categorization_rules SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(i64::from(active))
                .bind(&now)
                .bind(id)
                .execute(pool)
                .await?;
        if result.rows_affected() == 0 {
            outcome.errors.push(ItemError::new(id.as_str(), "rule not found"));
        } else {
            outcome.updated += 1;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::test_db;
    use crate::directory::{insert_category, insert_property};
    use saldo_core::{DescriptionCriteria, KeywordOperator, ValueCriteria, ValueOperator};

    async fn seed(pool: &DbPool) {
        insert_category(pool, Some("cat-rent"), "Aluguel").await.unwrap();
        insert_category(pool, Some("cat-food"), "Mercado").await.unwrap();
        insert_property(pool, Some("prop-1"), "Apartamento Centro").await.unwrap();
    }

    fn new_rule(name: &str, category_id: &str, priority: i32) -> NewRule {
        NewRule {
            name: name.to_string(),
            description: None,
            is_active: true,
            priority,
            category_id: category_id.to_string(),
            property_id: None,
            criteria: RuleCriteria::default(),
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trips_criteria() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let mut input = new_rule("aluguel", "cat-rent", 10);
        input.property_id = Some("prop-1".to_string());
        input.criteria = RuleCriteria {
            description: Some(DescriptionCriteria {
                keywords: vec!["ALUGUEL".to_string()],
                operator: KeywordOperator::Or,
                case_sensitive: false,
            }),
            value: Some(ValueCriteria {
                min_cents: Some(10_000),
                max_cents: None,
                operator: ValueOperator::Gt,
            }),
            ..Default::default()
        };

        let saved = save_rule(&pool, &input).await.unwrap();
        let loaded = get_rule(&pool, &saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.criteria, input.criteria);
        assert_eq!(loaded.property_id.as_deref(), Some("prop-1"));
        assert_eq!(loaded.priority, 10);
    }

    #[tokio::test]
    async fn save_rejects_unknown_category() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let err = save_rule(&pool, &new_rule("r", "cat-missing", 0)).await;
        assert!(matches!(err, Err(StorageError::CategoryNotFound(_))));
    }

    #[tokio::test]
    async fn save_rejects_invalid_criteria() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let mut input = new_rule("r", "cat-rent", 0);
        input.criteria = RuleCriteria {
            value: Some(ValueCriteria {
                min_cents: Some(1_000),
                max_cents: Some(500),
                operator: ValueOperator::Between,
            }),
            ..Default::default()
        };
        let err = save_rule(&pool, &input).await;
        assert!(matches!(err, Err(StorageError::InvalidCriteria(_))));
    }

    #[tokio::test]
    async fn listing_orders_by_priority_then_age() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let low = save_rule(&pool, &new_rule("low", "cat-rent", 1)).await.unwrap();
        let high = save_rule(&pool, &new_rule("high", "cat-rent", 10)).await.unwrap();
        let mid_old = save_rule(&pool, &new_rule("mid-old", "cat-food", 5)).await.unwrap();
        // Same priority, created later; must sort after mid_old.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mid_new = save_rule(&pool, &new_rule("mid-new", "cat-food", 5)).await.unwrap();

        let all = list_rules(&pool, &RuleListFilter::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![&high.id, &mid_old.id, &mid_new.id, &low.id]);

        let food_only = list_rules(
            &pool,
            &RuleListFilter {
                category_id: Some("cat-food".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(food_only.len(), 2);

        let paged = list_rules(
            &pool,
            &RuleListFilter {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(paged.len(), 2);
        assert_eq!(paged[0].id, mid_old.id);
    }

    #[tokio::test]
    async fn update_merges_partial_fields() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let saved = save_rule(&pool, &new_rule("r", "cat-rent", 1)).await.unwrap();
        let updated = update_rule(
            &pool,
            &saved.id,
            &RuleUpdate {
                priority: Some(20),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.priority, 20);
        assert!(!updated.is_active);
        assert_eq!(updated.name, "r");
        assert_eq!(updated.category_id, "cat-rent");

        assert!(matches!(
            update_rule(&pool, "missing", &RuleUpdate::default()).await,
            Err(StorageError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_rejects_invalid_merged_criteria() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let saved = save_rule(&pool, &new_rule("r", "cat-rent", 1)).await.unwrap();
        let err = update_rule(
            &pool,
            &saved.id,
            &RuleUpdate {
                criteria: Some(RuleCriteria {
                    description: Some(DescriptionCriteria {
                        keywords: vec![],
                        operator: KeywordOperator::And,
                        case_sensitive: false,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(err, Err(StorageError::InvalidCriteria(_))));
    }

    #[tokio::test]
    async fn delete_reports_not_found() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let saved = save_rule(&pool, &new_rule("r", "cat-rent", 1)).await.unwrap();
        delete_rule(&pool, &saved.id).await.unwrap();
        assert!(get_rule(&pool, &saved.id).await.unwrap().is_none());
        assert!(matches!(
            delete_rule(&pool, &saved.id).await,
            Err(StorageError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn bulk_toggle_reports_per_id_errors() {
        let (_dir, pool) = test_db().await;
        seed(&pool).await;

        let a = save_rule(&pool, &new_rule("a", "cat-rent", 1)).await.unwrap();
        let b = save_rule(&pool, &new_rule("b", "cat-rent", 1)).await.unwrap();

        let outcome = set_rules_active(
            &pool,
            &[a.id.clone(), "missing".to_string(), b.id.clone()],
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].id, "missing");

        let active = list_active_rules(&pool).await.unwrap();
        assert!(active.is_empty());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::criteria::RuleCriteria;

/// A named, prioritized criteria value mapped to a target category and
/// optional property. Higher priority rules are evaluated and ranked first;
/// ties go to the earlier-created rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationRule {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub priority: i32,
    pub category_id: String,
    pub property_id: Option<String>,
    pub criteria: RuleCriteria,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input shape for creating a rule. The repository mints the id and
/// timestamps and rejects criteria or target ids that do not validate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
    pub category_id: String,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub criteria: RuleCriteria,
}

fn default_active() -> bool {
    true
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub priority: Option<i32>,
    pub category_id: Option<String>,
    pub property_id: Option<String>,
    pub criteria: Option<RuleCriteria>,
}

/// Orders rules for evaluation and ranking: priority descending, then
/// earlier `created_at` first.
pub fn sort_for_evaluation(rules: &mut [CategorizationRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

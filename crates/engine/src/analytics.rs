//! Historical effectiveness reporting over a rule's persisted suggestions.

use serde::Serialize;

use saldo_storage::{self as storage, DbPool};

use crate::engine::EngineError;

/// One calendar month of a rule's suggestion history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBreakdown {
    /// Month of suggestion creation, `YYYY-MM`.
    pub month: String,
    pub total_suggestions: i64,
    pub applied_suggestions: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePerformance {
    pub rule_id: String,
    pub total_suggestions: i64,
    pub applied_suggestions: i64,
    pub dismissed_suggestions: i64,
    pub pending_suggestions: i64,
    pub success_rate: f64,
    pub average_confidence: f64,
    pub monthly_breakdown: Vec<MonthlyBreakdown>,
}

/// Aggregates a rule's suggestion outcomes: overall counters plus a
/// per-month breakdown, oldest month first.
pub async fn analyze_rule_performance(
    db: &DbPool,
    rule_id: &str,
) -> Result<RulePerformance, EngineError> {
    let rule = storage::get_rule(db, rule_id)
        .await?
        .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;

    let stats = storage::get_rule_stats(db, &rule.id).await?;
    let average_confidence = storage::average_confidence_for_rule(db, &rule.id).await?;
    let monthly_breakdown = storage::monthly_suggestion_counts(db, &rule.id)
        .await?
        .into_iter()
        .map(|(month, total, applied)| MonthlyBreakdown {
            month,
            total_suggestions: total,
            applied_suggestions: applied,
        })
        .collect();

    Ok(RulePerformance {
        rule_id: rule.id,
        total_suggestions: stats.total_suggestions,
        applied_suggestions: stats.applied_suggestions,
        dismissed_suggestions: stats.dismissed_suggestions,
        pending_suggestions: stats.pending_suggestions,
        success_rate: stats.success_rate,
        average_confidence,
        monthly_breakdown,
    })
}

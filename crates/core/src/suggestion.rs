use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted, rule-attributable proposal to categorize one transaction.
/// Not yet an accepted categorization: the review flow applies or dismisses
/// it later. At most one suggestion exists per `(processed_transaction_id,
/// rule_id)` pair; re-evaluation refreshes the row instead of duplicating
/// it. This shape is shared with the LLM-based suggestion producer, which
/// writes into the same sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSuggestion {
    pub id: String,
    pub processed_transaction_id: String,
    pub rule_id: String,
    pub suggested_category_id: String,
    pub suggested_property_id: Option<String>,
    pub confidence: f64,
    pub is_applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub is_dismissed: bool,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TransactionSuggestion {
    /// Pending means awaiting review: neither applied nor dismissed.
    pub fn is_pending(&self) -> bool {
        !self.is_applied && !self.is_dismissed
    }
}

/// Aggregate outcome counters over one rule's suggestion history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStats {
    pub total_suggestions: i64,
    pub applied_suggestions: i64,
    pub dismissed_suggestions: i64,
    pub pending_suggestions: i64,
    pub success_rate: f64,
}

impl RuleStats {
    /// `success_rate` is applied/total; a rule with no history reports 0.0
    /// rather than a division error.
    pub fn from_counts(total: i64, applied: i64, dismissed: i64) -> Self {
        let success_rate = if total > 0 {
            applied as f64 / total as f64
        } else {
            0.0
        };
        RuleStats {
            total_suggestions: total,
            applied_suggestions: applied,
            dismissed_suggestions: dismissed,
            pending_suggestions: total - applied - dismissed,
            success_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_applied_over_total() {
        let stats = RuleStats::from_counts(2, 1, 0);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.pending_suggestions, 1);
    }

    #[test]
    fn empty_history_reports_zero_rate() {
        let stats = RuleStats::from_counts(0, 0, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.pending_suggestions, 0);
    }

    #[test]
    fn dismissed_leaves_pending_count() {
        let stats = RuleStats::from_counts(5, 2, 1);
        assert_eq!(stats.pending_suggestions, 2);
        assert_eq!(stats.success_rate, 0.4);
    }
}

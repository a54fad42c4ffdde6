//! Read-only twin of the rule engine for criteria that are not (or not yet)
//! persisted: dry-runs over recent history, plus validation composed with
//! target existence checks. Nothing here writes a suggestion.

use std::sync::Arc;

use serde::Serialize;

use saldo_core::{
    matcher, ConfidenceScorer, CriteriaDimension, ProcessedTransaction, RuleCriteria,
    SpecificityScorer,
};
use saldo_storage::{self as storage, DbPool};

use crate::engine::EngineError;

/// One transaction a dry-run matched, with the confidence a real evaluation
/// would have assigned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaTestMatch {
    pub transaction: ProcessedTransaction,
    pub confidence: f64,
    pub matched_dimensions: Vec<CriteriaDimension>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaTestReport {
    pub matches: Vec<CriteriaTestMatch>,
    pub total_matches: usize,
}

/// Full rule shape for previewing: criteria plus the targets it would
/// suggest.
#[derive(Debug, Clone)]
pub struct RuleDraft {
    pub criteria: RuleCriteria,
    pub category_id: String,
    pub property_id: Option<String>,
}

/// Composed validation outcome: criteria violations plus any missing target
/// ids, flattened to messages so callers can render them as one list.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub struct RulePreview {
    db: DbPool,
    scorer: Arc<dyn ConfidenceScorer>,
}

impl RulePreview {
    pub fn new(db: DbPool) -> Self {
        Self::with_scorer(db, Arc::new(SpecificityScorer))
    }

    pub fn with_scorer(db: DbPool, scorer: Arc<dyn ConfidenceScorer>) -> Self {
        RulePreview { db, scorer }
    }

    /// Dry-runs ad-hoc criteria over up to `limit` most recent
    /// transactions. Invalid criteria are rejected up front; they must
    /// never reach the matcher.
    pub async fn test_criteria(
        &self,
        criteria: &RuleCriteria,
        limit: i64,
    ) -> Result<CriteriaTestReport, EngineError> {
        let report = criteria.validate();
        if !report.is_valid() {
            return Err(EngineError::InvalidCriteria(report.messages().join("; ")));
        }

        let defined = criteria.defined_dimensions().len();
        let transactions = storage::recent_transactions(&self.db, limit).await?;

        let mut matches = Vec::new();
        for tx in transactions {
            let detail = matcher::matches(criteria, &tx);
            if detail.matched {
                matches.push(CriteriaTestMatch {
                    confidence: self.scorer.score(detail.matched_dimensions.len(), defined),
                    matched_dimensions: detail.matched_dimensions,
                    transaction: tx,
                });
            }
        }

        Ok(CriteriaTestReport {
            total_matches: matches.len(),
            matches,
        })
    }

    /// Same dry-run accepting a full rule shape; fails if the draft's
    /// criteria or targets would not survive a real save.
    pub async fn preview_rule(
        &self,
        draft: &RuleDraft,
        limit: i64,
    ) -> Result<CriteriaTestReport, EngineError> {
        let validation = self
            .validate_rule(
                &draft.criteria,
                Some(&draft.category_id),
                draft.property_id.as_deref(),
            )
            .await?;
        if !validation.valid {
            return Err(EngineError::InvalidCriteria(validation.errors.join("; ")));
        }
        self.test_criteria(&draft.criteria, limit).await
    }

    /// Criteria validation composed with directory existence checks on the
    /// supplied target ids.
    pub async fn validate_rule(
        &self,
        criteria: &RuleCriteria,
        category_id: Option<&str>,
        property_id: Option<&str>,
    ) -> Result<RuleValidation, EngineError> {
        let mut errors = criteria.validate().messages();

        if let Some(id) = category_id {
            if !storage::category_exists(&self.db, id).await? {
                errors.push(format!("category not found: {id}"));
            }
        }
        if let Some(id) = property_id {
            if !storage::property_exists(&self.db, id).await? {
                errors.push(format!("property not found: {id}"));
            }
        }

        Ok(RuleValidation {
            valid: errors.is_empty(),
            errors,
        })
    }
}

//! Batch orchestration: evaluates rules over transactions and persists the
//! matches as suggestions. Stateless between calls; everything durable lives
//! in the backing store.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use saldo_core::{
    matcher, rule::sort_for_evaluation, CategorizationRule, ConfidenceScorer, CriteriaDimension,
    ItemError, ProcessedTransaction, SpecificityScorer,
};
use saldo_storage::{
    self as storage, DbPool, StorageError, SuggestionUpsert, TransactionFilter,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule not found: {0}")]
    RuleNotFound(String),
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One matching rule's verdict for a single transaction. Rules are not
/// mutually exclusive; a transaction can collect several of these, and
/// arbitration between them belongs to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub rule_id: String,
    pub matched: bool,
    pub confidence: f64,
    pub suggested_category_id: String,
    pub suggested_property_id: Option<String>,
    pub matched_dimensions: Vec<CriteriaDimension>,
}

/// Aggregated outcome of a `generate_suggestions` batch. `suggested` counts
/// matches persisted by the call, whether newly created or already present
/// (idempotent total, not a delta).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutcome {
    pub processed: usize,
    pub suggested: usize,
    pub errors: Vec<ItemError>,
}

/// Per-transaction result of applying a single rule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionApplication {
    pub processed_transaction_id: String,
    pub success: bool,
    pub matched: bool,
    /// True only when this call inserted the suggestion; a refresh of an
    /// existing row reports false.
    pub suggestion_created: bool,
    pub error: Option<String>,
}

impl TransactionApplication {
    fn failure(id: &str, error: &str) -> Self {
        TransactionApplication {
            processed_transaction_id: id.to_string(),
            success: false,
            matched: false,
            suggestion_created: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetroactiveOutcome {
    pub processed: usize,
    pub suggested: usize,
    pub details: Vec<TransactionApplication>,
}

pub struct RuleEngine {
    db: DbPool,
    scorer: Arc<dyn ConfidenceScorer>,
}

impl RuleEngine {
    pub fn new(db: DbPool) -> Self {
        Self::with_scorer(db, Arc::new(SpecificityScorer))
    }

    pub fn with_scorer(db: DbPool, scorer: Arc<dyn ConfidenceScorer>) -> Self {
        RuleEngine { db, scorer }
    }

    /// Evaluates every supplied rule independently against one transaction.
    /// Returns one entry per matching rule, ordered by priority descending
    /// (ties: earlier-created rule first). Rules whose stored criteria no
    /// longer validate are skipped, not fatal to the call.
    pub fn evaluate_transaction(
        &self,
        tx: &ProcessedTransaction,
        rules: &[CategorizationRule],
    ) -> Vec<EvaluationResult> {
        let mut ordered = rules.to_vec();
        sort_for_evaluation(&mut ordered);

        let mut results = Vec::new();
        for rule in &ordered {
            let report = rule.criteria.validate();
            if !report.is_valid() {
                tracing::warn!(
                    rule_id = %rule.id,
                    errors = ?report.messages(),
                    "skipping rule with invalid stored criteria"
                );
                continue;
            }
            let detail = matcher::matches(&rule.criteria, tx);
            if !detail.matched {
                continue;
            }
            let confidence = self.scorer.score(
                detail.matched_dimensions.len(),
                rule.criteria.defined_dimensions().len(),
            );
            results.push(EvaluationResult {
                rule_id: rule.id.clone(),
                matched: true,
                confidence,
                suggested_category_id: rule.category_id.clone(),
                suggested_property_id: rule.property_id.clone(),
                matched_dimensions: detail.matched_dimensions,
            });
        }
        results
    }

    /// Loads the batch's rule set: the requested subset, or every active
    /// rule when no subset is given. Unknown ids and rules with invalid
    /// stored criteria become per-item errors rather than aborting.
    async fn load_rules(
        &self,
        rule_ids: Option<&[String]>,
        errors: &mut Vec<ItemError>,
    ) -> Result<Vec<CategorizationRule>, EngineError> {
        let loaded = match rule_ids {
            Some(ids) => {
                let mut rules = Vec::with_capacity(ids.len());
                for id in ids {
                    match storage::get_rule(&self.db, id).await? {
                        Some(rule) => rules.push(rule),
                        None => errors.push(ItemError::new(id.as_str(), "rule not found")),
                    }
                }
                rules
            }
            None => storage::list_active_rules(&self.db).await?,
        };

        let mut usable = Vec::with_capacity(loaded.len());
        for rule in loaded {
            let report = rule.criteria.validate();
            if report.is_valid() {
                usable.push(rule);
            } else {
                tracing::warn!(
                    rule_id = %rule.id,
                    errors = ?report.messages(),
                    "skipping rule with invalid stored criteria"
                );
                errors.push(ItemError::new(
                    rule.id.as_str(),
                    format!("invalid criteria: {}", report.messages().join("; ")),
                ));
            }
        }
        Ok(usable)
    }

    /// Evaluates each transaction against the rule subset (or all active
    /// rules) and upserts one suggestion per match. Idempotent: a second
    /// identical call persists no additional rows.
    pub async fn generate_suggestions(
        &self,
        transaction_ids: &[String],
        rule_ids: Option<&[String]>,
    ) -> Result<GenerateOutcome, EngineError> {
        let mut outcome = GenerateOutcome::default();
        let rules = self.load_rules(rule_ids, &mut outcome.errors).await?;

        for tx_id in transaction_ids {
            let Some(tx) = storage::get_transaction(&self.db, tx_id).await? else {
                outcome
                    .errors
                    .push(ItemError::new(tx_id.as_str(), "transaction not found"));
                continue;
            };
            outcome.processed += 1;

            for result in self.evaluate_transaction(&tx, &rules) {
                storage::upsert_suggestion(
                    &self.db,
                    &SuggestionUpsert {
                        processed_transaction_id: tx_id,
                        rule_id: &result.rule_id,
                        suggested_category_id: &result.suggested_category_id,
                        suggested_property_id: result.suggested_property_id.as_deref(),
                        confidence: result.confidence,
                    },
                )
                .await?;
                outcome.suggested += 1;
            }
        }

        tracing::debug!(
            processed = outcome.processed,
            suggested = outcome.suggested,
            failed = outcome.errors.len(),
            "suggestion batch finished"
        );
        Ok(outcome)
    }

    /// Single-rule form of suggestion generation with per-transaction
    /// results. A transaction lookup failure fails its own entry and the
    /// batch moves on; an unknown or invalid rule fails the whole call
    /// since no entry could succeed.
    pub async fn apply_rule_to_transactions(
        &self,
        rule_id: &str,
        transaction_ids: &[String],
    ) -> Result<Vec<TransactionApplication>, EngineError> {
        let rule = storage::get_rule(&self.db, rule_id)
            .await?
            .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;
        let report = rule.criteria.validate();
        if !report.is_valid() {
            return Err(EngineError::InvalidCriteria(report.messages().join("; ")));
        }
        let defined = rule.criteria.defined_dimensions().len();

        let mut results = Vec::with_capacity(transaction_ids.len());
        for tx_id in transaction_ids {
            let Some(tx) = storage::get_transaction(&self.db, tx_id).await? else {
                results.push(TransactionApplication::failure(tx_id, "transaction not found"));
                continue;
            };

            let detail = matcher::matches(&rule.criteria, &tx);
            if !detail.matched {
                results.push(TransactionApplication {
                    processed_transaction_id: tx_id.clone(),
                    success: true,
                    matched: false,
                    suggestion_created: false,
                    error: None,
                });
                continue;
            }

            let confidence = self
                .scorer
                .score(detail.matched_dimensions.len(), defined);
            let upsert = storage::upsert_suggestion(
                &self.db,
                &SuggestionUpsert {
                    processed_transaction_id: tx_id,
                    rule_id: &rule.id,
                    suggested_category_id: &rule.category_id,
                    suggested_property_id: rule.property_id.as_deref(),
                    confidence,
                },
            )
            .await?;

            results.push(TransactionApplication {
                processed_transaction_id: tx_id.clone(),
                success: true,
                matched: true,
                suggestion_created: upsert.newly_created,
                error: None,
            });
        }
        Ok(results)
    }

    /// Re-runs one rule over historical transactions selected by the
    /// filter, then delegates to [`Self::apply_rule_to_transactions`].
    pub async fn generate_retroactive_suggestions(
        &self,
        rule_id: &str,
        filter: &TransactionFilter,
    ) -> Result<RetroactiveOutcome, EngineError> {
        let candidates = storage::find_transaction_ids(&self.db, filter).await?;
        tracing::debug!(
            rule_id = %rule_id,
            candidates = candidates.len(),
            "retroactive generation candidate set resolved"
        );
        let details = self.apply_rule_to_transactions(rule_id, &candidates).await?;
        let processed = details.iter().filter(|d| d.success).count();
        let suggested = details.iter().filter(|d| d.matched).count();
        Ok(RetroactiveOutcome {
            processed,
            suggested,
            details,
        })
    }
}

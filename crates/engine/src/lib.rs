pub mod analytics;
pub mod engine;
pub mod preview;

pub use analytics::{analyze_rule_performance, MonthlyBreakdown, RulePerformance};
pub use engine::{
    EngineError, EvaluationResult, GenerateOutcome, RetroactiveOutcome, RuleEngine,
    TransactionApplication,
};
pub use preview::{CriteriaTestMatch, CriteriaTestReport, RuleDraft, RulePreview, RuleValidation};
pub use saldo_storage::TransactionFilter;

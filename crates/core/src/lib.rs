pub mod batch;
pub mod confidence;
pub mod criteria;
pub mod matcher;
pub mod rule;
pub mod suggestion;
pub mod transaction;

pub use batch::ItemError;
pub use confidence::{ConfidenceScorer, SpecificityScorer};
pub use criteria::{
    CriteriaDimension, CriteriaViolation, DateCriteria, DayRange, DescriptionCriteria,
    KeywordOperator, RuleCriteria, ValidationReport, ValueCriteria, ValueOperator,
};
pub use matcher::{matches, MatchDetail};
pub use rule::{CategorizationRule, NewRule, RuleUpdate};
pub use suggestion::{RuleStats, TransactionSuggestion};
pub use transaction::ProcessedTransaction;

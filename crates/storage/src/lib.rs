pub mod db;
pub mod directory;
pub mod rules;
pub mod suggestions;
pub mod transactions;

pub use db::{create_db, DbPool, StorageError};
pub use directory::{
    category_exists, get_categories, get_properties, insert_category, insert_property,
    property_exists, Category, Property,
};
pub use rules::{
    delete_rule, get_rule, list_active_rules, list_rules, save_rule, set_rules_active,
    update_rule, BulkToggleOutcome, RuleListFilter,
};
pub use suggestions::{
    apply_suggestion, average_confidence_for_rule, dismiss_suggestion, get_rule_stats,
    get_suggestion, get_suggestions_for_rule, get_suggestions_for_transaction,
    monthly_suggestion_counts, upsert_suggestion, SuggestionUpsert, UpsertOutcome,
};
pub use transactions::{
    assign_categorization, find_transaction_ids, get_transaction, insert_transaction,
    recent_transactions, TransactionFilter,
};

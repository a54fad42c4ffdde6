use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A bank transaction wrapped with its bookkeeping period and whatever
/// categorization has already been assigned. Produced by the statement
/// import subsystem; read-only to the rule engine apart from the
/// category/property assignment recorded when a suggestion is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedTransaction {
    pub id: String,
    pub bank_account_id: String,
    pub date: NaiveDate,
    /// Signed amount in integer cents; expenses are negative.
    pub amount_cents: i64,
    pub description: String,
    /// Bookkeeping period, derived from `date`.
    pub year: i32,
    pub month: u32,
    pub category_id: Option<String>,
    pub property_id: Option<String>,
}

impl ProcessedTransaction {
    pub fn new(
        id: &str,
        bank_account_id: &str,
        date: NaiveDate,
        amount_cents: i64,
        description: &str,
    ) -> Self {
        ProcessedTransaction {
            id: id.to_string(),
            bank_account_id: bank_account_id.to_string(),
            date,
            amount_cents,
            description: description.to_string(),
            year: date.year(),
            month: date.month(),
            category_id: None,
            property_id: None,
        }
    }

    /// Calendar day-of-month, the value day-range criteria test against.
    pub fn day(&self) -> u32 {
        self.date.day()
    }

    /// A transaction counts as categorized once either target is assigned.
    pub fn is_categorized(&self) -> bool {
        self.category_id.is_some() || self.property_id.is_some()
    }

    pub fn abs_amount_cents(&self) -> i64 {
        self.amount_cents.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_is_derived_from_date() {
        let tx = ProcessedTransaction::new("t1", "acc-1", date(2024, 11, 5), -1500, "PADARIA");
        assert_eq!(tx.year, 2024);
        assert_eq!(tx.month, 11);
        assert_eq!(tx.day(), 5);
    }

    #[test]
    fn categorized_when_either_target_assigned() {
        let mut tx = ProcessedTransaction::new("t1", "acc-1", date(2024, 1, 1), 100, "X");
        assert!(!tx.is_categorized());

        tx.category_id = Some("cat-1".to_string());
        assert!(tx.is_categorized());

        tx.category_id = None;
        tx.property_id = Some("prop-1".to_string());
        assert!(tx.is_categorized());
    }

    #[test]
    fn abs_amount_ignores_sign() {
        let tx = ProcessedTransaction::new("t1", "acc-1", date(2024, 1, 1), -12050, "ALUGUEL");
        assert_eq!(tx.abs_amount_cents(), 12050);
    }
}

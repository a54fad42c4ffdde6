use chrono::Datelike;

use crate::criteria::{
    CriteriaDimension, DescriptionCriteria, KeywordOperator, RuleCriteria, ValueCriteria,
    ValueOperator,
};
use crate::transaction::ProcessedTransaction;

/// Outcome of evaluating one criteria value against one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDetail {
    pub matched: bool,
    /// Dimensions that were defined and passed; absent dimensions never
    /// appear here.
    pub matched_dimensions: Vec<CriteriaDimension>,
}

impl MatchDetail {
    fn miss() -> Self {
        MatchDetail {
            matched: false,
            matched_dimensions: Vec::new(),
        }
    }
}

/// Evaluates each defined dimension independently and ANDs the results.
/// Absent dimensions are vacuously true, so empty criteria match every
/// transaction (with no matched dimensions).
///
/// Criteria must have passed [`RuleCriteria::validate`]; callers re-validate
/// stored criteria and skip the owning rule otherwise.
pub fn matches(criteria: &RuleCriteria, tx: &ProcessedTransaction) -> MatchDetail {
    let mut matched_dimensions = Vec::new();

    if let Some(date) = &criteria.date {
        if !date.is_vacuous() {
            if let Some(range) = &date.day_range {
                let day = tx.date.day();
                if day < u32::from(range.start) || day > u32::from(range.end) {
                    return MatchDetail::miss();
                }
            }
            if let Some(months) = &date.months {
                if !months.iter().any(|&m| u32::from(m) == tx.date.month()) {
                    return MatchDetail::miss();
                }
            }
            matched_dimensions.push(CriteriaDimension::Date);
        }
    }

    if let Some(value) = &criteria.value {
        if !value_matches(value, tx.amount_cents) {
            return MatchDetail::miss();
        }
        matched_dimensions.push(CriteriaDimension::Value);
    }

    if let Some(description) = &criteria.description {
        if !description_matches(description, &tx.description) {
            return MatchDetail::miss();
        }
        matched_dimensions.push(CriteriaDimension::Description);
    }

    if let Some(accounts) = &criteria.accounts {
        if !accounts.is_empty() {
            if !accounts.iter().any(|a| a == &tx.bank_account_id) {
                return MatchDetail::miss();
            }
            matched_dimensions.push(CriteriaDimension::Accounts);
        }
    }

    MatchDetail {
        matched: true,
        matched_dimensions,
    }
}

/// Sign is ignored: the comparison runs against `abs(amount)`. Integer cents
/// make `eq` exact.
fn value_matches(value: &ValueCriteria, amount_cents: i64) -> bool {
    let amount = amount_cents.abs();
    match value.operator {
        ValueOperator::Gt => value.min_cents.is_some_and(|min| amount > min),
        ValueOperator::Gte => value.min_cents.is_some_and(|min| amount >= min),
        ValueOperator::Lt => value.max_cents.is_some_and(|max| amount < max),
        ValueOperator::Lte => value.max_cents.is_some_and(|max| amount <= max),
        ValueOperator::Eq => value.min_cents.is_some_and(|min| amount == min),
        ValueOperator::Between => match (value.min_cents, value.max_cents) {
            (Some(min), Some(max)) => amount >= min && amount <= max,
            _ => false,
        },
    }
}

fn description_matches(criteria: &DescriptionCriteria, text: &str) -> bool {
    let haystack = if criteria.case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    };

    let mut hits = criteria.keywords.iter().map(|keyword| {
        if criteria.case_sensitive {
            contains_delimited(&haystack, keyword)
        } else {
            contains_delimited(&haystack, &keyword.to_lowercase())
        }
    });

    match criteria.operator {
        KeywordOperator::And => hits.all(|hit| hit),
        KeywordOperator::Or => hits.any(|hit| hit),
    }
}

/// Delimited substring search: an occurrence counts only when bounded by the
/// string edge or a non-alphanumeric character on both sides, so "IOF"
/// matches "COBRANCA IOF" but not "BIOFISICA EXAME". Multi-word phrase
/// keywords search as-is, spaces included.
fn contains_delimited(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(found) = haystack[from..].find(needle) {
        let start = from + found;
        let end = start + needle.len();
        let open_left = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_alphanumeric());
        let open_right = end == haystack.len()
            || haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| !c.is_alphanumeric());
        if open_left && open_right {
            return true;
        }
        // Step one char forward; occurrences may overlap.
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

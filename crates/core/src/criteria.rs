use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One independently-optional predicate family within a rule. A criteria set
/// is the AND of every dimension it defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriteriaDimension {
    Date,
    Value,
    Description,
    Accounts,
}

/// Inclusive day-of-month window. No wraparound: `start` must be <= `end`,
/// so "25th through 5th" needs two rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRange {
    pub start: u8,
    pub end: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_range: Option<DayRange>,
    /// Calendar months (1-12) the transaction may fall in; OR within the set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months: Option<Vec<u8>>,
}

impl DateCriteria {
    /// A date block with neither sub-predicate constrains nothing and counts
    /// as no dimension at all.
    pub fn is_vacuous(&self) -> bool {
        self.day_range.is_none() && self.months.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Between,
}

impl fmt::Display for ValueOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueOperator::Gt => "gt",
            ValueOperator::Gte => "gte",
            ValueOperator::Lt => "lt",
            ValueOperator::Lte => "lte",
            ValueOperator::Eq => "eq",
            ValueOperator::Between => "between",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ValueOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gt" => Ok(ValueOperator::Gt),
            "gte" => Ok(ValueOperator::Gte),
            "lt" => Ok(ValueOperator::Lt),
            "lte" => Ok(ValueOperator::Lte),
            "eq" => Ok(ValueOperator::Eq),
            "between" => Ok(ValueOperator::Between),
            other => Err(format!("Unknown value operator: '{other}'")),
        }
    }
}

/// Compares the **absolute value** of the transaction amount, so a rule for
/// "values over 100" matches a -150 expense and a +150 income alike.
/// `gt`/`gte`/`eq` read `min_cents`, `lt`/`lte` read `max_cents`, `between`
/// needs both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cents: Option<i64>,
    pub operator: ValueOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordOperator {
    /// Every keyword must match.
    And,
    /// Any keyword suffices.
    Or,
}

impl FromStr for KeywordOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "and" => Ok(KeywordOperator::And),
            "or" => Ok(KeywordOperator::Or),
            other => Err(format!("Unknown keyword operator: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionCriteria {
    pub keywords: Vec<String>,
    pub operator: KeywordOperator,
    /// Opt-in; matching is case-insensitive by default.
    #[serde(default)]
    pub case_sensitive: bool,
}

/// The criteria value embedded in a rule: a set of independent, optional
/// predicate dimensions, ANDed together. An empty criteria set is valid and
/// matches every transaction unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateCriteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueCriteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<DescriptionCriteria>,
    /// Allow-list of bank-account ids; absent or empty means all accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriteriaViolation {
    #[error("day range start must be between 1 and 31, got {0}")]
    DayRangeStartOutOfBounds(u8),
    #[error("day range end must be between 1 and 31, got {0}")]
    DayRangeEndOutOfBounds(u8),
    #[error("day range start {0} must be <= end {1}")]
    DayRangeInverted(u8, u8),
    #[error("month must be between 1 and 12, got {0}")]
    MonthOutOfBounds(u8),
    #[error("months must not be empty")]
    EmptyMonths,
    #[error("operator '{0}' requires min")]
    MissingMin(ValueOperator),
    #[error("operator '{0}' requires max")]
    MissingMax(ValueOperator),
    #[error("between requires min <= max, got min {0} and max {1}")]
    InvertedValueBounds(i64, i64),
    #[error("value bound must not be negative, got {0}")]
    NegativeValueBound(i64),
    #[error("keywords must not be empty")]
    EmptyKeywords,
    #[error("keywords must not contain blank entries")]
    BlankKeyword,
    #[error("accounts must not contain blank ids")]
    BlankAccount,
}

/// Outcome of statically validating a criteria value. Collects every
/// violation instead of stopping at the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<CriteriaViolation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

impl RuleCriteria {
    /// Static validation of this criteria value. Pure and total: never
    /// fails, reports all violations at once. Dimensions are independent, so
    /// no cross-dimension constraints exist, and "at least one predicate" is
    /// deliberately not enforced here.
    pub fn validate(&self) -> ValidationReport {
        let mut violations = Vec::new();

        if let Some(date) = &self.date {
            if let Some(range) = &date.day_range {
                if !(1..=31).contains(&range.start) {
                    violations.push(CriteriaViolation::DayRangeStartOutOfBounds(range.start));
                }
                if !(1..=31).contains(&range.end) {
                    violations.push(CriteriaViolation::DayRangeEndOutOfBounds(range.end));
                }
                if range.start > range.end {
                    violations.push(CriteriaViolation::DayRangeInverted(range.start, range.end));
                }
            }
            if let Some(months) = &date.months {
                if months.is_empty() {
                    violations.push(CriteriaViolation::EmptyMonths);
                }
                for &month in months {
                    if !(1..=12).contains(&month) {
                        violations.push(CriteriaViolation::MonthOutOfBounds(month));
                    }
                }
            }
        }

        if let Some(value) = &self.value {
            match value.operator {
                ValueOperator::Gt | ValueOperator::Gte | ValueOperator::Eq => {
                    if value.min_cents.is_none() {
                        violations.push(CriteriaViolation::MissingMin(value.operator));
                    }
                }
                ValueOperator::Lt | ValueOperator::Lte => {
                    if value.max_cents.is_none() {
                        violations.push(CriteriaViolation::MissingMax(value.operator));
                    }
                }
                ValueOperator::Between => {
                    if value.min_cents.is_none() {
                        violations.push(CriteriaViolation::MissingMin(ValueOperator::Between));
                    }
                    if value.max_cents.is_none() {
                        violations.push(CriteriaViolation::MissingMax(ValueOperator::Between));
                    }
                    if let (Some(min), Some(max)) = (value.min_cents, value.max_cents) {
                        if min > max {
                            violations.push(CriteriaViolation::InvertedValueBounds(min, max));
                        }
                    }
                }
            }
            for bound in [value.min_cents, value.max_cents].into_iter().flatten() {
                if bound < 0 {
                    violations.push(CriteriaViolation::NegativeValueBound(bound));
                }
            }
        }

        if let Some(description) = &self.description {
            if description.keywords.is_empty() {
                violations.push(CriteriaViolation::EmptyKeywords);
            } else if description.keywords.iter().any(|k| k.trim().is_empty()) {
                violations.push(CriteriaViolation::BlankKeyword);
            }
        }

        if let Some(accounts) = &self.accounts {
            if accounts.iter().any(|a| a.trim().is_empty()) {
                violations.push(CriteriaViolation::BlankAccount);
            }
        }

        ValidationReport { violations }
    }

    /// The dimensions this criteria actually constrains. A vacuous date
    /// block and an empty account list count as undefined.
    pub fn defined_dimensions(&self) -> Vec<CriteriaDimension> {
        let mut dimensions = Vec::new();
        if self.date.as_ref().is_some_and(|d| !d.is_vacuous()) {
            dimensions.push(CriteriaDimension::Date);
        }
        if self.value.is_some() {
            dimensions.push(CriteriaDimension::Value);
        }
        if self.description.is_some() {
            dimensions.push(CriteriaDimension::Description);
        }
        if self.accounts.as_ref().is_some_and(|a| !a.is_empty()) {
            dimensions.push(CriteriaDimension::Accounts);
        }
        dimensions
    }

    pub fn is_empty(&self) -> bool {
        self.defined_dimensions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_criteria_is_valid() {
        let criteria = RuleCriteria::default();
        assert!(criteria.validate().is_valid());
        assert!(criteria.is_empty());
    }

    #[test]
    fn inverted_between_bounds_rejected() {
        let criteria = RuleCriteria {
            value: Some(ValueCriteria {
                min_cents: Some(100_000),
                max_cents: Some(50_000),
                operator: ValueOperator::Between,
            }),
            ..Default::default()
        };
        let report = criteria.validate();
        assert!(!report.is_valid());
        assert!(report.messages().iter().any(|m| m.contains("min <= max")));
    }

    #[test]
    fn collects_all_violations_at_once() {
        let criteria = RuleCriteria {
            date: Some(DateCriteria {
                day_range: Some(DayRange { start: 0, end: 45 }),
                months: Some(vec![13]),
            }),
            value: Some(ValueCriteria {
                min_cents: Some(100_000),
                max_cents: Some(50_000),
                operator: ValueOperator::Between,
            }),
            description: Some(DescriptionCriteria {
                keywords: vec![],
                operator: KeywordOperator::Or,
                case_sensitive: false,
            }),
            accounts: Some(vec!["acc-1".to_string(), "".to_string()]),
        };
        let report = criteria.validate();
        assert_eq!(report.violations.len(), 6);
        assert!(report
            .violations
            .contains(&CriteriaViolation::DayRangeStartOutOfBounds(0)));
        assert!(report
            .violations
            .contains(&CriteriaViolation::DayRangeEndOutOfBounds(45)));
        assert!(report
            .violations
            .contains(&CriteriaViolation::MonthOutOfBounds(13)));
        assert!(report
            .violations
            .contains(&CriteriaViolation::InvertedValueBounds(100_000, 50_000)));
        assert!(report.violations.contains(&CriteriaViolation::EmptyKeywords));
        assert!(report.violations.contains(&CriteriaViolation::BlankAccount));
    }

    #[test]
    fn gt_without_min_rejected() {
        let criteria = RuleCriteria {
            value: Some(ValueCriteria {
                min_cents: None,
                max_cents: Some(100),
                operator: ValueOperator::Gt,
            }),
            ..Default::default()
        };
        let report = criteria.validate();
        assert!(report
            .violations
            .contains(&CriteriaViolation::MissingMin(ValueOperator::Gt)));
    }

    #[test]
    fn lt_without_max_rejected() {
        let criteria = RuleCriteria {
            value: Some(ValueCriteria {
                min_cents: Some(100),
                max_cents: None,
                operator: ValueOperator::Lt,
            }),
            ..Default::default()
        };
        assert!(criteria
            .validate()
            .violations
            .contains(&CriteriaViolation::MissingMax(ValueOperator::Lt)));
    }

    #[test]
    fn empty_months_rejected() {
        let criteria = RuleCriteria {
            date: Some(DateCriteria {
                day_range: None,
                months: Some(vec![]),
            }),
            ..Default::default()
        };
        assert!(criteria
            .validate()
            .violations
            .contains(&CriteriaViolation::EmptyMonths));
    }

    #[test]
    fn blank_keyword_rejected() {
        let criteria = RuleCriteria {
            description: Some(DescriptionCriteria {
                keywords: vec!["ALUGUEL".to_string(), "   ".to_string()],
                operator: KeywordOperator::And,
                case_sensitive: false,
            }),
            ..Default::default()
        };
        assert!(criteria
            .validate()
            .violations
            .contains(&CriteriaViolation::BlankKeyword));
    }

    #[test]
    fn vacuous_date_block_defines_no_dimension() {
        let criteria = RuleCriteria {
            date: Some(DateCriteria::default()),
            ..Default::default()
        };
        assert!(criteria.validate().is_valid());
        assert!(criteria.defined_dimensions().is_empty());
    }

    #[test]
    fn empty_account_list_defines_no_dimension() {
        let criteria = RuleCriteria {
            accounts: Some(vec![]),
            ..Default::default()
        };
        assert!(criteria.validate().is_valid());
        assert!(criteria.defined_dimensions().is_empty());
    }

    #[test]
    fn operator_parsing() {
        assert_eq!("between".parse::<ValueOperator>(), Ok(ValueOperator::Between));
        assert_eq!("GTE".parse::<ValueOperator>(), Ok(ValueOperator::Gte));
        assert!("like".parse::<ValueOperator>().is_err());
        assert_eq!("or".parse::<KeywordOperator>(), Ok(KeywordOperator::Or));
        assert!("xor".parse::<KeywordOperator>().is_err());
    }

    #[test]
    fn criteria_json_uses_camel_case() {
        let criteria = RuleCriteria {
            date: Some(DateCriteria {
                day_range: Some(DayRange { start: 1, end: 10 }),
                months: None,
            }),
            description: Some(DescriptionCriteria {
                keywords: vec!["IOF".to_string()],
                operator: KeywordOperator::Or,
                case_sensitive: true,
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&criteria).unwrap();
        assert!(json.contains("\"dayRange\""));
        assert!(json.contains("\"caseSensitive\""));

        let parsed: RuleCriteria = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, criteria);
    }

    #[test]
    fn case_sensitive_defaults_off() {
        let parsed: DescriptionCriteria =
            serde_json::from_str(r#"{"keywords":["IOF"],"operator":"or"}"#).unwrap();
        assert!(!parsed.case_sensitive);
    }
}

// SPDX-License-Identifier: MIT

//! Per-kind usage summary of evaluated conditions (telemetry only)

use serde::{Deserialize, Serialize};

use super::types::{Condition, FilterKind};

/// Label both presence kinds are reported under
pub const ONLINE_LABEL: &str = "online";

/// Filter kinds seen, passed and failed during one evaluation.
/// Each list holds a label at most once, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedFilters {
    pub filters: Vec<String>,
    pub passed_filters: Vec<String>,
    pub failed_filters: Vec<String>,
}

fn canonical_label(filter: &str) -> String {
    let label = filter.to_lowercase();
    let is_online = FilterKind::IsOnline.as_str().to_lowercase();
    let is_online_in_last = FilterKind::IsOnlineInLast.as_str().to_lowercase();

    if label == is_online || label == is_online_in_last {
        ONLINE_LABEL.to_string()
    } else {
        label
    }
}

fn insert_once(set: &mut Vec<String>, label: &str) {
    if !set.iter().any(|l| l == label) {
        set.push(label.to_string());
    }
}

/// Fold one condition into the summary
pub fn sum_filters(mut acc: UsedFilters, condition: &Condition) -> UsedFilters {
    let label = canonical_label(&condition.filter);

    insert_once(&mut acc.filters, &label);
    if condition.passed {
        insert_once(&mut acc.passed_filters, &label);
    } else {
        insert_once(&mut acc.failed_filters, &label);
    }
    acc
}

pub fn summarize<'a, I>(conditions: I) -> UsedFilters
where
    I: IntoIterator<Item = &'a Condition>,
{
    conditions
        .into_iter()
        .fold(UsedFilters::default(), sum_filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::FilterOperator;

    fn condition(filter: &str, passed: bool) -> Condition {
        Condition {
            filter: filter.to_string(),
            field: "field".to_string(),
            expected: "x".to_string(),
            actual: "x".to_string(),
            operator: FilterOperator::Equal,
            passed,
        }
    }

    #[test]
    fn test_single_passed_condition() {
        let used = summarize(&[condition("payload", true)]);
        assert_eq!(used.filters, vec!["payload"]);
        assert_eq!(used.passed_filters, vec!["payload"]);
        assert!(used.failed_filters.is_empty());
    }

    #[test]
    fn test_single_failed_condition() {
        let used = summarize(&[condition("subscriber", false)]);
        assert_eq!(used.filters, vec!["subscriber"]);
        assert!(used.passed_filters.is_empty());
        assert_eq!(used.failed_filters, vec!["subscriber"]);
    }

    #[test]
    fn test_online_kinds_fold_into_one_label() {
        let used = summarize(&[condition("isOnline", true), condition("isOnlineInLast", false)]);
        assert_eq!(used.filters, vec!["online"]);
        assert_eq!(used.passed_filters, vec!["online"]);
        assert_eq!(used.failed_filters, vec!["online"]);
    }

    #[test]
    fn test_labels_are_lowercased_and_deduplicated() {
        let used = summarize(&[
            condition("Payload", true),
            condition("payload", true),
            condition("previousStep", true),
            condition("webhook", false),
            condition("payload", false),
        ]);
        assert_eq!(used.filters, vec!["payload", "previousstep", "webhook"]);
        assert_eq!(used.passed_filters, vec!["payload", "previousstep"]);
        assert_eq!(used.failed_filters, vec!["webhook", "payload"]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(summarize(&Vec::<Condition>::new()), UsedFilters::default());
    }

    #[test]
    fn test_serialized_shape() {
        let used = summarize(&[condition("payload", true)]);
        let value = serde_json::to_value(&used).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "filters": ["payload"],
                "passedFilters": ["payload"],
                "failedFilters": []
            })
        );
    }
}

// SPDX-License-Identifier: MIT

//! Filter tree and trace types
//!
//! Filter trees are authored upstream and arrive as JSON or YAML. Every node
//! is tagged by its `on` key; groups use `on: group`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::store::{JobRef, Subscriber};

/// A node of a step's filter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "on")]
pub enum FilterNode {
    #[serde(rename = "group")]
    Group(FilterGroup),
    #[serde(rename = "payload")]
    Payload(FieldFilter),
    #[serde(rename = "subscriber")]
    Subscriber(FieldFilter),
    #[serde(rename = "tenant")]
    Tenant(FieldFilter),
    #[serde(rename = "webhook")]
    Webhook(WebhookFilter),
    #[serde(rename = "isOnline")]
    IsOnline(OnlineFilter),
    #[serde(rename = "isOnlineInLast")]
    IsOnlineInLast(OnlineInLastFilter),
    #[serde(rename = "previousStep")]
    PreviousStep(PreviousStepFilter),
}

impl FilterNode {
    /// Build an AND/OR group node
    pub fn group(value: GroupOperator, children: Vec<FilterNode>) -> Self {
        FilterNode::Group(FilterGroup { value, children })
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterNode::Group(_) => FilterKind::Group,
            FilterNode::Payload(_) => FilterKind::Payload,
            FilterNode::Subscriber(_) => FilterKind::Subscriber,
            FilterNode::Tenant(_) => FilterKind::Tenant,
            FilterNode::Webhook(_) => FilterKind::Webhook,
            FilterNode::IsOnline(_) => FilterKind::IsOnline,
            FilterNode::IsOnlineInLast(_) => FilterKind::IsOnlineInLast,
            FilterNode::PreviousStep(_) => FilterKind::PreviousStep,
        }
    }

    /// Whether evaluating this node requires an outbound network call
    pub fn is_network_bound(&self) -> bool {
        matches!(self, FilterNode::Webhook(_))
    }
}

/// The `on` tag of a filter node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Group,
    Payload,
    Subscriber,
    Tenant,
    Webhook,
    IsOnline,
    IsOnlineInLast,
    PreviousStep,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Group => "group",
            FilterKind::Payload => "payload",
            FilterKind::Subscriber => "subscriber",
            FilterKind::Tenant => "tenant",
            FilterKind::Webhook => "webhook",
            FilterKind::IsOnline => "isOnline",
            FilterKind::IsOnlineInLast => "isOnlineInLast",
            FilterKind::PreviousStep => "previousStep",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical operator of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    And,
    Or,
}

/// AND/OR group of child nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub value: GroupOperator,
    #[serde(default)]
    pub children: Vec<FilterNode>,
}

/// Payload, subscriber or tenant field comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: String,
}

/// Comparison against a field of a webhook response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookFilter {
    pub webhook_url: String,
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: String,
}

/// Subscriber is (or is not) currently online
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineFilter {
    pub value: bool,
}

/// Subscriber was online within the last `value` units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineInLastFilter {
    pub value: i64,
    pub time_operator: TimeUnit,
}

/// State of a message produced by an earlier step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousStepFilter {
    pub step: String,
    pub step_type: PreviousStepType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviousStepType {
    Read,
    Unread,
    Seen,
    Unseen,
    Opened,
}

impl PreviousStepType {
    /// Unread and unseen pass when the event did *not* happen
    pub fn is_negative(&self) -> bool {
        matches!(self, PreviousStepType::Unread | PreviousStepType::Unseen)
    }

    /// Seen/unseen look at the `seen` flag, everything else at `read`
    pub fn uses_seen_flag(&self) -> bool {
        matches!(self, PreviousStepType::Seen | PreviousStepType::Unseen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PreviousStepType::Read => "read",
            PreviousStepType::Unread => "unread",
            PreviousStepType::Seen => "seen",
            PreviousStepType::Unseen => "unseen",
            PreviousStepType::Opened => "opened",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Larger,
    Smaller,
    LargerEqual,
    SmallerEqual,
    IsDefined,
    In,
    NotIn,
    AnyIn,
    AllIn,
    Like,
    NotLike,
    Between,
    NotBetween,
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterOperator::Equal => "EQUAL",
            FilterOperator::NotEqual => "NOT_EQUAL",
            FilterOperator::Larger => "LARGER",
            FilterOperator::Smaller => "SMALLER",
            FilterOperator::LargerEqual => "LARGER_EQUAL",
            FilterOperator::SmallerEqual => "SMALLER_EQUAL",
            FilterOperator::IsDefined => "IS_DEFINED",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT_IN",
            FilterOperator::AnyIn => "ANY_IN",
            FilterOperator::AllIn => "ALL_IN",
            FilterOperator::Like => "LIKE",
            FilterOperator::NotLike => "NOT_LIKE",
            FilterOperator::Between => "BETWEEN",
            FilterOperator::NotBetween => "NOT_BETWEEN",
        };
        f.write_str(s)
    }
}

/// Authored values are strings, but YAML and hand-written JSON often carry
/// bare numbers and booleans.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar filter value, got {}",
            other
        ))),
    }
}

/// Per-call input of the evaluator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    #[serde(default)]
    pub subscriber: Option<Subscriber>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub tenant: Option<Value>,
    pub environment_id: String,
    pub organization_id: String,
    pub subscriber_id: String,
    pub transaction_id: String,
    #[serde(default)]
    pub job: Option<JobRef>,
}

/// The data field conditions are resolved against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Value>,
}

/// One record per evaluated leaf condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub filter: String,
    pub field: String,
    pub expected: String,
    pub actual: String,
    pub operator: FilterOperator,
    pub passed: bool,
}

/// The conditions evaluated for one top-level filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTrace {
    pub filter: FilterNode,
    pub variables: FilterVariables,
    pub conditions: Vec<Condition>,
}

impl ProcessingTrace {
    pub fn new(filter: FilterNode, variables: FilterVariables) -> Self {
        Self {
            filter,
            variables,
            conditions: Vec::new(),
        }
    }

    pub fn add_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }
}

/// Result returned to the orchestrator for one step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub passed: bool,
    pub variables: FilterVariables,
    pub traces: Vec<ProcessingTrace>,
    pub conditions: Vec<Condition>,
    pub used_filters: super::usage::UsedFilters,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_display() {
        assert_eq!(FilterOperator::Equal.to_string(), "EQUAL");
        assert_eq!(FilterOperator::SmallerEqual.to_string(), "SMALLER_EQUAL");
        assert_eq!(FilterOperator::IsDefined.to_string(), "IS_DEFINED");
        assert_eq!(FilterOperator::NotBetween.to_string(), "NOT_BETWEEN");
    }

    #[test]
    fn test_deserialize_group_with_children() {
        let node: FilterNode = serde_json::from_value(json!({
            "on": "group",
            "value": "AND",
            "children": [
                {"on": "payload", "field": "varField", "operator": "EQUAL", "value": "true"},
                {"on": "webhook", "webhookUrl": "https://example.com", "field": "ok", "operator": "EQUAL", "value": "true"},
                {"on": "isOnlineInLast", "value": 5, "timeOperator": "minutes"},
                {"on": "previousStep", "step": "step-1", "stepType": "unread"}
            ]
        }))
        .unwrap();

        let FilterNode::Group(group) = node else {
            panic!("Expected group");
        };
        assert_eq!(group.value, GroupOperator::And);
        assert_eq!(group.children.len(), 4);
        assert_eq!(group.children[0].kind(), FilterKind::Payload);
        assert!(group.children[1].is_network_bound());
        assert_eq!(
            group.children[2],
            FilterNode::IsOnlineInLast(OnlineInLastFilter {
                value: 5,
                time_operator: TimeUnit::Minutes,
            })
        );
        assert_eq!(
            group.children[3],
            FilterNode::PreviousStep(PreviousStepFilter {
                step: "step-1".to_string(),
                step_type: PreviousStepType::Unread,
            })
        );
    }

    #[test]
    fn test_scalar_values_become_strings() {
        let node: FilterNode = serde_json::from_value(json!({
            "on": "payload", "field": "count", "operator": "LARGER", "value": 3
        }))
        .unwrap();
        let FilterNode::Payload(filter) = node else {
            panic!("Expected payload filter");
        };
        assert_eq!(filter.value, "3");

        let node: FilterNode = serde_json::from_value(json!({
            "on": "subscriber", "field": "data.vip", "operator": "EQUAL", "value": true
        }))
        .unwrap();
        let FilterNode::Subscriber(filter) = node else {
            panic!("Expected subscriber filter");
        };
        assert_eq!(filter.value, "true");
    }

    #[test]
    fn test_group_without_children_defaults_to_empty() {
        let node: FilterNode = serde_json::from_value(json!({"on": "group", "value": "OR"})).unwrap();
        assert_eq!(node, FilterNode::group(GroupOperator::Or, vec![]));
    }

    #[test]
    fn test_previous_step_type_flags() {
        assert!(PreviousStepType::Unread.is_negative());
        assert!(PreviousStepType::Unseen.is_negative());
        assert!(!PreviousStepType::Opened.is_negative());
        assert!(PreviousStepType::Seen.uses_seen_flag());
        assert!(!PreviousStepType::Read.uses_seen_flag());
    }
}

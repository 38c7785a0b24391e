// SPDX-License-Identifier: MIT

//! Presence conditions: `isOnline` and `isOnlineInLast`

use chrono::{DateTime, Utc};

use super::types::{
    Condition, FilterKind, FilterOperator, OnlineFilter, OnlineInLastFilter, TimeUnit,
};
use crate::store::Subscriber;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Subscribers created before presence tracking carry neither field and
/// never satisfy a presence filter, whatever the expected value.
fn has_presence_data(subscriber: Option<&Subscriber>) -> bool {
    subscriber.is_some_and(|s| s.is_online.is_some() || s.last_online_at.is_some())
}

/// Recorded `actual` of an `isOnline` condition: anything but a set `true` flag is "false"
fn is_online_string(subscriber: Option<&Subscriber>) -> String {
    let online = subscriber.and_then(|s| s.is_online).unwrap_or(false);
    online.to_string()
}

/// Whole `unit`s elapsed between `since` and `now`, truncated toward zero
pub fn elapsed_in(unit: TimeUnit, now: DateTime<Utc>, since: DateTime<Utc>) -> i64 {
    let diff = now.signed_duration_since(since);
    match unit {
        TimeUnit::Minutes => diff.num_minutes(),
        TimeUnit::Hours => diff.num_hours(),
        TimeUnit::Days => diff.num_days(),
    }
}

pub fn evaluate_is_online(filter: &OnlineFilter, subscriber: Option<&Subscriber>) -> Condition {
    let expected = filter.value.to_string();
    let actual = is_online_string(subscriber);

    let passed = subscriber.and_then(|s| s.is_online) == Some(filter.value);

    Condition {
        filter: FilterKind::IsOnline.to_string(),
        field: "isOnline".to_string(),
        expected,
        actual,
        operator: FilterOperator::Equal,
        passed,
    }
}

pub fn evaluate_is_online_in_last(
    filter: &OnlineInLastFilter,
    subscriber: Option<&Subscriber>,
    now: DateTime<Utc>,
) -> Condition {
    let label = FilterKind::IsOnlineInLast.to_string();

    if !has_presence_data(subscriber) {
        return Condition {
            filter: label,
            field: "lastOnlineAt".to_string(),
            expected: filter.value.to_string(),
            actual: String::new(),
            operator: FilterOperator::Larger,
            passed: false,
        };
    }

    let online = subscriber.and_then(|s| s.is_online).unwrap_or(false);
    if online {
        return Condition {
            filter: label,
            field: "isOnline".to_string(),
            expected: "true".to_string(),
            actual: "true".to_string(),
            operator: FilterOperator::Larger,
            passed: true,
        };
    }

    let elapsed = subscriber
        .and_then(|s| s.last_online_at)
        .map(|last| elapsed_in(filter.time_operator, now, last));
    let passed = elapsed.is_some_and(|diff| diff >= 0 && diff <= filter.value);

    Condition {
        filter: label,
        field: "lastOnlineAt".to_string(),
        expected: filter.value.to_string(),
        actual: elapsed.map(|d| d.to_string()).unwrap_or_default(),
        operator: FilterOperator::Larger,
        passed,
    }
}

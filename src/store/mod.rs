// SPDX-License-Identifier: MIT

//! Collaborator contracts consumed by the filter evaluator
//!
//! Persistence lives outside this crate. The evaluator only sees these narrow
//! async traits; a miss is `Ok(None)` (or a zero count), never an error.

mod cache;
mod memory;

pub use cache::{SubscriberCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
pub use memory::{LogAuditSink, MemoryAuditSink, MemoryStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::FilterError;

/// Delivery channel of a step or message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    InApp,
    Email,
    Sms,
    Chat,
    Push,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::InApp => "in_app",
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Chat => "chat",
            ChannelType::Push => "push",
        }
    }
}

/// Subscriber profile snapshot, including presence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub subscriber_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_online_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    pub fn new(subscriber_id: impl Into<String>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            ..Default::default()
        }
    }

    /// Structured form used for field path resolution
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The job currently being evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRef {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub channel: ChannelType,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// A job produced by an earlier step of the same workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub transaction_id: String,
    pub subscriber_id: String,
    pub environment_id: String,
    pub step_id: String,
    pub channel: ChannelType,
}

/// Scope of a previous-step job lookup
#[derive(Debug, Clone, PartialEq)]
pub struct StepLookup {
    pub transaction_id: String,
    pub subscriber_id: String,
    pub environment_id: String,
    pub step_id: String,
}

/// Message sent by a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub job_id: String,
    pub environment_id: String,
    pub channel: ChannelType,
    #[serde(default)]
    pub seen: Option<bool>,
    #[serde(default)]
    pub read: Option<bool>,
}

/// An "opened" delivery event reported by an email provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedEvent {
    pub environment_id: String,
    pub job_id: String,
    pub message_id: String,
}

/// Scope of an opened-event count
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedQuery {
    pub environment_id: String,
    pub parent_job_id: Option<String>,
    pub message_id: String,
}

/// Environment record holding the keys webhook requests are signed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub organization_id: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Filter processing record handed to the audit sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub job_id: String,
    pub environment_id: String,
    pub organization_id: String,
    pub subscriber_id: String,
    pub transaction_id: String,
    pub detail: String,
    pub passed: bool,
    pub raw: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn find_by_id(
        &self,
        environment_id: &str,
        subscriber_id: &str,
    ) -> Result<Option<Subscriber>, FilterError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn find_for_step(&self, lookup: &StepLookup) -> Result<Option<Job>, FilterError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_job(
        &self,
        environment_id: &str,
        job_id: &str,
    ) -> Result<Option<Message>, FilterError>;
}

#[async_trait]
pub trait ExecutionDetailsRepository: Send + Sync {
    async fn count_opened(&self, query: &OpenedQuery) -> Result<usize, FilterError>;
}

#[async_trait]
pub trait EnvironmentRepository: Send + Sync {
    async fn find_by_id(
        &self,
        environment_id: &str,
        organization_id: &str,
    ) -> Result<Option<Environment>, FilterError>;
}

/// Observability sink for processing traces. Failures never fail an evaluation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), FilterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscriber_value_omits_unset_fields() {
        let mut subscriber = Subscriber::new("sub-1");
        subscriber.first_name = Some("Ada".to_string());
        subscriber.data = Some(json!({"plan": "pro"}));

        let value = subscriber.to_value();
        assert_eq!(value["subscriberId"], "sub-1");
        assert_eq!(value["firstName"], "Ada");
        assert_eq!(value["data"]["plan"], "pro");
        assert!(value.get("isOnline").is_none());
        assert!(value.get("lastOnlineAt").is_none());
    }

    #[test]
    fn test_channel_type_serde() {
        assert_eq!(serde_json::to_value(ChannelType::InApp).unwrap(), json!("in_app"));
        let channel: ChannelType = serde_json::from_value(json!("email")).unwrap();
        assert_eq!(channel, ChannelType::Email);
        assert_eq!(channel.as_str(), "email");
    }
}

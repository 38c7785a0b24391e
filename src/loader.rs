// SPDX-License-Identifier: MIT

//! Fixture loader - YAML/JSON loading of filter trees and evaluation inputs
//!
//! A fixture bundles the filters of one step, the evaluation context and the
//! records the in-memory store should be seeded with.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::FilterError;
use crate::filter::{Condition, EvaluationContext, FilterNode};
use crate::store::{Environment, Job, MemoryStore, Message, OpenedEvent, Subscriber};

/// Records loaded into a [`MemoryStore`]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    /// Subscribers of the context's environment
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub opened_events: Vec<OpenedEvent>,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

/// One step evaluation: filters, context and seed records
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Fixture {
    #[serde(default)]
    pub filters: Option<Vec<FilterNode>>,
    pub context: EvaluationContext,
    #[serde(default)]
    pub seed: SeedData,
}

impl Fixture {
    /// Build an in-memory store holding the fixture's seed records
    pub async fn seed_store(&self) -> MemoryStore {
        let store = MemoryStore::new();
        for subscriber in &self.seed.subscribers {
            store
                .insert_subscriber(&self.context.environment_id, subscriber.clone())
                .await;
        }
        for job in &self.seed.jobs {
            store.insert_job(job.clone()).await;
        }
        for message in &self.seed.messages {
            store.insert_message(message.clone()).await;
        }
        for event in &self.seed.opened_events {
            store.insert_opened_event(event.clone()).await;
        }
        for environment in &self.seed.environments {
            store.insert_environment(environment.clone()).await;
        }
        store
    }
}

/// Loads fixtures and condition lists from YAML or JSON files
pub struct FixtureLoader;

impl FixtureLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a fixture; `.json` files are parsed as JSON, anything else as YAML
    pub fn load_fixture<P: AsRef<Path>>(&self, path: P) -> Result<Fixture, FilterError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        if is_json(path) {
            Self::parse_json(&content)
        } else {
            Self::parse_yaml(&content)
        }
    }

    /// Load a flattened condition list, e.g. the `conditions` of a previous run
    pub fn load_conditions<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Condition>, FilterError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        if is_json(path) {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    pub fn parse_yaml(content: &str) -> Result<Fixture, FilterError> {
        let fixture: Fixture = serde_yaml::from_str(content)?;
        Ok(fixture)
    }

    pub fn parse_json(content: &str) -> Result<Fixture, FilterError> {
        let fixture: Fixture = serde_json::from_str(content)?;
        Ok(fixture)
    }
}

impl Default for FixtureLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterOperator, GroupOperator, TimeUnit};
    use crate::store::SubscriberRepository;
    use std::io::Write;

    const YAML_FIXTURE: &str = r#"
filters:
  - on: group
    value: AND
    children:
      - on: payload
        field: order.total
        operator: LARGER
        value: 100
      - on: isOnlineInLast
        value: 2
        timeOperator: hours
context:
  environmentId: env-1
  organizationId: org-1
  subscriberId: sub-1
  transactionId: tx-1
  payload:
    order:
      total: 150
seed:
  subscribers:
    - subscriberId: sub-1
      isOnline: false
      lastOnlineAt: "2024-03-01T11:00:00Z"
  environments:
    - id: env-1
      organizationId: org-1
      apiKeys: ["secret"]
"#;

    #[test]
    fn test_parse_yaml_fixture() {
        let fixture = FixtureLoader::parse_yaml(YAML_FIXTURE).unwrap();
        let filters = fixture.filters.unwrap();
        assert_eq!(filters.len(), 1);

        let FilterNode::Group(group) = &filters[0] else {
            panic!("Expected group");
        };
        assert_eq!(group.value, GroupOperator::And);
        match &group.children[0] {
            FilterNode::Payload(f) => {
                assert_eq!(f.field, "order.total");
                assert_eq!(f.operator, FilterOperator::Larger);
                assert_eq!(f.value, "100");
            }
            other => panic!("Expected payload filter, got {:?}", other),
        }
        match &group.children[1] {
            FilterNode::IsOnlineInLast(f) => {
                assert_eq!(f.value, 2);
                assert_eq!(f.time_operator, TimeUnit::Hours);
            }
            other => panic!("Expected isOnlineInLast filter, got {:?}", other),
        }

        assert_eq!(fixture.context.subscriber_id, "sub-1");
        assert_eq!(fixture.seed.subscribers[0].is_online, Some(false));
        assert!(fixture.seed.subscribers[0].last_online_at.is_some());
    }

    #[test]
    fn test_parse_json_fixture_without_filters() {
        let json = r#"{
            "context": {
                "environmentId": "env-1",
                "organizationId": "org-1",
                "subscriberId": "sub-1",
                "transactionId": "tx-1"
            }
        }"#;
        let fixture = FixtureLoader::parse_json(json).unwrap();
        assert!(fixture.filters.is_none());
        assert!(fixture.seed.jobs.is_empty());
    }

    #[test]
    fn test_invalid_fixture_returns_error() {
        let yaml = r#"
filters:
  - on: nowhere
context: {}
"#;
        let result = FixtureLoader::parse_yaml(yaml);
        assert!(matches!(result, Err(FilterError::Yaml(_))));
    }

    #[tokio::test]
    async fn test_seed_store_scopes_subscribers_to_context_environment() {
        let fixture = FixtureLoader::parse_yaml(YAML_FIXTURE).unwrap();
        let store = fixture.seed_store().await;

        assert!(store.find_by_id("env-1", "sub-1").await.unwrap().is_some());
        assert!(store.find_by_id("env-2", "sub-1").await.unwrap().is_none());
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();

        let fixture_path = dir.path().join("fixture.yaml");
        fs::File::create(&fixture_path)
            .unwrap()
            .write_all(YAML_FIXTURE.as_bytes())
            .unwrap();
        let fixture = FixtureLoader::new().load_fixture(&fixture_path).unwrap();
        assert!(fixture.filters.is_some());

        let conditions_path = dir.path().join("conditions.json");
        fs::write(
            &conditions_path,
            r#"[{"filter": "payload", "field": "a", "expected": "1", "actual": "1", "operator": "EQUAL", "passed": true}]"#,
        )
        .unwrap();
        let conditions = FixtureLoader::new()
            .load_conditions(&conditions_path)
            .unwrap();
        assert_eq!(conditions.len(), 1);
        assert!(conditions[0].passed);

        let missing = FixtureLoader::new().load_fixture(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(FilterError::Io(_))));
    }
}

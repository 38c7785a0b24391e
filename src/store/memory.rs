// SPDX-License-Identifier: MIT

//! In-memory collaborators used by the CLI and tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    AuditRecord, AuditSink, Environment, EnvironmentRepository, ExecutionDetailsRepository, Job,
    JobRepository, Message, MessageRepository, OpenedEvent, OpenedQuery, StepLookup, Subscriber,
    SubscriberRepository,
};
use crate::error::FilterError;

#[derive(Default)]
struct Tables {
    subscribers: HashMap<(String, String), Subscriber>,
    jobs: Vec<Job>,
    messages: Vec<Message>,
    opened: Vec<OpenedEvent>,
    environments: HashMap<String, Environment>,
}

/// Shared in-memory store implementing every repository contract
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_subscriber(&self, environment_id: &str, subscriber: Subscriber) {
        let mut tables = self.tables.write().await;
        tables.subscribers.insert(
            (environment_id.to_string(), subscriber.subscriber_id.clone()),
            subscriber,
        );
    }

    pub async fn insert_job(&self, job: Job) {
        self.tables.write().await.jobs.push(job);
    }

    pub async fn insert_message(&self, message: Message) {
        self.tables.write().await.messages.push(message);
    }

    pub async fn insert_opened_event(&self, event: OpenedEvent) {
        self.tables.write().await.opened.push(event);
    }

    pub async fn insert_environment(&self, environment: Environment) {
        let mut tables = self.tables.write().await;
        tables
            .environments
            .insert(environment.id.clone(), environment);
    }
}

#[async_trait]
impl SubscriberRepository for MemoryStore {
    async fn find_by_id(
        &self,
        environment_id: &str,
        subscriber_id: &str,
    ) -> Result<Option<Subscriber>, FilterError> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscribers
            .get(&(environment_id.to_string(), subscriber_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn find_for_step(&self, lookup: &StepLookup) -> Result<Option<Job>, FilterError> {
        let tables = self.tables.read().await;
        Ok(tables
            .jobs
            .iter()
            .find(|job| {
                job.transaction_id == lookup.transaction_id
                    && job.subscriber_id == lookup.subscriber_id
                    && job.environment_id == lookup.environment_id
                    && job.step_id == lookup.step_id
            })
            .cloned())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn find_by_job(
        &self,
        environment_id: &str,
        job_id: &str,
    ) -> Result<Option<Message>, FilterError> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .find(|m| m.environment_id == environment_id && m.job_id == job_id)
            .cloned())
    }
}

#[async_trait]
impl ExecutionDetailsRepository for MemoryStore {
    async fn count_opened(&self, query: &OpenedQuery) -> Result<usize, FilterError> {
        let tables = self.tables.read().await;
        Ok(tables
            .opened
            .iter()
            .filter(|e| e.environment_id == query.environment_id)
            .filter(|e| e.message_id == query.message_id)
            .filter(|e| {
                query
                    .parent_job_id
                    .as_ref()
                    .map_or(true, |parent| &e.job_id == parent)
            })
            .count())
    }
}

#[async_trait]
impl EnvironmentRepository for MemoryStore {
    async fn find_by_id(
        &self,
        environment_id: &str,
        organization_id: &str,
    ) -> Result<Option<Environment>, FilterError> {
        let tables = self.tables.read().await;
        Ok(tables
            .environments
            .get(environment_id)
            .filter(|env| env.organization_id == organization_id)
            .cloned())
    }
}

/// Audit sink that keeps every record in memory
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<RwLock<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), FilterError> {
        self.records.write().await.push(record);
        Ok(())
    }
}

/// Audit sink that writes records through the `log` facade
#[derive(Clone, Copy, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), FilterError> {
        log::info!(
            "{} for job {} (transaction {}): passed={} {}",
            record.detail,
            record.job_id,
            record.transaction_id,
            record.passed,
            record.raw
        );
        Ok(())
    }
}

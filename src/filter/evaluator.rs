// SPDX-License-Identifier: MIT

//! Filter tree evaluator
//!
//! A step's filter list is a disjunction: the first top-level filter that
//! passes wins. Inside a group, children that need no network call are
//! evaluated before webhook children, and evaluation stops as soon as the
//! group's outcome is known, so a webhook is only called when its answer
//! can still change the verdict.

use futures::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;

use super::operator::evaluate_field;
use super::presence::{evaluate_is_online, evaluate_is_online_in_last, Clock, SystemClock};
use super::previous_step::PreviousStepEvaluator;
use super::types::{
    EvaluationContext, FilterGroup, FilterKind, FilterNode, FilterOutcome, FilterVariables,
    GroupOperator, ProcessingTrace,
};
use super::usage::summarize;
use super::webhook::{WebhookEvaluator, WebhookTransport};
use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::store::{
    AuditRecord, AuditSink, EnvironmentRepository, ExecutionDetailsRepository, JobRepository,
    MemoryStore, MessageRepository, Subscriber, SubscriberCache, SubscriberRepository,
};

/// Detail attached to audit records of filter processing
pub const FILTER_PROCESSING_DETAIL: &str = "Filter processing";

/// Collaborators the evaluator depends on
#[derive(Clone)]
pub struct FilterServices {
    pub subscribers: Arc<dyn SubscriberRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub execution_details: Arc<dyn ExecutionDetailsRepository>,
    pub environments: Arc<dyn EnvironmentRepository>,
    pub audit: Arc<dyn AuditSink>,
    pub webhook: Arc<dyn WebhookTransport>,
    pub clock: Arc<dyn Clock>,
}

impl FilterServices {
    /// Wire every repository to one in-memory store
    pub fn with_store(
        store: MemoryStore,
        audit: Arc<dyn AuditSink>,
        webhook: Arc<dyn WebhookTransport>,
    ) -> Self {
        let store = Arc::new(store);
        Self {
            subscribers: store.clone(),
            jobs: store.clone(),
            messages: store.clone(),
            execution_details: store.clone(),
            environments: store,
            audit,
            webhook,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Evaluates step filters against an [`EvaluationContext`]
pub struct ConditionsFilter {
    subscribers: SubscriberCache,
    previous_step: PreviousStepEvaluator,
    webhook: WebhookEvaluator,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl ConditionsFilter {
    pub fn new(services: FilterServices, config: &FilterConfig) -> Self {
        let subscribers = SubscriberCache::new(services.subscribers)
            .with_clock(services.clock.clone())
            .with_limits(config.subscriber_cache_ttl, config.subscriber_cache_capacity);
        Self {
            previous_step: PreviousStepEvaluator::new(
                services.jobs,
                services.messages,
                services.execution_details,
            ),
            webhook: WebhookEvaluator::new(
                services.webhook,
                services.environments,
                subscribers.clone(),
                config.signature_header.clone(),
            ),
            subscribers,
            audit: services.audit,
            clock: services.clock,
        }
    }

    /// Decide whether a step runs.
    ///
    /// Configuration and webhook failures abort the evaluation; every other
    /// outcome is a verdict.
    pub async fn filter(
        &self,
        filters: Option<&[FilterNode]>,
        ctx: &EvaluationContext,
    ) -> Result<FilterOutcome, FilterError> {
        let filters = match filters {
            Some(filters) if !filters.is_empty() => filters,
            _ => {
                log::debug!("No filters for job {:?}, passing", ctx.job.as_ref().map(|j| &j.id));
                return Ok(Self::outcome(true, base_variables(ctx), vec![]));
            }
        };

        let variables = self.variables(ctx).await?;
        let mut traces = Vec::new();
        let mut passed = false;

        for filter in filters {
            let mut trace = ProcessingTrace::new(filter.clone(), variables.clone());
            let filter_passed = self
                .evaluate_node(filter, ctx, &variables, &mut trace)
                .await?;

            self.record_audit(ctx, &trace, filter_passed).await;
            traces.push(trace);

            if filter_passed {
                passed = true;
                break;
            }
        }

        log::info!(
            "Filters for transaction {} {} after {} of {} filter(s)",
            ctx.transaction_id,
            if passed { "passed" } else { "failed" },
            traces.len(),
            filters.len()
        );
        Ok(Self::outcome(passed, variables, traces))
    }

    fn outcome(
        passed: bool,
        variables: FilterVariables,
        traces: Vec<ProcessingTrace>,
    ) -> FilterOutcome {
        let conditions: Vec<_> = traces
            .iter()
            .flat_map(|t| t.conditions.iter().cloned())
            .collect();
        let used_filters = summarize(&conditions);
        FilterOutcome {
            passed,
            variables,
            traces,
            conditions,
            used_filters,
        }
    }

    async fn variables(&self, ctx: &EvaluationContext) -> Result<FilterVariables, FilterError> {
        let mut variables = base_variables(ctx);
        if variables.subscriber.is_none() && !ctx.subscriber_id.is_empty() {
            variables.subscriber = self
                .subscribers
                .get(&ctx.environment_id, &ctx.subscriber_id)
                .await?
                .map(|s| s.to_value());
        }
        Ok(variables)
    }

    async fn presence_subscriber(
        &self,
        ctx: &EvaluationContext,
    ) -> Result<Option<Subscriber>, FilterError> {
        if let Some(subscriber) = &ctx.subscriber {
            return Ok(Some(subscriber.clone()));
        }
        self.subscribers
            .get(&ctx.environment_id, &ctx.subscriber_id)
            .await
    }

    fn evaluate_node<'a>(
        &'a self,
        node: &'a FilterNode,
        ctx: &'a EvaluationContext,
        variables: &'a FilterVariables,
        trace: &'a mut ProcessingTrace,
    ) -> BoxFuture<'a, Result<bool, FilterError>> {
        Box::pin(async move {
            let condition = match node {
                FilterNode::Group(group) => {
                    return self.evaluate_group(group, ctx, variables, trace).await;
                }
                FilterNode::Payload(f) => evaluate_field(
                    FilterKind::Payload.as_str(),
                    variables.payload.as_ref(),
                    &f.field,
                    f.operator,
                    &f.value,
                ),
                FilterNode::Subscriber(f) => evaluate_field(
                    FilterKind::Subscriber.as_str(),
                    variables.subscriber.as_ref(),
                    &f.field,
                    f.operator,
                    &f.value,
                ),
                FilterNode::Tenant(f) => evaluate_field(
                    FilterKind::Tenant.as_str(),
                    variables.tenant.as_ref(),
                    &f.field,
                    f.operator,
                    &f.value,
                ),
                FilterNode::Webhook(f) => self.webhook.evaluate(f, ctx, variables).await?,
                FilterNode::IsOnline(f) => {
                    let subscriber = self.presence_subscriber(ctx).await?;
                    evaluate_is_online(f, subscriber.as_ref())
                }
                FilterNode::IsOnlineInLast(f) => {
                    let subscriber = self.presence_subscriber(ctx).await?;
                    evaluate_is_online_in_last(f, subscriber.as_ref(), self.clock.now())
                }
                FilterNode::PreviousStep(f) => self.previous_step.evaluate(f, ctx).await?,
            };

            log::debug!(
                "{} condition on '{}' {} {}: actual '{}' -> {}",
                condition.filter,
                condition.field,
                condition.operator,
                condition.expected,
                condition.actual,
                condition.passed
            );
            let passed = condition.passed;
            trace.add_condition(condition);
            Ok(passed)
        })
    }

    /// Children run sequentially: local children first, webhook children
    /// last, stopping as soon as the group's outcome is decided.
    async fn evaluate_group(
        &self,
        group: &FilterGroup,
        ctx: &EvaluationContext,
        variables: &FilterVariables,
        trace: &mut ProcessingTrace,
    ) -> Result<bool, FilterError> {
        if group.children.is_empty() {
            return Ok(true);
        }

        let (network, local): (Vec<&FilterNode>, Vec<&FilterNode>) = group
            .children
            .iter()
            .partition(|child| child.is_network_bound());

        // AND stops at the first failure, OR at the first pass
        let decisive = group.value == GroupOperator::Or;
        for child in local.into_iter().chain(network) {
            if self.evaluate_node(child, ctx, variables, trace).await? == decisive {
                log::debug!("{:?} group decided early: {}", group.value, decisive);
                return Ok(decisive);
            }
        }
        Ok(!decisive)
    }

    async fn record_audit(&self, ctx: &EvaluationContext, trace: &ProcessingTrace, passed: bool) {
        let Some(job) = &ctx.job else {
            return;
        };

        let raw = match serde_json::to_string(trace) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Failed to serialize processing trace for job {}: {}", job.id, e);
                return;
            }
        };
        let record = AuditRecord {
            id: Uuid::new_v4(),
            job_id: job.id.clone(),
            environment_id: ctx.environment_id.clone(),
            organization_id: ctx.organization_id.clone(),
            subscriber_id: ctx.subscriber_id.clone(),
            transaction_id: ctx.transaction_id.clone(),
            detail: FILTER_PROCESSING_DETAIL.to_string(),
            passed,
            raw,
            created_at: self.clock.now(),
        };

        if let Err(e) = self.audit.record(record).await {
            log::warn!("Failed to record filter processing for job {}: {}", job.id, e);
        }
    }
}

fn base_variables(ctx: &EvaluationContext) -> FilterVariables {
    FilterVariables {
        subscriber: ctx.subscriber.as_ref().map(|s| s.to_value()),
        payload: ctx
            .payload
            .clone()
            .or_else(|| ctx.job.as_ref().and_then(|j| j.payload.clone())),
        tenant: ctx.tenant.clone(),
    }
}

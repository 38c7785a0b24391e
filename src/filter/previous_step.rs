// SPDX-License-Identifier: MIT

//! `previousStep` conditions: read/seen/opened state of an earlier step's message

use std::sync::Arc;

use super::types::{Condition, EvaluationContext, FilterKind, FilterOperator, PreviousStepFilter};
use crate::error::FilterError;
use crate::store::{
    ChannelType, ExecutionDetailsRepository, JobRepository, MessageRepository, OpenedQuery,
    StepLookup,
};

pub struct PreviousStepEvaluator {
    jobs: Arc<dyn JobRepository>,
    messages: Arc<dyn MessageRepository>,
    execution_details: Arc<dyn ExecutionDetailsRepository>,
}

impl PreviousStepEvaluator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        messages: Arc<dyn MessageRepository>,
        execution_details: Arc<dyn ExecutionDetailsRepository>,
    ) -> Self {
        Self {
            jobs,
            messages,
            execution_details,
        }
    }

    /// A missing job or message passes: work queued before the referenced
    /// step existed must not be blocked.
    pub async fn evaluate(
        &self,
        filter: &PreviousStepFilter,
        ctx: &EvaluationContext,
    ) -> Result<Condition, FilterError> {
        let expected = !filter.step_type.is_negative();
        let mut condition = Condition {
            filter: FilterKind::PreviousStep.to_string(),
            field: filter.step_type.as_str().to_string(),
            expected: expected.to_string(),
            actual: String::new(),
            operator: FilterOperator::Equal,
            passed: true,
        };

        let lookup = StepLookup {
            transaction_id: ctx.transaction_id.clone(),
            subscriber_id: ctx.subscriber_id.clone(),
            environment_id: ctx.environment_id.clone(),
            step_id: filter.step.clone(),
        };
        let Some(job) = self.jobs.find_for_step(&lookup).await? else {
            log::debug!("No job found for previous step {}, passing", filter.step);
            return Ok(condition);
        };
        let Some(message) = self
            .messages
            .find_by_job(&ctx.environment_id, &job.id)
            .await?
        else {
            log::debug!("No message found for job {}, passing", job.id);
            return Ok(condition);
        };

        let happened = if message.channel == ChannelType::Email {
            let query = OpenedQuery {
                environment_id: ctx.environment_id.clone(),
                parent_job_id: ctx.job.as_ref().and_then(|j| j.parent_id.clone()),
                message_id: message.id.clone(),
            };
            Some(self.execution_details.count_opened(&query).await? > 0)
        } else if filter.step_type.uses_seen_flag() {
            message.seen
        } else {
            message.read
        };

        condition.actual = happened
            .map(|b| b.to_string())
            .unwrap_or_else(|| super::operator::UNDEFINED.to_string());
        condition.passed = happened == Some(expected);
        Ok(condition)
    }
}

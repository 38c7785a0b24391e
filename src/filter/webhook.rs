// SPDX-License-Identifier: MIT

//! Webhook-backed conditions
//!
//! A webhook condition POSTs the subscriber, payload and channel to a
//! customer endpoint, signs the request with the environment's API key and
//! compares one field of the JSON response. Any failure of the call aborts
//! the evaluation instead of counting as a mismatch.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::operator::evaluate_field;
use super::signature::sign_environment;
use super::types::{Condition, EvaluationContext, FilterKind, FilterVariables, WebhookFilter};
use crate::error::FilterError;
use crate::store::{EnvironmentRepository, SubscriberCache};

/// Outbound POST used by webhook conditions
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `body` as JSON and return the decoded JSON response.
    async fn post(
        &self,
        url: &str,
        body: &Value,
        headers: &[(String, String)],
    ) -> Result<Value, FilterError>;
}

/// `reqwest` transport with a per-request timeout
pub struct HttpWebhookTransport {
    client: Client,
}

impl HttpWebhookTransport {
    pub fn new(timeout: Duration) -> Result<Self, FilterError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FilterError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn post(
        &self,
        url: &str,
        body: &Value,
        headers: &[(String, String)],
    ) -> Result<Value, FilterError> {
        let target =
            Url::parse(url).map_err(|e| FilterError::webhook(url, format!("invalid url: {}", e)))?;

        let mut request = self
            .client
            .post(target)
            .header("Accept", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FilterError::webhook(url, "request timed out")
            } else {
                FilterError::webhook(url, e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FilterError::webhook(url, format!("status {}", status)));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| FilterError::webhook(url, e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| FilterError::webhook(url, format!("invalid JSON response: {}", e)))
    }
}

pub struct WebhookEvaluator {
    transport: Arc<dyn WebhookTransport>,
    environments: Arc<dyn EnvironmentRepository>,
    subscribers: SubscriberCache,
    signature_header: String,
}

impl WebhookEvaluator {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        environments: Arc<dyn EnvironmentRepository>,
        subscribers: SubscriberCache,
        signature_header: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            environments,
            subscribers,
            signature_header: signature_header.into(),
        }
    }

    pub async fn evaluate(
        &self,
        filter: &WebhookFilter,
        ctx: &EvaluationContext,
        variables: &FilterVariables,
    ) -> Result<Condition, FilterError> {
        let payload = self.build_payload(ctx, variables).await?;
        let signature = self.sign(ctx).await?;
        let headers = vec![(self.signature_header.clone(), signature)];

        log::debug!("Calling webhook filter {}", filter.webhook_url);
        let response = self
            .transport
            .post(&filter.webhook_url, &payload, &headers)
            .await
            .map_err(|e| {
                log::error!("{}", e);
                e
            })?;

        Ok(evaluate_field(
            FilterKind::Webhook.as_str(),
            Some(&response),
            &filter.field,
            filter.operator,
            &filter.value,
        ))
    }

    async fn build_payload(
        &self,
        ctx: &EvaluationContext,
        variables: &FilterVariables,
    ) -> Result<Value, FilterError> {
        let subscriber = match &variables.subscriber {
            Some(subscriber) => subscriber.clone(),
            None => self
                .subscribers
                .get(&ctx.environment_id, &ctx.subscriber_id)
                .await?
                .map(|s| s.to_value())
                .unwrap_or(Value::Null),
        };
        let payload = ctx
            .payload
            .clone()
            .or_else(|| ctx.job.as_ref().and_then(|j| j.payload.clone()))
            .unwrap_or_else(|| Value::Object(Map::new()));

        let mut body = json!({
            "subscriber": subscriber,
            "payload": payload,
        });
        if let Some(job) = &ctx.job {
            body["channel"] = json!(job.channel.as_str());
            if let Some(provider_id) = &job.provider_id {
                body["providerId"] = json!(provider_id);
            }
        }
        Ok(body)
    }

    async fn sign(&self, ctx: &EvaluationContext) -> Result<String, FilterError> {
        let environment = self
            .environments
            .find_by_id(&ctx.environment_id, &ctx.organization_id)
            .await?
            .ok_or_else(|| FilterError::EnvironmentNotFound {
                environment_id: ctx.environment_id.clone(),
            })?;
        let api_key = environment
            .api_keys
            .first()
            .ok_or_else(|| FilterError::MissingApiKey {
                environment_id: ctx.environment_id.clone(),
            })?;
        sign_environment(api_key, &ctx.environment_id)
    }
}

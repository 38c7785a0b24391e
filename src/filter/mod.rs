// SPDX-License-Identifier: MIT

//! Step filter evaluation
//!
//! This module decides whether a notification step runs by walking the
//! step's filter tree:
//! - `payload` / `subscriber` / `tenant` field comparisons
//! - `webhook` conditions answered by a signed call to a customer endpoint
//! - `isOnline` / `isOnlineInLast` presence windows
//! - `previousStep` read/seen/opened state of an earlier message

mod evaluator;
pub mod operator;
pub mod presence;
mod previous_step;
pub mod signature;
mod types;
pub mod usage;
mod webhook;

pub use evaluator::{ConditionsFilter, FilterServices, FILTER_PROCESSING_DETAIL};
pub use presence::{Clock, FixedClock, SystemClock};
pub use previous_step::PreviousStepEvaluator;
pub use types::{
    Condition, EvaluationContext, FieldFilter, FilterGroup, FilterKind, FilterNode, FilterOperator,
    FilterOutcome, FilterVariables, GroupOperator, OnlineFilter, OnlineInLastFilter,
    PreviousStepFilter, PreviousStepType, ProcessingTrace, TimeUnit, WebhookFilter,
};
pub use usage::{sum_filters, summarize, UsedFilters};
pub use webhook::{HttpWebhookTransport, WebhookEvaluator, WebhookTransport};

//! Decoration, classification and instrumentation of admission webhook
//! invocations.
//!
//! Webhook plugins ([`mutating::MutatingWebhookPlugin`],
//! [`validating::ValidatingWebhookPlugin`]) wrap their base invoker with an
//! ordered list of [`decorator::Decorator`]s. The metrics decorators classify
//! every outcome, resolve the resource labels allowed by the configured
//! [`metrics::Rule`]s and hand the result to a
//! [`metrics::WebhookMetricsRecorder`].

pub mod admission;
pub mod attributes;
pub mod config;
pub mod decorator;
pub mod errors;
pub mod initializer;
mod logging;
pub mod metrics;
pub mod mutating;
pub mod plugins;
pub mod validating;
pub mod webhook;

pub use admission::{AdmissionPlugin, ValidationInterface};
pub use attributes::{Attributes, AttributesRecord, Operation};
pub use errors::{AdmissionError, AdmissionResult, WebhookError};
pub use initializer::{
    InvocationLogInitializer, PluginInitializer, PluginInitializers, WebhookPluginInitializer,
};

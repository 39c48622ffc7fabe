use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::{Attributes, GroupVersionKind, GroupVersionResource};

/// What happens to the admission request when the webhook cannot be called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Call failures are ignored and the request continues.
    Ignore,
    /// Call failures reject the request.
    #[default]
    Fail,
}

/// Whether a mutating webhook asks to be called again after later webhooks
/// changed the object.
///
/// Carried as configuration only: the mutating plugin dispatches a single
/// round and never reads it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReinvocationPolicy {
    #[default]
    Never,
    IfNeeded,
}

/// Accessors shared by mutating and validating webhook configurations.
pub trait Webhook: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when the configuration leaves the policy unset.
    fn failure_policy(&self) -> Option<FailurePolicy>;

    /// Only an explicit `Ignore` policy ignores call failures, an unset
    /// policy behaves like `Fail`.
    fn ignores_call_failures(&self) -> bool {
        self.failure_policy() == Some(FailurePolicy::Ignore)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutatingWebhook {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reinvocation_policy: Option<ReinvocationPolicy>,
}

impl MutatingWebhook {
    pub fn new(name: &str, failure_policy: Option<FailurePolicy>) -> Self {
        MutatingWebhook {
            name: name.to_owned(),
            failure_policy,
            reinvocation_policy: None,
        }
    }
}

impl Webhook for MutatingWebhook {
    fn name(&self) -> &str {
        &self.name
    }

    fn failure_policy(&self) -> Option<FailurePolicy> {
        self.failure_policy
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatingWebhook {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
}

impl ValidatingWebhook {
    pub fn new(name: &str, failure_policy: Option<FailurePolicy>) -> Self {
        ValidatingWebhook {
            name: name.to_owned(),
            failure_policy,
        }
    }
}

impl Webhook for ValidatingWebhook {
    fn name(&self) -> &str {
        &self.name
    }

    fn failure_policy(&self) -> Option<FailurePolicy> {
        self.failure_policy
    }
}

/// Which admission phase a webhook belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    Mutating,
    Validating,
}

impl WebhookKind {
    /// Value of the `type` label of the webhook metric series.
    pub fn metric_label(&self) -> &'static str {
        match self {
            WebhookKind::Mutating => "admit",
            WebhookKind::Validating => "validating",
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookKind::Mutating => f.write_str("mutating"),
            WebhookKind::Validating => f.write_str("validating"),
        }
    }
}

/// A single call of one webhook for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookInvocation {
    pub webhook: String,
    pub resource: GroupVersionResource,
    pub subresource: String,
    pub kind: GroupVersionKind,
}

impl WebhookInvocation {
    /// Invocation of `webhook` against the resource the request targets.
    pub fn for_attributes(webhook: &str, attributes: &dyn Attributes) -> Self {
        WebhookInvocation {
            webhook: webhook.to_owned(),
            resource: attributes.resource().clone(),
            subresource: attributes.subresource().to_owned(),
            kind: attributes.kind().clone(),
        }
    }
}

/// The request attributes together with the objects converted to the
/// version the webhooks expect.
pub struct VersionedAttributes {
    pub attributes: Arc<dyn Attributes>,
    pub versioned_kind: GroupVersionKind,
    pub versioned_object: Option<Value>,
    pub versioned_old_object: Option<Value>,
    /// Set once a mutating webhook changed `versioned_object`.
    pub dirty: bool,
}

impl VersionedAttributes {
    pub fn new(attributes: Arc<dyn Attributes>) -> Self {
        VersionedAttributes {
            versioned_kind: attributes.kind().clone(),
            versioned_object: attributes.object().cloned(),
            versioned_old_object: attributes.old_object().cloned(),
            attributes,
            dirty: false,
        }
    }
}

/// Receives audit annotations produced while calling webhooks.
pub trait WebhookAnnotator: Send + Sync {
    fn add_annotation(&self, key: &str, value: &str);
}

/// Collects audit annotations in memory.
#[derive(Debug, Default)]
pub struct AuditAnnotations {
    annotations: Mutex<BTreeMap<String, String>>,
}

impl AuditAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.annotations
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WebhookAnnotator for AuditAnnotations {
    fn add_annotation(&self, key: &str, value: &str) {
        let mut annotations = self
            .annotations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        annotations
            .entry(key.to_owned())
            .or_insert_with(|| value.to_owned());
    }
}

//! Mutating webhook invocation and dispatch.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::warn;

use crate::admission::AdmissionPlugin;
use crate::attributes::Operation;
use crate::decorator::{Decorator, Decorators};
use crate::errors::{AdmissionResult, WebhookError};
use crate::initializer::WantsMutatingWebhookInvokerDecorator;
use crate::webhook::{
    MutatingWebhook, VersionedAttributes, Webhook, WebhookAnnotator, WebhookInvocation,
};

mod decorators;

pub use decorators::{LoggingDecorator, MetricsDecorator};

pub const PLUGIN_NAME: &str = "MutatingAdmissionWebhook";

const FAILED_OPEN_ANNOTATION_PREFIX: &str = "failed-open.mutating.webhook.admission.k8s.io/";

/// Calls one mutating webhook.
///
/// Returns whether the webhook changed `attr.versioned_object`.
#[async_trait]
pub trait MutatingWebhookInvoker: Send + Sync {
    async fn invoke(
        &self,
        hook: &MutatingWebhook,
        invocation: &WebhookInvocation,
        attr: &mut VersionedAttributes,
        annotator: &dyn WebhookAnnotator,
        round: usize,
        idx: usize,
    ) -> Result<bool, WebhookError>;
}

pub type MutatingWebhookInvokerDecorator = dyn Decorator<dyn MutatingWebhookInvoker>;

/// Admission plugin calling the configured mutating webhooks one after the
/// other.
pub struct MutatingWebhookPlugin {
    hooks: Vec<MutatingWebhook>,
    invoker: Arc<dyn MutatingWebhookInvoker>,
    decorators: Decorators<dyn MutatingWebhookInvoker>,
    decorated: OnceLock<Arc<dyn MutatingWebhookInvoker>>,
}

impl MutatingWebhookPlugin {
    pub fn new(hooks: Vec<MutatingWebhook>, invoker: Arc<dyn MutatingWebhookInvoker>) -> Self {
        MutatingWebhookPlugin {
            hooks,
            invoker,
            decorators: Decorators::new(),
            decorated: OnceLock::new(),
        }
    }

    pub fn hooks(&self) -> &[MutatingWebhook] {
        &self.hooks
    }

    pub fn decorator_count(&self) -> usize {
        self.decorators.len()
    }

    /// The base invoker wrapped by every appended decorator. Built on first
    /// use and reused afterwards.
    pub fn decorated_invoker(&self) -> Arc<dyn MutatingWebhookInvoker> {
        self.decorated
            .get_or_init(|| self.decorators.decorate(self.invoker.clone()))
            .clone()
    }

    /// Runs every webhook in order, each one seeing the mutations of the
    /// previous ones.
    pub async fn admit(
        &self,
        attr: &mut VersionedAttributes,
        annotator: &dyn WebhookAnnotator,
    ) -> AdmissionResult<()> {
        let invoker = self.decorated_invoker();
        let round = 0;

        for (idx, hook) in self.hooks.iter().enumerate() {
            let invocation =
                WebhookInvocation::for_attributes(&hook.name, attr.attributes.as_ref());
            match invoker
                .invoke(hook, &invocation, attr, annotator, round, idx)
                .await
            {
                Ok(changed) => {
                    if changed {
                        attr.dirty = true;
                    }
                }
                Err(err @ WebhookError::CallingWebhook { .. }) if hook.ignores_call_failures() => {
                    warn!(
                        webhook = hook.name.as_str(),
                        error = %err,
                        "failed calling webhook, failing open"
                    );
                    annotator.add_annotation(
                        &format!("{FAILED_OPEN_ANNOTATION_PREFIX}round_{round}_index_{idx}"),
                        &hook.name,
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

impl AdmissionPlugin for MutatingWebhookPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn handles(&self, _operation: Operation) -> bool {
        true
    }

    fn as_wants_mutating_webhook_invoker_decorator(
        &mut self,
    ) -> Option<&mut dyn WantsMutatingWebhookInvokerDecorator> {
        Some(self)
    }
}

impl WantsMutatingWebhookInvokerDecorator for MutatingWebhookPlugin {
    fn append_webhook_invoker_decorator(
        &mut self,
        decorator: Arc<MutatingWebhookInvokerDecorator>,
    ) {
        self.decorators.push(decorator);
        self.decorated = OnceLock::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributesRecord, GroupVersionResource};
    use crate::webhook::{AuditAnnotations, FailurePolicy};
    use serde_json::json;
    use std::sync::Mutex;

    /// Sets `metadata.labels.<webhook name>` on the object, or fails for the
    /// webhook named in `failure`.
    struct LabellingInvoker {
        failure: Option<(&'static str, fn() -> WebhookError)>,
        calls: Mutex<Vec<String>>,
    }

    impl LabellingInvoker {
        fn new() -> Self {
            LabellingInvoker {
                failure: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(webhook: &'static str, error: fn() -> WebhookError) -> Self {
            LabellingInvoker {
                failure: Some((webhook, error)),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MutatingWebhookInvoker for LabellingInvoker {
        async fn invoke(
            &self,
            hook: &MutatingWebhook,
            _invocation: &WebhookInvocation,
            attr: &mut VersionedAttributes,
            _annotator: &dyn WebhookAnnotator,
            _round: usize,
            _idx: usize,
        ) -> Result<bool, WebhookError> {
            self.calls.lock().unwrap().push(hook.name.clone());
            if let Some((webhook, error)) = self.failure {
                if webhook == hook.name {
                    return Err(error());
                }
            }
            if let Some(object) = attr.versioned_object.as_mut() {
                object["metadata"]["labels"][hook.name.as_str()] = json!("true");
            }
            Ok(true)
        }
    }

    fn attributes() -> VersionedAttributes {
        let mut record = AttributesRecord::new(
            Operation::Create,
            GroupVersionResource::new("", "v1", "pods"),
        );
        record.object = Some(json!({"metadata": {"name": "web"}}));
        VersionedAttributes::new(Arc::new(record))
    }

    #[tokio::test]
    async fn webhooks_run_in_order_and_mark_the_object_dirty() {
        let invoker = Arc::new(LabellingInvoker::new());
        let plugin = MutatingWebhookPlugin::new(
            vec![
                MutatingWebhook::new("first", None),
                MutatingWebhook::new("second", None),
            ],
            invoker.clone(),
        );
        let mut attr = attributes();

        plugin.admit(&mut attr, &AuditAnnotations::new()).await.unwrap();

        assert!(attr.dirty);
        assert_eq!(*invoker.calls.lock().unwrap(), vec!["first", "second"]);
        let object = attr.versioned_object.unwrap();
        let labels = &object["metadata"]["labels"];
        assert_eq!(labels["first"], json!("true"));
        assert_eq!(labels["second"], json!("true"));
    }

    #[tokio::test]
    async fn ignored_call_failure_fails_open() {
        let invoker = Arc::new(LabellingInvoker::failing("flaky", || {
            WebhookError::calling_webhook("flaky", "connection refused", 503)
        }));
        let plugin = MutatingWebhookPlugin::new(
            vec![
                MutatingWebhook::new("flaky", Some(FailurePolicy::Ignore)),
                MutatingWebhook::new("stable", None),
            ],
            invoker.clone(),
        );
        let mut attr = attributes();
        let annotations = AuditAnnotations::new();

        plugin.admit(&mut attr, &annotations).await.unwrap();

        assert_eq!(*invoker.calls.lock().unwrap(), vec!["flaky", "stable"]);
        let annotations = annotations.into_inner();
        assert_eq!(
            annotations
                .get("failed-open.mutating.webhook.admission.k8s.io/round_0_index_0")
                .map(String::as_str),
            Some("flaky")
        );
    }

    #[tokio::test]
    async fn rejection_stops_the_chain() {
        let invoker = Arc::new(LabellingInvoker::failing("strict", || {
            WebhookError::rejection("strict", 403, "no privileged pods")
        }));
        let plugin = MutatingWebhookPlugin::new(
            vec![
                MutatingWebhook::new("strict", Some(FailurePolicy::Ignore)),
                MutatingWebhook::new("never", None),
            ],
            invoker.clone(),
        );
        let mut attr = attributes();

        let err = plugin
            .admit(&mut attr, &AuditAnnotations::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "admission webhook \"strict\" denied the request: no privileged pods"
        );
        assert_eq!(*invoker.calls.lock().unwrap(), vec!["strict"]);
        assert!(!attr.dirty);
    }

    #[tokio::test]
    async fn call_failure_without_ignore_is_returned() {
        let invoker = Arc::new(LabellingInvoker::failing("unset", || {
            WebhookError::calling_webhook("unset", "timeout", 504)
        }));
        let plugin =
            MutatingWebhookPlugin::new(vec![MutatingWebhook::new("unset", None)], invoker);

        let err = plugin
            .admit(&mut attributes(), &AuditAnnotations::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "failed calling webhook \"unset\": timeout");
    }

    #[test]
    fn appending_a_decorator_rebuilds_the_invoker() {
        let base: Arc<dyn MutatingWebhookInvoker> = Arc::new(LabellingInvoker::new());
        let mut plugin = MutatingWebhookPlugin::new(Vec::new(), base.clone());
        assert!(Arc::ptr_eq(&plugin.decorated_invoker(), &base));

        plugin.append_webhook_invoker_decorator(Arc::new(LoggingDecorator));

        assert_eq!(plugin.decorator_count(), 1);
        assert!(!Arc::ptr_eq(&plugin.decorated_invoker(), &base));
    }
}

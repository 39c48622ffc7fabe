//! Validating webhook invocation and dispatch.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::admission::AdmissionPlugin;
use crate::attributes::Operation;
use crate::decorator::{Decorator, Decorators};
use crate::errors::{AdmissionResult, WebhookError};
use crate::initializer::WantsValidatingWebhookInvokerDecorator;
use crate::webhook::{
    ValidatingWebhook, VersionedAttributes, Webhook, WebhookAnnotator, WebhookInvocation,
};

mod decorators;

pub use decorators::{LoggingDecorator, MetricsDecorator};

pub const PLUGIN_NAME: &str = "ValidatingAdmissionWebhook";

const FAILED_OPEN_ANNOTATION_PREFIX: &str = "failed-open.validating.webhook.admission.k8s.io/";

/// Calls one validating webhook. `Ok(())` means the webhook allowed the
/// request.
#[async_trait]
pub trait ValidatingWebhookInvoker: Send + Sync {
    async fn invoke(
        &self,
        hook: &ValidatingWebhook,
        invocation: &WebhookInvocation,
        attr: &VersionedAttributes,
    ) -> Result<(), WebhookError>;
}

pub type ValidatingWebhookInvokerDecorator = dyn Decorator<dyn ValidatingWebhookInvoker>;

/// Admission plugin calling the configured validating webhooks concurrently.
pub struct ValidatingWebhookPlugin {
    hooks: Vec<ValidatingWebhook>,
    invoker: Arc<dyn ValidatingWebhookInvoker>,
    decorators: Decorators<dyn ValidatingWebhookInvoker>,
    decorated: OnceLock<Arc<dyn ValidatingWebhookInvoker>>,
}

impl ValidatingWebhookPlugin {
    pub fn new(
        hooks: Vec<ValidatingWebhook>,
        invoker: Arc<dyn ValidatingWebhookInvoker>,
    ) -> Self {
        ValidatingWebhookPlugin {
            hooks,
            invoker,
            decorators: Decorators::new(),
            decorated: OnceLock::new(),
        }
    }

    pub fn hooks(&self) -> &[ValidatingWebhook] {
        &self.hooks
    }

    pub fn decorator_count(&self) -> usize {
        self.decorators.len()
    }

    pub fn decorated_invoker(&self) -> Arc<dyn ValidatingWebhookInvoker> {
        self.decorated
            .get_or_init(|| self.decorators.decorate(self.invoker.clone()))
            .clone()
    }

    /// Calls every webhook and waits for all of them. When several webhooks
    /// fail, the error of the first one in configuration order is returned.
    pub async fn validate(
        &self,
        attr: &VersionedAttributes,
        annotator: &dyn WebhookAnnotator,
    ) -> AdmissionResult<()> {
        let invoker = self.decorated_invoker();
        let calls = self.hooks.iter().map(|hook| {
            let invoker = invoker.clone();
            async move {
                let invocation =
                    WebhookInvocation::for_attributes(&hook.name, attr.attributes.as_ref());
                invoker.invoke(hook, &invocation, attr).await
            }
        });
        let results = join_all(calls).await;

        let mut first_error = None;
        for (idx, (hook, result)) in self.hooks.iter().zip(results).enumerate() {
            match result {
                Ok(()) => {}
                Err(err @ WebhookError::CallingWebhook { .. }) if hook.ignores_call_failures() => {
                    warn!(
                        webhook = hook.name.as_str(),
                        error = %err,
                        "failed calling webhook, failing open"
                    );
                    annotator.add_annotation(
                        &format!("{FAILED_OPEN_ANNOTATION_PREFIX}round_0_index_{idx}"),
                        &hook.name,
                    );
                }
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl AdmissionPlugin for ValidatingWebhookPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn handles(&self, _operation: Operation) -> bool {
        true
    }

    fn as_wants_validating_webhook_invoker_decorator(
        &mut self,
    ) -> Option<&mut dyn WantsValidatingWebhookInvokerDecorator> {
        Some(self)
    }
}

impl WantsValidatingWebhookInvokerDecorator for ValidatingWebhookPlugin {
    fn append_webhook_invoker_decorator(
        &mut self,
        decorator: Arc<ValidatingWebhookInvokerDecorator>,
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
    use std::collections::HashMap;
    use std::time::Duration;

    /// Fails the webhooks listed in `outcomes`, allows all the others.
    /// `delays` lets a webhook finish after the ones configured after it.
    #[derive(Default)]
    struct ScriptedInvoker {
        outcomes: HashMap<&'static str, fn() -> WebhookError>,
        delays: HashMap<&'static str, Duration>,
    }

    #[async_trait]
    impl ValidatingWebhookInvoker for ScriptedInvoker {
        async fn invoke(
            &self,
            hook: &ValidatingWebhook,
            _invocation: &WebhookInvocation,
            _attr: &VersionedAttributes,
        ) -> Result<(), WebhookError> {
            if let Some(delay) = self.delays.get(hook.name.as_str()) {
                tokio::time::sleep(*delay).await;
            }
            match self.outcomes.get(hook.name.as_str()) {
                Some(error) => Err(error()),
                None => Ok(()),
            }
        }
    }

    fn attributes() -> VersionedAttributes {
        let record = AttributesRecord::new(
            Operation::Delete,
            GroupVersionResource::new("", "v1", "configmaps"),
        );
        VersionedAttributes::new(Arc::new(record))
    }

    #[tokio::test]
    async fn all_webhooks_allow() {
        let plugin = ValidatingWebhookPlugin::new(
            vec![
                ValidatingWebhook::new("a", None),
                ValidatingWebhook::new("b", None),
            ],
            Arc::new(ScriptedInvoker::default()),
        );

        assert!(plugin
            .validate(&attributes(), &AuditAnnotations::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn first_error_in_configuration_order_wins() {
        let mut invoker = ScriptedInvoker::default();
        invoker.outcomes.insert("slow", || {
            WebhookError::rejection("slow", 403, "slow said no")
        });
        invoker.outcomes.insert("fast", || {
            WebhookError::rejection("fast", 403, "fast said no")
        });
        invoker.delays.insert("slow", Duration::from_millis(50));

        let plugin = ValidatingWebhookPlugin::new(
            vec![
                ValidatingWebhook::new("slow", None),
                ValidatingWebhook::new("fast", None),
            ],
            Arc::new(invoker),
        );

        let err = plugin
            .validate(&attributes(), &AuditAnnotations::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "admission webhook \"slow\" denied the request: slow said no"
        );
    }

    #[tokio::test]
    async fn ignored_call_failure_fails_open() {
        let mut invoker = ScriptedInvoker::default();
        invoker.outcomes.insert("flaky", || {
            WebhookError::calling_webhook("flaky", "no endpoints available", 503)
        });

        let plugin = ValidatingWebhookPlugin::new(
            vec![
                ValidatingWebhook::new("ok", None),
                ValidatingWebhook::new("flaky", Some(FailurePolicy::Ignore)),
            ],
            Arc::new(invoker),
        );
        let annotations = AuditAnnotations::new();

        plugin.validate(&attributes(), &annotations).await.unwrap();

        let annotations = annotations.into_inner();
        assert_eq!(
            annotations
                .get("failed-open.validating.webhook.admission.k8s.io/round_0_index_1")
                .map(String::as_str),
            Some("flaky")
        );
    }

    #[tokio::test]
    async fn ignore_policy_does_not_hide_internal_errors() {
        let mut invoker = ScriptedInvoker::default();
        invoker.outcomes.insert("broken", || {
            WebhookError::Internal(anyhow::anyhow!("cannot convert object"))
        });

        let plugin = ValidatingWebhookPlugin::new(
            vec![ValidatingWebhook::new("broken", Some(FailurePolicy::Ignore))],
            Arc::new(invoker),
        );

        let err = plugin
            .validate(&attributes(), &AuditAnnotations::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot convert object");
    }
}

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::ValidatingWebhookInvoker;
use crate::decorator::Decorator;
use crate::errors::WebhookError;
use crate::logging::log_invocation;
use crate::metrics::WebhookMetricsObserver;
use crate::webhook::{ValidatingWebhook, VersionedAttributes, WebhookInvocation, WebhookKind};

/// Observes latency and outcome of every validating webhook call.
pub struct MetricsDecorator {
    observer: Arc<WebhookMetricsObserver>,
}

impl MetricsDecorator {
    pub fn new(observer: Arc<WebhookMetricsObserver>) -> Self {
        MetricsDecorator { observer }
    }
}

impl Decorator<dyn ValidatingWebhookInvoker> for MetricsDecorator {
    fn decorate(
        &self,
        invoker: Arc<dyn ValidatingWebhookInvoker>,
    ) -> Arc<dyn ValidatingWebhookInvoker> {
        Arc::new(MetricsInvoker {
            invoker,
            observer: self.observer.clone(),
        })
    }
}

struct MetricsInvoker {
    invoker: Arc<dyn ValidatingWebhookInvoker>,
    observer: Arc<WebhookMetricsObserver>,
}

#[async_trait]
impl ValidatingWebhookInvoker for MetricsInvoker {
    async fn invoke(
        &self,
        hook: &ValidatingWebhook,
        invocation: &WebhookInvocation,
        attr: &VersionedAttributes,
    ) -> Result<(), WebhookError> {
        let start = Instant::now();
        let result = self.invoker.invoke(hook, invocation, attr).await;
        self.observer.observe(
            hook,
            WebhookKind::Validating,
            attr.attributes.as_ref(),
            start.elapsed(),
            result.as_ref().err(),
        );
        result
    }
}

/// Logs every validating webhook call at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDecorator;

impl Decorator<dyn ValidatingWebhookInvoker> for LoggingDecorator {
    fn decorate(
        &self,
        invoker: Arc<dyn ValidatingWebhookInvoker>,
    ) -> Arc<dyn ValidatingWebhookInvoker> {
        Arc::new(LoggingInvoker { invoker })
    }
}

struct LoggingInvoker {
    invoker: Arc<dyn ValidatingWebhookInvoker>,
}

#[async_trait]
impl ValidatingWebhookInvoker for LoggingInvoker {
    async fn invoke(
        &self,
        hook: &ValidatingWebhook,
        invocation: &WebhookInvocation,
        attr: &VersionedAttributes,
    ) -> Result<(), WebhookError> {
        let start = Instant::now();
        let result = self.invoker.invoke(hook, invocation, attr).await;
        log_invocation(
            WebhookKind::Validating,
            &hook.name,
            attr.attributes.as_ref(),
            invocation,
            start.elapsed(),
            result.is_err(),
        );
        result
    }
}

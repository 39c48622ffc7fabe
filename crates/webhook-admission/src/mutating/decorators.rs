use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::MutatingWebhookInvoker;
use crate::decorator::Decorator;
use crate::errors::WebhookError;
use crate::logging::log_invocation;
use crate::metrics::WebhookMetricsObserver;
use crate::webhook::{
    MutatingWebhook, VersionedAttributes, WebhookAnnotator, WebhookInvocation, WebhookKind,
};

/// Observes latency and outcome of every mutating webhook call.
pub struct MetricsDecorator {
    observer: Arc<WebhookMetricsObserver>,
}

impl MetricsDecorator {
    pub fn new(observer: Arc<WebhookMetricsObserver>) -> Self {
        MetricsDecorator { observer }
    }
}

impl Decorator<dyn MutatingWebhookInvoker> for MetricsDecorator {
    fn decorate(
        &self,
        invoker: Arc<dyn MutatingWebhookInvoker>,
    ) -> Arc<dyn MutatingWebhookInvoker> {
        Arc::new(MetricsInvoker {
            invoker,
            observer: self.observer.clone(),
        })
    }
}

struct MetricsInvoker {
    invoker: Arc<dyn MutatingWebhookInvoker>,
    observer: Arc<WebhookMetricsObserver>,
}

#[async_trait]
impl MutatingWebhookInvoker for MetricsInvoker {
    async fn invoke(
        &self,
        hook: &MutatingWebhook,
        invocation: &WebhookInvocation,
        attr: &mut VersionedAttributes,
        annotator: &dyn WebhookAnnotator,
        round: usize,
        idx: usize,
    ) -> Result<bool, WebhookError> {
        let start = Instant::now();
        let result = self
            .invoker
            .invoke(hook, invocation, attr, annotator, round, idx)
            .await;
        self.observer.observe(
            hook,
            WebhookKind::Mutating,
            attr.attributes.as_ref(),
            start.elapsed(),
            result.as_ref().err(),
        );
        result
    }
}

/// Logs every mutating webhook call at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDecorator;

impl Decorator<dyn MutatingWebhookInvoker> for LoggingDecorator {
    fn decorate(
        &self,
        invoker: Arc<dyn MutatingWebhookInvoker>,
    ) -> Arc<dyn MutatingWebhookInvoker> {
        Arc::new(LoggingInvoker { invoker })
    }
}

struct LoggingInvoker {
    invoker: Arc<dyn MutatingWebhookInvoker>,
}

#[async_trait]
impl MutatingWebhookInvoker for LoggingInvoker {
    async fn invoke(
        &self,
        hook: &MutatingWebhook,
        invocation: &WebhookInvocation,
        attr: &mut VersionedAttributes,
        annotator: &dyn WebhookAnnotator,
        round: usize,
        idx: usize,
    ) -> Result<bool, WebhookError> {
        let start = Instant::now();
        let result = self
            .invoker
            .invoke(hook, invocation, attr, annotator, round, idx)
            .await;
        log_invocation(
            WebhookKind::Mutating,
            &hook.name,
            attr.attributes.as_ref(),
            invocation,
            start.elapsed(),
            result.is_err(),
        );
        result
    }
}

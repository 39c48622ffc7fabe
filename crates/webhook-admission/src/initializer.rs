//! Wiring of invoker decorators into admission plugins at startup.

use std::sync::Arc;

use tracing::debug;

use crate::admission::AdmissionPlugin;
use crate::metrics::{Rule, WebhookMetricsObserver, WebhookMetricsRecorder};
use crate::mutating::{self, MutatingWebhookInvokerDecorator};
use crate::validating::{self, ValidatingWebhookInvokerDecorator};

/// Implemented by plugins calling mutating webhooks.
pub trait WantsMutatingWebhookInvokerDecorator {
    /// Each call appends, decorators already registered are kept.
    fn append_webhook_invoker_decorator(&mut self, decorator: Arc<MutatingWebhookInvokerDecorator>);
}

/// Implemented by plugins calling validating webhooks.
pub trait WantsValidatingWebhookInvokerDecorator {
    /// Each call appends, decorators already registered are kept.
    fn append_webhook_invoker_decorator(
        &mut self,
        decorator: Arc<ValidatingWebhookInvokerDecorator>,
    );
}

/// Prepares a plugin before it starts serving requests.
pub trait PluginInitializer {
    fn initialize(&self, plugin: &mut dyn AdmissionPlugin);
}

/// Attaches the metrics decorators to the webhook plugins.
pub struct WebhookPluginInitializer {
    observer: Arc<WebhookMetricsObserver>,
}

impl WebhookPluginInitializer {
    /// `rules` bound the resource labels of the duration histogram.
    pub fn new(rules: Vec<Rule>, recorder: Arc<dyn WebhookMetricsRecorder>) -> Self {
        WebhookPluginInitializer {
            observer: Arc::new(WebhookMetricsObserver::new(rules, recorder)),
        }
    }

    pub fn observer(&self) -> &Arc<WebhookMetricsObserver> {
        &self.observer
    }
}

impl PluginInitializer for WebhookPluginInitializer {
    fn initialize(&self, plugin: &mut dyn AdmissionPlugin) {
        let name = plugin.name().to_owned();
        if let Some(wants) = plugin.as_wants_mutating_webhook_invoker_decorator() {
            debug!(plugin = name.as_str(), "attaching mutating webhook metrics");
            wants.append_webhook_invoker_decorator(Arc::new(mutating::MetricsDecorator::new(
                self.observer.clone(),
            )));
        }
        if let Some(wants) = plugin.as_wants_validating_webhook_invoker_decorator() {
            debug!(plugin = name.as_str(), "attaching validating webhook metrics");
            wants.append_webhook_invoker_decorator(Arc::new(validating::MetricsDecorator::new(
                self.observer.clone(),
            )));
        }
    }
}

/// Attaches the invocation logging decorators to the webhook plugins.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvocationLogInitializer;

impl PluginInitializer for InvocationLogInitializer {
    fn initialize(&self, plugin: &mut dyn AdmissionPlugin) {
        if let Some(wants) = plugin.as_wants_mutating_webhook_invoker_decorator() {
            wants.append_webhook_invoker_decorator(Arc::new(mutating::LoggingDecorator));
        }
        if let Some(wants) = plugin.as_wants_validating_webhook_invoker_decorator() {
            wants.append_webhook_invoker_decorator(Arc::new(validating::LoggingDecorator));
        }
    }
}

/// Runs several initializers, in order.
#[derive(Default)]
pub struct PluginInitializers {
    initializers: Vec<Box<dyn PluginInitializer>>,
}

impl PluginInitializers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, initializer: impl PluginInitializer + 'static) -> Self {
        self.initializers.push(Box::new(initializer));
        self
    }
}

impl PluginInitializer for PluginInitializers {
    fn initialize(&self, plugin: &mut dyn AdmissionPlugin) {
        for initializer in &self.initializers {
            initializer.initialize(plugin);
        }
    }
}

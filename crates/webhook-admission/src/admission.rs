use crate::attributes::{Attributes, Operation};
use crate::errors::AdmissionResult;
use crate::initializer::{
    WantsMutatingWebhookInvokerDecorator, WantsValidatingWebhookInvokerDecorator,
};

/// An admission plugin, as seen by the initialization framework.
///
/// The optional capabilities are exposed through explicit accessors: a
/// plugin that supports one overrides the matching `as_wants_*` method.
pub trait AdmissionPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the plugin is interested in requests of this kind.
    fn handles(&self, operation: Operation) -> bool;

    fn as_wants_mutating_webhook_invoker_decorator(
        &mut self,
    ) -> Option<&mut dyn WantsMutatingWebhookInvokerDecorator> {
        None
    }

    fn as_wants_validating_webhook_invoker_decorator(
        &mut self,
    ) -> Option<&mut dyn WantsValidatingWebhookInvokerDecorator> {
        None
    }
}

/// A plugin that can reject requests without changing them.
pub trait ValidationInterface: AdmissionPlugin {
    fn validate(&self, attributes: &dyn Attributes) -> AdmissionResult<()>;
}

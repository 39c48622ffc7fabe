use std::time::Duration;

use tracing::debug;

use crate::attributes::Attributes;
use crate::webhook::{WebhookInvocation, WebhookKind};

/// Debug record of one finished webhook call. `rejected` only tells whether
/// the call returned an error, the failure policy is not taken into account.
pub(crate) fn log_invocation(
    kind: WebhookKind,
    webhook: &str,
    attributes: &dyn Attributes,
    invocation: &WebhookInvocation,
    latency: Duration,
    rejected: bool,
) {
    let message = match kind {
        WebhookKind::Mutating => "MutatingWebhookInvoked",
        WebhookKind::Validating => "ValidatingWebhookInvoked",
    };
    debug!(
        webhook,
        operation = %attributes.operation(),
        webhook_type = %kind,
        rejected,
        group = invocation.resource.group.as_str(),
        version = invocation.resource.version.as_str(),
        resource = invocation.resource.resource.as_str(),
        subresource = invocation.subresource.as_str(),
        latency = latency.as_secs_f64(),
        "{message}"
    );
}

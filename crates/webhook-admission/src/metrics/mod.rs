use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, warn};

mod classification;
mod labels;
mod otel;
mod recorder;

pub use classification::{
    Classification, RejectionClass, SUCCESS_STATUS_CODE, UNKNOWN_STATUS_CODE, classify,
};
pub use labels::{ResourceLabels, Rule, resource_labels};
pub use otel::{OtelRecorder, setup_metrics};
#[cfg(test)]
pub(crate) use recorder::MockWebhookMetricsRecorder;
pub use recorder::{
    ObservationRecord, RejectionRecord, TracingRecorder, WebhookMetricsRecorder,
};

use crate::attributes::Attributes;
use crate::errors::WebhookError;
use crate::webhook::{Webhook, WebhookKind};

/// Turns the outcome of a webhook invocation into metric observations.
///
/// Recording is best effort: sink errors and panics are logged and never
/// reach the caller.
pub struct WebhookMetricsObserver {
    rules: Arc<[Rule]>,
    recorder: Arc<dyn WebhookMetricsRecorder>,
}

impl WebhookMetricsObserver {
    /// `rules` select the requests whose resource labels are emitted, see
    /// [`resource_labels`].
    pub fn new(rules: impl Into<Arc<[Rule]>>, recorder: Arc<dyn WebhookMetricsRecorder>) -> Self {
        WebhookMetricsObserver {
            rules: rules.into(),
            recorder,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn observe(
        &self,
        hook: &dyn Webhook,
        kind: WebhookKind,
        attributes: &dyn Attributes,
        latency: Duration,
        error: Option<&WebhookError>,
    ) {
        let classification = classify(error, hook.ignores_call_failures());
        let operation = attributes.operation();

        if classification.class != RejectionClass::None {
            let rejection = RejectionRecord {
                name: hook.name().to_owned(),
                kind,
                operation,
                class: classification.class,
                status_code: classification.status_code,
            };
            self.record("rejection", |recorder| {
                recorder.observe_webhook_rejection(&rejection)
            });
        }

        let observation = ObservationRecord {
            name: hook.name().to_owned(),
            operation,
            kind,
            rejected: classification.rejected,
            labels: resource_labels(&self.rules, attributes),
            latency,
            status_code: classification.status_code,
        };
        self.record("admission", |recorder| {
            recorder.observe_webhook(&observation)
        });
    }

    fn record<F>(&self, metric: &str, f: F)
    where
        F: FnOnce(&dyn WebhookMetricsRecorder) -> Result<()>,
    {
        let recorder = self.recorder.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| f(recorder))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(metric, error = %e, "cannot record webhook metric"),
            Err(_) => error!(metric, "webhook metrics recorder panicked"),
        }
    }
}

use std::time::Duration;

use anyhow::Result;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use super::classification::RejectionClass;
use super::labels::ResourceLabels;
use crate::attributes::Operation;
use crate::webhook::WebhookKind;

/// One webhook invocation, as seen by the metrics sink.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationRecord {
    pub name: String,
    pub operation: Operation,
    pub kind: WebhookKind,
    pub rejected: bool,
    /// Redacted unless a label rule matched the request.
    pub labels: ResourceLabels,
    pub latency: Duration,
    pub status_code: u16,
}

/// A webhook invocation that counts as a rejection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectionRecord {
    pub name: String,
    pub kind: WebhookKind,
    pub operation: Operation,
    pub class: RejectionClass,
    pub status_code: u16,
}

/// Sink of webhook observations. It is shared by every in-flight request,
/// implementations must accept concurrent calls.
#[cfg_attr(test, automock)]
pub trait WebhookMetricsRecorder: Send + Sync {
    /// Latency and outcome of every invocation.
    fn observe_webhook(&self, record: &ObservationRecord) -> Result<()>;

    /// Invocations that were rejected.
    fn observe_webhook_rejection(&self, record: &RejectionRecord) -> Result<()>;
}

/// Writes the observations to the log instead of exporting them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingRecorder;

impl WebhookMetricsRecorder for TracingRecorder {
    fn observe_webhook(&self, record: &ObservationRecord) -> Result<()> {
        info!(
            webhook = record.name.as_str(),
            operation = %record.operation,
            webhook_type = record.kind.metric_label(),
            rejected = record.rejected,
            group = record.labels.group.as_str(),
            version = record.labels.version.as_str(),
            resource = record.labels.resource.as_str(),
            subresource = record.labels.subresource.as_str(),
            code = record.status_code,
            latency = record.latency.as_secs_f64(),
            "webhook admission observed"
        );
        Ok(())
    }

    fn observe_webhook_rejection(&self, record: &RejectionRecord) -> Result<()> {
        info!(
            webhook = record.name.as_str(),
            operation = %record.operation,
            webhook_type = record.kind.metric_label(),
            error_type = record.class.error_type(),
            rejection_code = record.status_code,
            "webhook rejection observed"
        );
        Ok(())
    }
}

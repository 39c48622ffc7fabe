use anyhow::Result;
use lazy_static::lazy_static;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

use super::recorder::{ObservationRecord, RejectionRecord, WebhookMetricsRecorder};

const METER_NAME: &str = "webhook-admission";

lazy_static! {
    static ref WEBHOOK_ADMISSION_DURATION: Histogram<f64> = global::meter(METER_NAME)
        .f64_histogram("apiserver_admission_webhook_admission_duration_seconds")
        .with_unit("s")
        .with_description(
            "Admission webhook latency identified by name and broken out for each operation and API resource and type (validating or admit)."
        )
        .with_boundaries(vec![0.005, 0.025, 0.1, 0.5, 1.0, 2.5, 10.0, 25.0])
        .build();
    static ref WEBHOOK_REQUEST_TOTAL: Counter<u64> = global::meter(METER_NAME)
        .u64_counter("apiserver_admission_webhook_request_total")
        .with_description(
            "Admission webhook request total, identified by name and broken out for each admission type (validating or admit) and operation."
        )
        .build();
    static ref WEBHOOK_REJECTION_COUNT: Counter<u64> = global::meter(METER_NAME)
        .u64_counter("apiserver_admission_webhook_rejection_count")
        .with_description(
            "Admission webhook rejection count, identified by name and broken out for each admission type (validating or admit) and operation."
        )
        .build();
}

/// Installs the global meter provider, exporting through OTLP/gRPC.
///
/// The returned provider must be kept alive, and shut down, by the caller.
pub fn setup_metrics(endpoint: Option<&str>) -> Result<SdkMeterProvider> {
    let mut exporter_builder = opentelemetry_otlp::MetricExporter::builder().with_tonic();
    if let Some(endpoint) = endpoint {
        exporter_builder = exporter_builder.with_endpoint(endpoint);
    }
    let metric_exporter = exporter_builder.build()?;

    let periodic_reader = PeriodicReader::builder(metric_exporter).build();
    let meter_provider = SdkMeterProvider::builder()
        .with_reader(periodic_reader)
        .build();

    global::set_meter_provider(meter_provider.clone());
    Ok(meter_provider)
}

/// Records the observations on the OpenTelemetry instruments of the global
/// meter provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct OtelRecorder;

impl WebhookMetricsRecorder for OtelRecorder {
    fn observe_webhook(&self, record: &ObservationRecord) -> Result<()> {
        WEBHOOK_ADMISSION_DURATION
            .record(record.latency.as_secs_f64(), &duration_attributes(record));
        WEBHOOK_REQUEST_TOTAL.add(1, &request_attributes(record));
        Ok(())
    }

    fn observe_webhook_rejection(&self, record: &RejectionRecord) -> Result<()> {
        WEBHOOK_REJECTION_COUNT.add(1, &Into::<Vec<KeyValue>>::into(record));
        Ok(())
    }
}

fn duration_attributes(record: &ObservationRecord) -> Vec<KeyValue> {
    vec![
        KeyValue::new("name", record.name.clone()),
        KeyValue::new("type", record.kind.metric_label()),
        KeyValue::new("operation", record.operation.as_str()),
        KeyValue::new("rejected", record.rejected),
        KeyValue::new("group", record.labels.group.clone()),
        KeyValue::new("version", record.labels.version.clone()),
        KeyValue::new("resource", record.labels.resource.clone()),
        KeyValue::new("subresource", record.labels.subresource.clone()),
    ]
}

fn request_attributes(record: &ObservationRecord) -> Vec<KeyValue> {
    vec![
        KeyValue::new("name", record.name.clone()),
        KeyValue::new("type", record.kind.metric_label()),
        KeyValue::new("operation", record.operation.as_str()),
        KeyValue::new("code", record.status_code as i64),
        KeyValue::new("rejected", record.rejected),
    ]
}

#[allow(clippy::from_over_into)]
impl Into<Vec<KeyValue>> for &RejectionRecord {
    fn into(self) -> Vec<KeyValue> {
        vec![
            KeyValue::new("name", self.name.clone()),
            KeyValue::new("type", self.kind.metric_label()),
            KeyValue::new("operation", self.operation.as_str()),
            KeyValue::new("error_type", self.class.error_type()),
            KeyValue::new("rejection_code", self.status_code as i64),
        ]
    }
}

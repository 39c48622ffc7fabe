use std::path::Path;

use anyhow::Result;
use serde_json::{Value, json};
use webhook_admission::attributes::{AttributesRecord, GroupVersionResource, Operation};
use webhook_admission::config::read_webhook_admission_file;
use webhook_admission::metrics::resource_labels;

pub(crate) struct LabelsQuery<'a> {
    pub group: &'a str,
    pub version: &'a str,
    pub resource: &'a str,
    pub subresource: &'a str,
    pub namespace: &'a str,
}

pub(crate) fn labels(config_path: &Path, query: &LabelsQuery) -> Result<Value> {
    let config = read_webhook_admission_file(config_path)?;

    // The operation plays no part in label resolution.
    let mut record = AttributesRecord::new(
        Operation::Create,
        GroupVersionResource::new(query.group, query.version, query.resource),
    );
    record.subresource = query.subresource.to_owned();
    record.namespace = query.namespace.to_owned();

    let labels = resource_labels(config.resource_label_rules(), &record);
    Ok(json!({
        "group": labels.group,
        "version": labels.version,
        "resource": labels.resource,
        "subresource": labels.subresource,
    }))
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;
use webhook_admission::attributes::{AttributesRecord, parse_admission_request};
use webhook_admission::plugins::ProtectAnnotation;
use webhook_admission::{AdmissionPlugin, ValidationInterface};

pub(crate) fn check_annotation(request_path: &Path) -> Result<()> {
    let document = fs::read_to_string(request_path)
        .with_context(|| format!("cannot read {}", request_path.display()))?;
    let record = AttributesRecord::try_from(parse_admission_request(&document)?)?;

    let plugin = ProtectAnnotation::new();
    if !plugin.handles(record.operation) {
        debug!(operation = %record.operation, "operation not handled");
        println!("allowed");
        return Ok(());
    }

    plugin
        .validate(&record)
        .map_err(|e| anyhow!("request denied: {e}"))?;
    println!("allowed");
    Ok(())
}

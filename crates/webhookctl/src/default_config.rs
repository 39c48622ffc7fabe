use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::info;
use webhook_admission::config::{
    PluginConfigs, expand_cardinality_of_admission_webhook_duration_metrics,
};

/// Plugin configuration map, as YAML, with the webhook duration metric
/// cardinality expanded.
pub(crate) fn render() -> Result<String> {
    let mut plugin_configs = PluginConfigs::new();
    expand_cardinality_of_admission_webhook_duration_metrics(&mut plugin_configs)?;
    Ok(serde_yaml::to_string(&plugin_configs)?)
}

pub(crate) fn default_config(output: Option<&Path>) -> Result<()> {
    let rendered = render()?;
    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            info!(path = %path.display(), "configuration written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConfigError;
use crate::metrics::Rule;
use crate::{mutating, validating};

pub const WEBHOOK_ADMISSION_KIND: &str = "WebhookAdmissionConfiguration";
pub const WEBHOOK_ADMISSION_API_VERSION: &str = "apiserver.config.k8s.io/v2alpha1";

/// Configuration of the webhook admission plugins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAdmission {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config_file: Option<String>,
    #[serde(default)]
    pub metrics: WebhookMetrics,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMetrics {
    #[serde(default)]
    pub duration: DurationMetric,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationMetric {
    /// Requests matching one of these rules keep their resource labels on
    /// the duration histogram.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_resource_labels_for: Vec<Rule>,
}

impl WebhookAdmission {
    pub fn new(include_resource_labels_for: Vec<Rule>) -> Self {
        WebhookAdmission {
            api_version: WEBHOOK_ADMISSION_API_VERSION.to_owned(),
            kind: WEBHOOK_ADMISSION_KIND.to_owned(),
            kube_config_file: None,
            metrics: WebhookMetrics {
                duration: DurationMetric {
                    include_resource_labels_for,
                },
            },
        }
    }

    pub fn resource_label_rules(&self) -> &[Rule] {
        &self.metrics.duration.include_resource_labels_for
    }

    /// Decodes the configuration stored in an admission plugin entry.
    pub fn from_plugin_config(config: &AdmissionPluginConfig) -> Result<Self, ConfigError> {
        let webhook_admission: WebhookAdmission =
            serde_json::from_value(config.configuration.clone())?;
        webhook_admission.check_kind()?;
        Ok(webhook_admission)
    }

    // An empty kind is accepted, the document may be a bare configuration.
    fn check_kind(&self) -> Result<(), ConfigError> {
        if self.kind.is_empty() || self.kind == WEBHOOK_ADMISSION_KIND {
            return Ok(());
        }
        Err(ConfigError::UnexpectedKind {
            expected: WEBHOOK_ADMISSION_KIND.to_owned(),
            found: self.kind.clone(),
        })
    }
}

/// Reads a YAML, or JSON, `WebhookAdmissionConfiguration` document.
pub fn read_webhook_admission_file(path: &Path) -> Result<WebhookAdmission, ConfigError> {
    let file = File::open(path)?;
    let webhook_admission: WebhookAdmission = serde_yaml::from_reader(file)?;
    webhook_admission.check_kind()?;
    Ok(webhook_admission)
}

/// Configuration of one admission plugin, either inline or by file location.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionPluginConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default)]
    pub configuration: Value,
}

/// Admission plugin configurations, keyed by plugin name.
pub type PluginConfigs = BTreeMap<String, AdmissionPluginConfig>;

/// Resources whose webhook latency is broken down by resource on OpenShift.
pub fn default_resource_label_rules() -> Vec<Rule> {
    [
        ("", &["endpoints", "events", "pods"][..]),
        ("quota", &["resourcequotas"][..]),
        ("apiserver.openshift.io", &["apirequestcounts"][..]),
        ("discovery.k8s.io", &["endpointslices"][..]),
        ("events.k8s.io", &["events"][..]),
        ("quota.openshift.io", &["clusterresourcequotas"][..]),
    ]
    .into_iter()
    .map(|(group, resources)| Rule {
        groups: vec![group.to_owned()],
        resources: resources.iter().map(|r| r.to_string()).collect(),
        ..Default::default()
    })
    .collect()
}

/// Installs the default resource label rules as the configuration of both
/// webhook admission plugins. Existing entries are replaced.
pub fn expand_cardinality_of_admission_webhook_duration_metrics(
    plugin_configs: &mut PluginConfigs,
) -> Result<(), ConfigError> {
    let configuration = serde_json::to_value(WebhookAdmission::new(
        default_resource_label_rules(),
    ))?;
    let plugin_config = AdmissionPluginConfig {
        location: String::new(),
        configuration,
    };

    plugin_configs.insert(mutating::PLUGIN_NAME.to_owned(), plugin_config.clone());
    plugin_configs.insert(validating::PLUGIN_NAME.to_owned(), plugin_config);
    Ok(())
}

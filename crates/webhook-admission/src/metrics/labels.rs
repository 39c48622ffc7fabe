use serde::{Deserialize, Serialize};

use crate::attributes::{Attributes, GroupVersionResource};

const WILDCARD: &str = "*";

/// Selects the requests whose resource labels may be emitted on the webhook
/// duration metric.
///
/// Every dimension is a list of literal values or `*`. An empty list matches
/// everything for that dimension.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
    /// Entries may carry a `/subresource` suffix, which is ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

impl Rule {
    /// All dimensions must match.
    pub fn matches(&self, gvr: &GroupVersionResource, namespace: &str) -> bool {
        dimension_matches(&self.namespaces, namespace)
            && dimension_matches(&self.groups, &gvr.group)
            && dimension_matches(&self.versions, &gvr.version)
            && self.resource_matches(&gvr.resource)
    }

    fn resource_matches(&self, resource: &str) -> bool {
        self.resources.is_empty()
            || self.resources.iter().any(|configured| {
                let configured = configured
                    .split_once('/')
                    .map_or(configured.as_str(), |(resource, _)| resource);
                configured == WILDCARD || configured == resource
            })
    }
}

fn dimension_matches(values: &[String], value: &str) -> bool {
    values.is_empty() || values.iter().any(|v| v == WILDCARD || v == value)
}

/// Resource labels attached to a webhook observation. Either all four
/// values are the real ones or all of them are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceLabels {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub subresource: String,
}

/// Resolves the resource labels of a request.
///
/// No rules means no resource labels at all. Otherwise the real values are
/// revealed when at least one rule matches the request.
pub fn resource_labels(rules: &[Rule], attributes: &dyn Attributes) -> ResourceLabels {
    if rules.is_empty() {
        return ResourceLabels::default();
    }

    let gvr = attributes.resource();
    if !rules
        .iter()
        .any(|rule| rule.matches(gvr, attributes.namespace()))
    {
        return ResourceLabels::default();
    }

    ResourceLabels {
        group: gvr.group.clone(),
        version: gvr.version.clone(),
        resource: gvr.resource.clone(),
        subresource: attributes.subresource().to_owned(),
    }
}

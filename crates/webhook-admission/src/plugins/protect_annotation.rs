//! Keeps the internal registry pull secret reference of service accounts
//! under the control of the controller manager.

use crate::admission::{AdmissionPlugin, ValidationInterface};
use crate::attributes::{Attributes, Operation, object_meta};
use crate::errors::{AccessorError, AdmissionError, AdmissionResult};

pub const PLUGIN_NAME: &str = "registry.openshift.io/ProtectAnnotation";

pub const PROTECTED_ANNOTATION_KEY: &str = "openshift.io/internal-registry-pull-secret-ref";

const SERVICE_ACCOUNTS_RESOURCE: &str = "serviceaccounts";

const SERVICE_ACCOUNTS_GROUP: &str = "system:serviceaccounts";

const ALLOWED_SERVICE_ACCOUNTS: [&str; 3] = [
    "system:serviceaccounts:openshift-infra",
    "system:serviceaccounts:openshift-controller-manager",
    "system:serviceaccounts:openshift-controller-manager-operator",
];

/// Rejects updates of the protected annotation made by service accounts
/// other than the ones of the controller manager.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtectAnnotation;

impl ProtectAnnotation {
    pub fn new() -> Self {
        ProtectAnnotation
    }
}

impl AdmissionPlugin for ProtectAnnotation {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn handles(&self, operation: Operation) -> bool {
        operation == Operation::Update
    }
}

impl ValidationInterface for ProtectAnnotation {
    fn validate(&self, attributes: &dyn Attributes) -> AdmissionResult<()> {
        if attributes.resource().resource != SERVICE_ACCOUNTS_RESOURCE
            || !attributes.subresource().is_empty()
        {
            return Ok(());
        }

        let groups = attributes
            .user_info()
            .groups
            .as_deref()
            .unwrap_or_default();
        if !groups.iter().any(|group| group == SERVICE_ACCOUNTS_GROUP) {
            // not a service account
            return Ok(());
        }
        if groups
            .iter()
            .any(|group| ALLOWED_SERVICE_ACCOUNTS.contains(&group.as_str()))
        {
            return Ok(());
        }

        if !annotation_changed(attributes, PROTECTED_ANNOTATION_KEY)? {
            return Ok(());
        }

        Err(AdmissionError::forbidden(
            &attributes.resource().resource,
            attributes.name(),
            format!(
                "'{PROTECTED_ANNOTATION_KEY}' annotation can only be changed by openshift-controller-manager"
            ),
        ))
    }
}

/// A flip of presence or a different value are both changes.
fn annotation_changed(attributes: &dyn Attributes, key: &str) -> Result<bool, AccessorError> {
    let before = object_meta(attributes.old_object())?;
    let after = object_meta(attributes.object())?;

    let value_before = before.annotations.as_ref().and_then(|a| a.get(key));
    let value_after = after.annotations.as_ref().and_then(|a| a.get(key));
    Ok(value_before != value_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributesRecord, GroupVersionKind, GroupVersionResource};
    use k8s_openapi::api::authentication::v1::UserInfo;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn object(kind: &str, name: &str, annotations: &[(&str, &str)]) -> Value {
        let annotations: serde_json::Map<String, Value> = annotations
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        let mut metadata = json!({ "name": name });
        if !annotations.is_empty() {
            metadata["annotations"] = Value::Object(annotations);
        }
        json!({
            "apiVersion": "v1",
            "kind": kind,
            "metadata": metadata,
        })
    }

    fn sa(annotations: &[(&str, &str)]) -> Value {
        object("ServiceAccount", "test-sa", annotations)
    }

    fn pod(annotations: &[(&str, &str)]) -> Value {
        object("Pod", "test-pod", annotations)
    }

    fn attributes(old: Value, new: Value, groups: &[&str], subresource: &str) -> AttributesRecord {
        let kind = new["kind"].as_str().unwrap_or_default().to_owned();
        let resource = match kind.as_str() {
            "ServiceAccount" => "serviceaccounts",
            "Pod" => "pods",
            other => panic!("unexpected kind {other}"),
        };
        let mut record = AttributesRecord::new(
            Operation::Update,
            GroupVersionResource::new("", "v1", resource),
        );
        record.name = new["metadata"]["name"].as_str().unwrap_or_default().to_owned();
        record.namespace = "test-ns".to_owned();
        record.kind = GroupVersionKind::new("", "v1", &kind);
        record.subresource = subresource.to_owned();
        record.old_object = Some(old);
        record.object = Some(new);
        record.user_info = UserInfo {
            username: Some("test".to_owned()),
            groups: Some(groups.iter().map(|g| g.to_string()).collect()),
            ..Default::default()
        };
        record
    }

    const KEY: &str = PROTECTED_ANNOTATION_KEY;
    const OCM: &str = "system:serviceaccounts:openshift-infra";

    #[rstest]
    #[case::serviceaccount_edit(
        sa(&[(KEY, "before")]), sa(&[(KEY, "after")]), &["system:serviceaccounts", "foo"], "", true
    )]
    #[case::serviceaccount_delete(
        sa(&[(KEY, "before")]), sa(&[]), &["system:serviceaccounts", "foo"], "", true
    )]
    #[case::serviceaccount_add(
        sa(&[]), sa(&[(KEY, "after")]), &["system:serviceaccounts", "foo"], "", true
    )]
    #[case::serviceaccount_no_change(
        sa(&[(KEY, "before"), ("foo", "before")]),
        sa(&[(KEY, "before"), ("foo", "after")]),
        &["system:serviceaccounts", "foo"],
        "",
        false
    )]
    #[case::serviceaccount_edit_subresource(
        sa(&[(KEY, "before")]),
        sa(&[(KEY, "after")]),
        &["system:serviceaccounts", "foo"],
        "sub-resource",
        false
    )]
    #[case::ocm_serviceaccount_edit(
        sa(&[(KEY, "before")]), sa(&[(KEY, "after")]), &["system:serviceaccounts", OCM], "", false
    )]
    #[case::ocm_serviceaccount_delete(
        sa(&[(KEY, "before")]), sa(&[]), &["system:serviceaccounts", OCM], "", false
    )]
    #[case::ocm_serviceaccount_add(
        sa(&[]), sa(&[(KEY, "after")]), &["system:serviceaccounts", OCM], "", false
    )]
    #[case::ocm_serviceaccount_no_change(
        sa(&[(KEY, "before"), ("foo", "before")]),
        sa(&[(KEY, "before"), ("foo", "after")]),
        &["system:serviceaccounts", OCM],
        "",
        false
    )]
    #[case::allow_listed_group_first(
        sa(&[(KEY, "before")]), sa(&[(KEY, "after")]), &[OCM, "system:serviceaccounts"], "", false
    )]
    #[case::user_edit(
        sa(&[(KEY, "before")]), sa(&[(KEY, "after")]), &["system:authenticated"], "", false
    )]
    #[case::not_a_service_account(
        pod(&[(KEY, "before")]), pod(&[(KEY, "after")]), &["system:serviceaccounts"], "", false
    )]
    fn validate(
        #[case] old: Value,
        #[case] new: Value,
        #[case] groups: &[&str],
        #[case] subresource: &str,
        #[case] want_error: bool,
    ) {
        let attributes = attributes(old, new, groups, subresource);
        let result = ProtectAnnotation::new().validate(&attributes);

        assert_eq!(result.is_err(), want_error, "{result:?}");
    }

    #[test]
    fn denial_names_the_protected_annotation() {
        let attributes = attributes(
            sa(&[(KEY, "before")]),
            sa(&[(KEY, "after")]),
            &["system:serviceaccounts"],
            "",
        );

        let err = ProtectAnnotation::new().validate(&attributes).unwrap_err();

        assert!(matches!(err, AdmissionError::Forbidden { .. }));
        assert_eq!(
            err.to_string(),
            "serviceaccounts \"test-sa\" is forbidden: 'openshift.io/internal-registry-pull-secret-ref' annotation can only be changed by openshift-controller-manager"
        );
    }

    #[test]
    fn unreadable_metadata_is_an_internal_error() {
        let mut attributes = attributes(
            sa(&[(KEY, "before")]),
            sa(&[(KEY, "after")]),
            &["system:serviceaccounts"],
            "",
        );
        attributes.old_object = Some(json!({ "metadata": { "annotations": "not a map" } }));

        let err = ProtectAnnotation::new().validate(&attributes).unwrap_err();

        assert!(matches!(err, AdmissionError::Internal(_)));
    }

    #[test]
    fn only_updates_are_handled() {
        let plugin = ProtectAnnotation::new();

        assert!(plugin.handles(Operation::Update));
        assert!(!plugin.handles(Operation::Create));
        assert!(!plugin.handles(Operation::Delete));
    }
}

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AccessorError, AttributesError};

/// The kind of write operation an admission request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AttributesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATE" => Ok(Operation::Create),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            "CONNECT" => Ok(Operation::Connect),
            _ => Err(AttributesError::UnknownOperation(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_owned(),
            version: version.to_owned(),
            resource: resource.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_owned(),
            version: version.to_owned(),
            kind: kind.to_owned(),
        }
    }
}

/// Read-only view over an admission request. This is everything the
/// decorators, the label rules and the admission plugins need to know about
/// the request being admitted.
pub trait Attributes: Send + Sync {
    /// Name of the object as presented in the request. Empty on CREATE when
    /// the name is generated by the server.
    fn name(&self) -> &str;

    /// Namespace of the request, empty for cluster scoped resources.
    fn namespace(&self) -> &str;

    fn resource(&self) -> &GroupVersionResource;

    /// Empty unless the request targets a subresource (`status`, `scale`...).
    fn subresource(&self) -> &str;

    fn operation(&self) -> Operation;

    fn kind(&self) -> &GroupVersionKind;

    fn object(&self) -> Option<&Value>;

    /// Only populated for UPDATE and DELETE requests.
    fn old_object(&self) -> Option<&Value>;

    fn user_info(&self) -> &UserInfo;

    fn is_dry_run(&self) -> bool;
}

/// Concrete, owned implementation of [`Attributes`].
#[derive(Clone, Debug)]
pub struct AttributesRecord {
    pub name: String,
    pub namespace: String,
    pub resource: GroupVersionResource,
    pub subresource: String,
    pub operation: Operation,
    pub kind: GroupVersionKind,
    pub object: Option<Value>,
    pub old_object: Option<Value>,
    pub user_info: UserInfo,
    pub dry_run: bool,
}

impl AttributesRecord {
    pub fn new(operation: Operation, resource: GroupVersionResource) -> Self {
        AttributesRecord {
            name: String::new(),
            namespace: String::new(),
            resource,
            subresource: String::new(),
            operation,
            kind: GroupVersionKind::default(),
            object: None,
            old_object: None,
            user_info: UserInfo::default(),
            dry_run: false,
        }
    }
}

impl Attributes for AttributesRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn resource(&self) -> &GroupVersionResource {
        &self.resource
    }

    fn subresource(&self) -> &str {
        &self.subresource
    }

    fn operation(&self) -> Operation {
        self.operation
    }

    fn kind(&self) -> &GroupVersionKind {
        &self.kind
    }

    fn object(&self) -> Option<&Value> {
        self.object.as_ref()
    }

    fn old_object(&self) -> Option<&Value> {
        self.old_object.as_ref()
    }

    fn user_info(&self) -> &UserInfo {
        &self.user_info
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// The `request` section of an `AdmissionReview` document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub operation: String,
    #[serde(default)]
    pub user_info: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// Accepts either a bare `AdmissionRequest` or a full `AdmissionReview`
/// wrapping it under `request`.
pub fn parse_admission_request(document: &str) -> Result<AdmissionRequest, AttributesError> {
    let value: Value = serde_json::from_str(document)?;
    let request = match value.get("request") {
        Some(request) => request.clone(),
        None => value,
    };
    Ok(serde_json::from_value(request)?)
}

impl TryFrom<AdmissionRequest> for AttributesRecord {
    type Error = AttributesError;

    fn try_from(request: AdmissionRequest) -> Result<Self, Self::Error> {
        Ok(AttributesRecord {
            name: request.name.unwrap_or_default(),
            namespace: request.namespace.unwrap_or_default(),
            resource: request.resource,
            subresource: request.sub_resource.unwrap_or_default(),
            operation: request.operation.parse()?,
            kind: request.kind,
            object: request.object,
            old_object: request.old_object,
            user_info: request.user_info,
            dry_run: request.dry_run.unwrap_or_default(),
        })
    }
}

/// Returns the metadata of an admitted object.
///
/// A missing object, a document that is not a JSON object, or a `metadata`
/// field that cannot be decoded are accessor failures. An object without
/// `metadata` has empty metadata.
pub fn object_meta(object: Option<&Value>) -> Result<ObjectMeta, AccessorError> {
    let object = object.ok_or(AccessorError::MissingObject)?;
    let fields = object.as_object().ok_or(AccessorError::NotAnObject)?;
    match fields.get("metadata") {
        None | Some(Value::Null) => Ok(ObjectMeta::default()),
        Some(metadata) => serde_json::from_value(metadata.clone())
            .map_err(|e| AccessorError::MalformedMetadata(e.to_string())),
    }
}

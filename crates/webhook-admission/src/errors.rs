use std::fmt;

use thiserror::Error;

pub type AdmissionResult<T> = std::result::Result<T, AdmissionError>;

/// Status returned by a webhook, or synthesized by the client when the
/// webhook could not be reached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebhookStatus {
    pub code: u16,
    pub message: String,
}

impl WebhookStatus {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        WebhookStatus {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a failed webhook invocation.
///
/// The variant decides how the failure is classified for metrics, see
/// [`crate::metrics::classify`].
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The webhook endpoint could not be reached or failed at the transport
    /// level.
    #[error("failed calling webhook \"{webhook}\": {reason}")]
    CallingWebhook {
        webhook: String,
        reason: String,
        status: WebhookStatus,
    },

    /// The webhook ran and denied the request.
    #[error("admission webhook \"{webhook}\" denied the request: {status}")]
    Rejection {
        webhook: String,
        status: WebhookStatus,
    },

    /// Anything else: undecodable responses, patch failures, bugs.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn calling_webhook(webhook: &str, reason: impl Into<String>, code: u16) -> Self {
        let reason = reason.into();
        WebhookError::CallingWebhook {
            webhook: webhook.to_owned(),
            status: WebhookStatus::new(code, reason.clone()),
            reason,
        }
    }

    pub fn rejection(webhook: &str, code: u16, message: impl Into<String>) -> Self {
        WebhookError::Rejection {
            webhook: webhook.to_owned(),
            status: WebhookStatus::new(code, message),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("{resource} \"{name}\" is forbidden: {reason}")]
    Forbidden {
        resource: String,
        name: String,
        reason: String,
    },

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

impl AdmissionError {
    pub fn forbidden(resource: &str, name: &str, reason: impl Into<String>) -> Self {
        AdmissionError::Forbidden {
            resource: resource.to_owned(),
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<AccessorError> for AdmissionError {
    fn from(error: AccessorError) -> Self {
        AdmissionError::Internal(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("object is missing")]
    MissingObject,

    #[error("object is not a JSON object")]
    NotAnObject,

    #[error("cannot decode object metadata: {0}")]
    MalformedMetadata(String),
}

#[derive(Debug, Error)]
pub enum AttributesError {
    #[error("unknown admission operation: {0}")]
    UnknownOperation(String),

    #[error("cannot decode admission request: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cannot encode configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected configuration kind \"{found}\", expected \"{expected}\"")]
    UnexpectedKind { expected: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_error_messages() {
        let err = WebhookError::calling_webhook("pods.example.com", "connection refused", 503);
        assert_eq!(
            err.to_string(),
            "failed calling webhook \"pods.example.com\": connection refused"
        );

        let err = WebhookError::rejection("pods.example.com", 403, "pod is not allowed");
        assert_eq!(
            err.to_string(),
            "admission webhook \"pods.example.com\" denied the request: pod is not allowed"
        );

        let err = WebhookError::from(anyhow::anyhow!("cannot decode response"));
        assert_eq!(err.to_string(), "cannot decode response");
    }

    #[test]
    fn admission_error_keeps_webhook_message() {
        let err = AdmissionError::from(WebhookError::rejection("hook", 400, "nope"));
        assert_eq!(
            err.to_string(),
            "admission webhook \"hook\" denied the request: nope"
        );
    }

    #[test]
    fn forbidden_message() {
        let err = AdmissionError::forbidden("serviceaccounts", "builder", "not allowed");
        assert_eq!(
            err.to_string(),
            "serviceaccounts \"builder\" is forbidden: not allowed"
        );
    }
}

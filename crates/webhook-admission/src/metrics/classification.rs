use crate::errors::WebhookError;

/// Status code recorded for successful invocations.
pub const SUCCESS_STATUS_CODE: u16 = 200;
/// Status code recorded when the failure carries no status.
pub const UNKNOWN_STATUS_CODE: u16 = 0;

/// Why a webhook invocation counts as a rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionClass {
    /// Not a rejection.
    None,
    /// The webhook could not be called.
    CallingWebhookError,
    /// The webhook denied the request.
    WebhookRejection,
    /// Any other failure.
    InternalError,
}

impl RejectionClass {
    /// Value of the `error_type` label of the rejection counter.
    pub fn error_type(&self) -> &'static str {
        match self {
            RejectionClass::None | RejectionClass::WebhookRejection => "no_error",
            RejectionClass::CallingWebhookError => "calling_webhook_error",
            RejectionClass::InternalError => "apiserver_internal_error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub class: RejectionClass,
    pub rejected: bool,
    pub status_code: u16,
}

/// Classifies the outcome of a webhook invocation.
///
/// Total over every outcome: a call failure of a webhook that ignores call
/// failures is not a rejection, but still reports the status code of the
/// failure.
pub fn classify(error: Option<&WebhookError>, ignore_call_failures: bool) -> Classification {
    match error {
        None => Classification {
            class: RejectionClass::None,
            rejected: false,
            status_code: SUCCESS_STATUS_CODE,
        },
        Some(WebhookError::CallingWebhook { status, .. }) => {
            let rejected = !ignore_call_failures;
            Classification {
                class: if rejected {
                    RejectionClass::CallingWebhookError
                } else {
                    RejectionClass::None
                },
                rejected,
                status_code: status.code,
            }
        }
        Some(WebhookError::Rejection { status, .. }) => Classification {
            class: RejectionClass::WebhookRejection,
            rejected: true,
            status_code: status.code,
        },
        Some(WebhookError::Internal(_)) => Classification {
            class: RejectionClass::InternalError,
            rejected: true,
            status_code: UNKNOWN_STATUS_CODE,
        },
    }
}

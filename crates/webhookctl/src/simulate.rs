use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};
use webhook_admission::attributes::{AttributesRecord, parse_admission_request};
use webhook_admission::config::{default_resource_label_rules, read_webhook_admission_file};
use webhook_admission::errors::AdmissionResult;
use webhook_admission::metrics::{
    OtelRecorder, Rule, TracingRecorder, WebhookMetricsRecorder, setup_metrics,
};
use webhook_admission::mutating::{MutatingWebhookInvoker, MutatingWebhookPlugin};
use webhook_admission::validating::{ValidatingWebhookInvoker, ValidatingWebhookPlugin};
use webhook_admission::webhook::{
    AuditAnnotations, FailurePolicy, MutatingWebhook, ValidatingWebhook, VersionedAttributes,
    WebhookAnnotator, WebhookInvocation, WebhookKind,
};
use webhook_admission::{
    InvocationLogInitializer, PluginInitializer, PluginInitializers, WebhookError,
    WebhookPluginInitializer,
};

const DEFAULT_DENIAL_CODE: u16 = 403;
const DEFAULT_CALL_FAILURE_CODE: u16 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Allow,
    Deny,
    Unreachable,
    Internal,
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allow" => Ok(Outcome::Allow),
            "deny" => Ok(Outcome::Deny),
            "unreachable" => Ok(Outcome::Unreachable),
            "internal" => Ok(Outcome::Internal),
            _ => Err(anyhow!("unknown outcome: {s}")),
        }
    }
}

pub(crate) fn parse_failure_policy(policy: &str) -> Result<FailurePolicy> {
    match policy {
        "Ignore" => Ok(FailurePolicy::Ignore),
        "Fail" => Ok(FailurePolicy::Fail),
        _ => Err(anyhow!("unknown failure policy: {policy}")),
    }
}

pub(crate) struct SimulateOptions {
    pub request_path: PathBuf,
    pub webhook: String,
    pub kind: WebhookKind,
    pub outcome: Outcome,
    pub status_code: Option<u16>,
    pub failure_policy: Option<FailurePolicy>,
    pub config_path: Option<PathBuf>,
    pub enable_metrics: bool,
    pub otlp_endpoint: Option<String>,
}

/// Webhook that answers every call with the same outcome.
struct SimulatedWebhook {
    outcome: Outcome,
    status_code: Option<u16>,
}

impl SimulatedWebhook {
    fn respond(&self, webhook: &str) -> Result<(), WebhookError> {
        match self.outcome {
            Outcome::Allow => Ok(()),
            Outcome::Deny => Err(WebhookError::rejection(
                webhook,
                self.status_code.unwrap_or(DEFAULT_DENIAL_CODE),
                "denied by the simulated webhook",
            )),
            Outcome::Unreachable => Err(WebhookError::calling_webhook(
                webhook,
                "simulated connection failure",
                self.status_code.unwrap_or(DEFAULT_CALL_FAILURE_CODE),
            )),
            Outcome::Internal => Err(WebhookError::Internal(anyhow!(
                "simulated internal error"
            ))),
        }
    }
}

#[async_trait]
impl MutatingWebhookInvoker for SimulatedWebhook {
    async fn invoke(
        &self,
        hook: &MutatingWebhook,
        _invocation: &WebhookInvocation,
        _attr: &mut VersionedAttributes,
        _annotator: &dyn WebhookAnnotator,
        _round: usize,
        _idx: usize,
    ) -> Result<bool, WebhookError> {
        self.respond(&hook.name).map(|()| false)
    }
}

#[async_trait]
impl ValidatingWebhookInvoker for SimulatedWebhook {
    async fn invoke(
        &self,
        hook: &ValidatingWebhook,
        _invocation: &WebhookInvocation,
        _attr: &VersionedAttributes,
    ) -> Result<(), WebhookError> {
        self.respond(&hook.name)
    }
}

fn resource_label_rules(config_path: Option<&PathBuf>) -> Result<Vec<Rule>> {
    match config_path {
        Some(path) => Ok(read_webhook_admission_file(path)?
            .resource_label_rules()
            .to_vec()),
        None => Ok(default_resource_label_rules()),
    }
}

pub(crate) async fn simulate(options: SimulateOptions) -> Result<Value> {
    let document = fs::read_to_string(&options.request_path)
        .with_context(|| format!("cannot read {}", options.request_path.display()))?;
    let record = AttributesRecord::try_from(parse_admission_request(&document)?)?;
    let rules = resource_label_rules(options.config_path.as_ref())?;

    let meter_provider = if options.enable_metrics {
        Some(setup_metrics(options.otlp_endpoint.as_deref())?)
    } else {
        None
    };
    let recorder: Arc<dyn WebhookMetricsRecorder> = if meter_provider.is_some() {
        Arc::new(OtelRecorder)
    } else {
        Arc::new(TracingRecorder)
    };
    let initializers = PluginInitializers::new()
        .with(WebhookPluginInitializer::new(rules, recorder))
        .with(InvocationLogInitializer);

    let invoker = Arc::new(SimulatedWebhook {
        outcome: options.outcome,
        status_code: options.status_code,
    });
    let mut attr = VersionedAttributes::new(Arc::new(record));
    let annotations = AuditAnnotations::new();

    let result: AdmissionResult<()> = match options.kind {
        WebhookKind::Mutating => {
            let mut plugin = MutatingWebhookPlugin::new(
                vec![MutatingWebhook::new(&options.webhook, options.failure_policy)],
                invoker,
            );
            initializers.initialize(&mut plugin);
            plugin.admit(&mut attr, &annotations).await
        }
        WebhookKind::Validating => {
            let mut plugin = ValidatingWebhookPlugin::new(
                vec![ValidatingWebhook::new(&options.webhook, options.failure_policy)],
                invoker,
            );
            initializers.initialize(&mut plugin);
            plugin.validate(&attr, &annotations).await
        }
    };

    if let Some(meter_provider) = meter_provider {
        info!("flushing metrics");
        if let Err(e) = meter_provider.shutdown() {
            warn!(error = %e, "cannot flush metrics");
        }
    }

    Ok(json!({
        "allowed": result.is_ok(),
        "message": result.err().map(|e| e.to_string()),
        "dirty": attr.dirty,
        "annotations": annotations.into_inner(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn request_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({
                "uid": "1",
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "resource": {"group": "", "version": "v1", "resource": "pods"},
                "name": "web",
                "namespace": "default",
                "operation": "CREATE",
                "object": {"metadata": {"name": "web"}}
            })
        )
        .unwrap();
        file
    }

    #[rstest]
    #[case::allow(Outcome::Allow, None, true, None)]
    #[case::deny(
        Outcome::Deny,
        Some(FailurePolicy::Ignore),
        false,
        Some("admission webhook \"hook\" denied the request: denied by the simulated webhook")
    )]
    #[case::unreachable_fail(
        Outcome::Unreachable,
        Some(FailurePolicy::Fail),
        false,
        Some("failed calling webhook \"hook\": simulated connection failure")
    )]
    #[case::unreachable_ignore(Outcome::Unreachable, Some(FailurePolicy::Ignore), true, None)]
    #[case::internal(Outcome::Internal, None, false, Some("simulated internal error"))]
    #[tokio::test]
    async fn simulate_outcomes(
        #[case] outcome: Outcome,
        #[case] failure_policy: Option<FailurePolicy>,
        #[case] allowed: bool,
        #[case] message: Option<&str>,
        #[values(WebhookKind::Mutating, WebhookKind::Validating)] kind: WebhookKind,
    ) {
        let request = request_file();
        let options = SimulateOptions {
            request_path: request.path().to_path_buf(),
            webhook: "hook".to_owned(),
            kind,
            outcome,
            status_code: None,
            failure_policy,
            config_path: None,
            enable_metrics: false,
            otlp_endpoint: None,
        };

        let report = simulate(options).await.unwrap();

        assert_eq!(report["allowed"], json!(allowed));
        assert_eq!(report["message"], json!(message));
    }

    #[test]
    fn parse_outcome() {
        assert_eq!("unreachable".parse::<Outcome>().unwrap(), Outcome::Unreachable);
        assert!("timeout".parse::<Outcome>().is_err());
    }
}

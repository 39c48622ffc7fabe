use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::ArgMatches;
use webhook_admission::webhook::WebhookKind;

mod check_annotation;
mod cli;
mod default_config;
mod labels;
mod simulate;
mod tracing;

use simulate::{Outcome, SimulateOptions, parse_failure_policy};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();

    let log_level = string_arg(&matches, "log-level")?;
    let log_fmt = string_arg(&matches, "log-fmt")?;
    let log_no_color = matches.get_flag("log-no-color");
    tracing::setup_tracing(log_level, log_fmt, log_no_color)?;

    match matches.subcommand() {
        Some(("default-config", matches)) => {
            let output = matches.get_one::<String>("output").map(Path::new);
            default_config::default_config(output)
        }
        Some(("labels", matches)) => {
            let config = string_arg(matches, "config")?;
            let query = labels::LabelsQuery {
                group: string_arg(matches, "group")?,
                version: string_arg(matches, "version")?,
                resource: string_arg(matches, "resource")?,
                subresource: string_arg(matches, "subresource")?,
                namespace: string_arg(matches, "namespace")?,
            };
            let labels = labels::labels(Path::new(config), &query)?;
            println!("{}", serde_json::to_string_pretty(&labels)?);
            Ok(())
        }
        Some(("check-annotation", matches)) => {
            let request = string_arg(matches, "request-path")?;
            check_annotation::check_annotation(Path::new(request))
        }
        Some(("simulate", matches)) => {
            let options = simulate_options(matches)?;
            let report = simulate::simulate(options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some((command, _)) => Err(anyhow!("unknown subcommand: {command}")),
        None => {
            // NOTE: this should not happen due to the
            // subcommand_required setting
            unreachable!();
        }
    }
}

fn string_arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument: {name}"))
}

fn simulate_options(matches: &ArgMatches) -> Result<SimulateOptions> {
    let kind = match string_arg(matches, "kind")? {
        "mutating" => WebhookKind::Mutating,
        "validating" => WebhookKind::Validating,
        other => return Err(anyhow!("unknown webhook kind: {other}")),
    };
    let failure_policy = matches
        .get_one::<String>("failure-policy")
        .map(|policy| parse_failure_policy(policy))
        .transpose()?;

    Ok(SimulateOptions {
        request_path: PathBuf::from(string_arg(matches, "request-path")?),
        webhook: string_arg(matches, "webhook")?.to_owned(),
        kind,
        outcome: string_arg(matches, "outcome")?.parse::<Outcome>()?,
        status_code: matches.get_one::<u16>("status-code").copied(),
        failure_policy,
        config_path: matches.get_one::<String>("config").map(PathBuf::from),
        enable_metrics: matches.get_flag("enable-metrics"),
        otlp_endpoint: matches.get_one::<String>("otlp-endpoint").cloned(),
    })
}

use clap::{
    Arg, ArgAction, Command, builder::PossibleValuesParser, crate_authors, crate_description,
    crate_name, crate_version,
};

fn subcommand_default_config() -> Command {
    Command::new("default-config")
        .about("Print the webhook admission plugin configuration with the default resource label rules")
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("PATH")
                .help("Write the configuration to PATH instead of the standard output"),
        )
}

fn subcommand_labels() -> Command {
    Command::new("labels")
        .about("Show the resource labels a webhook observation would carry")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .required(true)
                .help("WebhookAdmissionConfiguration file (YAML or JSON)"),
        )
        .arg(
            Arg::new("group")
                .long("group")
                .value_name("GROUP")
                .default_value("")
                .help("API group of the resource, empty for the core group"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .value_name("VERSION")
                .required(true)
                .help("API version of the resource"),
        )
        .arg(
            Arg::new("resource")
                .long("resource")
                .value_name("RESOURCE")
                .required(true)
                .help("Resource name, e.g. pods"),
        )
        .arg(
            Arg::new("subresource")
                .long("subresource")
                .value_name("SUBRESOURCE")
                .default_value("")
                .help("Subresource name, e.g. status"),
        )
        .arg(
            Arg::new("namespace")
                .long("namespace")
                .value_name("NAMESPACE")
                .default_value("")
                .help("Namespace of the request"),
        )
}

fn subcommand_check_annotation() -> Command {
    Command::new("check-annotation")
        .about("Run the internal registry annotation protection against an admission request")
        .arg(
            Arg::new("request-path")
                .long("request")
                .short('r')
                .value_name("PATH")
                .required(true)
                .help("File containing the AdmissionReview or the admission request, in JSON format"),
        )
}

fn subcommand_simulate() -> Command {
    Command::new("simulate")
        .about("Send an admission request through an instrumented webhook plugin with a simulated webhook")
        .arg(
            Arg::new("request-path")
                .long("request")
                .short('r')
                .value_name("PATH")
                .required(true)
                .help("File containing the AdmissionReview or the admission request, in JSON format"),
        )
        .arg(
            Arg::new("webhook")
                .long("webhook")
                .value_name("NAME")
                .required(true)
                .help("Name of the simulated webhook"),
        )
        .arg(
            Arg::new("kind")
                .long("kind")
                .value_name("KIND")
                .default_value("validating")
                .value_parser(PossibleValuesParser::new(["mutating", "validating"]))
                .help("Admission phase of the webhook"),
        )
        .arg(
            Arg::new("outcome")
                .long("outcome")
                .value_name("OUTCOME")
                .default_value("allow")
                .value_parser(PossibleValuesParser::new([
                    "allow",
                    "deny",
                    "unreachable",
                    "internal",
                ]))
                .help("What the simulated webhook does"),
        )
        .arg(
            Arg::new("status-code")
                .long("status-code")
                .value_name("CODE")
                .value_parser(clap::value_parser!(u16))
                .help("Status code of a denial or of a call failure"),
        )
        .arg(
            Arg::new("failure-policy")
                .long("failure-policy")
                .value_name("POLICY")
                .value_parser(PossibleValuesParser::new(["Ignore", "Fail"]))
                .help("Failure policy of the webhook, unset behaves like Fail"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("WebhookAdmissionConfiguration file. The OpenShift defaults are used when missing"),
        )
        .arg(
            Arg::new("enable-metrics")
                .long("enable-metrics")
                .action(ArgAction::SetTrue)
                .env("WEBHOOKCTL_ENABLE_METRICS")
                .help("Export the observations through OTLP instead of logging them"),
        )
        .arg(
            Arg::new("otlp-endpoint")
                .long("otlp-endpoint")
                .value_name("URL")
                .env("OTEL_EXPORTER_OTLP_METRICS_ENDPOINT")
                .help("OTLP collector receiving the metrics"),
        )
}

pub fn build_cli() -> Command {
    let mut subcommands = vec![
        subcommand_default_config(),
        subcommand_labels(),
        subcommand_check_annotation(),
        subcommand_simulate(),
    ];
    subcommands.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    Command::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LOG_LEVEL")
                .env("WEBHOOKCTL_LOG_LEVEL")
                .default_value("info")
                .value_parser(PossibleValuesParser::new([
                    "trace", "debug", "info", "warn", "error",
                ]))
                .global(true)
                .help("Log level"),
        )
        .arg(
            Arg::new("log-fmt")
                .long("log-fmt")
                .value_name("LOG_FMT")
                .env("WEBHOOKCTL_LOG_FMT")
                .default_value("text")
                .value_parser(PossibleValuesParser::new(["text", "json"]))
                .global(true)
                .help("Log output format"),
        )
        .arg(
            Arg::new("log-no-color")
                .long("log-no-color")
                .env("NO_COLOR")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Disable colored output for logs"),
        )
        .subcommands(subcommands)
        .subcommand_required(true)
        .arg_required_else_help(true)
}

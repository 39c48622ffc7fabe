use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;

#[allow(dead_code)]
pub fn setup_command() -> Command {
    let mut cmd: Command = cargo_bin_cmd!("webhookctl");
    cmd.env_remove("WEBHOOKCTL_LOG_LEVEL")
        .env_remove("WEBHOOKCTL_ENABLE_METRICS")
        .arg("--log-no-color");
    cmd
}

#[allow(dead_code)]
pub fn test_data(path: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(path)
        .to_string_lossy()
        .to_string()
}

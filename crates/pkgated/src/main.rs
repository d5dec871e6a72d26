use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use pkgate_core::{init_tracing, DirectoryConnector, GateConfig, GateRequest, QualityGate};
use tracing::Level;

const DEFAULT_CONFIG: &str = "/etc/pkgate/pkgate.toml";

fn config_path() -> PathBuf {
    std::env::var_os("PKGATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn json_logs() -> bool {
    std::env::var("PKGATE_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

async fn run() -> Result<bool> {
    let path = config_path();
    let config = GateConfig::load(&path)
        .with_context(|| format!("loading config {}", path.display()))?;
    let root = config
        .source_root
        .clone()
        .context("config missing [source] root")?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading request from stdin")?;
    let request = GateRequest::from_json(&input)?;

    let mut gate = QualityGate::new(config, Arc::new(DirectoryConnector::new(root)));
    let report = gate.run(&request).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.result)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(json_logs(), Level::INFO);

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "gate invocation failed");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_defaults_to_etc() {
        if std::env::var_os("PKGATE_CONFIG").is_none() {
            assert_eq!(config_path(), PathBuf::from(DEFAULT_CONFIG));
        }
    }
}

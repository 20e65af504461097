// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::DEFAULT_SECRET_NAME;
use crate::error::ImagePullError;
use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Controller configuration loaded from command line flags or environment variables
#[derive(Parser, Debug, Clone)]
#[command(
    name = "imagepull-controller",
    version,
    about = "A Kubernetes controller to spread image pull secrets on namespaces."
)]
pub struct Config {
    /// Enable debug mode.
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Enable development mode (load the kubeconfig instead of the in-cluster configuration).
    #[arg(long, env = "DEVELOPMENT")]
    pub development: bool,

    /// Kubernetes configuration path, only used when development mode is enabled.
    #[arg(short = 'c', long = "kube-config")]
    pub kube_config: Option<PathBuf>,

    /// Kubernetes namespace where the controller is running.
    #[arg(short = 'r', long = "namespace-running", env = "NAMESPACE_RUNNING")]
    pub namespace_running: String,

    /// Concurrent processing workers for the namespace controller.
    #[arg(short = 'w', long, env = "WORKERS", default_value_t = 5)]
    pub workers: u16,

    /// The duration between resyncs of the namespace controller resources (e.g. 30s, 5m, 1m30s).
    #[arg(long, env = "RESYNC_INTERVAL", default_value = "5m", value_parser = parse_duration)]
    pub resync_interval: Duration,

    /// The secret name in the running namespace that has the image pull credentials.
    #[arg(long, env = "SECRET_NAME", default_value = DEFAULT_SECRET_NAME)]
    pub secret_name: String,

    /// The secret name created in every namespace and set on its default service account.
    #[arg(long, env = "SA_SECRET_NAME")]
    pub sa_secret_name: Option<String>,
}

impl Config {
    /// Load configuration from the process arguments and environment.
    ///
    /// `--help` and `--version` print and exit here; any other parse error is returned.
    pub fn load() -> Result<Self> {
        match Config::try_parse() {
            Ok(config) => config.validate(),
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn validate(self) -> Result<Self> {
        if self.namespace_running.trim().is_empty() {
            return Err(
                ImagePullError::ConfigError("running namespace is required".to_string()).into(),
            );
        }
        if self.secret_name.trim().is_empty() {
            return Err(
                ImagePullError::ConfigError("secret name must not be empty".to_string()).into(),
            );
        }
        if self.workers == 0 {
            return Err(
                ImagePullError::ConfigError("workers must be at least 1".to_string()).into(),
            );
        }
        if self.resync_interval.is_zero() {
            return Err(ImagePullError::ConfigError(
                "resync interval must be greater than zero".to_string(),
            )
            .into());
        }
        Ok(self)
    }

    /// Name of the secret propagated into every namespace
    pub fn target_secret_name(&self) -> &str {
        self.sa_secret_name.as_deref().unwrap_or(&self.secret_name)
    }
}

/// Parse a human-friendly duration string.
///
/// Accepts compound values such as `1h`, `5m`, `1m30s` or `500ms`, and a bare
/// integer as seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| format!("invalid duration '{}': {}", s, e))
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation for in-cluster and development modes

use crate::config::Config;
use crate::error::{ImagePullError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::path::Path;
use tracing::{info, instrument};

/// Create the Kubernetes client the controllers talk through
#[instrument(skip(config), fields(development = config.development))]
pub async fn create_client(config: &Config) -> Result<Client> {
    let client_config = if config.development {
        load_kubeconfig(config.kube_config.as_deref()).await?
    } else {
        info!("Loading in-cluster Kubernetes configuration");
        KConfig::incluster().map_err(|e| {
            ImagePullError::KubeconfigError(format!(
                "error loading in-cluster configuration, check the controller is running inside a cluster or use development mode: {}",
                e
            ))
        })?
    };

    Client::try_from(client_config)
        .map_err(|e| ImagePullError::KubeconfigError(format!("Failed to create client: {}", e)))
}

/// Load a kubeconfig from `path`, or from the standard locations when unset
async fn load_kubeconfig(path: Option<&Path>) -> Result<KConfig> {
    let kubeconfig = match path {
        Some(path) => {
            info!("Loading Kubernetes configuration from {}", path.display());
            Kubeconfig::read_from(path)
        }
        None => {
            info!("Loading Kubernetes configuration from the default kubeconfig");
            Kubeconfig::read()
        }
    }
    .map_err(|e| ImagePullError::KubeconfigError(format!("Failed to read kubeconfig: {}", e)))?;

    KConfig::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| ImagePullError::KubeconfigError(format!("Failed to create config: {}", e)))
}

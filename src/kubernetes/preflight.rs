// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Start-up checks against the API server

use crate::constants::preflight::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use crate::kubernetes::{Labels, NamespaceRetriever, SecretRetriever};
use crate::reconcilers::source::name_field_selector;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait until the API server answers a namespace list.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
///
/// Returns `false` if shutdown was requested before the API became reachable.
pub async fn wait_for_api<R: NamespaceRetriever>(repo: &R, shutdown: &CancellationToken) -> bool {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match repo.list_namespaces(&Labels::new()).await {
            Ok(namespaces) => {
                info!(
                    "Kubernetes API is reachable, {} namespaces visible",
                    namespaces.items.len()
                );
                return true;
            }
            Err(e) => {
                warn!(
                    "Kubernetes API not reachable: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = sleep(Duration::from_secs(interval)) => {}
        }

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Report whether the credentials secret can be seen yet.
///
/// A missing secret is not fatal: namespaces are retried until the secret
/// cache controller observes it.
pub async fn check_credentials_secret<R: SecretRetriever>(
    repo: &R,
    namespace: &str,
    name: &str,
) -> Result<bool> {
    let secrets = repo
        .list_secrets(namespace, &name_field_selector(name))
        .await?;

    if secrets.items.is_empty() {
        warn!(
            "Credentials secret {}/{} not found, namespaces will not be reconciled until it exists",
            namespace, name
        );
        Ok(false)
    } else {
        info!("Credentials secret {}/{} found", namespace, name);
        Ok(true)
    }
}

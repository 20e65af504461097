// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use imagepull_controller::config::Config;
use imagepull_controller::constants::{
    namespace_controller, secret_cache_controller, RETRY_BACKOFF, SHUTDOWN_TIMEOUT,
};
use imagepull_controller::kubernetes::{
    check_credentials_secret, create_client, wait_for_api, CachedSecretRepository, CredentialCache,
    KubeRepository, SecretKey,
};
use imagepull_controller::reconcilers::{
    namespace_source, runner, secret_source, NamespaceReconciler, NamespaceReconcilerConfig,
    RunnerSettings, SecretCacheUpdater,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("could not load command configuration")?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting imagepull controller");
    info!(
        "Configuration loaded: namespace_running={}, secret_name={}, workers={}, resync_interval={:?}",
        config.namespace_running, config.secret_name, config.workers, config.resync_interval
    );

    let client = create_client(&config)
        .await
        .context("could not create Kubernetes client")?;
    let repo = KubeRepository::new(client);
    let cache = Arc::new(CredentialCache::new());
    let cached_repo = Arc::new(CachedSecretRepository::new(repo.clone(), cache.clone()));

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    if !wait_for_api(&repo, &shutdown).await {
        info!("Shutdown requested before the Kubernetes API became reachable");
        return Ok(());
    }
    if let Err(e) =
        check_credentials_secret(&repo, &config.namespace_running, &config.secret_name).await
    {
        warn!("Could not check for the credentials secret: {}", e);
    }

    let root_span = info_span!("imagepull_controller");

    let namespace_reconciler = NamespaceReconciler::new(
        NamespaceReconcilerConfig {
            running_namespace: config.namespace_running.clone(),
            image_pull_secret_name: config.secret_name.clone(),
            sa_image_pull_secret_name: config.target_secret_name().to_string(),
        },
        cached_repo,
        &root_span,
    )
    .context("could not create namespace controller handler")?;

    let secret_cache_updater = SecretCacheUpdater::new(
        cache,
        SecretKey::new(&config.namespace_running, &config.secret_name),
        &root_span,
    );

    let namespace_loop = runner::run(
        namespace_source(&repo),
        Arc::new(namespace_reconciler),
        RunnerSettings {
            name: namespace_controller::NAME,
            workers: config.workers,
            retries: namespace_controller::RETRIES,
            retry_backoff: RETRY_BACKOFF,
            resync_interval: config.resync_interval,
        },
        shutdown.clone(),
    );

    let secret_cache_loop = runner::run(
        secret_source(&repo, &config.namespace_running, &config.secret_name),
        Arc::new(secret_cache_updater),
        RunnerSettings {
            name: secret_cache_controller::NAME,
            workers: secret_cache_controller::WORKERS,
            retries: secret_cache_controller::RETRIES,
            retry_backoff: RETRY_BACKOFF,
            resync_interval: secret_cache_controller::RESYNC_INTERVAL,
        },
        shutdown.clone(),
    );

    info!("Starting controllers...");

    let controllers = async {
        tokio::join!(namespace_loop, secret_cache_loop);
    };
    tokio::pin!(controllers);

    tokio::select! {
        _ = &mut controllers => {
            if !shutdown.is_cancelled() {
                warn!("Controllers stopped unexpectedly");
            }
        }
        _ = shutdown.cancelled() => {
            info!("Waiting up to {:?} for controllers to stop", SHUTDOWN_TIMEOUT);
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut controllers).await.is_err() {
                warn!("Controllers did not stop within {:?}", SHUTDOWN_TIMEOUT);
            }
        }
    }

    info!("Imagepull controller stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGTERM or SIGINT
async fn cancel_on_signal(shutdown: CancellationToken) {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Could not install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
            return;
        }
    };

    tokio::select! {
        _ = terminate.recv() => info!("Signal SIGTERM received"),
        _ = tokio::signal::ctrl_c() => info!("Signal SIGINT received"),
    }
    shutdown.cancel();
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace reconciler - copies the credentials secret into every namespace and
//! sets it as an image pull secret on the namespace's default service account.

use crate::constants::{annotations, DEFAULT_SECRET_NAME, DEFAULT_SERVICE_ACCOUNT, OPERATOR_NAME};
use crate::error::{ImagePullError, Result, ResultExt};
use crate::kubernetes::CredentialRepository;
use crate::reconcilers::runner::Reconcile;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{LocalObjectReference, Namespace, Secret, ServiceAccount};
use kube::{api::ObjectMeta, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, info_span, instrument, Span};

/// Namespace reconciler settings
#[derive(Debug, Clone, Default)]
pub struct NamespaceReconcilerConfig {
    /// Namespace holding the credentials secret; never reconciled itself
    pub running_namespace: String,
    /// Name of the credentials secret in the running namespace
    pub image_pull_secret_name: String,
    /// Name of the copy created in each namespace, defaults to `image_pull_secret_name`
    pub sa_image_pull_secret_name: String,
}

impl NamespaceReconcilerConfig {
    fn with_defaults(mut self) -> Result<Self> {
        if self.running_namespace.is_empty() {
            return Err(ImagePullError::ConfigError("running namespace is required".to_string()));
        }
        if self.image_pull_secret_name.is_empty() {
            self.image_pull_secret_name = DEFAULT_SECRET_NAME.to_string();
        }
        if self.sa_image_pull_secret_name.is_empty() {
            self.sa_image_pull_secret_name = self.image_pull_secret_name.clone();
        }
        Ok(self)
    }
}

pub struct NamespaceReconciler {
    config: NamespaceReconcilerConfig,
    repo: Arc<dyn CredentialRepository>,
    span: Span,
}

impl NamespaceReconciler {
    pub fn new(
        config: NamespaceReconcilerConfig,
        repo: Arc<dyn CredentialRepository>,
        logger: &Span,
    ) -> Result<Self> {
        let config = config.with_defaults()?;
        let span = info_span!(
            parent: logger,
            "namespace_reconciler",
            svc = "reconcilers.namespace"
        );
        Ok(Self { config, repo, span })
    }

    pub fn config(&self) -> &NamespaceReconcilerConfig {
        &self.config
    }

    #[instrument(parent = &self.span, skip_all, fields(k8s_name = %namespace.name_any()))]
    pub async fn reconcile(&self, namespace: &Namespace) -> Result<()> {
        let target_namespace = namespace.name_any();

        if target_namespace == self.config.running_namespace {
            debug!("Skipping running namespace");
            return Ok(());
        }

        info!("Handling namespace");

        let secret = self
            .repo
            .get_secret(&self.config.running_namespace, &self.config.image_pull_secret_name)
            .await
            .context("could not retrieve docker registry credentials secret")?;

        let namespace_secret = build_namespace_secret(
            &secret,
            &target_namespace,
            &self.config.sa_image_pull_secret_name,
        );
        self.repo
            .ensure_secret(namespace_secret)
            .await
            .context("could not ensure docker registry credentials secret on namespace")?;

        let mut sa = self
            .repo
            .get_service_account(&target_namespace, DEFAULT_SERVICE_ACCOUNT)
            .await
            .context("could not retrieve default service account from namespace")?;

        if !add_image_pull_secret(&mut sa, &self.config.sa_image_pull_secret_name) {
            debug!("'default' service account image pull secret already set");
            return Ok(());
        }

        self.repo
            .ensure_service_account(sa)
            .await
            .context("could not ensure default service account")?;

        info!(
            "Image pull secret {} set on {}/{}",
            self.config.sa_image_pull_secret_name, target_namespace, DEFAULT_SERVICE_ACCOUNT
        );

        Ok(())
    }
}

#[async_trait]
impl Reconcile<Namespace> for NamespaceReconciler {
    async fn reconcile(&self, obj: Arc<Namespace>) -> Result<()> {
        NamespaceReconciler::reconcile(self, &obj).await
    }
}

/// Build the per-namespace copy of the credentials secret
fn build_namespace_secret(secret: &Secret, target_namespace: &str, name: &str) -> Secret {
    let mut annotations = secret.metadata.annotations.clone().unwrap_or_default();
    annotations.insert(annotations::MANAGED_BY.to_string(), OPERATOR_NAME.to_string());

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(target_namespace.to_string()),
            labels: secret.metadata.labels.clone(),
            annotations: Some(annotations),
            ..Default::default()
        },
        data: secret.data.clone(),
        type_: secret.type_.clone(),
        ..Default::default()
    }
}

/// Append a reference to `name` unless the service account already has one.
///
/// Returns whether the service account was changed.
fn add_image_pull_secret(sa: &mut ServiceAccount, name: &str) -> bool {
    let refs = sa.image_pull_secrets.get_or_insert_with(Vec::new);
    if refs.iter().any(|r| r.name == name) {
        return false;
    }
    refs.push(LocalObjectReference {
        name: name.to_string(),
    });
    true
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secret cache updater - keeps the credential cache in step with the credentials secret.

use crate::error::{Result, ResultExt};
use crate::kubernetes::{CredentialCache, SecretKey};
use crate::reconcilers::runner::Reconcile;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{info, info_span, instrument, warn, Span};

pub struct SecretCacheUpdater {
    cache: Arc<CredentialCache>,
    expected: SecretKey,
    span: Span,
}

impl SecretCacheUpdater {
    pub fn new(cache: Arc<CredentialCache>, expected: SecretKey, logger: &Span) -> Self {
        let span = info_span!(
            parent: logger,
            "secret_cache_updater",
            svc = "reconcilers.secret_cache"
        );
        Self {
            cache,
            expected,
            span,
        }
    }

    #[instrument(parent = &self.span, skip_all, fields(k8s_ns = %secret.namespace().unwrap_or_default(), k8s_name = %secret.name_any()))]
    pub fn reconcile(&self, secret: &Secret) -> Result<()> {
        let key = SecretKey::new(secret.namespace().unwrap_or_default(), secret.name_any());

        if key != self.expected {
            warn!("Controller received a secret that is not {}, ignoring", self.expected);
            return Ok(());
        }

        self.cache
            .set(&key.namespace, &key.name, secret.clone())
            .context("could not update secret cache")?;

        info!("Secret cache updated");
        Ok(())
    }
}

#[async_trait]
impl Reconcile<Secret> for SecretCacheUpdater {
    async fn reconcile(&self, obj: Arc<Secret>) -> Result<()> {
        SecretCacheUpdater::reconcile(self, &obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn make_secret(namespace: &str, name: &str, value: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                ".dockerconfigjson".to_string(),
                ByteString(value.as_bytes().to_vec()),
            )])),
            ..Default::default()
        }
    }

    fn make_updater(cache: Arc<CredentialCache>) -> SecretCacheUpdater {
        SecretCacheUpdater::new(
            cache,
            SecretKey::new("kube-system", "image-pull-credentials"),
            &Span::none(),
        )
    }

    #[test]
    fn test_stores_observed_secret() {
        let cache = Arc::new(CredentialCache::new());
        let updater = make_updater(cache.clone());
        let secret = make_secret("kube-system", "image-pull-credentials", "abc123");

        updater.reconcile(&secret).unwrap();

        assert_eq!(cache.get("kube-system", "image-pull-credentials"), Some(secret));
    }

    #[test]
    fn test_later_events_overwrite() {
        let cache = Arc::new(CredentialCache::new());
        let updater = make_updater(cache.clone());

        updater
            .reconcile(&make_secret("kube-system", "image-pull-credentials", "abc123"))
            .unwrap();
        let rotated = make_secret("kube-system", "image-pull-credentials", "rotated");
        updater.reconcile(&rotated).unwrap();

        assert_eq!(cache.get("kube-system", "image-pull-credentials"), Some(rotated));
    }

    #[test]
    fn test_ignores_other_secrets() {
        let cache = Arc::new(CredentialCache::new());
        let updater = make_updater(cache.clone());

        updater
            .reconcile(&make_secret("team-a", "image-pull-credentials", "abc123"))
            .unwrap();
        updater
            .reconcile(&make_secret("kube-system", "unrelated", "abc123"))
            .unwrap();

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_runs_as_controller_reconciler() {
        let cache = Arc::new(CredentialCache::new());
        let updater: Arc<dyn Reconcile<Secret>> = Arc::new(make_updater(cache.clone()));

        updater
            .reconcile(Arc::new(make_secret("kube-system", "image-pull-credentials", "abc123")))
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
    }
}

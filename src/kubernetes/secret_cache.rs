// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-process credential cache and the repository that reads secrets from it.

use crate::error::{ImagePullError, Result};
use crate::kubernetes::CredentialRepository;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Cache key: the `(namespace, name)` of a secret
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretKey {
    pub namespace: String,
    pub name: String,
}

impl SecretKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Last observed snapshot of each cached secret.
///
/// Values are copied in on `set` and copied out on `get`, so callers never
/// share a mutable secret with the cache.
#[derive(Debug, Default)]
pub struct CredentialCache {
    secrets: RwLock<HashMap<SecretKey, Secret>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Secret> {
        // Writers only ever insert whole values, so a poisoned map is still consistent
        let secrets = self.secrets.read().unwrap_or_else(PoisonError::into_inner);
        secrets.get(&SecretKey::new(namespace, name)).cloned()
    }

    /// Store `secret` under `(namespace, name)`, replacing any previous entry.
    pub fn set(&self, namespace: &str, name: &str, secret: Secret) -> Result<()> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|e| ImagePullError::CacheError(e.to_string()))?;
        secrets.insert(SecretKey::new(namespace, name), secret);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.secrets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Repository that serves `get_secret` from the [`CredentialCache`] and
/// delegates every other operation to the wrapped repository.
pub struct CachedSecretRepository<R> {
    inner: R,
    cache: Arc<CredentialCache>,
}

impl<R> CachedSecretRepository<R> {
    pub fn new(inner: R, cache: Arc<CredentialCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: CredentialRepository> CredentialRepository for CachedSecretRepository<R> {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.cache
            .get(namespace, name)
            .ok_or_else(|| ImagePullError::CacheMiss(SecretKey::new(namespace, name).to_string()))
    }

    async fn ensure_secret(&self, secret: Secret) -> Result<()> {
        self.inner.ensure_secret(secret).await
    }

    async fn get_service_account(&self, namespace: &str, name: &str) -> Result<ServiceAccount> {
        self.inner.get_service_account(namespace, name).await
    }

    async fn ensure_service_account(&self, service_account: ServiceAccount) -> Result<()> {
        self.inner.ensure_service_account(service_account).await
    }
}

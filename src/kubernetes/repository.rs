// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes repository: the get/list/watch/upsert surface the controllers consume.

use crate::error::{ImagePullError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use kube::{
    api::{ListParams, ObjectList, PostParams},
    runtime::watcher,
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A list+watch event stream for one resource kind
pub type WatchStream<K> =
    BoxStream<'static, std::result::Result<watcher::Event<K>, watcher::Error>>;

/// Label set used to narrow namespace list/watch calls
pub type Labels = BTreeMap<String, String>;

/// Namespace retrieval used by the namespace event source.
#[async_trait]
pub trait NamespaceRetriever: Send + Sync {
    async fn list_namespaces(&self, labels: &Labels) -> Result<ObjectList<Namespace>>;
    fn watch_namespaces(&self, labels: &Labels) -> WatchStream<Namespace>;
}

/// Secret retrieval used by the secret cache event source.
#[async_trait]
pub trait SecretRetriever: Send + Sync {
    async fn list_secrets(
        &self,
        namespace: &str,
        field_selector: &str,
    ) -> Result<ObjectList<Secret>>;
    fn watch_secrets(&self, namespace: &str, field_selector: &str) -> WatchStream<Secret>;
}

/// Resources the namespace reconciler reads and writes.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;
    /// Create the secret if missing, overwrite it otherwise.
    async fn ensure_secret(&self, secret: Secret) -> Result<()>;
    async fn get_service_account(&self, namespace: &str, name: &str) -> Result<ServiceAccount>;
    /// Create the service account if missing, overwrite it otherwise.
    async fn ensure_service_account(&self, service_account: ServiceAccount) -> Result<()>;
}

#[async_trait]
impl<T: CredentialRepository + ?Sized> CredentialRepository for Arc<T> {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        (**self).get_secret(namespace, name).await
    }

    async fn ensure_secret(&self, secret: Secret) -> Result<()> {
        (**self).ensure_secret(secret).await
    }

    async fn get_service_account(&self, namespace: &str, name: &str) -> Result<ServiceAccount> {
        (**self).get_service_account(namespace, name).await
    }

    async fn ensure_service_account(&self, service_account: ServiceAccount) -> Result<()> {
        (**self).ensure_service_account(service_account).await
    }
}

/// Render a label set as a Kubernetes label selector (`k1=v1,k2=v2`)
pub fn label_selector(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Repository talking directly to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeRepository {
    client: Client,
}

impl KubeRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn service_accounts(&self, namespace: &str) -> Api<ServiceAccount> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map a 404 from the API server into the repository's not found error
async fn get_object<K>(api: &Api<K>, kind: &'static str, namespace: &str, name: &str) -> Result<K>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(obj),
        Err(kube::Error::Api(err)) if err.code == 404 => Err(ImagePullError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Create the object if it is missing, replace it otherwise.
///
/// On replace the stored `resourceVersion` is carried forward so the update
/// passes the API server's optimistic concurrency check.
async fn ensure_object<K>(
    api: &Api<K>,
    kind: &'static str,
    namespace: &str,
    mut obj: K,
) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + serde::Serialize + Debug,
{
    let name = obj.name_any();
    let pp = PostParams::default();

    match get_object(api, kind, namespace, &name).await {
        Ok(stored) => {
            obj.meta_mut().resource_version = stored.resource_version();
            api.replace(&name, &pp, &obj).await?;
            debug!("{} {}/{} replaced", kind, namespace, name);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            api.create(&pp, &obj).await?;
            debug!("{} {}/{} created", kind, namespace, name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl NamespaceRetriever for KubeRepository {
    #[instrument(skip(self))]
    async fn list_namespaces(&self, labels: &Labels) -> Result<ObjectList<Namespace>> {
        let mut lp = ListParams::default();
        if !labels.is_empty() {
            lp = lp.labels(&label_selector(labels));
        }
        Ok(self.namespaces().list(&lp).await?)
    }

    fn watch_namespaces(&self, labels: &Labels) -> WatchStream<Namespace> {
        let mut config = watcher::Config::default();
        if !labels.is_empty() {
            config = config.labels(&label_selector(labels));
        }
        watcher(self.namespaces(), config).boxed()
    }
}

#[async_trait]
impl SecretRetriever for KubeRepository {
    #[instrument(skip(self))]
    async fn list_secrets(
        &self,
        namespace: &str,
        field_selector: &str,
    ) -> Result<ObjectList<Secret>> {
        let lp = ListParams::default().fields(field_selector);
        Ok(self.secrets(namespace).list(&lp).await?)
    }

    fn watch_secrets(&self, namespace: &str, field_selector: &str) -> WatchStream<Secret> {
        let config = watcher::Config::default().fields(field_selector);
        watcher(self.secrets(namespace), config).boxed()
    }
}

#[async_trait]
impl CredentialRepository for KubeRepository {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        get_object(&self.secrets(namespace), "Secret", namespace, name).await
    }

    #[instrument(skip(self, secret), fields(secret = %format!("{}/{}", secret.namespace().unwrap_or_default(), secret.name_any())))]
    async fn ensure_secret(&self, secret: Secret) -> Result<()> {
        let namespace = secret.namespace().unwrap_or_default();
        ensure_object(&self.secrets(&namespace), "Secret", &namespace, secret).await
    }

    async fn get_service_account(&self, namespace: &str, name: &str) -> Result<ServiceAccount> {
        get_object(&self.service_accounts(namespace), "ServiceAccount", namespace, name).await
    }

    #[instrument(skip(self, service_account), fields(service_account = %format!("{}/{}", service_account.namespace().unwrap_or_default(), service_account.name_any())))]
    async fn ensure_service_account(&self, service_account: ServiceAccount) -> Result<()> {
        let namespace = service_account.namespace().unwrap_or_default();
        ensure_object(
            &self.service_accounts(&namespace),
            "ServiceAccount",
            &namespace,
            service_account,
        )
        .await
    }
}

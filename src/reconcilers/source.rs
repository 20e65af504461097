// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Event sources: repository watch streams turned into controller input.

use crate::kubernetes::{Labels, NamespaceRetriever, SecretRetriever, WatchStream};
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Resource;

/// Applied objects of one kind plus the reflector store that backs resyncs
pub struct EventSource<K: Resource<DynamicType = ()> + Clone + 'static> {
    pub stream: BoxStream<'static, Result<K, watcher::Error>>,
    pub store: Store<K>,
}

/// Field selector matching a single object name
pub fn name_field_selector(name: &str) -> String {
    format!("metadata.name={}", name)
}

fn reflect<K>(events: WatchStream<K>) -> EventSource<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    let (store, writer) = reflector::store();
    let stream = events
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .boxed();

    EventSource { stream, store }
}

/// Every namespace in the cluster is a candidate
pub fn namespace_source<R: NamespaceRetriever + ?Sized>(repo: &R) -> EventSource<Namespace> {
    reflect(repo.watch_namespaces(&Labels::new()))
}

/// Only the credentials secret in the running namespace
pub fn secret_source<R: SecretRetriever + ?Sized>(
    repo: &R,
    namespace: &str,
    name: &str,
) -> EventSource<Secret> {
    reflect(repo.watch_secrets(namespace, &name_field_selector(name)))
}

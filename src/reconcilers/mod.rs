// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod namespace;
pub mod runner;
pub mod secret_cache;
pub mod source;

pub use namespace::{NamespaceReconciler, NamespaceReconcilerConfig};
pub use runner::{Reconcile, RunnerSettings};
pub use secret_cache::SecretCacheUpdater;
pub use source::{namespace_source, secret_source, EventSource};

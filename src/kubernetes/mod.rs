// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes access: client creation, the resource repository and its credential cache.

pub mod client;
pub mod preflight;
pub mod repository;
pub mod secret_cache;

pub use client::create_client;
pub use preflight::{check_credentials_secret, wait_for_api};
pub use repository::{
    label_selector, CredentialRepository, KubeRepository, Labels, NamespaceRetriever,
    SecretRetriever, WatchStream,
};
pub use secret_cache::{CachedSecretRepository, CredentialCache, SecretKey};

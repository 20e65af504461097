// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagePullError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Secret {0} not found in credential cache")]
    CacheMiss(String),

    #[error("Credential cache unavailable: {0}")]
    CacheError(String),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ImagePullError>,
    },
}

impl ImagePullError {
    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &ImagePullError {
        match self {
            ImagePullError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ImagePullError::NotFound { .. })
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self.root(), ImagePullError::CacheMiss(_))
    }
}

pub type Result<T> = std::result::Result<T, ImagePullError>;

/// Wraps a failed operation with a description of what was being attempted.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| ImagePullError::Context {
            context: context.into(),
            source: Box::new(source),
        })
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses and repositories.

use crate::error::{ImagePullError, Result};
use crate::kubernetes::CredentialRepository;
use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::client::Body;
use kube::{Client, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request received by the [`MockService`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Vec<u8>,
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    /// All requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);

        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = req
                .into_body()
                .collect()
                .await
                .map(|collected| collected.to_bytes().to_vec())
                .unwrap_or_default();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                query,
                body,
            });

            let (status, body) =
                response.unwrap_or_else(|| (404, not_found_json("resource", "unknown")));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock secret JSON response
pub fn secret_json(namespace: &str, name: &str, resource_version: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": resource_version,
        },
        "type": "kubernetes.io/dockerconfigjson",
        "data": { ".dockerconfigjson": "YWJjMTIz" }
    })
    .to_string()
}

/// Create a mock service account JSON response
pub fn service_account_json(namespace: &str, name: &str, resource_version: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ServiceAccount",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": resource_version,
        }
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

type Key = (String, String);

fn key_of<K: ResourceExt>(obj: &K) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

/// In-memory repository recording every call made against it.
#[derive(Default)]
pub struct FakeRepository {
    secrets: Mutex<HashMap<Key, Secret>>,
    service_accounts: Mutex<HashMap<Key, ServiceAccount>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<Option<&'static str>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, secret: Secret) -> Self {
        self.secrets.lock().unwrap().insert(key_of(&secret), secret);
        self
    }

    pub fn with_service_account(self, sa: ServiceAccount) -> Self {
        self.service_accounts.lock().unwrap().insert(key_of(&sa), sa);
        self
    }

    /// Make the named operation (e.g. "ensure_secret") fail with an API error
    pub fn fail_on(&self, operation: &'static str) {
        *self.failing.lock().unwrap() = Some(operation);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn service_account(&self, namespace: &str, name: &str) -> Option<ServiceAccount> {
        self.service_accounts
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Every call so far, as "operation namespace/name"
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that mutate state
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("ensure_"))
            .collect()
    }

    fn record(&self, operation: &'static str, namespace: &str, name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}/{}", operation, namespace, name));
        if *self.failing.lock().unwrap() == Some(operation) {
            return Err(ImagePullError::KubeError(kube::Error::Api(
                kube::core::ErrorResponse {
                    status: "Failure".to_string(),
                    message: format!("{} failed", operation),
                    reason: "InternalError".to_string(),
                    code: 500,
                },
            )));
        }
        Ok(())
    }

    fn not_found(kind: &'static str, namespace: &str, name: &str) -> ImagePullError {
        ImagePullError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

fn bump_resource_version(previous: Option<&str>) -> String {
    let current: u64 = previous.and_then(|v| v.parse().ok()).unwrap_or(0);
    (current + 1).to_string()
}

#[async_trait]
impl CredentialRepository for FakeRepository {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.record("get_secret", namespace, name)?;
        self.secret(namespace, name)
            .ok_or_else(|| Self::not_found("Secret", namespace, name))
    }

    async fn ensure_secret(&self, mut secret: Secret) -> Result<()> {
        let key = key_of(&secret);
        self.record("ensure_secret", &key.0, &key.1)?;
        let mut secrets = self.secrets.lock().unwrap();
        let previous = secrets.get(&key).and_then(|s| s.metadata.resource_version.clone());
        secret.metadata.resource_version = Some(bump_resource_version(previous.as_deref()));
        secrets.insert(key, secret);
        Ok(())
    }

    async fn get_service_account(&self, namespace: &str, name: &str) -> Result<ServiceAccount> {
        self.record("get_service_account", namespace, name)?;
        self.service_account(namespace, name)
            .ok_or_else(|| Self::not_found("ServiceAccount", namespace, name))
    }

    async fn ensure_service_account(&self, mut sa: ServiceAccount) -> Result<()> {
        let key = key_of(&sa);
        self.record("ensure_service_account", &key.0, &key.1)?;
        let mut service_accounts = self.service_accounts.lock().unwrap();
        let previous = service_accounts.get(&key).and_then(|s| s.metadata.resource_version.clone());
        sa.metadata.resource_version = Some(bump_resource_version(previous.as_deref()));
        service_accounts.insert(key, sa);
        Ok(())
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Kubernetes annotation keys set on propagated resources
pub mod annotations {
    /// Marks secrets created and owned by this controller
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
}

/// The controller name used as the managed-by annotation value
pub const OPERATOR_NAME: &str = "imagepull-controller";

/// Default name of the credentials secret in the running namespace
pub const DEFAULT_SECRET_NAME: &str = "image-pull-credentials";

/// The only service account patched in each namespace
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Upper bound on draining both controllers after a termination signal
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Namespace controller tuning
pub mod namespace_controller {
    pub const NAME: &str = "imagepull-namespace";
    pub const RETRIES: u32 = 2;
}

/// Secret cache controller tuning
pub mod secret_cache_controller {
    use std::time::Duration;

    pub const NAME: &str = "imagepull-secret-cache";
    pub const WORKERS: u16 = 1;
    pub const RETRIES: u32 = 1;
    pub const RESYNC_INTERVAL: Duration = Duration::from_secs(300);
}

/// Delay before a failed item is retried
pub const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// API availability polling configuration
pub mod preflight {
    /// Initial polling interval in seconds when waiting for the API server
    pub const POLL_INTERVAL_SECS: u64 = 2;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

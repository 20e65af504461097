// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Drives a reconciler from an event source: worker pool, bounded per-item
//! retry, periodic resync and shared cancellation on top of kube's `Controller`.

use crate::error::{ImagePullError, Result};
use crate::reconcilers::source::EventSource;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, reflector::Store, Config as ControllerConfig, Controller},
    Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A reconciler for one resource kind, invoked once per delivered object.
#[async_trait]
pub trait Reconcile<K>: Send + Sync + 'static {
    async fn reconcile(&self, obj: Arc<K>) -> Result<()>;
}

/// Per-controller tuning
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub name: &'static str,
    /// Concurrent reconciliations across distinct objects
    pub workers: u16,
    /// Retries of a failed object before waiting for the next resync
    pub retries: u32,
    pub retry_backoff: Duration,
    pub resync_interval: Duration,
}

/// Outcome of recording a failed reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32 },
    GiveUp,
}

/// Counts consecutive failures per object key.
#[derive(Debug)]
pub struct RetryTracker {
    max_retries: u32,
    failures: Mutex<HashMap<String, u32>>,
}

impl RetryTracker {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_failure(&self, key: &str) -> RetryDecision {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = failures.entry(key.to_string()).or_insert(0);
        *attempt += 1;

        if *attempt > self.max_retries {
            failures.remove(key);
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry { attempt: *attempt }
        }
    }

    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drop the counters of every key not accepted by `keep`
    pub fn retain(&self, keep: impl Fn(&str) -> bool) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct RunnerContext<K, R>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    reconciler: Arc<R>,
    settings: RunnerSettings,
    retries: RetryTracker,
    /// Objects currently known to the event source
    store: Store<K>,
    shutdown: CancellationToken,
}

fn object_key<K: Resource>(obj: &K) -> String {
    match obj.namespace() {
        Some(namespace) => format!("{}/{}", namespace, obj.name_any()),
        None => obj.name_any(),
    }
}

async fn reconcile<K, R>(obj: Arc<K>, ctx: Arc<RunnerContext<K, R>>) -> Result<Action>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
    R: Reconcile<K>,
{
    let key = object_key(obj.as_ref());

    tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => {
            debug!(
                controller = ctx.settings.name,
                "Abandoning reconciliation of {} on shutdown", key
            );
            Ok(Action::await_change())
        }
        result = ctx.reconciler.reconcile(obj) => {
            result?;
            ctx.retries.reset(&key);
            Ok(Action::await_change())
        }
    }
}

fn error_policy<K, R>(obj: Arc<K>, error: &ImagePullError, ctx: Arc<RunnerContext<K, R>>) -> Action
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    let key = object_key(obj.as_ref());

    // Requeues of deleted objects are skipped, so their counters are never reset
    let live: HashSet<String> = ctx
        .store
        .state()
        .iter()
        .map(|o| object_key(o.as_ref()))
        .collect();
    ctx.retries.retain(|k| live.contains(k));

    match ctx.retries.record_failure(&key) {
        RetryDecision::Retry { attempt } => {
            warn!(
                controller = ctx.settings.name,
                attempt,
                "Reconciliation of {} failed, retrying: {}",
                key,
                error
            );
            Action::requeue(ctx.settings.retry_backoff)
        }
        RetryDecision::GiveUp => {
            error!(
                controller = ctx.settings.name,
                "Reconciliation of {} failed after {} retries, waiting for next resync: {}",
                key,
                ctx.settings.retries,
                error
            );
            Action::await_change()
        }
    }
}

/// Emits a unit on every resync tick until shutdown.
///
/// Ticks are dropped while a previous one is still pending.
pub fn resync_trigger(period: Duration, shutdown: CancellationToken) -> mpsc::Receiver<()> {
    let (mut tx, rx) = mpsc::channel(0);

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = tx.try_send(()) {
                        if e.is_disconnected() {
                            break;
                        }
                    }
                }
            }
        }
    });

    rx
}

/// Run a controller until the event source ends or shutdown is requested.
pub async fn run<K, R>(
    source: EventSource<K>,
    reconciler: Arc<R>,
    settings: RunnerSettings,
    shutdown: CancellationToken,
) where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    R: Reconcile<K>,
{
    info!(
        controller = settings.name,
        workers = settings.workers,
        resync_interval = ?settings.resync_interval,
        "Starting controller"
    );

    let resync = resync_trigger(settings.resync_interval, shutdown.clone());
    let stop = shutdown.clone();
    let name = settings.name;
    let context = Arc::new(RunnerContext {
        reconciler,
        retries: RetryTracker::new(settings.retries),
        settings: settings.clone(),
        store: source.store.clone(),
        shutdown,
    });

    Controller::for_stream(source.stream, source.store)
        .with_config(ControllerConfig::default().concurrency(settings.workers))
        .reconcile_all_on(resync)
        .graceful_shutdown_on(async move { stop.cancelled().await })
        .run(reconcile::<K, R>, error_policy::<K, R>, context)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(controller = name, "Reconciled {}", obj),
                Err(e) => debug!(controller = name, "Reconciliation error: {}", e),
            }
        })
        .await;

    info!(controller = name, "Controller stopped");
}

//! Backend health checking.
//!
//! One probe loop runs per backend, so checks are concurrent across
//! the pool but strictly serial per target - a slow backend never has
//! overlapping probes. The selector reads the resulting liveness bit
//! without blocking.

use crate::config::Scheme;
use crate::pool::BackendPool;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capability for probing a backend's health.
///
/// Injected so tests can substitute deterministic fakes; the core
/// never depends on a concrete HTTP client.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Returns whether the backend at `url` is serving.
    async fn check(&self, url: &str) -> bool;
}

/// Probes `GET {scheme}://{url}/health`; any 2xx answer means alive.
pub struct HttpHealthChecker {
    client: reqwest::Client,
    scheme: Scheme,
}

impl HttpHealthChecker {
    /// Creates a checker over an existing client.
    #[must_use]
    pub fn new(client: reqwest::Client, scheme: Scheme) -> Self {
        Self { client, scheme }
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, url: &str) -> bool {
        let target = format!("{}://{}/health", self.scheme.as_str(), url);
        match self.client.get(&target).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(%target, %error, "health probe failed");
                false
            }
        }
    }
}

/// Drives periodic health probes for a pool.
pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    checker: Arc<dyn HealthChecker>,
    interval: Duration,
}

impl HealthMonitor {
    /// Creates a monitor; nothing runs until [`Self::spawn`].
    #[must_use]
    pub fn new(pool: Arc<BackendPool>, checker: Arc<dyn HealthChecker>, interval: Duration) -> Self {
        Self {
            pool,
            checker,
            interval,
        }
    }

    /// Probes every backend once, concurrently, and waits for the
    /// sweep to finish. Used at startup so the first request already
    /// sees accurate liveness.
    pub async fn probe_all(&self) {
        let mut probes = Vec::with_capacity(self.pool.len());

        for backend in self.pool.iter() {
            let backend = Arc::clone(backend);
            let checker = Arc::clone(&self.checker);
            probes.push(tokio::spawn(async move {
                let alive = checker.check(backend.url()).await;
                backend.set_alive(alive);
            }));
        }

        for probe in probes {
            let _ = probe.await;
        }
    }

    /// Spawns one probe loop per backend and returns a handle that
    /// aborts them on shutdown (or on drop).
    #[must_use]
    pub fn spawn(self) -> HealthMonitorHandle {
        let mut tasks = Vec::with_capacity(self.pool.len());

        for backend in self.pool.iter() {
            let backend = Arc::clone(backend);
            let checker = Arc::clone(&self.checker);
            let interval = self.interval;

            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let alive = checker.check(backend.url()).await;
                    if alive != backend.is_alive() {
                        if alive {
                            info!(backend = %backend.url(), "backend is healthy");
                        } else {
                            warn!(backend = %backend.url(), "backend failed health check");
                        }
                    }
                    backend.set_alive(alive);
                }
            }));
        }

        HealthMonitorHandle { tasks }
    }
}

/// Handle over the running probe loops.
pub struct HealthMonitorHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl HealthMonitorHandle {
    /// Stops all probe loops.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for HealthMonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Backend pool and steering policy.

use crate::error::{BalancerError, BalancerResult};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// One upstream server.
///
/// Liveness and load are plain atomics so the selector never blocks on
/// the health monitor or on in-flight forwards.
#[derive(Debug)]
pub struct Backend {
    /// Bare `host:port` address.
    url: String,
    /// Last observed health-probe outcome.
    alive: AtomicBool,
    /// Body bytes of requests currently in flight to this backend.
    pending_bytes: AtomicI64,
}

impl Backend {
    /// Creates a backend in the dead state; the first health probe
    /// decides its real liveness.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alive: AtomicBool::new(false),
            pending_bytes: AtomicI64::new(0),
        }
    }

    /// Returns the backend address.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the last observed liveness.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Records a health-probe outcome.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Returns the outstanding forwarded-body byte count.
    #[must_use]
    pub fn pending_bytes(&self) -> i64 {
        self.pending_bytes.load(Ordering::SeqCst)
    }

    pub(crate) fn add_pending(&self, amount: i64) {
        self.pending_bytes.fetch_add(amount, Ordering::SeqCst);
    }
}

/// A fixed, ordered set of backends.
///
/// The pool is built once at startup; order is stable and breaks
/// steering ties.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
}

impl BackendPool {
    /// Builds a pool from backend addresses, preserving order.
    #[must_use]
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backends: urls
                .into_iter()
                .map(|url| Arc::new(Backend::new(url)))
                .collect(),
        }
    }

    /// Returns the number of backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Returns the backend at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<Backend>> {
        self.backends.get(index)
    }

    /// Iterates the backends in pool order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Backend>> {
        self.backends.iter()
    }

    /// Picks the live backend with the fewest pending bytes.
    ///
    /// Ties go to the lowest pool index; the scan keeps the first
    /// backend seen at the minimum, so pool order is the tie-break.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NoBackend`] when no backend is alive.
    pub fn select(&self) -> BalancerResult<Arc<Backend>> {
        let mut best: Option<&Arc<Backend>> = None;

        for backend in &self.backends {
            if !backend.is_alive() {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => backend.pending_bytes() < current.pending_bytes(),
            };
            if better {
                best = Some(backend);
            }
        }

        best.cloned().ok_or(BalancerError::NoBackend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> BackendPool {
        let pool = BackendPool::new(["server1:1", "server2:1", "server3:1"]);
        for backend in pool.iter() {
            backend.set_alive(true);
        }
        pool
    }

    #[test]
    fn all_idle_ties_to_first() {
        let pool = pool();
        assert_eq!(pool.select().unwrap().url(), "server1:1");
    }

    #[test]
    fn least_pending_wins() {
        let pool = pool();
        pool.get(0).unwrap().add_pending(14);
        pool.get(2).unwrap().add_pending(14);

        assert_eq!(pool.select().unwrap().url(), "server2:1");
    }

    #[test]
    fn tie_breaks_by_pool_order() {
        let pool = pool();
        pool.get(0).unwrap().add_pending(7);

        // server2 and server3 tie at zero; lower index wins.
        assert_eq!(pool.select().unwrap().url(), "server2:1");
    }

    #[test]
    fn dead_backends_skipped() {
        let pool = pool();
        pool.get(0).unwrap().set_alive(false);
        pool.get(1).unwrap().add_pending(100);

        // server1 would win on load but is dead.
        assert_eq!(pool.select().unwrap().url(), "server2:1");

        pool.get(1).unwrap().set_alive(false);
        assert_eq!(pool.select().unwrap().url(), "server3:1");
    }

    #[test]
    fn no_live_backend_errors() {
        let pool = BackendPool::new(["server1:1"]);
        assert!(matches!(pool.select(), Err(BalancerError::NoBackend)));

        let empty = BackendPool::new(Vec::<String>::new());
        assert!(empty.is_empty());
        assert!(matches!(empty.select(), Err(BalancerError::NoBackend)));
    }
}

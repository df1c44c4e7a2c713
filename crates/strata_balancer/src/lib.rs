//! # strata_balancer
//!
//! A health-checked HTTP load balancer.
//!
//! Incoming requests are forwarded verbatim to the live backend with
//! the fewest outstanding body bytes (ties broken by pool order). A
//! background monitor probes each backend's `/health` endpoint and
//! maintains a per-backend liveness bit.
//!
//! Health probing and request sending are injected through the
//! [`HealthChecker`] and [`RequestSender`] capability traits so tests
//! can substitute deterministic fakes; production wires both to a
//! shared HTTP client.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod forward;
pub mod health;
pub mod pool;
pub mod server;

pub use config::{BalancerConfig, Scheme};
pub use error::{BalancerError, BalancerResult};
pub use forward::{Forwarder, HttpRequestSender, ProxyRequest, ProxyResponse, RequestSender};
pub use health::{HealthChecker, HealthMonitor, HttpHealthChecker};
pub use pool::{Backend, BackendPool};

/// Current version of the balancer.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

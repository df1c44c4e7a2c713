//! Balancer configuration.

use crate::error::{BalancerError, BalancerResult};
use std::fmt;
use std::time::Duration;

/// Outbound URL scheme, used for health probes and forwarded requests
/// alike. There is no per-backend override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTPS.
    Https,
}

impl Scheme {
    /// Returns the scheme as it appears in a URL.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Maps the `--https` command-line flag to a scheme.
    #[must_use]
    pub const fn from_https_flag(https: bool) -> Self {
        if https {
            Self::Https
        } else {
            Self::Http
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a balancer instance.
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    /// Outbound scheme.
    pub scheme: Scheme,

    /// Inbound listen port.
    pub port: u16,

    /// Backend addresses, bare `host:port`, in steering tie-break order.
    pub backends: Vec<String>,

    /// Interval between health probes per backend.
    pub health_interval: Duration,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Http,
            port: 9090,
            backends: Vec::new(),
            health_interval: Duration::from_secs(10),
        }
    }
}

impl BalancerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outbound scheme.
    #[must_use]
    pub const fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the inbound listen port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the backend pool.
    #[must_use]
    pub fn backends(mut self, backends: Vec<String>) -> Self {
        self.backends = backends;
        self
    }

    /// Sets the health-probe interval.
    #[must_use]
    pub const fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::Config`] if the backend list is empty
    /// or the health interval is zero.
    pub fn validate(&self) -> BalancerResult<()> {
        if self.backends.is_empty() {
            return Err(BalancerError::config("at least one backend is required"));
        }
        if self.health_interval.is_zero() {
            return Err(BalancerError::config("health interval must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_strings() {
        assert_eq!(Scheme::Http.as_str(), "http");
        assert_eq!(Scheme::Https.as_str(), "https");
        assert_eq!(Scheme::from_https_flag(true), Scheme::Https);
        assert_eq!(Scheme::from_https_flag(false), Scheme::Http);
    }

    #[test]
    fn empty_backends_rejected() {
        let config = BalancerConfig::default();
        assert!(matches!(
            config.validate(),
            Err(BalancerError::Config { .. })
        ));

        let config = config.backends(vec!["server1:1".into()]);
        assert!(config.validate().is_ok());
    }
}

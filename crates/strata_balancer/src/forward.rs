//! Request forwarding.
//!
//! The forwarder owns the steering decision's bookkeeping: it charges
//! the chosen backend's pending-byte counter before the outbound send
//! and releases it on every exit path - success, upstream error, or a
//! caller that drops the future mid-flight.

use crate::config::Scheme;
use crate::error::{BalancerError, BalancerResult};
use crate::pool::{Backend, BackendPool};
use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, Method, StatusCode};
use std::sync::Arc;

/// An outbound request, fully resolved against a backend.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Request method.
    pub method: Method,
    /// Full target URL (`{scheme}://{backend}{path?query}`).
    pub target: String,
    /// Headers copied from the inbound request.
    pub headers: HeaderMap,
    /// Buffered request body.
    pub body: Bytes,
}

/// An upstream response, handed back to the caller untouched.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Buffered response body.
    pub body: Bytes,
}

/// Capability for executing an outbound request.
///
/// Injected so tests can substitute deterministic fakes; errors are
/// surfaced verbatim and never retried on another backend.
#[async_trait]
pub trait RequestSender: Send + Sync {
    /// Sends the request and returns the upstream response.
    async fn send(&self, request: ProxyRequest) -> BalancerResult<ProxyResponse>;
}

/// Production sender over a shared [`reqwest::Client`].
pub struct HttpRequestSender {
    client: reqwest::Client,
}

impl HttpRequestSender {
    /// Creates a sender over an existing client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestSender for HttpRequestSender {
    async fn send(&self, request: ProxyRequest) -> BalancerResult<ProxyResponse> {
        let response = self
            .client
            .request(request.method, &request.target)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(BalancerError::upstream)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(BalancerError::upstream)?;

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }
}

/// Steers requests onto backends and relays the responses.
pub struct Forwarder {
    pool: Arc<BackendPool>,
    sender: Arc<dyn RequestSender>,
    scheme: Scheme,
}

impl Forwarder {
    /// Creates a forwarder over a pool and an injected sender.
    #[must_use]
    pub fn new(pool: Arc<BackendPool>, sender: Arc<dyn RequestSender>, scheme: Scheme) -> Self {
        Self {
            pool,
            sender,
            scheme,
        }
    }

    /// Returns the outbound scheme.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the backend pool.
    #[must_use]
    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    /// Selects a backend and forwards the request to it.
    ///
    /// # Errors
    ///
    /// [`BalancerError::NoBackend`] when no backend is alive; sender
    /// errors verbatim otherwise.
    pub async fn dispatch(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> BalancerResult<ProxyResponse> {
        let backend = self.pool.select()?;
        self.forward(&backend, method, path_and_query, headers, body)
            .await
    }

    /// Forwards a request to a specific backend.
    ///
    /// The backend's pending-byte counter is charged for the duration
    /// of the send: the `Content-Length` header when present, otherwise
    /// the buffered body length.
    pub async fn forward(
        &self,
        backend: &Backend,
        method: Method,
        path_and_query: &str,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> BalancerResult<ProxyResponse> {
        let pending = pending_bytes(&headers, &body);
        let _charge = PendingCharge::new(backend, pending);

        // The client derives Host from the target URL; a stale inbound
        // value must not override it.
        headers.remove(header::HOST);

        let target = format!(
            "{}://{}{}",
            self.scheme.as_str(),
            backend.url(),
            path_and_query
        );
        let request = ProxyRequest {
            method,
            target,
            headers,
            body,
        };

        self.sender.send(request).await
    }
}

/// Charges a backend's pending-byte counter, releasing on drop so the
/// decrement happens on all exit paths.
struct PendingCharge<'a> {
    backend: &'a Backend,
    amount: i64,
}

impl<'a> PendingCharge<'a> {
    fn new(backend: &'a Backend, amount: i64) -> Self {
        backend.add_pending(amount);
        Self { backend, amount }
    }
}

impl Drop for PendingCharge<'_> {
    fn drop(&mut self) {
        self.backend.add_pending(-self.amount);
    }
}

/// The steering weight of a request: its declared `Content-Length`, or
/// the buffered body length when the header is absent or unreadable.
fn pending_bytes(headers: &HeaderMap, body: &Bytes) -> i64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(body.len() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Echoes the request body back once the gate opens.
    struct GatedEchoSender {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl RequestSender for GatedEchoSender {
        async fn send(&self, request: ProxyRequest) -> BalancerResult<ProxyResponse> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| BalancerError::upstream("gate closed"))?;
            Ok(ProxyResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: request.body,
            })
        }
    }

    /// Records the last request and always fails.
    struct FailingSender {
        last: Mutex<Option<ProxyRequest>>,
    }

    #[async_trait]
    impl RequestSender for FailingSender {
        async fn send(&self, request: ProxyRequest) -> BalancerResult<ProxyResponse> {
            *self.last.lock().unwrap() = Some(request);
            Err(BalancerError::upstream("connection refused"))
        }
    }

    fn live_pool() -> Arc<BackendPool> {
        let pool = Arc::new(BackendPool::new(["server1:1", "server2:1", "server3:1"]));
        for backend in pool.iter() {
            backend.set_alive(true);
        }
        pool
    }

    async fn wait_for_pending(pool: &BackendPool, index: usize, expected: i64) {
        for _ in 0..1000 {
            if pool.get(index).unwrap().pending_bytes() == expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        panic!("backend {index} never reached {expected} pending bytes");
    }

    #[tokio::test]
    async fn in_flight_bodies_steer_selection() {
        let pool = live_pool();
        let gate = Arc::new(Semaphore::new(0));
        let forwarder = Arc::new(Forwarder::new(
            Arc::clone(&pool),
            Arc::new(GatedEchoSender {
                gate: Arc::clone(&gate),
            }),
            Scheme::Http,
        ));

        let body = Bytes::from_static(b"body length 14");
        let mut in_flight = Vec::new();
        for index in [0usize, 2] {
            let forwarder = Arc::clone(&forwarder);
            let backend = Arc::clone(pool.get(index).unwrap());
            let body = body.clone();
            in_flight.push(tokio::spawn(async move {
                forwarder
                    .forward(&backend, Method::GET, "/", HeaderMap::new(), body)
                    .await
            }));
        }

        wait_for_pending(&pool, 0, 14).await;
        wait_for_pending(&pool, 2, 14).await;

        // The idle backend wins while the other two carry 14 bytes.
        assert_eq!(pool.select().unwrap().url(), "server2:1");

        gate.add_permits(2);
        for task in in_flight {
            let response = task.await.unwrap().unwrap();
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, Bytes::from_static(b"body length 14"));
        }

        // Charges released on completion; ties fall back to pool order.
        for backend in pool.iter() {
            assert_eq!(backend.pending_bytes(), 0);
        }
        assert_eq!(pool.select().unwrap().url(), "server1:1");
    }

    #[tokio::test]
    async fn charge_released_on_sender_error() {
        let pool = live_pool();
        let sender = Arc::new(FailingSender {
            last: Mutex::new(None),
        });
        let forwarder = Forwarder::new(Arc::clone(&pool), sender, Scheme::Http);

        let backend = Arc::clone(pool.get(0).unwrap());
        let result = forwarder
            .forward(
                &backend,
                Method::POST,
                "/submit",
                HeaderMap::new(),
                Bytes::from_static(b"payload"),
            )
            .await;

        assert!(matches!(result, Err(BalancerError::Upstream { .. })));
        assert_eq!(backend.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn target_url_and_host_rewrite() {
        let pool = live_pool();
        let sender = Arc::new(FailingSender {
            last: Mutex::new(None),
        });
        let forwarder = Forwarder::new(
            Arc::clone(&pool),
            Arc::clone(&sender) as Arc<dyn RequestSender>,
            Scheme::Https,
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "balancer.local".parse().unwrap());
        headers.insert("x-custom", "kept".parse().unwrap());

        let backend = Arc::clone(pool.get(1).unwrap());
        let _ = forwarder
            .forward(
                &backend,
                Method::GET,
                "/path?q=1",
                headers,
                Bytes::new(),
            )
            .await;

        let request = sender.last.lock().unwrap().take().unwrap();
        assert_eq!(request.target, "https://server2:1/path?q=1");
        assert!(request.headers.get(header::HOST).is_none());
        assert_eq!(request.headers.get("x-custom").unwrap(), "kept");
    }

    #[tokio::test]
    async fn content_length_header_outranks_body_length() {
        let pool = live_pool();
        let gate = Arc::new(Semaphore::new(0));
        let forwarder = Arc::new(Forwarder::new(
            Arc::clone(&pool),
            Arc::new(GatedEchoSender {
                gate: Arc::clone(&gate),
            }),
            Scheme::Http,
        ));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "5".parse().unwrap());

        let backend = Arc::clone(pool.get(0).unwrap());
        let task = {
            let forwarder = Arc::clone(&forwarder);
            let backend = Arc::clone(&backend);
            tokio::spawn(async move {
                forwarder
                    .forward(
                        &backend,
                        Method::POST,
                        "/",
                        headers,
                        Bytes::from_static(b"body length 14"),
                    )
                    .await
            })
        };

        wait_for_pending(&pool, 0, 5).await;

        gate.add_permits(1);
        task.await.unwrap().unwrap();
        assert_eq!(backend.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn dispatch_without_live_backend() {
        let pool = Arc::new(BackendPool::new(["server1:1"]));
        let sender = Arc::new(FailingSender {
            last: Mutex::new(None),
        });
        let forwarder = Forwarder::new(pool, sender, Scheme::Http);

        let result = forwarder
            .dispatch(Method::GET, "/", HeaderMap::new(), Bytes::new())
            .await;
        assert!(matches!(result, Err(BalancerError::NoBackend)));
    }
}

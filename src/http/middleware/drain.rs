//! In-flight request tracking for graceful listener stop.
//!
//! A stop request puts the listener into draining mode. Requests already
//! running finish normally and are answered with `Connection: close`; new
//! requests get `503 Service Unavailable`. The listener closes its
//! connections only once nothing is in flight or the deadline has passed.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::watch;
use tokio_util::task::TaskTracker;

/// Drain state shared between one listener's middleware and its server task.
#[derive(Debug, Clone)]
pub struct RequestDrain {
    in_flight: TaskTracker,
    stop: Arc<watch::Sender<Option<Duration>>>,
}

impl RequestDrain {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(None);
        Self {
            in_flight: TaskTracker::new(),
            stop: Arc::new(stop),
        }
    }

    /// Start draining, allowing in-flight requests up to `deadline`.
    ///
    /// Only the first request counts; later calls keep the original deadline.
    pub fn request_stop(&self, deadline: Duration) {
        self.stop.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(deadline);
                true
            } else {
                false
            }
        });
    }

    pub fn is_draining(&self) -> bool {
        self.stop.borrow().is_some()
    }

    /// Number of requests currently being handled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Resolve with the drain deadline once a stop has been requested.
    pub async fn stop_requested(&self) -> Duration {
        let mut rx = self.stop.subscribe();
        let deadline = rx.wait_for(Option::is_some).await.ok().and_then(|deadline| *deadline);
        match deadline {
            Some(deadline) => deadline,
            // The sender lives in `self`, so the channel cannot close here.
            None => std::future::pending().await,
        }
    }

    /// Wait for in-flight requests to finish. `false` if `deadline` passed
    /// first.
    pub async fn wait_idle(&self, deadline: Duration) -> bool {
        self.in_flight.close();
        tokio::time::timeout(deadline, self.in_flight.wait())
            .await
            .is_ok()
    }
}

impl Default for RequestDrain {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that counts requests in flight and refuses new ones while
/// draining.
pub async fn drain_middleware(State(drain): State<RequestDrain>, request: Request<Body>, next: Next) -> Response {
    // Counted before the draining check so a concurrent stop either sees
    // this request or this request sees the stop.
    let _in_flight = drain.in_flight.token();

    if drain.is_draining() {
        let mut response = (StatusCode::SERVICE_UNAVAILABLE, "listener is shutting down").into_response();
        close_connection(&mut response);
        return response;
    }

    let mut response = next.run(request).await;
    if drain.is_draining() {
        close_connection(&mut response);
    }
    response
}

fn close_connection(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(drain: RequestDrain) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    "slow"
                }),
            )
            .layer(middleware::from_fn_with_state(drain, drain_middleware))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_normally_until_stop() {
        let drain = RequestDrain::new();
        let response = app(drain.clone()).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONNECTION).is_none());
        assert_eq!(drain.in_flight(), 0);
    }

    #[tokio::test]
    async fn new_requests_are_refused_while_draining() {
        let drain = RequestDrain::new();
        drain.request_stop(Duration::from_secs(1));

        let response = app(drain).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::CONNECTION], "close");
    }

    #[tokio::test]
    async fn in_flight_request_completes_before_idle() {
        let drain = RequestDrain::new();
        let request = tokio::spawn(app(drain.clone()).oneshot(get_request("/slow")));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(drain.in_flight(), 1);
        drain.request_stop(Duration::from_secs(5));

        assert!(drain.wait_idle(Duration::from_secs(5)).await);
        let response = request.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONNECTION], "close");
    }

    #[tokio::test]
    async fn wait_idle_gives_up_at_deadline() {
        let drain = RequestDrain::new();
        let request = tokio::spawn(app(drain.clone()).oneshot(get_request("/slow")));

        tokio::time::sleep(Duration::from_millis(50)).await;
        drain.request_stop(Duration::from_millis(10));
        assert!(!drain.wait_idle(Duration::from_millis(10)).await);

        request.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn first_stop_deadline_wins() {
        let drain = RequestDrain::new();
        drain.request_stop(Duration::from_secs(3));
        drain.request_stop(Duration::from_secs(9));
        assert_eq!(drain.stop_requested().await, Duration::from_secs(3));
    }
}

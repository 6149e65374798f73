//! Listener lifecycle: concurrent start, coordinated failure, graceful stop.

use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use trusted_edge::config::ListenerSpec;
use trusted_edge::lifecycle::{RuntimeError, RuntimeState};

mod common;

#[tokio::test]
async fn run_without_listeners_binds_nothing() {
    let rt = common::runtime(Vec::new());
    let err = rt.run().await.unwrap_err();
    assert!(matches!(err, RuntimeError::NoListeners));
    assert_eq!(rt.state(), RuntimeState::Idle);
}

#[tokio::test]
async fn tls_failure_stops_plain_listener() {
    let rt = common::runtime(vec![
        ListenerSpec::plain("127.0.0.1:0"),
        ListenerSpec::plain("127.0.0.1:0")
            .with_tls("/nonexistent/trusted-edge/cert.pem", "/nonexistent/trusted-edge/key.pem"),
    ]);

    let run = common::spawn_run(&rt);
    let plain_addr = tokio::time::timeout(Duration::from_secs(5), rt.listening(0)).await;

    let err = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not return")
        .unwrap()
        .unwrap_err();

    match err {
        RuntimeError::Bind { source, .. } => assert_eq!(source.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(rt.state(), RuntimeState::Failed);

    let addr = plain_addr
        .expect("plain listener did not bind in time")
        .expect("plain listener failed to bind");
    assert!(
        tokio::net::TcpStream::connect(addr).await.is_err(),
        "plain listener still accepting after coordinated shutdown"
    );

    rt.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn port_conflict_is_a_bind_error() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = occupied.local_addr().unwrap().to_string();

    let rt = common::runtime(vec![ListenerSpec::plain("127.0.0.1:0"), ListenerSpec::plain(address.clone())]);
    let err = common::spawn_run(&rt).await.unwrap().unwrap_err();

    match err {
        RuntimeError::Bind { address: failed, .. } => assert_eq!(failed, address),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(rt.state(), RuntimeState::Failed);
}

#[tokio::test]
async fn shutdown_twice_succeeds() {
    let rt = common::runtime(vec![ListenerSpec::plain("127.0.0.1:0"), ListenerSpec::plain("127.0.0.1:0")]);
    let run = common::spawn_run(&rt);
    common::wait_listening(&rt, 0).await;
    common::wait_listening(&rt, 1).await;
    assert_eq!(rt.state(), RuntimeState::Running);

    rt.shutdown(Duration::from_secs(5)).await.unwrap();
    run.await.unwrap().unwrap();
    assert_eq!(rt.state(), RuntimeState::Stopped);

    rt.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(rt.state(), RuntimeState::Stopped);
}

#[tokio::test]
async fn run_twice_is_rejected() {
    let rt = common::runtime(vec![ListenerSpec::plain("127.0.0.1:0")]);
    let run = common::spawn_run(&rt);
    common::wait_listening(&rt, 0).await;

    let err = rt.run().await.unwrap_err();
    assert!(matches!(err, RuntimeError::AlreadyStarted { state: RuntimeState::Running }));

    rt.shutdown(Duration::from_secs(5)).await.unwrap();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn in_flight_request_drains_before_stop() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            "done"
        }),
    );
    let rt = common::runtime_with_app(vec![ListenerSpec::plain("127.0.0.1:0")], app);
    let run = common::spawn_run(&rt);
    let addr = common::wait_listening(&rt, 0).await;

    let request = tokio::spawn(async move {
        common::client().get(format!("http://{addr}/slow")).send().await
    });
    common::wait_in_flight(&rt, 1).await;

    let started = Instant::now();
    rt.shutdown(Duration::from_secs(5)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let response = request.await.unwrap().expect("in-flight request was dropped");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "done");
    run.await.unwrap().unwrap();
    assert_eq!(rt.state(), RuntimeState::Stopped);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn in_flight_requests_drain_on_every_listener() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            "done"
        }),
    );
    let rt = common::runtime_with_app(
        vec![ListenerSpec::plain("127.0.0.1:0"), ListenerSpec::plain("127.0.0.1:0")],
        app,
    );
    let run = common::spawn_run(&rt);
    let first = common::wait_listening(&rt, 0).await;
    let second = common::wait_listening(&rt, 1).await;

    let requests: Vec<_> = [first, second]
        .into_iter()
        .map(|addr| tokio::spawn(async move { common::client().get(format!("http://{addr}/slow")).send().await }))
        .collect();
    common::wait_in_flight(&rt, 2).await;

    rt.shutdown(Duration::from_secs(5)).await.unwrap();

    for request in requests {
        let response = request.await.unwrap().expect("in-flight request was dropped");
        assert_eq!(response.status(), 200);
    }
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn request_past_deadline_times_out_shutdown() {
    let app = Router::new().route(
        "/stuck",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "late"
        }),
    );
    let rt = common::runtime_with_app(vec![ListenerSpec::plain("127.0.0.1:0")], app);
    let run = common::spawn_run(&rt);
    let addr = common::wait_listening(&rt, 0).await;

    let request = tokio::spawn(async move {
        common::client().get(format!("http://{addr}/stuck")).send().await
    });
    common::wait_in_flight(&rt, 1).await;

    let err = rt.shutdown(Duration::from_millis(200)).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ShutdownTimeout { .. }));

    // The listener closes its connections at the deadline and then exits.
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("listener kept running past the deadline")
        .unwrap()
        .unwrap();
    assert!(request.await.unwrap().is_err());
}

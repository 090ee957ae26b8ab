//! Dispatcher, failover and health-check behavior over mock transports.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, Request, StatusCode};
use url::Url;

use common::{
    eventually, get, mock_balancer, passive_only, Behavior, MockExecutor, HTTP2_ID, HTTP3_ID,
};
use h3_reverse_proxy::health::HealthSettings;
use h3_reverse_proxy::net::{resolver, ProtocolTier};
use h3_reverse_proxy::{BalancerNode, TransportNode, Upstream, UpstreamError};

#[tokio::test]
async fn test_nodes_start_healthy() {
    let (balancer, _, _) = mock_balancer(
        Behavior::Status(StatusCode::OK),
        Behavior::Status(StatusCode::OK),
        passive_only(),
    );
    assert!(balancer.is_healthy());
    assert!(balancer.children().values().all(|c| c.is_healthy()));
    assert_eq!(
        balancer.children().keys().cloned().collect::<Vec<_>>(),
        vec![HTTP2_ID.to_string(), HTTP3_ID.to_string()]
    );
}

#[tokio::test]
async fn test_both_tiers_serve_traffic() {
    let (balancer, http3, http2) = mock_balancer(
        Behavior::Status(StatusCode::OK),
        Behavior::Status(StatusCode::OK),
        passive_only(),
    );

    let mut tiers = HashSet::new();
    for i in 0..100 {
        let request = if i % 2 == 0 {
            get("/")
        } else {
            Request::builder()
                .method(Method::HEAD)
                .uri("/status")
                .body(Bytes::new())
                .unwrap()
        };
        let response = balancer.execute(request).await.unwrap();
        tiers.insert(response.headers()["x-tier"].to_str().unwrap().to_string());
    }

    assert_eq!(tiers.len(), 2);
    assert_eq!(http3.calls() + http2.calls(), 100);
}

#[tokio::test]
async fn test_failing_tier_becomes_unhealthy() {
    let (balancer, http3, http2) = mock_balancer(
        Behavior::Status(StatusCode::OK),
        Behavior::Status(StatusCode::SERVICE_UNAVAILABLE),
        passive_only(),
    );

    for _ in 0..500 {
        if http2.calls() >= 5 {
            break;
        }
        let response = balancer.execute(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-tier"], "http3");
    }

    assert_eq!(http2.calls(), 5);
    assert!(!balancer.children()[HTTP2_ID].is_healthy());
    assert!(balancer.children()[HTTP3_ID].is_healthy());

    for _ in 0..50 {
        let candidates = balancer.select_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].identifier(), HTTP3_ID);
    }

    // unhealthy tier is no longer attempted
    let before = http3.calls();
    for _ in 0..10 {
        balancer.execute(get("/")).await.unwrap();
    }
    assert_eq!(http2.calls(), 5);
    assert_eq!(http3.calls(), before + 10);
}

#[tokio::test]
async fn test_single_child_failing_probe_has_no_healthy_upstream() {
    let upstream: Url = common::UPSTREAM.parse().unwrap();
    let executor = MockExecutor::new("http2", Behavior::Fail("connection refused"));
    let settings = HealthSettings {
        interval: Duration::from_millis(20),
        ..HealthSettings::default()
    };
    let child: Arc<dyn Upstream> = Arc::new(
        TransportNode::new(
            HTTP2_ID,
            upstream.clone(),
            ProtocolTier::Http2,
            resolver::fixed(&upstream, None),
            executor.clone(),
            settings.clone(),
        )
        .unwrap(),
    );
    let balancer = BalancerNode::new("single", settings, vec![child.clone()]);

    balancer.start_health_checks();
    assert!(eventually(|| !child.is_healthy()).await);

    let err = balancer.execute(get("/")).await.unwrap_err();
    assert!(matches!(err, UpstreamError::NoHealthyUpstream { ref identifier } if identifier == "single"));
    balancer.close().unwrap();
}

#[tokio::test]
async fn test_post_is_never_retried() {
    let (balancer, http3, http2) = mock_balancer(
        Behavior::Fail("reset by peer"),
        Behavior::Fail("reset by peer"),
        passive_only(),
    );

    let request = Request::builder()
        .method(Method::POST)
        .uri("/orders")
        .body(Bytes::from_static(b"{\"qty\":1}"))
        .unwrap();
    let err = balancer.execute(request).await.unwrap_err();

    assert!(matches!(err, UpstreamError::ExecutionFailed { .. }));
    assert_eq!(http3.calls() + http2.calls(), 1);
    assert!(http3.calls() == 0 || http2.calls() == 0);
}

#[tokio::test]
async fn test_patch_is_never_retried() {
    let (balancer, http3, http2) = mock_balancer(
        Behavior::Status(StatusCode::BAD_GATEWAY),
        Behavior::Status(StatusCode::BAD_GATEWAY),
        passive_only(),
    );

    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/orders/1")
        .body(Bytes::new())
        .unwrap();
    let err = balancer.execute(request).await.unwrap_err();

    assert!(matches!(err, UpstreamError::PassiveCheckFailed { status: StatusCode::BAD_GATEWAY, .. }));
    assert_eq!(http3.calls() + http2.calls(), 1);
}

#[tokio::test]
async fn test_idempotent_request_tries_every_candidate() {
    let (balancer, http3, http2) = mock_balancer(
        Behavior::Fail("timeout"),
        Behavior::Status(StatusCode::INTERNAL_SERVER_ERROR),
        passive_only(),
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/items/1")
        .body(Bytes::from_static(b"v"))
        .unwrap();
    let err = balancer.execute(request).await.unwrap_err();

    match &err {
        UpstreamError::Exhausted { identifier, errors } => {
            assert_eq!(identifier, "origin");
            assert_eq!(errors.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("timeout"));
    assert!(message.contains("500 Internal Server Error"));
    assert_eq!(http3.calls(), 1);
    assert_eq!(http2.calls(), 1);
}

#[tokio::test]
async fn test_active_probe_recovers_unhealthy_tier() {
    let settings = HealthSettings {
        interval: Duration::from_millis(20),
        failure_window: Duration::from_secs(60),
        ..HealthSettings::default()
    };
    let (balancer, _, http2) = mock_balancer(
        Behavior::Status(StatusCode::OK),
        Behavior::Fail("refused"),
        settings,
    );

    balancer.start_health_checks();
    let http2_node = balancer.children()[HTTP2_ID].clone();
    assert!(eventually(|| !http2_node.is_healthy()).await);

    http2.set_behavior(Behavior::Status(StatusCode::OK));
    assert!(eventually(|| http2_node.is_healthy()).await);

    balancer.stop_health_checks();
    assert!(!balancer.health_checks_running());
}

#[tokio::test]
async fn test_child_with_active_checks_disabled_is_not_probed() {
    let settings = HealthSettings {
        interval: Duration::from_millis(20),
        ..HealthSettings::default()
    };
    let (balancer, http3, http2) = mock_balancer(
        Behavior::Status(StatusCode::OK),
        Behavior::Status(StatusCode::OK),
        settings,
    );
    balancer.children()[HTTP3_ID].health().set_active_check_enabled(false);

    balancer.start_health_checks();
    assert!(eventually(|| http2.calls() >= 2).await);
    assert_eq!(http3.calls(), 0);
    balancer.close().unwrap();
}

#[tokio::test]
async fn test_nested_balancer_is_probed_through_its_dispatcher() {
    let settings = HealthSettings {
        interval: Duration::from_millis(20),
        ..HealthSettings::default()
    };
    let (inner, inner_http3, inner_http2) = mock_balancer(
        Behavior::Fail("down"),
        Behavior::Fail("down"),
        settings.clone(),
    );
    let inner: Arc<dyn Upstream> = Arc::new(inner);

    let upstream: Url = "https://backup.test/".parse().unwrap();
    let backup = MockExecutor::new("backup", Behavior::Status(StatusCode::OK));
    let backup: Arc<dyn Upstream> = Arc::new(
        TransportNode::new(
            "http2://backup.test/",
            upstream.clone(),
            ProtocolTier::Http2,
            resolver::fixed(&upstream, None),
            backup,
            settings.clone(),
        )
        .unwrap(),
    );

    let outer = BalancerNode::new("outer", settings, vec![inner.clone(), backup]);
    outer.start_health_checks();
    assert!(inner.health_checks_running());

    assert!(eventually(|| !inner.is_healthy()).await);
    assert!(inner_http3.calls() > 0 && inner_http2.calls() > 0);

    for _ in 0..10 {
        let response = outer.execute(get("/")).await.unwrap();
        assert_eq!(response.headers()["x-tier"], "backup");
    }

    outer.close().unwrap();
    assert!(!inner.health_checks_running());
}

#[tokio::test]
async fn test_snapshot_reports_tree() {
    let (balancer, _, _) = mock_balancer(
        Behavior::Status(StatusCode::OK),
        Behavior::Status(StatusCode::SERVICE_UNAVAILABLE),
        passive_only(),
    );
    let _ = balancer.execute(get("/")).await;
    let _ = balancer.execute(get("/")).await;

    let snapshot = balancer.snapshot();
    assert_eq!(snapshot.identifier, "origin");
    assert_eq!(snapshot.kind, "balancer");
    assert_eq!(snapshot.children.len(), 2);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["children"][0]["identifier"], HTTP2_ID);
    assert_eq!(json["children"][0]["kind"], "transport");
}

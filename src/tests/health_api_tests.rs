use axum::http::{header, StatusCode};

use super::common::setup_test_app;

#[tokio::test]
async fn test_healthz_endpoint() {
    let t = setup_test_app().await;
    let res = t.get("/healthz", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.bytes, b"ok");
}

#[tokio::test]
async fn test_readyz_endpoint_ok() {
    let t = setup_test_app().await;
    let res = t.get("/readyz", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.bytes, b"ready");
}

#[tokio::test]
async fn test_readyz_after_pool_closed() {
    let t = setup_test_app().await;
    t.db().close().await;
    let res = t.get("/readyz", None).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(res.text().starts_with("not ready"));
}

#[tokio::test]
async fn test_version_endpoint() {
    let t = setup_test_app().await;
    let res = t.get("/version", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let v = res.json();
    assert_eq!(v["name"], "foodgram");
    assert!(!v["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoints() {
    let t = setup_test_app().await;
    t.user("ann").await;

    let res = t.get("/metrics", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let v = res.json();
    assert_eq!(v["users_registered"], 1);
    assert_eq!(v["tokens_issued"], 1);
    assert_eq!(v["shopping_list_exports"], 0);

    let res = t.get("/metrics/prometheus", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    let text = res.text();
    assert!(text.contains("# TYPE foodgram_users_registered counter"));
    assert!(text.contains("foodgram_users_registered 1\n"));
    assert!(text.contains("# TYPE foodgram_uptime_seconds gauge"));
}

#[tokio::test]
async fn test_security_headers_present() {
    let t = setup_test_app().await;
    let res = t.get("/api/tags/", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert_eq!(res.headers["x-frame-options"], "DENY");
    assert_eq!(res.headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_path_traversal_rejected() {
    let t = setup_test_app().await;
    let res = t.get("/api/recipes/..%2f..%2fetc/", None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"]["code"], "INVALID_PATH");
}

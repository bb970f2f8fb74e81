use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Liveness probe, no DB access
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: DB round trip bounded by 5s
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

fn counter(out: &mut String, name: &str, help: &str, kind: &str, value: impl std::fmt::Display) {
    out.push_str(&format!(
        "# HELP foodgram_{name} {help}\n# TYPE foodgram_{name} {kind}\nfoodgram_{name} {value}\n"
    ));
}

// Prometheus text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let mut body = String::new();
    counter(&mut body, "users_registered", "Users registered", "counter", m.users_registered);
    counter(&mut body, "tokens_issued", "API tokens issued", "counter", m.tokens_issued);
    counter(&mut body, "recipes_created", "Recipes created", "counter", m.recipes_created);
    counter(&mut body, "recipes_deleted", "Recipes deleted", "counter", m.recipes_deleted);
    counter(&mut body, "shopping_list_exports", "Shopping lists exported", "counter", m.shopping_list_exports);
    counter(
        &mut body,
        "shopping_list_export_failures",
        "Shopping list exports that failed to render",
        "counter",
        m.shopping_list_export_failures,
    );
    counter(&mut body, "uptime_seconds", "Uptime seconds", "gauge", m.uptime_seconds);
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Request body ceiling; `FOODGRAM_MAX_BODY_SIZE` overrides, clamped to 1..=50 MiB.
pub fn max_body_size() -> usize {
    std::env::var("FOODGRAM_MAX_BODY_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_BODY_SIZE)
        .clamp(1024 * 1024, 50 * 1024 * 1024)
}

fn reject(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": { "code": code, "message": message },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

/// Rejects traversal sequences in the URI and oversized declared bodies
/// before routing. Known scanner user agents are logged.
pub async fn validate_request_middleware(req: Request, next: Next) -> Response {
    if contains_path_traversal(req.uri().path()) {
        return reject(StatusCode::BAD_REQUEST, "INVALID_PATH", "Path traversal detected in request".to_string());
    }

    if let Some(ua) = req.headers().get("user-agent").and_then(|v| v.to_str().ok()) {
        if is_suspicious_user_agent(ua) {
            tracing::warn!(user_agent = %sanitize_for_logging(ua), "suspicious user agent");
        }
    }

    if matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        let declared = req
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok());
        let limit = max_body_size();
        if let Some(length) = declared.filter(|&l| l > limit) {
            tracing::debug!(length, limit, "request body too large");
            return reject(
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds maximum size of {} bytes", limit),
            );
        }
    }

    next.run(req).await
}

fn contains_path_traversal(path: &str) -> bool {
    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }
    if path.contains("/./") || path.contains("....") {
        return true;
    }

    let lower = path.to_lowercase();
    const ENCODED: [&str; 7] = ["%2e%2e", "%252e%252e", "%2e/", "/%2e", "%2f%2e", "%5c%2e", "%00"];
    if ENCODED.iter().any(|p| lower.contains(p)) {
        return true;
    }

    path.contains('\0')
}

fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua = ua.to_lowercase();
    ["sqlmap", "nikto", "havij", "acunetix", "scanner"].iter().any(|s| ua.contains(s))
}

/// Strips control characters and caps length so client text is safe to log.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .take(200)
        .collect::<String>()
        .replace('"', "\\\"")
}

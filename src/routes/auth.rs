use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::{issue_token, revoke_token, CurrentUser},
    error::{AppError, AppResult},
    middleware::ClientIp,
    routes::users::verify_blocking,
    state::AppState,
    types::{LoginRequest, TokenResponse},
};

fn invalid_credentials() -> AppError {
    AppError::BadRequest("Unable to log in with provided credentials".to_string())
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    state.rate_limiter.check_endpoint_limit("/api/auth/token/login/", ip).await?;

    let row: Option<(i64, String)> = sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?1")
        .bind(req.email.trim())
        .fetch_optional(&state.db)
        .await?;
    let Some((user_id, hash)) = row else {
        tracing::debug!(%ip, "login for unknown email");
        return Err(invalid_credentials());
    };
    if !verify_blocking(req.password, hash).await? {
        tracing::debug!(%ip, user_id, "login with wrong password");
        return Err(invalid_credentials());
    }

    let auth_token = issue_token(&state.db, user_id).await?;
    state.metrics.inc_tokens_issued();
    tracing::info!(user_id, "token issued");
    Ok(Json(TokenResponse { auth_token }))
}

pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<StatusCode> {
    revoke_token(&state.db, user.id).await?;
    tracing::info!(user_id = user.id, "token revoked");
    Ok(StatusCode::NO_CONTENT)
}

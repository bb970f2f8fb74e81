use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use validator::Validate;

use crate::{
    auth::{hash_password, verify_password, CurrentUser, MaybeUser},
    error::{AppError, AppResult, OptionExt},
    middleware::ClientIp,
    pagination::{Page, PageParams, Paginated},
    state::AppState,
    types::{CreatedUserDto, RegisterRequest, SetPasswordRequest, UserDto},
};

/// Column list shared by every user query; `?1` is the viewer id (may be NULL).
pub(crate) const USER_COLUMNS: &str = r#"u.id, u.email, u.username, u.first_name, u.last_name,
    EXISTS(SELECT 1 FROM follows f WHERE f.follower_id = ?1 AND f.author_id = u.id) AS is_subscribed"#;

pub(crate) fn user_from_row(row: &SqliteRow) -> UserDto {
    UserDto {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        is_subscribed: row.get::<i64, _>("is_subscribed") != 0,
    }
}

pub(crate) async fn fetch_user(db: &SqlitePool, id: i64, viewer: Option<i64>) -> AppResult<Option<UserDto>> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?2", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(viewer).bind(id).fetch_optional(db).await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Hashing is CPU-bound; keep it off the async workers.
pub(crate) async fn hash_blocking(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

pub(crate) async fn verify_blocking(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    state.rate_limiter.check_endpoint_limit("/api/users/", ip).await?;
    req.validate()?;

    let email_taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?1")
        .bind(&req.email)
        .fetch_one(&state.db)
        .await?;
    if email_taken > 0 {
        return Err(AppError::ValidationError {
            field: "email".to_string(),
            message: "A user with this email already exists".to_string(),
        });
    }
    let username_taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?1")
        .bind(&req.username)
        .fetch_one(&state.db)
        .await?;
    if username_taken > 0 {
        return Err(AppError::ValidationError {
            field: "username".to_string(),
            message: "A user with this username already exists".to_string(),
        });
    }

    let hash = hash_blocking(req.password.clone()).await?;
    let id = sqlx::query(
        "INSERT INTO users (email, username, first_name, last_name, password_hash) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&req.email)
    .bind(&req.username)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&hash)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    state.metrics.inc_users_registered();
    tracing::info!(user_id = id, username = %req.username, "user registered");

    let created = CreatedUserDto {
        id,
        email: req.email,
        username: req.username,
        first_name: req.first_name,
        last_name: req.last_name,
    };
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(params): Query<PageParams>,
    uri: Uri,
) -> AppResult<Json<Paginated<UserDto>>> {
    let page = Page::resolve(params, &state.config.pagination)?;
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&state.db).await?;

    let sql = format!("SELECT {} FROM users u ORDER BY u.id LIMIT ?2 OFFSET ?3", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(viewer.id())
        .bind(page.size)
        .bind(page.offset())
        .fetch_all(&state.db)
        .await?;
    let users = rows.iter().map(user_from_row).collect();

    Ok(Json(Paginated::new(users, count, page, &uri)))
}

pub async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserDto>> {
    let user = fetch_user(&state.db, id, viewer.id()).await?.ok_or_not_found("User")?;
    Ok(Json(user))
}

pub async fn me(user: CurrentUser) -> Json<UserDto> {
    Json(UserDto::me(&user))
}

pub async fn set_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    req.validate()?;

    let stored: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?1")
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("User")?;

    if !verify_blocking(req.current_password.clone(), stored).await? {
        return Err(AppError::ValidationError {
            field: "current_password".to_string(),
            message: "Incorrect password".to_string(),
        });
    }
    if req.new_password == req.current_password {
        return Err(AppError::ValidationError {
            field: "new_password".to_string(),
            message: "The new password must differ from the current one".to_string(),
        });
    }

    let hash = hash_blocking(req.new_password).await?;
    sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(&hash)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    tracing::info!(user_id = user.id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}

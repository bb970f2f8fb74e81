use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    auth::CurrentUser,
    error::{validation::validate_positive_number, AppError, AppResult, OptionExt},
    pagination::{Page, PageParams, Paginated},
    routes::{
        recipes::author_recipes,
        users::{fetch_user, user_from_row, USER_COLUMNS},
    },
    state::AppState,
    types::{SubscriptionDto, UserDto},
};

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<i64>,
}

async fn with_recipes(db: &SqlitePool, user: UserDto, recipes_limit: Option<i64>) -> AppResult<SubscriptionDto> {
    let recipes = author_recipes(db, user.id, recipes_limit).await?;
    let recipes_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recipes WHERE author_id = ?1")
        .bind(user.id)
        .fetch_one(db)
        .await?;
    Ok(SubscriptionDto { user, recipes, recipes_count })
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SubscriptionQuery>,
    uri: Uri,
) -> AppResult<Json<Paginated<SubscriptionDto>>> {
    validate_positive_number(query.recipes_limit, "recipes_limit")?;
    let page = Page::resolve(PageParams { page: query.page, limit: query.limit }, &state.config.pagination)?;

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE follower_id = ?1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;

    let sql = format!(
        r#"SELECT {} FROM follows fl JOIN users u ON u.id = fl.author_id
           WHERE fl.follower_id = ?1 ORDER BY fl.id DESC LIMIT ?2 OFFSET ?3"#,
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user.id)
        .bind(page.size)
        .bind(page.offset())
        .fetch_all(&state.db)
        .await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in &rows {
        results.push(with_recipes(&state.db, user_from_row(row), query.recipes_limit).await?);
    }
    Ok(Json(Paginated::new(results, count, page, &uri)))
}

pub async fn subscribe(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(author_id): Path<i64>,
    Query(query): Query<SubscriptionQuery>,
) -> AppResult<impl IntoResponse> {
    validate_positive_number(query.recipes_limit, "recipes_limit")?;
    fetch_user(&state.db, author_id, None).await?.ok_or_not_found("User")?;
    if author_id == user.id {
        return Err(AppError::BadRequest("You cannot subscribe to yourself".to_string()));
    }

    let inserted = sqlx::query("INSERT OR IGNORE INTO follows (follower_id, author_id) VALUES (?1, ?2)")
        .bind(user.id)
        .bind(author_id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if inserted == 0 {
        return Err(AppError::BadRequest("You are already subscribed to this author".to_string()));
    }
    tracing::info!(follower_id = user.id, author_id, "subscribed");

    let author = fetch_user(&state.db, author_id, Some(user.id)).await?.ok_or_not_found("User")?;
    let body = with_recipes(&state.db, author, query.recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(author_id): Path<i64>,
) -> AppResult<StatusCode> {
    fetch_user(&state.db, author_id, None).await?.ok_or_not_found("User")?;

    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 AND author_id = ?2")
        .bind(user.id)
        .bind(author_id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::BadRequest("You are not subscribed to this author".to_string()));
    }
    tracing::info!(follower_id = user.id, author_id, "unsubscribed");

    Ok(StatusCode::NO_CONTENT)
}

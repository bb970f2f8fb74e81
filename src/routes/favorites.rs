//! Per-user recipe lists: favorites and the shopping cart share the same
//! add/remove semantics and differ only in their table.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    auth::CurrentUser,
    error::{AppError, AppResult, OptionExt},
    routes::recipes::short_recipe,
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping cart",
        }
    }
}

pub(crate) async fn add_recipe(
    state: &AppState,
    user: &CurrentUser,
    recipe_id: i64,
    list: RecipeList,
) -> AppResult<impl IntoResponse> {
    let recipe = short_recipe(&state.db, recipe_id).await?.ok_or_not_found("Recipe")?;

    let sql = format!("INSERT OR IGNORE INTO {} (user_id, recipe_id) VALUES (?1, ?2)", list.table());
    let inserted = sqlx::query(&sql).bind(user.id).bind(recipe_id).execute(&state.db).await?.rows_affected();
    if inserted == 0 {
        return Err(AppError::BadRequest(format!("Recipe is already in your {}", list.label())));
    }
    tracing::debug!(user_id = user.id, recipe_id, list = list.table(), "recipe added");

    Ok((StatusCode::CREATED, Json(recipe)))
}

pub(crate) async fn remove_recipe(
    state: &AppState,
    user: &CurrentUser,
    recipe_id: i64,
    list: RecipeList,
) -> AppResult<StatusCode> {
    short_recipe(&state.db, recipe_id).await?.ok_or_not_found("Recipe")?;

    let sql = format!("DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2", list.table());
    let removed = sqlx::query(&sql).bind(user.id).bind(recipe_id).execute(&state.db).await?.rows_affected();
    if removed == 0 {
        return Err(AppError::BadRequest(format!("Recipe is not in your {}", list.label())));
    }
    tracing::debug!(user_id = user.id, recipe_id, list = list.table(), "recipe removed");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    add_recipe(&state, &user, id, RecipeList::Favorites).await
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove_recipe(&state, &user, id, RecipeList::Favorites).await
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    add_recipe(&state, &user, id, RecipeList::ShoppingCart).await
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove_recipe(&state, &user, id, RecipeList::ShoppingCart).await
}

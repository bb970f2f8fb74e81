//! Read-only reference data: tags and ingredients (products).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::{
    error::{AppResult, OptionExt},
    middleware::validation::sanitize_for_logging,
    state::AppState,
    types::{ProductDto, TagDto},
};

#[derive(Debug, Default, Deserialize)]
pub struct TagQuery {
    /// Comma-separated tag names.
    pub tags: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientQuery {
    #[serde(alias = "name")]
    pub search: Option<String>,
}

const LIKE_ESCAPE: char = '!';

fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

pub async fn list_tags(State(state): State<AppState>, Query(query): Query<TagQuery>) -> AppResult<Json<Vec<TagDto>>> {
    let names: Vec<String> = query
        .tags
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, name, color, slug FROM tags");
    if !names.is_empty() {
        qb.push(" WHERE name IN (");
        let mut sep = qb.separated(", ");
        for name in names {
            sep.push_bind(name);
        }
        sep.push_unseparated(")");
    }
    qb.push(" ORDER BY name, id");

    let rows = qb.build().fetch_all(&state.db).await?;
    let tags = rows
        .into_iter()
        .map(|r| TagDto { id: r.get("id"), name: r.get("name"), color: r.get("color"), slug: r.get("slug") })
        .collect();
    Ok(Json(tags))
}

pub async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<TagDto>> {
    let tag = sqlx::query_as::<_, (i64, String, String, String)>("SELECT id, name, color, slug FROM tags WHERE id = ?1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(|(id, name, color, slug)| TagDto { id, name, color, slug })
        .ok_or_not_found("Tag")?;
    Ok(Json(tag))
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> AppResult<Json<Vec<ProductDto>>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, name, measurement_unit FROM products");
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        tracing::debug!(search = %sanitize_for_logging(term), "ingredient search");
        let pattern = format!("%{}%", escape_like_pattern(&term.to_lowercase()));
        qb.push(" WHERE LOWER(name) LIKE ").push_bind(pattern).push(" ESCAPE '!'");
    }
    qb.push(" ORDER BY name, id");

    let rows = qb.build().fetch_all(&state.db).await?;
    let products = rows
        .into_iter()
        .map(|r| ProductDto { id: r.get("id"), name: r.get("name"), measurement_unit: r.get("measurement_unit") })
        .collect();
    Ok(Json(products))
}

pub async fn get_ingredient(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<ProductDto>> {
    let product = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, measurement_unit FROM products WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .map(|(id, name, measurement_unit)| ProductDto { id, name, measurement_unit })
    .ok_or_not_found("Ingredient")?;
    Ok(Json(product))
}

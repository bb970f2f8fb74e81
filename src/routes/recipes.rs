use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    auth::{CurrentUser, MaybeUser},
    error::{
        validation::{validate_image_data_uri, validate_positive_number, validate_unique_ids},
        AppError, AppResult, OptionExt,
    },
    pagination::{Page, PageParams, Paginated},
    routes::users::fetch_user,
    state::AppState,
    types::{
        CreateRecipeRequest, IngredientAmount, RecipeDto, RecipeIngredientDto, ShortRecipeDto, TagDto,
        UpdateRecipeRequest,
    },
};

/// Filters accepted by `GET /api/recipes/`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<i64>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}

fn parse_int(field: &str, value: &str) -> AppResult<i64> {
    value.parse::<i64>().map_err(|_| AppError::ValidationError {
        field: field.to_string(),
        message: format!("A valid integer is required, got '{}'", value),
    })
}

/// Splits the raw query into page parameters and recipe filters. Repeated
/// `tags` keys accumulate.
pub fn parse_list_query(pairs: &[(String, String)]) -> AppResult<(PageParams, RecipeFilter)> {
    let mut page = PageParams::default();
    let mut filter = RecipeFilter::default();
    for (key, value) in pairs {
        match key.as_str() {
            "page" => page.page = Some(parse_int("page", value)?),
            "limit" => page.limit = Some(parse_int("limit", value)?),
            "author" => filter.author = Some(parse_int("author", value)?),
            "tags" if !value.is_empty() => filter.tags.push(value.clone()),
            "is_favorited" => filter.is_favorited = parse_flag(value),
            "is_in_shopping_cart" => filter.is_in_shopping_cart = parse_flag(value),
            _ => {}
        }
    }
    Ok((page, filter))
}

fn filtered_query<'a>(select: &str, filter: &RecipeFilter, viewer: Option<i64>) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM recipes r WHERE 1 = 1");
    if let Some(author) = filter.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        qb.push(
            " AND r.id IN (SELECT rt.recipe_id FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id WHERE t.slug IN (",
        );
        let mut slugs = qb.separated(", ");
        for slug in &filter.tags {
            slugs.push_bind(slug.clone());
        }
        slugs.push_unseparated("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            qb.push(" AND r.id IN (SELECT recipe_id FROM favorites WHERE user_id = ").push_bind(viewer).push(")");
        }
        if filter.is_in_shopping_cart {
            qb.push(" AND r.id IN (SELECT recipe_id FROM shopping_cart WHERE user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }
    qb
}

pub(crate) async fn short_recipe(db: &SqlitePool, id: i64) -> AppResult<Option<ShortRecipeDto>> {
    let row = sqlx::query("SELECT id, name, image, cooking_time FROM recipes WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|r| ShortRecipeDto {
        id: r.get("id"),
        name: r.get("name"),
        image: r.get("image"),
        cooking_time: r.get("cooking_time"),
    }))
}

/// Newest first; `limit` of `None` returns all.
pub(crate) async fn author_recipes(
    db: &SqlitePool,
    author_id: i64,
    limit: Option<i64>,
) -> AppResult<Vec<ShortRecipeDto>> {
    let rows = sqlx::query(
        r#"SELECT id, name, image, cooking_time FROM recipes
           WHERE author_id = ?1 ORDER BY pub_date DESC, id DESC LIMIT ?2"#,
    )
    .bind(author_id)
    .bind(limit.unwrap_or(-1))
    .fetch_all(db)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| ShortRecipeDto {
            id: r.get("id"),
            name: r.get("name"),
            image: r.get("image"),
            cooking_time: r.get("cooking_time"),
        })
        .collect())
}

async fn recipe_tags(db: &SqlitePool, recipe_id: i64) -> AppResult<Vec<TagDto>> {
    let rows = sqlx::query(
        r#"SELECT t.id, t.name, t.color, t.slug FROM recipe_tags rt
           JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = ?1 ORDER BY t.id"#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| TagDto { id: r.get("id"), name: r.get("name"), color: r.get("color"), slug: r.get("slug") })
        .collect())
}

async fn recipe_ingredients(db: &SqlitePool, recipe_id: i64) -> AppResult<Vec<RecipeIngredientDto>> {
    let rows = sqlx::query(
        r#"SELECT p.id, p.name, p.measurement_unit, ri.amount FROM recipe_ingredients ri
           JOIN products p ON p.id = ri.product_id WHERE ri.recipe_id = ?1 ORDER BY ri.id"#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| RecipeIngredientDto {
            id: r.get("id"),
            name: r.get("name"),
            measurement_unit: r.get("measurement_unit"),
            amount: r.get("amount"),
        })
        .collect())
}

/// Full recipe representation as seen by `viewer`.
pub(crate) async fn load_recipe(db: &SqlitePool, id: i64, viewer: Option<i64>) -> AppResult<Option<RecipeDto>> {
    let Some(row) = sqlx::query(
        r#"SELECT r.id, r.author_id, r.name, r.image, r.text, r.cooking_time,
              EXISTS(SELECT 1 FROM favorites fv WHERE fv.user_id = ?1 AND fv.recipe_id = r.id) AS is_favorited,
              EXISTS(SELECT 1 FROM shopping_cart sc WHERE sc.user_id = ?1 AND sc.recipe_id = r.id) AS in_cart
           FROM recipes r WHERE r.id = ?2"#,
    )
    .bind(viewer)
    .bind(id)
    .fetch_optional(db)
    .await?
    else {
        return Ok(None);
    };

    let author_id: i64 = row.get("author_id");
    let author = fetch_user(db, author_id, viewer).await?.ok_or_not_found("Author")?;

    Ok(Some(RecipeDto {
        id,
        tags: recipe_tags(db, id).await?,
        author,
        ingredients: recipe_ingredients(db, id).await?,
        name: row.get("name"),
        image: row.get("image"),
        text: row.get("text"),
        cooking_time: row.get("cooking_time"),
        is_favorited: row.get::<i64, _>("is_favorited") != 0,
        is_in_shopping_cart: row.get::<i64, _>("in_cart") != 0,
    }))
}

async fn count_existing(db: &SqlitePool, table: &str, ids: &[i64]) -> AppResult<i64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE id IN (", table));
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
    Ok(qb.build_query_scalar::<i64>().fetch_one(db).await?)
}

async fn check_ingredients(db: &SqlitePool, ingredients: &[IngredientAmount]) -> AppResult<()> {
    if ingredients.is_empty() {
        return Err(AppError::ValidationError {
            field: "ingredients".to_string(),
            message: "At least one ingredient is required".to_string(),
        });
    }
    for item in ingredients {
        item.validate()?;
    }
    let ids: Vec<i64> = ingredients.iter().map(|i| i.id).collect();
    validate_unique_ids(&ids, "ingredients")?;
    if count_existing(db, "products", &ids).await? != ids.len() as i64 {
        return Err(AppError::ValidationError {
            field: "ingredients".to_string(),
            message: "Unknown ingredient id".to_string(),
        });
    }
    Ok(())
}

async fn check_tags(db: &SqlitePool, tags: &[i64]) -> AppResult<()> {
    if tags.is_empty() {
        return Err(AppError::ValidationError {
            field: "tags".to_string(),
            message: "At least one tag is required".to_string(),
        });
    }
    validate_unique_ids(tags, "tags")?;
    if count_existing(db, "tags", tags).await? != tags.len() as i64 {
        return Err(AppError::ValidationError { field: "tags".to_string(), message: "Unknown tag id".to_string() });
    }
    Ok(())
}

fn name_taken() -> AppError {
    AppError::ValidationError {
        field: "name".to_string(),
        message: "You already have a recipe with this name".to_string(),
    }
}

/// A concurrent write can slip past `check_name_free`; the unique index on
/// `(author_id, name)` catches it.
fn recipe_write_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => name_taken(),
        _ => err.into(),
    }
}

async fn check_name_free(db: &SqlitePool, author_id: i64, name: &str, except: Option<i64>) -> AppResult<()> {
    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM recipes WHERE author_id = ?1 AND name = ?2 AND id != ?3",
    )
    .bind(author_id)
    .bind(name)
    .bind(except.unwrap_or(-1))
    .fetch_one(db)
    .await?;
    if taken > 0 {
        return Err(name_taken());
    }
    Ok(())
}

async fn replace_tags(tx: &mut sqlx::SqliteConnection, recipe_id: i64, tags: &[i64]) -> AppResult<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?1").bind(recipe_id).execute(&mut *tx).await?;
    for tag_id in tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)")
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
    }
    Ok(())
}

async fn replace_ingredients(
    tx: &mut sqlx::SqliteConnection,
    recipe_id: i64,
    ingredients: &[IngredientAmount],
) -> AppResult<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?1").bind(recipe_id).execute(&mut *tx).await?;
    for item in ingredients {
        sqlx::query("INSERT INTO recipe_ingredients (recipe_id, product_id, amount) VALUES (?1, ?2, ?3)")
            .bind(recipe_id)
            .bind(item.id)
            .bind(item.amount)
            .execute(&mut *tx)
            .await?;
    }
    Ok(())
}

/// Returns the recipe's author after checking it exists and belongs to `user`.
async fn authorize_author(db: &SqlitePool, recipe_id: i64, user: &CurrentUser) -> AppResult<i64> {
    let author_id: i64 = sqlx::query_scalar("SELECT author_id FROM recipes WHERE id = ?1")
        .bind(recipe_id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found("Recipe")?;
    if author_id != user.id {
        return Err(AppError::Forbidden("Only the author may change this recipe".to_string()));
    }
    Ok(author_id)
}

pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(pairs): Query<Vec<(String, String)>>,
    uri: Uri,
) -> AppResult<Json<Paginated<RecipeDto>>> {
    let (params, filter) = parse_list_query(&pairs)?;
    let page = Page::resolve(params, &state.config.pagination)?;

    if viewer.0.is_none() && (filter.is_favorited || filter.is_in_shopping_cart) {
        return Ok(Json(Paginated::new(Vec::new(), 0, page, &uri)));
    }

    let count = filtered_query("SELECT COUNT(*)", &filter, viewer.id())
        .build_query_scalar::<i64>()
        .fetch_one(&state.db)
        .await?;

    let mut qb = filtered_query("SELECT r.id", &filter, viewer.id());
    qb.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.size)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let ids = qb.build_query_scalar::<i64>().fetch_all(&state.db).await?;

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(recipe) = load_recipe(&state.db, id, viewer.id()).await? {
            results.push(recipe);
        }
    }
    Ok(Json(Paginated::new(results, count, page, &uri)))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Json<RecipeDto>> {
    let recipe = load_recipe(&state.db, id, viewer.id()).await?.ok_or_not_found("Recipe")?;
    Ok(Json(recipe))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateRecipeRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    validate_image_data_uri(&req.image)?;
    check_ingredients(&state.db, &req.ingredients).await?;
    check_tags(&state.db, &req.tags).await?;
    check_name_free(&state.db, user.id, &req.name, None).await?;

    let mut tx = state.db.begin().await?;
    let recipe_id = sqlx::query(
        "INSERT INTO recipes (author_id, name, image, text, cooking_time) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(user.id)
    .bind(&req.name)
    .bind(&req.image)
    .bind(&req.text)
    .bind(req.cooking_time)
    .execute(&mut *tx)
    .await
    .map_err(recipe_write_error)?
    .last_insert_rowid();
    replace_tags(&mut tx, recipe_id, &req.tags).await?;
    replace_ingredients(&mut tx, recipe_id, &req.ingredients).await?;
    tx.commit().await?;

    state.metrics.inc_recipes_created();
    tracing::info!(recipe_id, author_id = user.id, "recipe created");

    let recipe = load_recipe(&state.db, recipe_id, Some(user.id)).await?.ok_or_not_found("Recipe")?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn update_recipe(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecipeRequest>,
) -> AppResult<Json<RecipeDto>> {
    let author_id = authorize_author(&state.db, id, &user).await?;

    req.validate()?;
    validate_positive_number(req.cooking_time, "cooking_time")?;
    if let Some(image) = &req.image {
        validate_image_data_uri(image)?;
    }
    if let Some(ingredients) = &req.ingredients {
        check_ingredients(&state.db, ingredients).await?;
    }
    if let Some(tags) = &req.tags {
        check_tags(&state.db, tags).await?;
    }
    if let Some(name) = &req.name {
        check_name_free(&state.db, author_id, name, Some(id)).await?;
    }

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"UPDATE recipes SET
             name = COALESCE(?1, name),
             image = COALESCE(?2, image),
             text = COALESCE(?3, text),
             cooking_time = COALESCE(?4, cooking_time)
           WHERE id = ?5"#,
    )
    .bind(req.name.as_deref())
    .bind(req.image.as_deref())
    .bind(req.text.as_deref())
    .bind(req.cooking_time)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(recipe_write_error)?;
    if let Some(tags) = &req.tags {
        replace_tags(&mut tx, id, tags).await?;
    }
    if let Some(ingredients) = &req.ingredients {
        replace_ingredients(&mut tx, id, ingredients).await?;
    }
    tx.commit().await?;
    tracing::info!(recipe_id = id, "recipe updated");

    let recipe = load_recipe(&state.db, id, Some(user.id)).await?.ok_or_not_found("Recipe")?;
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    authorize_author(&state.db, id, &user).await?;
    sqlx::query("DELETE FROM recipes WHERE id = ?1").bind(id).execute(&state.db).await?;
    state.metrics.inc_recipes_deleted();
    tracing::info!(recipe_id = id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_list_query() {
        let (page, filter) = parse_list_query(&pairs(&[
            ("page", "2"),
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("author", "7"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "0"),
            ("unknown", "x"),
        ]))
        .unwrap();
        assert_eq!(page.page, Some(2));
        assert_eq!(page.limit, None);
        assert_eq!(filter.author, Some(7));
        assert_eq!(filter.tags, vec!["breakfast".to_string(), "lunch".to_string()]);
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }

    #[test]
    fn test_parse_list_query_rejects_bad_ints() {
        assert!(parse_list_query(&pairs(&[("author", "abc")])).is_err());
        assert!(parse_list_query(&pairs(&[("limit", "")])).is_err());
    }

    #[test]
    fn test_filtered_query_sql() {
        let filter = RecipeFilter {
            author: Some(1),
            tags: vec!["a".to_string(), "b".to_string()],
            is_favorited: true,
            is_in_shopping_cart: false,
        };
        let sql = filtered_query("SELECT r.id", &filter, Some(3)).sql().to_string();
        assert!(sql.contains("r.author_id = ?"));
        assert!(sql.contains("t.slug IN (?, ?))"));
        assert!(sql.contains("FROM favorites"));
        assert!(!sql.contains("shopping_cart"));

        // Viewer-relative filters are dropped for anonymous viewers
        let sql = filtered_query("SELECT r.id", &filter, None).sql().to_string();
        assert!(!sql.contains("favorites"));
    }
}

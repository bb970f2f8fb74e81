use std::path::Path;

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::FixturesConfig;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Cascades depend on this
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    let tables = [
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            date_joined TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
        r#"CREATE TABLE IF NOT EXISTS auth_tokens (
            key TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS follows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            follower_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            UNIQUE(follower_id, author_id),
            CHECK (follower_id <> author_id),
            FOREIGN KEY(follower_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            measurement_unit TEXT NOT NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            image TEXT NOT NULL,
            text TEXT NOT NULL,
            cooking_time INTEGER NOT NULL CHECK (cooking_time >= 1),
            pub_date TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS recipe_tags (
            recipe_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY(recipe_id, tag_id),
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
            FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS recipe_ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL,
            product_id INTEGER NOT NULL,
            amount INTEGER NOT NULL CHECK (amount >= 1),
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
            FOREIGN KEY(product_id) REFERENCES products(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            recipe_id INTEGER NOT NULL,
            UNIQUE(user_id, recipe_id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS shopping_cart (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            recipe_id INTEGER NOT NULL,
            UNIQUE(user_id, recipe_id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE
        )"#,
    ];
    for ddl in tables {
        sqlx::query(ddl).execute(pool).await?;
    }

    let indexes = [
        ("idx_recipes_pub_date", "CREATE INDEX IF NOT EXISTS idx_recipes_pub_date ON recipes(pub_date DESC, id DESC)"),
        ("idx_recipes_author_name", "CREATE UNIQUE INDEX IF NOT EXISTS idx_recipes_author_name ON recipes(author_id, name)"),
        ("idx_recipe_ingredients_recipe", "CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id)"),
        ("idx_recipe_tags_tag", "CREATE INDEX IF NOT EXISTS idx_recipe_tags_tag ON recipe_tags(tag_id)"),
        ("idx_follows_author", "CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id)"),
        ("idx_products_name", "CREATE INDEX IF NOT EXISTS idx_products_name ON products(name)"),
        ("idx_favorites_recipe", "CREATE INDEX IF NOT EXISTS idx_favorites_recipe ON favorites(recipe_id)"),
        ("idx_shopping_cart_recipe", "CREATE INDEX IF NOT EXISTS idx_shopping_cart_recipe ON shopping_cart(recipe_id)"),
    ];
    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct ProductFixture {
    name: String,
    measurement_unit: String,
}

#[derive(Debug, Deserialize)]
struct TagFixture {
    name: String,
    color: String,
    slug: String,
}

/// Loads the configured catalogues into empty `products` / `tags` tables.
///
/// Missing files are logged and skipped; malformed files are an error.
pub async fn load_fixtures(pool: &SqlitePool, fixtures: &FixturesConfig) -> anyhow::Result<()> {
    if let Some(path) = fixtures.products.as_deref() {
        if let Some(items) = read_fixture::<ProductFixture>(path)? {
            let inserted = load_products(pool, &items).await?;
            if inserted > 0 {
                tracing::info!("Loaded {} products from {}", inserted, path);
            }
        }
    }
    if let Some(path) = fixtures.tags.as_deref() {
        if let Some(items) = read_fixture::<TagFixture>(path)? {
            let inserted = load_tags(pool, &items).await?;
            if inserted > 0 {
                tracing::info!("Loaded {} tags from {}", inserted, path);
            }
        }
    }
    Ok(())
}

fn read_fixture<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<Option<Vec<T>>> {
    if !Path::new(path).is_file() {
        tracing::warn!("Fixture file {} not found, skipping", path);
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let items = serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("invalid fixture {}: {}", path, e))?;
    Ok(Some(items))
}

async fn load_products(pool: &SqlitePool, items: &[ProductFixture]) -> anyhow::Result<usize> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(pool).await?;
    if existing > 0 {
        return Ok(0);
    }
    let mut tx = pool.begin().await?;
    for p in items {
        sqlx::query("INSERT INTO products (name, measurement_unit) VALUES (?1, ?2)")
            .bind(p.name.trim())
            .bind(p.measurement_unit.trim())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(items.len())
}

async fn load_tags(pool: &SqlitePool, items: &[TagFixture]) -> anyhow::Result<usize> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags").fetch_one(pool).await?;
    if existing > 0 {
        return Ok(0);
    }
    let mut tx = pool.begin().await?;
    for t in items {
        sqlx::query("INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)")
            .bind(t.name.trim())
            .bind(t.color.trim())
            .bind(t.slug.trim())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(items.len())
}

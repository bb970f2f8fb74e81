use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use std::sync::Mutex;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::{AppConfig, FixturesConfig};
use crate::state::AppState;

/// Serializes tests that touch process environment variables.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

pub const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    /// Distinct client address per app so the process-wide limiter never trips.
    pub ip: String,
    _dir: TempDir,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

pub async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite://{}", dir.path().join("test.db").display());
    Sqlite::create_database(&db_url).await.unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await
        .unwrap();
    crate::db::init_db(&pool).await.unwrap();
    (pool, dir)
}

pub async fn seed_catalogue(pool: &SqlitePool) {
    for (name, unit) in [("salt", "g"), ("beet", "pcs"), ("milk", "ml"), ("flour", "g"), ("sugar", "g")] {
        sqlx::query("INSERT INTO products (name, measurement_unit) VALUES (?1, ?2)")
            .bind(name)
            .bind(unit)
            .execute(pool)
            .await
            .unwrap();
    }
    for (name, color, slug) in [("Breakfast", "#FFA500", "breakfast"), ("Lunch", "#00FF00", "lunch")] {
        sqlx::query("INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(color)
            .bind(slug)
            .execute(pool)
            .await
            .unwrap();
    }
}

pub async fn product_id(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("SELECT id FROM products WHERE name = ?1").bind(name).fetch_one(pool).await.unwrap()
}

pub async fn tag_id(pool: &SqlitePool, slug: &str) -> i64 {
    sqlx::query_scalar("SELECT id FROM tags WHERE slug = ?1").bind(slug).fetch_one(pool).await.unwrap()
}

pub async fn setup_test_app() -> TestApp {
    let (pool, dir) = test_pool().await;
    seed_catalogue(&pool).await;

    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}", dir.path().join("test.db").display());
    config.fixtures = FixturesConfig::default();

    let state = AppState::new(pool, config);
    let app = crate::routes::router(state.clone());
    let octets = uuid::Uuid::new_v4().into_bytes();
    let ip = format!("10.{}.{}.{}", octets[0], octets[1], octets[2]);
    TestApp { app, state, ip, _dir: dir }
}

impl TestApp {
    pub fn db(&self) -> &SqlitePool {
        &self.state.db
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri).header("x-forwarded-for", &self.ip);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.into_body().collect().await.unwrap().to_bytes().to_vec();
        Response { status, headers, bytes }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Registers `username` and logs in; returns `(user_id, token)`.
    pub async fn user(&self, username: &str) -> (i64, String) {
        let email = format!("{}@example.com", username);
        let res = self
            .post(
                "/api/users/",
                None,
                json!({
                    "email": email,
                    "username": username,
                    "first_name": "Test",
                    "last_name": "User",
                    "password": "pass-1234",
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
        let id = res.json()["id"].as_i64().unwrap();

        let res = self
            .post("/api/auth/token/login/", None, json!({ "email": email, "password": "pass-1234" }))
            .await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.text());
        (id, res.json()["auth_token"].as_str().unwrap().to_string())
    }

    /// Creates a recipe with `(product name, amount)` lines tagged `breakfast`.
    pub async fn recipe(&self, token: &str, name: &str, lines: &[(&str, i64)]) -> i64 {
        let mut ingredients = Vec::new();
        for (product, amount) in lines {
            ingredients.push(json!({ "id": product_id(self.db(), product).await, "amount": amount }));
        }
        let res = self
            .post(
                "/api/recipes/",
                Some(token),
                json!({
                    "ingredients": ingredients,
                    "tags": [tag_id(self.db(), "breakfast").await],
                    "image": PNG,
                    "name": name,
                    "text": "Mix and cook.",
                    "cooking_time": 15,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
        res.json()["id"].as_i64().unwrap()
    }
}

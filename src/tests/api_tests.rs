use axum::http::{Method, StatusCode};
use serde_json::json;

use super::common::setup_test_app;

fn registration(username: &str, email: &str) -> serde_json::Value {
    json!({
        "email": email,
        "username": username,
        "first_name": "Ann",
        "last_name": "Lee",
        "password": "pass-1234",
    })
}

#[tokio::test]
async fn test_register_returns_user_without_subscription_flag() {
    let t = setup_test_app().await;
    let res = t.post("/api/users/", None, registration("ann", "ann@example.com")).await;

    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    assert_eq!(body["username"], "ann");
    assert_eq!(body["email"], "ann@example.com");
    assert!(body.get("is_subscribed").is_none());
    assert!(body.get("password").is_none());
    assert_eq!(t.state.metrics.get_snapshot().users_registered, 1);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let t = setup_test_app().await;
    t.user("ann").await;

    let res = t.post("/api/users/", None, registration("ann", "other@example.com")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"]["details"]["field"], "username");

    // Email uniqueness ignores case
    let res = t.post("/api/users/", None, registration("ann2", "ANN@example.com")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"]["details"]["field"], "email");

    let res = t.post("/api/users/", None, registration("me", "me@example.com")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t.post("/api/users/", None, registration("bad name", "bad@example.com")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_logout() {
    let t = setup_test_app().await;
    let (id, token) = t.user("ann").await;

    // Logging in again returns the same token
    let res = t
        .post("/api/auth/token/login/", None, json!({ "email": "ann@example.com", "password": "pass-1234" }))
        .await;
    assert_eq!(res.json()["auth_token"], token.as_str());

    let res = t
        .post("/api/auth/token/login/", None, json!({ "email": "ann@example.com", "password": "wrong" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t.get("/api/users/me/", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["id"], id);

    let res = t.request(Method::POST, "/api/auth/token/logout/", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = t.get("/api/users/me/", Some(&token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authentication_required() {
    let t = setup_test_app().await;

    let res = t.get("/api/users/me/", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"]["code"], "UNAUTHORIZED");

    // A bad token is rejected even on public endpoints
    let res = t.get("/api/recipes/", Some("not-a-token")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = t.get("/api/recipes/", None).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_set_password() {
    let t = setup_test_app().await;
    let (_, token) = t.user("ann").await;

    let res = t
        .post(
            "/api/users/set_password/",
            Some(&token),
            json!({ "current_password": "wrong", "new_password": "new-pass" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t
        .post(
            "/api/users/set_password/",
            Some(&token),
            json!({ "current_password": "pass-1234", "new_password": "pass-1234" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t
        .post(
            "/api/users/set_password/",
            Some(&token),
            json!({ "current_password": "pass-1234", "new_password": "new-pass" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = t
        .post("/api/auth/token/login/", None, json!({ "email": "ann@example.com", "password": "new-pass" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_users_pagination_and_lookup() {
    let t = setup_test_app().await;
    let mut ids = Vec::new();
    for name in ["u1", "u2", "u3"] {
        ids.push(t.user(name).await.0);
    }

    let res = t.get("/api/users/?limit=2", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["next"], "/api/users/?limit=2&page=2");
    assert!(body["previous"].is_null());
    assert_eq!(body["results"][0]["is_subscribed"], false);

    let res = t.get("/api/users/?page=2&limit=2", None).await;
    let body = res.json();
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["previous"], "/api/users/?limit=2");

    let res = t.get(&format!("/api/users/{}/", ids[1]), None).await;
    assert_eq!(res.json()["username"], "u2");

    let res = t.get("/api/users/9999/", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subscriptions() {
    let t = setup_test_app().await;
    let (reader_id, reader) = t.user("reader").await;
    let (author_id, author) = t.user("author").await;

    t.recipe(&author, "Porridge", &[("milk", 200)]).await;
    t.recipe(&author, "Pancakes", &[("flour", 100), ("milk", 100)]).await;

    let uri = format!("/api/users/{}/subscribe/?recipes_limit=1", author_id);
    let res = t.post(&uri, Some(&reader), json!({})).await;
    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes_count"], 2);
    assert_eq!(body["recipes"].as_array().unwrap().len(), 1);
    assert_eq!(body["recipes"][0]["name"], "Pancakes");

    // Second subscribe and self-subscribe are rejected
    let res = t.post(&uri, Some(&reader), json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = t.post(&format!("/api/users/{}/subscribe/", reader_id), Some(&reader), json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = t.post("/api/users/9999/subscribe/", Some(&reader), json!({})).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = t.get("/api/users/subscriptions/", Some(&reader)).await;
    let body = res.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["username"], "author");
    assert_eq!(body["results"][0]["recipes"].as_array().unwrap().len(), 2);

    let res = t.get(&format!("/api/users/{}/", author_id), Some(&reader)).await;
    assert_eq!(res.json()["is_subscribed"], true);

    let res = t.delete(&format!("/api/users/{}/subscribe/", author_id), Some(&reader)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = t.delete(&format!("/api/users/{}/subscribe/", author_id), Some(&reader)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t.get("/api/users/subscriptions/", Some(&reader)).await;
    assert_eq!(res.json()["count"], 0);
}

#[tokio::test]
async fn test_tags_and_ingredients() {
    let t = setup_test_app().await;

    let res = t.get("/api/tags/", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let tags = res.json();
    assert_eq!(tags.as_array().unwrap().len(), 2);
    assert_eq!(tags[0]["slug"], "breakfast");

    let res = t.get("/api/tags/?tags=Lunch", None).await;
    assert_eq!(res.json().as_array().unwrap().len(), 1);

    let id = tags[1]["id"].as_i64().unwrap();
    let res = t.get(&format!("/api/tags/{}/", id), None).await;
    assert_eq!(res.json()["name"], "Lunch");
    assert_eq!(t.get("/api/tags/999/", None).await.status, StatusCode::NOT_FOUND);

    let res = t.get("/api/ingredients/?search=SU", None).await;
    let items = res.json();
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["name"], "sugar");
    assert_eq!(items[0]["measurement_unit"], "g");

    // `name` is accepted as an alias of `search`
    let res = t.get("/api/ingredients/?name=l", None).await;
    let names: Vec<String> =
        res.json().as_array().unwrap().iter().map(|i| i["name"].as_str().unwrap().to_string()).collect();
    assert_eq!(names, vec!["flour", "milk", "salt"]);

    let res = t.get("/api/ingredients/", None).await;
    assert_eq!(res.json().as_array().unwrap().len(), 5);
}

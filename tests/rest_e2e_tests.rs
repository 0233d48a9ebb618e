//! End-to-end tests over the HTTP surface
//!
//! These exercise the axum exposure: real requests, real headers, real JSON
//! bodies, against the same social-graph fixture as the dispatcher tests.

mod common;

use axum_test::TestServer;
use common::*;
use gatekit::prelude::*;

const SECRET: &str = "app-secret";

struct HttpWorld {
    server: TestServer,
    client_id: ResourceId,
    author_id: ResourceId,
    post_id: ResourceId,
}

async fn http_world() -> HttpWorld {
    let h = harness();
    let client_id = h.seed_client(SECRET).await;
    let author_id = h.seed_user("author", "pw-author").await;
    h.seed_user("reader", "pw-reader").await;
    let post_id = h.seed_post("hello world", author_id).await;

    let server = TestServer::new(RestExposure::build_router(h.dispatcher.clone()));
    HttpWorld {
        server,
        client_id,
        author_id,
        post_id,
    }
}

async fn login_token(world: &HttpWorld, username: &str, password: &str) -> String {
    let response = world
        .server
        .post("/login")
        .json(&json!({
            "clientID": world.client_id,
            "clientSecret": SECRET,
            "username": username,
            "password": password,
        }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let world = http_world().await;
    let response = world.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], json!("ok"));
}

#[tokio::test]
async fn test_login_flow_over_http() {
    let world = http_world().await;

    let response = world
        .server
        .post("/login")
        .json(&json!({
            "clientID": world.client_id,
            "clientSecret": SECRET,
            "username": "author",
            "password": "pw-author",
        }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["userID"], json!(world.author_id));
    assert!(body["token"].as_str().unwrap().len() >= 32);

    let response = world
        .server
        .post("/login")
        .json(&json!({
            "clientID": world.client_id,
            "clientSecret": SECRET,
            "username": "author",
            "password": "wrong",
        }))
        .await;
    response.assert_status_unauthorized();
    assert_eq!(response.json::<Value>()["code"], json!("LOGIN_FAILED"));
}

#[tokio::test]
async fn test_crud_cycle_over_http() {
    let world = http_world().await;
    let token = login_token(&world, "author", "pw-author").await;

    // Create
    let response = world
        .server
        .post("/posts")
        .authorization_bearer(&token)
        .json(&json!({"text": "from http", "creator": world.author_id}))
        .await;
    response.assert_status_ok();
    let id = response.json::<Value>()["id"].as_u64().unwrap();

    // Read (anonymous)
    let response = world.server.get(&format!("/posts/{}", id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["text"], json!("from http"));

    // Update
    let response = world
        .server
        .put(&format!("/posts/{}", id))
        .authorization_bearer(&token)
        .json(&json!({"text": "edited"}))
        .await;
    response.assert_status_ok();

    let response = world.server.get(&format!("/posts/{}", id)).await;
    assert_eq!(response.json::<Value>()["text"], json!("edited"));

    // Delete
    let response = world
        .server
        .delete(&format!("/posts/{}", id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();

    let response = world.server.get(&format!("/posts/{}", id)).await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_permission_boundaries_over_http() {
    let world = http_world().await;
    let reader_token = login_token(&world, "reader", "pw-reader").await;

    // Non-owner edit
    let response = world
        .server
        .put(&format!("/posts/{}", world.post_id))
        .authorization_bearer(&reader_token)
        .json(&json!({"text": "defaced"}))
        .await;
    response.assert_status_forbidden();

    // Anonymous read still filters, never 403s
    let response = world.server.get(&format!("/users/{}", world.author_id)).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["username"], json!("author"));
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_function_over_http() {
    let world = http_world().await;
    let token = login_token(&world, "reader", "pw-reader").await;

    // Denied without a session, handler untouched
    let response = world
        .server
        .post(&format!("/posts/{}/like", world.post_id))
        .await;
    response.assert_status_forbidden();

    // Allowed with one
    let response = world
        .server
        .post(&format!("/posts/{}/like", world.post_id))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["likes"], json!(1));
}

#[tokio::test]
async fn test_malformed_body_over_http() {
    let world = http_world().await;
    let response = world
        .server
        .put(&format!("/posts/{}", world.post_id))
        .text("{oops")
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_unroutable_paths_over_http() {
    let world = http_world().await;

    world.server.get("/posts").await.assert_status_not_found();
    world
        .server
        .get("/nonexistent/1")
        .await
        .assert_status_not_found();
    world
        .server
        .post("/posts/1/like/extra")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_pretty_print_config_over_http() {
    let h = harness_with_config(ServerConfig {
        pretty_print_json: true,
        ..ServerConfig::default()
    });
    let author = h.seed_user("author", "pw-author").await;
    let post = h.seed_post("spaced out", author).await;

    let server = TestServer::new(RestExposure::build_router(h.dispatcher.clone()));
    let response = server.get(&format!("/posts/{}", post)).await;
    response.assert_status_ok();

    // Pretty output carries newlines but parses to the same object.
    let raw = response.text();
    assert!(raw.contains('\n'));
    assert_eq!(response.json::<Value>()["text"], json!("spaced out"));
}

//! HTTP API tests: requests go through the full router, auth gate included.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use eventshare::config::{Config, HashCost};
use eventshare::identity::TokenService;
use eventshare::server::{router, AppState};

const BOUNDARY: &str = "eventshare-test-boundary";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-png-body";
const SECRET: &str = "api-test-secret";

struct TestApp {
    tmp: TempDir,
    app: Router,
}

impl TestApp {
    fn uploads_left(&self) -> usize {
        std::fs::read_dir(self.tmp.path().join("uploads")).unwrap().count()
    }

    /// A directory where the snapshot's temp file goes makes every later store write fail.
    fn break_store_writes(&self) {
        std::fs::create_dir(self.tmp.path().join("store.bin.tmp")).unwrap();
    }
}

fn test_app() -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = Config::new(tmp.path(), SecretString::from(SECRET.to_string()));
    cfg.hash_cost = HashCost { memory_kib: 1024, iterations: 1, parallelism: 1 };
    let state = AppState::from_config(&cfg).unwrap();
    TestApp { tmp, app: router(state) }
}

#[derive(Clone, Copy)]
enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, content_type, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_multipart(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY));
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Register and return `(id, token)`.
async fn register(app: &Router, name: &str, email: &str) -> (String, String) {
    let (status, body) = send_json(app, post_json("/users/register", json!({"name": name, "email": email, "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (body["_id"].as_str().unwrap().to_string(), body["token"].as_str().unwrap().to_string())
}

async fn create_event(app: &Router, token: &str, title: &str, images: &[Part<'_>]) -> (StatusCode, Value) {
    let start = (Utc::now() + Duration::days(1)).to_rfc3339();
    let end = (Utc::now() + Duration::days(2)).to_rfc3339();
    let mut parts = vec![
        Part::Text("title", title),
        Part::Text("description", "A walk in the park"),
        Part::Text("location", "Central Park"),
        Part::Text("startDate", &start),
        Part::Text("endDate", &end),
    ];
    parts.extend(images.iter().copied());
    send_json(app, post_multipart("/events", Some(token), &parts)).await
}

#[tokio::test]
async fn register_login_end_to_end() {
    let t = test_app();
    let (status, body) =
        send_json(&t.app, post_json("/users/register", json!({"name": "Alice", "email": "a@x.com", "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["email"], "a@x.com");
    assert!(body.get("password_hash").is_none());
    let alice_id = body["_id"].as_str().unwrap().to_string();

    let (status, body) = send_json(&t.app, post_json("/users/login", json!({"email": "a@x.com", "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::OK);
    let tokens = TokenService::new(&SecretString::from(SECRET.to_string()), Duration::days(5));
    let decoded = tokens.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(decoded.to_string(), alice_id);

    let (status, body) = send_json(&t.app, post_json("/users/login", json!({"email": "a@x.com", "password": "wrong"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_credentials");
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let t = test_app();
    register(&t.app, "Alice", "a@x.com").await;
    let (status, body) =
        send_json(&t.app, post_json("/users/register", json!({"name": "Al", "email": "A@x.com", "password": "secret2"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "duplicate_email");
}

#[tokio::test]
async fn missing_fields_are_a_validation_error() {
    let t = test_app();
    let (status, body) = send_json(&t.app, post_json("/users/register", json!({"email": "a@x.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let bad_json = Request::post("/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(&t.app, bad_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let t = test_app();
    let (status, body) = send_json(&t.app, Request::get("/users/me").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = send_json(&t.app, authed("GET", "/events/discovery", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenService::new(&SecretString::from("other-secret".to_string()), Duration::days(5));
    let token = foreign.issue(uuid::Uuid::new_v4()).unwrap();
    let (status, _) = send_json(&t.app, authed("GET", "/events/followed", token.expose_secret())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_lists_owned_events() {
    let t = test_app();
    let (alice_id, token) = register(&t.app, "Alice", "a@x.com").await;
    let (status, created) = create_event(&t.app, &token, "Picnic", &[]).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);

    let (status, me) = send_json(&t.app, authed("GET", "/users/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], alice_id.as_str());
    assert_eq!(me["profilePicture"], Value::Null);
    let events = me["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Picnic");
    assert_eq!(events[0]["owner"], alice_id.as_str());
}

#[tokio::test]
async fn event_creation_validates_dates_and_images() {
    let t = test_app();
    let (_, token) = register(&t.app, "Alice", "a@x.com").await;

    let past = (Utc::now() - Duration::days(1)).to_rfc3339();
    let future = (Utc::now() + Duration::days(1)).to_rfc3339();
    let parts = [
        Part::Text("title", "Late"),
        Part::Text("description", "d"),
        Part::Text("location", "l"),
        Part::Text("startDate", &past),
        Part::Text("endDate", &future),
    ];
    let (status, body) = send_json(&t.app, post_multipart("/events", Some(&token), &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let parts = [
        Part::Text("title", "Backwards"),
        Part::Text("description", "d"),
        Part::Text("location", "l"),
        Part::Text("startDate", &future),
        Part::Text("endDate", &past),
    ];
    let (status, _) = send_json(&t.app, post_multipart("/events", Some(&token), &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = create_event(&t.app, &token, "Gif", &[Part::File("images", "a.gif", "image/gif", b"GIF89a")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = create_event(
        &t.app,
        &token,
        "Photos",
        &[Part::File("images", "a.png", "image/png", PNG), Part::File("images", "b.jpg", "image/jpeg", b"\xff\xd8\xff")],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let images = body["event"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert!(images[0].as_str().unwrap().ends_with(".png"));
    assert!(images[1].as_str().unwrap().ends_with(".jpg"));
    assert_eq!(body["event"]["participants"], json!([]));

    let (_, feed) = send_json(&t.app, authed("GET", "/events/discovery", &token)).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn join_twice_fails_the_second_time() {
    let t = test_app();
    let (_, alice) = register(&t.app, "Alice", "a@x.com").await;
    let (bob_id, bob) = register(&t.app, "Bob", "b@x.com").await;
    let (_, created) = create_event(&t.app, &alice, "Picnic", &[]).await;
    let event_id = created["event"]["id"].as_str().unwrap().to_string();
    let uri = format!("/events/{}/join", event_id);

    let (status, body) = send_json(&t.app, authed("POST", &uri, &bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["participants"], json!([bob_id]));

    let (status, body) = send_json(&t.app, authed("POST", &uri, &bob)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "already_joined");

    let (status, body) = send_json(&t.app, authed("POST", &format!("/events/{}/join", uuid::Uuid::new_v4()), &bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = send_json(&t.app, authed("POST", "/events/not-an-id/join", &bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn followed_feed_shows_followed_owners_only() {
    let t = test_app();
    let (_, alice) = register(&t.app, "Alice", "a@x.com").await;
    let (bob_id, bob) = register(&t.app, "Bob", "b@x.com").await;
    let (_, carol) = register(&t.app, "Carol", "c@x.com").await;
    create_event(&t.app, &bob, "bob-1", &[]).await;
    create_event(&t.app, &carol, "carol-1", &[]).await;
    create_event(&t.app, &bob, "bob-2", &[]).await;

    let (status, feed) = send_json(&t.app, authed("GET", "/events/followed", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed, json!([]));

    let follow_uri = format!("/users/{}/follow", bob_id);
    let (status, body) = send_json(&t.app, authed("POST", &follow_uri, &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], true);
    let (status, body) = send_json(&t.app, authed("POST", &follow_uri, &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], false);

    let (_, feed) = send_json(&t.app, authed("GET", "/events/followed", &alice)).await;
    let titles: Vec<&str> = feed.as_array().unwrap().iter().map(|e| e["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["bob-2", "bob-1"]);

    let (_, me) = send_json(&t.app, authed("GET", "/users/me", &bob)).await;
    assert_eq!(me["followers"].as_array().unwrap().len(), 1);

    let (status, body) = send_json(&t.app, authed("POST", &format!("/users/{}/follow", bob_id), &bob)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn profile_picture_upload_and_download() {
    let t = test_app();
    let (alice_id, token) = register(&t.app, "Alice", "a@x.com").await;
    let download = format!("/users/profilePicture/{}", alice_id);

    let (status, body) = send_json(&t.app, Request::get(download.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let parts = [Part::File("profilePicture", "me.png", "image/png", PNG)];
    let (status, body) = send_json(&t.app, post_multipart("/users/upload", Some(&token), &parts)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profilePicture"], download.as_str());

    let resp = t.app.clone().oneshot(Request::get(download.as_str()).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PNG);

    let (status, _) = send_json(&t.app, post_multipart("/users/upload", Some(&token), &[Part::Text("note", "no file")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn multipart_registration_stores_the_picture() {
    let t = test_app();
    let parts = [
        Part::Text("name", "Dana"),
        Part::Text("email", "d@x.com"),
        Part::Text("password", "secret1"),
        Part::File("profilePicture", "d.jpg", "image/jpeg", b"\xff\xd8\xffjpeg"),
    ];
    let (status, body) = send_json(&t.app, post_multipart("/users/register", None, &parts)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["_id"].as_str().unwrap();

    let (status, bytes) = send(&t.app, Request::get(format!("/users/profilePicture/{}", id)).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"\xff\xd8\xffjpeg");
}

#[tokio::test]
async fn unknown_route_and_health() {
    let t = test_app();
    let (status, body) = send_json(&t.app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, body) = send_json(&t.app, Request::get("/nope").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn blank_file_inputs_are_ignored() {
    let t = test_app();
    let parts = [
        Part::Text("name", "Erin"),
        Part::Text("email", "e@x.com"),
        Part::Text("password", "secret1"),
        Part::File("profilePicture", "", "application/octet-stream", b""),
    ];
    let (status, body) = send_json(&t.app, post_multipart("/users/register", None, &parts)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let token = body["token"].as_str().unwrap().to_string();

    let (_, me) = send_json(&t.app, authed("GET", "/users/me", &token)).await;
    assert_eq!(me["profilePicture"], Value::Null);

    let (status, body) =
        create_event(&t.app, &token, "No photos", &[Part::File("images", "", "application/octet-stream", b"")]).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["event"]["images"], json!([]));
    assert_eq!(t.uploads_left(), 0);
}

#[tokio::test]
async fn failed_event_write_removes_saved_images() {
    let t = test_app();
    let (_, token) = register(&t.app, "Alice", "a@x.com").await;
    t.break_store_writes();

    let (status, body) = create_event(
        &t.app,
        &token,
        "Photos",
        &[Part::File("images", "a.png", "image/png", PNG), Part::File("images", "b.png", "image/png", PNG)],
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "internal server error");
    assert_eq!(t.uploads_left(), 0);

    let (_, feed) = send_json(&t.app, authed("GET", "/events/discovery", &token)).await;
    assert_eq!(feed, json!([]));
}

#[tokio::test]
async fn failed_picture_write_removes_the_new_file() {
    let t = test_app();
    let (alice_id, token) = register(&t.app, "Alice", "a@x.com").await;
    t.break_store_writes();

    let parts = [Part::File("profilePicture", "me.png", "image/png", PNG)];
    let (status, _) = send_json(&t.app, post_multipart("/users/upload", Some(&token), &parts)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(t.uploads_left(), 0);

    let (status, _) =
        send_json(&t.app, Request::get(format!("/users/profilePicture/{}", alice_id)).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_registration_removes_the_picture() {
    let t = test_app();
    register(&t.app, "Alice", "a@x.com").await;
    let parts = [
        Part::Text("name", "Alice again"),
        Part::Text("email", "A@X.com"),
        Part::Text("password", "secret1"),
        Part::File("profilePicture", "a.png", "image/png", PNG),
    ];
    let (status, body) = send_json(&t.app, post_multipart("/users/register", None, &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "duplicate_email");
    assert_eq!(t.uploads_left(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_joins_are_all_recorded() {
    let t = test_app();
    let (_, owner) = register(&t.app, "Owner", "o@x.com").await;
    let (_, created) = create_event(&t.app, &owner, "Party", &[]).await;
    let uri = format!("/events/{}/join", created["event"]["id"].as_str().unwrap());

    let mut tokens = Vec::new();
    for i in 0..8 {
        tokens.push(register(&t.app, "Guest", &format!("g{}@x.com", i)).await.1);
    }
    let mut joins = Vec::new();
    for token in tokens {
        let app = t.app.clone();
        let uri = uri.clone();
        joins.push(tokio::spawn(async move { send_json(&app, authed("POST", &uri, &token)).await.0 }));
    }
    for join in joins {
        assert_eq!(join.await.unwrap(), StatusCode::OK);
    }

    let (_, feed) = send_json(&t.app, authed("GET", "/events/discovery", &owner)).await;
    assert_eq!(feed[0]["participants"].as_array().unwrap().len(), 8);
}

/// Registration that succeeded server-side can always be recovered by logging in.
#[tokio::test]
async fn registered_account_can_log_in_without_the_register_response() {
    let t = test_app();
    let parts = [
        Part::Text("name", "Finn"),
        Part::Text("email", "f@x.com"),
        Part::Text("password", "secret1"),
    ];
    let (status, registered) = send_json(&t.app, post_multipart("/users/register", None, &parts)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(&t.app, post_json("/users/login", json!({"email": "f@x.com", "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], registered["_id"]);
    let tokens = TokenService::new(&SecretString::from(SECRET.to_string()), Duration::days(5));
    let id = tokens.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(id.to_string(), registered["_id"].as_str().unwrap());
}

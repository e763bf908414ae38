use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use event_booking::{
    cache::CacheService, config::Config, router, store::MemoryStore, AppState,
};

const ADMIN_EMAIL: &str = "admin@example.com";

fn app_with(configure: impl FnOnce(&mut Config)) -> Router {
    let mut config = Config::in_memory("integration-secret");
    config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
    configure(&mut config);
    let state = AppState::with_store(Arc::new(MemoryStore::new()), CacheService::disabled(), config);
    router(Arc::new(state))
}

fn app() -> Router {
    app_with(|_| {})
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Запрос с произвольным (в том числе битым) телом; возвращает и Content-Type
async fn call_raw(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, String, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn sign_up(app: &Router, email: &str) -> (String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/sign-up",
        None,
        Some(json!({ "email": email, "password": "correct-horse", "username": email.split('@').next() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "sign-up failed: {body}");
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["profile"]["id"].as_str().unwrap().to_string(),
    )
}

fn event_body(title: &str, day: u32) -> Value {
    json!({
        "title": title,
        "description": "An evening out",
        "date": format!("2030-03-{day:02}"),
        "time": "19:00:00",
        "location": "Main Hall",
        "price": 15.5,
        "capacity": 1,
        "category": "Music"
    })
}

async fn create_event(app: &Router, admin_token: &str, title: &str, day: u32) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/events",
        Some(admin_token),
        Some(event_body(title, day)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create event failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_and_root_respond() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn only_admins_write_events() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;
    let (member, _) = sign_up(&app, "member@example.com").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/events",
        Some(&member),
        Some(event_body("Sneaky", 1)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::POST, "/api/events", None, Some(event_body("Anon", 1))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let id = create_event(&app, &admin, "Opening Night", 1).await;

    let uri = format!("/api/events/{id}");
    let (status, _) = call(&app, Method::PATCH, &uri, Some(&member), Some(json!({ "price": 0.0 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::DELETE, &uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::PATCH, &uri, Some(&admin), Some(json!({ "price": 20.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 20.0);
    assert_eq!(body["title"], "Opening Night");

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_price_or_capacity_is_rejected() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;

    let mut body = event_body("Broken", 2);
    body["price"] = json!(-1.0);
    let (status, _) = call(&app, Method::POST, "/api/events", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = event_body("Broken", 2);
    body["capacity"] = json!(-3);
    let (status, _) = call(&app, Method::POST, "/api/events", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn anyone_reads_events_and_profiles() {
    let app = app();
    let (admin, admin_id) = sign_up(&app, ADMIN_EMAIL).await;
    let id = create_event(&app, &admin, "Public Talk", 3).await;

    let (status, body) = call(&app, Method::GET, "/api/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, _) = call(&app, Method::GET, &format!("/api/events/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::GET, "/api/events/count", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = call(&app, Method::GET, "/api/events/featured", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());

    let (status, body) = call(&app, Method::GET, "/api/profiles", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::GET, &format!("/api/profiles/{admin_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
async fn sign_up_creates_exactly_one_profile() {
    let app = app();
    let (token, id) = sign_up(&app, "new@example.com").await;

    let (_, profiles) = call(&app, Method::GET, "/api/profiles", None, None).await;
    let profiles = profiles.as_array().unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["id"], id.as_str());
    assert_eq!(profiles[0]["username"], "new");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/sign-up",
        None,
        Some(json!({ "email": "NEW@example.com", "password": "another-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, profiles) = call(&app, Method::GET, "/api/profiles", Some(&token), None).await;
    assert_eq!(profiles.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn seven_events_make_one_page() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;
    for day in 1..=7 {
        create_event(&app, &admin, &format!("Show {day}"), day).await;
    }

    let (status, body) = call(&app, Method::GET, "/api/events/count", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 7);
    assert_eq!(body["page_size"], 9);
    assert_eq!(body["pages"], 1);

    let (_, body) = call(&app, Method::GET, "/api/events?page=1", None, None).await;
    let titles: Vec<&str> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 7);
    assert_eq!(titles.first(), Some(&"Show 1"));
    assert_eq!(titles.last(), Some(&"Show 7"));

    let (_, body) = call(&app, Method::GET, "/api/events?page=2", None, None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn search_only_covers_loaded_page() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;
    for day in 1..=9 {
        create_event(&app, &admin, &format!("Concert {day}"), day).await;
    }
    create_event(&app, &admin, "Poetry Slam", 28).await;

    let (_, body) = call(&app, Method::GET, "/api/events?page=1&q=poetry", None, None).await;
    assert_eq!(body["count"], 0);

    let (_, body) = call(&app, Method::GET, "/api/events?page=2&q=POETRY", None, None).await;
    assert_eq!(body["count"], 1);

    let (_, body) = call(&app, Method::GET, "/api/events?page=1&q=concert", None, None).await;
    assert_eq!(body["count"], 9);
}

#[tokio::test]
async fn booking_is_pending_and_private_to_owner() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;
    let (alice, alice_id) = sign_up(&app, "alice@example.com").await;
    let (bob, _) = sign_up(&app, "bob@example.com").await;
    let event_id = create_event(&app, &admin, "Gala", 12).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/bookings",
        None,
        Some(json!({ "event_id": event_id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, booking) = call(
        &app,
        Method::POST,
        "/api/bookings",
        Some(&alice),
        Some(json!({ "event_id": event_id, "preferences": "aisle seat" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["user_id"], alice_id.as_str());
    assert_eq!(booking["preferences"], "aisle seat");

    let uri = format!("/api/bookings/{}", booking["id"].as_str().unwrap());

    // ни другой пользователь, ни администратор не трогают чужую бронь
    for token in [&bob, &admin] {
        let (status, _) = call(&app, Method::GET, &uri, Some(token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(
            &app,
            Method::PATCH,
            &uri,
            Some(token),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (_, mine) = call(&app, Method::GET, "/api/bookings", Some(&alice), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, theirs) = call(&app, Method::GET, "/api/bookings", Some(&bob), None).await;
    assert!(theirs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn booking_unknown_event_is_not_found() {
    let app = app();
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/bookings",
        Some(&alice),
        Some(json!({ "event_id": uuid::Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn booking_status_transitions() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let event_id = create_event(&app, &admin, "Workshop", 14).await;

    let (_, booking) = call(
        &app,
        Method::POST,
        "/api/bookings",
        Some(&alice),
        Some(json!({ "event_id": event_id })),
    )
    .await;
    let uri = format!("/api/bookings/{}", booking["id"].as_str().unwrap());

    let (status, body) = call(&app, Method::PATCH, &uri, Some(&alice), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, _) = call(&app, Method::PATCH, &uri, Some(&alice), Some(json!({ "status": "pending" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = call(&app, Method::PATCH, &uri, Some(&alice), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn duplicates_allowed_unless_limits_enforced() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let event_id = create_event(&app, &admin, "Open Mic", 16).await;
    for _ in 0..2 {
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/bookings",
            Some(&alice),
            Some(json!({ "event_id": event_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let strict = app_with(|c| c.features.enforce_booking_limits = true);
    let (admin, _) = sign_up(&strict, ADMIN_EMAIL).await;
    let (alice, _) = sign_up(&strict, "alice@example.com").await;
    let (bob, _) = sign_up(&strict, "bob@example.com").await;
    // capacity = 1
    let event_id = create_event(&strict, &admin, "Open Mic", 16).await;

    let book = |token: String| {
        let strict = strict.clone();
        let event_id = event_id.clone();
        async move {
            call(
                &strict,
                Method::POST,
                "/api/bookings",
                Some(&token),
                Some(json!({ "event_id": event_id })),
            )
            .await
        }
    };

    let (status, first) = book(alice.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = book(alice.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, second) = book(bob.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let confirm = json!({ "status": "confirmed" });
    let uri = format!("/api/bookings/{}", first["id"].as_str().unwrap());
    let (status, _) = call(&strict, Method::PATCH, &uri, Some(&alice), Some(confirm.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/bookings/{}", second["id"].as_str().unwrap());
    let (status, _) = call(&strict, Method::PATCH, &uri, Some(&bob), Some(confirm)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn sign_out_ends_the_session() {
    let app = app();
    let (_, _) = sign_up(&app, "carol@example.com").await;

    let (status, session) = call(
        &app,
        Method::POST,
        "/api/auth/sign-in",
        None,
        Some(json!({ "email": "carol@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = session["access_token"].as_str().unwrap().to_string();

    let (status, me) = call(&app, Method::GET, "/api/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "carol");

    let (status, _) = call(&app, Method::POST, "/api/auth/sign-out", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::GET, "/api/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/sign-in",
        None,
        Some(json!({ "email": "carol@example.com", "password": "wrong-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_updates_are_owner_only() {
    let app = app();
    let (dave, dave_id) = sign_up(&app, "dave@example.com").await;
    let (erin, _) = sign_up(&app, "erin@example.com").await;
    let uri = format!("/api/profiles/{dave_id}");

    let (status, _) = call(&app, Method::PATCH, &uri, Some(&erin), Some(json!({ "full_name": "Not Dave" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::PATCH, &uri, Some(&dave), Some(json!({ "is_admin": true }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::PATCH, &uri, Some(&dave), Some(json!({ "full_name": "Dave D." }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_name"], "Dave D.");
    assert_eq!(body["id"], dave_id.as_str());
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
async fn garbage_token_is_rejected_even_on_public_routes() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/api/events", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_requests_get_json_validation_errors() {
    let app = app();
    let cases = [
        (Method::POST, "/api/auth/sign-up", "{not json"),
        (Method::POST, "/api/auth/sign-up", r#"{"email":"a@b.co"}"#),
        (Method::GET, "/api/events/not-a-uuid", ""),
        (Method::GET, "/api/events?page=abc", ""),
    ];

    for (method, uri, body) in cases {
        let (status, content_type, body) = call_raw(&app, method, uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
        assert!(content_type.starts_with("application/json"), "{uri}: {content_type}");
        assert_eq!(body["success"], false, "{uri}");
        assert_eq!(body["error"], "validation_error", "{uri}");
        assert!(body["message"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn null_clears_event_and_booking_fields() {
    let app = app();
    let (admin, _) = sign_up(&app, ADMIN_EMAIL).await;
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let event_id = create_event(&app, &admin, "Book Club", 18).await;

    let uri = format!("/api/events/{event_id}");
    let (status, body) = call(&app, Method::PATCH, &uri, Some(&admin), Some(json!({ "description": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], Value::Null);
    assert_eq!(body["location"], "Main Hall");

    let (_, booking) = call(
        &app,
        Method::POST,
        "/api/bookings",
        Some(&alice),
        Some(json!({ "event_id": event_id, "preferences": "front row" })),
    )
    .await;
    let uri = format!("/api/bookings/{}", booking["id"].as_str().unwrap());

    let (status, body) = call(&app, Method::PATCH, &uri, Some(&alice), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preferences"], "front row");

    let (status, body) = call(&app, Method::PATCH, &uri, Some(&alice), Some(json!({ "preferences": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preferences"], Value::Null);
    assert_eq!(body["status"], "confirmed");
}

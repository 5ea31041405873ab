mod common;

use axum::http::{StatusCode, header};
use serde_json::json;

use common::{Client, body_json, flaky_app, fresh_client, send, set_cookie_line, test_app};

async fn register(app: &common::TestApp, client: &Client, email: &str, password: &str) {
    let response = send(
        app,
        client.post_json(
            "/api/signup",
            json!({
                "email": email,
                "password": password,
                "password_confirmation": password,
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn first_request_gets_http_only_session_cookie() {
    let app = test_app();
    let response = send(&app, Client::default().get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);

    let sid = set_cookie_line(response.headers(), "sid").expect("session cookie");
    assert!(sid.contains("HttpOnly"));
    assert!(sid.contains("SameSite=Strict"));
    assert!(sid.contains("Path=/"));
    assert!(sid.contains("Expires="));

    let xsrf = set_cookie_line(response.headers(), "xsrf").expect("csrf cookie");
    assert!(!xsrf.contains("HttpOnly"));

    assert_eq!(app.store.len().await, 1);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn known_session_cookie_is_not_reissued() {
    let app = test_app();
    let client = fresh_client(&app).await;

    let response = send(&app, client.get("/health")).await;
    assert!(set_cookie_line(response.headers(), "sid").is_none());
    assert!(set_cookie_line(response.headers(), "xsrf").is_none());
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn unknown_session_cookie_falls_back_to_a_new_session() {
    let app = test_app();
    let client = Client {
        sid: Some("bm90LWEtcmVhbC1zZXNzaW9u".to_string()),
        xsrf: None,
    };

    let response = send(&app, client.get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut next = client.clone();
    next.absorb(response.headers());
    assert_ne!(next.sid, client.sid);
}

#[tokio::test]
async fn json_client_gets_redirect_instruction_instead_of_redirect() {
    let app = test_app();
    let response = send(&app, Client::default().get_json("/dashboard")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert!(
        set_cookie_line(response.headers(), "sid")
            .unwrap()
            .contains("HttpOnly")
    );

    let body = body_json(response).await;
    assert_eq!(body["data"]["redirect_path"], "/signin");
    assert_eq!(body["message"], "Login is required to access this resource.");
}

#[tokio::test]
async fn browser_is_sent_back_to_intended_page_after_sign_in() {
    let app = test_app();
    let mut client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;

    let response = send(&app, client.get("/profile?tab=security")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/signin");

    let anonymous_sid = client.sid.clone();
    let response = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    client.absorb(response.headers());
    assert_ne!(client.sid, anonymous_sid);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Logged in.");
    assert_eq!(body["data"]["redirect_path"], "/profile?tab=security");

    let response = send(&app, client.get_json("/profile")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["user_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn browser_without_any_cookie_is_sent_back_after_sign_in() {
    let app = test_app();
    let mut client = Client::default();

    let response = send(&app, client.get("/profile")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/signin");
    client.absorb(response.headers());
    assert!(client.sid.is_some() && client.xsrf.is_some());

    register(&app, &client, "ada@example.com", "correct horse").await;
    let response = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["redirect_path"], "/profile");
}

#[tokio::test]
async fn sign_in_reissues_the_csrf_token() {
    let app = test_app();
    let mut client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;
    let before = client.xsrf.clone();

    let response = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let xsrf = set_cookie_line(response.headers(), "xsrf").expect("csrf cookie");
    assert!(!xsrf.contains("HttpOnly"));
    client.absorb(response.headers());
    assert_ne!(client.xsrf, before);

    // The new token is the one that passes from now on.
    let response = send(&app, client.post_json("/api/signout", json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_session_lookup_falls_back_to_a_new_anonymous_session() {
    let (app, store) = flaky_app();
    let client = fresh_client(&app).await;

    store.fail_reads(true);
    let response = send(&app, client.get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let sid = set_cookie_line(response.headers(), "sid").expect("new session cookie");
    assert!(sid.contains("HttpOnly"));

    let mut next = client.clone();
    next.absorb(response.headers());
    assert!(next.sid.is_some());
    assert_ne!(next.sid, client.sid);
    assert_eq!(app.store.len().await, 2);
}

#[tokio::test]
async fn session_write_failure_during_sign_in_is_a_generic_server_error() {
    let (app, store) = flaky_app();
    let client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;

    store.fail_writes(true);
    let response = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie_line(response.headers(), "sid").is_none());
    assert_eq!(
        body_json(response).await,
        json!({ "message": "An error occurred." })
    );
}

#[tokio::test]
async fn sign_in_without_intended_page_lands_on_dashboard() {
    let app = test_app();
    let mut client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;

    let response = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    client.absorb(response.headers());
    assert_eq!(body_json(response).await["data"]["redirect_path"], "/dashboard");

    let response = send(&app, client.get_json("/dashboard")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn pre_login_session_id_is_destroyed_on_sign_in() {
    let app = test_app();
    let client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;

    let response = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The old cookie no longer authenticates anything.
    let response = send(&app, client.get_json("/dashboard")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn password_mismatch_is_rejected_before_any_storage_call() {
    let app = test_app();
    let client = fresh_client(&app).await;

    let response = send(
        &app,
        client.post_json(
            "/api/signup",
            json!({
                "email": "ada@example.com",
                "password": "correct horse",
                "password_confirmation": "battery staple",
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid input!");
    assert_eq!(body["errors"]["password"][0], "Passwords do not match.");
    assert_eq!(app.users.calls(), 0);
}

#[tokio::test]
async fn duplicate_email_is_reported_on_the_email_field() {
    let app = test_app();
    let client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;

    let response = send(
        &app,
        client.post_json(
            "/api/signup",
            json!({
                "email": "ada@example.com",
                "password": "another secret",
                "password_confirmation": "another secret",
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(
        body["errors"]["email"][0],
        "User with email: ada@example.com already exists."
    );
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let app = test_app();
    let client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;

    let unknown = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "bob@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    let wrong = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "battery staple" }),
        ),
    )
    .await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(unknown).await, body_json(wrong).await);
}

#[tokio::test]
async fn state_changing_requests_need_the_csrf_header() {
    let app = test_app();
    let client = fresh_client(&app).await;

    let mut forged = client.clone();
    forged.xsrf = Some("forged".to_string());
    let mut request = forged.post_json("/api/signup", json!({}));
    request
        .headers_mut()
        .insert(header::COOKIE, client.cookie_header().parse().unwrap());

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.users.calls(), 0);

    let mut request = client.post_json("/api/signup", json!({}));
    request.headers_mut().remove("x-csrf-token");
    assert_eq!(send(&app, request).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sign_out_destroys_the_session() {
    let app = test_app();
    let mut client = fresh_client(&app).await;
    register(&app, &client, "ada@example.com", "correct horse").await;

    let response = send(
        &app,
        client.post_json(
            "/api/signin",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    client.absorb(response.headers());
    let signed_in = client.clone();

    let response = send(&app, client.post_json("/api/signout", json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie_line(response.headers(), "sid").is_some());
    assert_eq!(body_json(response).await["data"]["redirect_path"], "/signin");

    let response = send(&app, signed_in.get_json("/dashboard")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

mod common;

use axum::http::{Method, StatusCode};
use common::{ADMIN_EMAIL, ADMIN_PASSWORD, TestApp};
use entity::refresh_token;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

#[tokio::test]
async fn refresh_tokens_rotate_and_cannot_be_replayed() {
    let app = TestApp::spawn().await;
    let pair = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let original = pair["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": original })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    let rotated = body["data"]["refresh_token"].as_str().unwrap();
    assert_ne!(rotated, original);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": original })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::spawn().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "not-the-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() {
    let app = TestApp::spawn().await;
    let (status, _) = app.request(Method::GET, "/api/v1/employees", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.admin_token().await;
    let (status, body) = app.request(Method::GET, "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["data"]["role"]["full_access"], true);
}

#[tokio::test]
async fn seeding_twice_creates_nothing_new() {
    let app = TestApp::spawn().await;
    let again = server::seed::run(
        &app.db,
        &server::seed::SeedSettings {
            admin_email: ADMIN_EMAIL.into(),
            admin_password: ADMIN_PASSWORD.into(),
            company_name: "Test Co".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(again.menus_created, 0);
    assert_eq!(again.leave_types_created, 0);
    assert_eq!(again.admin_user_id, app.seed.admin_user_id);
}

#[tokio::test]
async fn rotated_refresh_tokens_do_not_pile_up() {
    let app = TestApp::spawn().await;
    let mut current = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();
    for _ in 0..2 {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/v1/auth/refresh",
                None,
                Some(json!({ "refresh_token": current })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        current = body["data"]["refresh_token"].as_str().unwrap().to_string();
    }

    let stored = refresh_token::Entity::find()
        .filter(refresh_token::Column::UserId.eq(app.seed.admin_user_id))
        .count(&app.db)
        .await
        .unwrap();
    assert_eq!(stored, 1, "only the live token should remain");
}

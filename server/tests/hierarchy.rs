mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{Value, json};

async fn create_menu(app: &TestApp, token: &str, key: &str, parent: Option<&str>) -> (StatusCode, Value) {
    let parent_ids: Vec<&str> = parent.into_iter().collect();
    app.request(
        Method::POST,
        "/api/v1/menus",
        Some(token),
        Some(json!({ "key": key, "label": key, "parent_ids": parent_ids })),
    )
    .await
}

#[tokio::test]
async fn menu_chain_stops_at_five_levels() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;

    let mut parent: Option<String> = None;
    for level in 1..=5 {
        let (status, body) =
            create_menu(&app, &token, &format!("level-{level}"), parent.as_deref()).await;
        assert_eq!(status, StatusCode::CREATED, "level {level}: {body}");
        parent = body["data"]["id"].as_str().map(str::to_string);
    }

    let (status, body) = create_menu(&app, &token, "level-6", parent.as_deref()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn role_cannot_move_under_its_own_descendant() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;

    let (status, manager) = app
        .request(
            Method::POST,
            "/api/v1/roles",
            Some(&token),
            Some(json!({ "name": "Manager" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{manager}");
    let manager_id = manager["data"]["id"].as_str().unwrap().to_string();

    let (status, lead) = app
        .request(
            Method::POST,
            "/api/v1/roles",
            Some(&token),
            Some(json!({ "name": "Team lead", "parent_id": manager_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{lead}");
    assert_eq!(lead["data"]["depth"], manager["data"]["depth"].as_i64().unwrap() + 1);
    let lead_id = lead["data"]["id"].as_str().unwrap();

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/roles/{manager_id}"),
            Some(&token),
            Some(json!({ "parent_id": lead_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn full_access_admin_sees_every_active_menu() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let (status, body) = app.request(Method::GET, "/api/v1/menus/mine", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let roots = body["data"].as_array().unwrap();
    assert!(roots.iter().any(|node| node["key"] == "employees"));
    let users = roots.iter().find(|node| node["key"] == "users").unwrap();
    let children = users["children"].as_array().unwrap();
    assert!(children.iter().any(|node| node["key"] == "roles"));
}

struct Manager {
    role_id: String,
    token: String,
}

/// A non-root "HR" role directly under the root role, holding the users and
/// roles menus, plus one account in it.
async fn hr_manager(app: &TestApp, admin: &str) -> Manager {
    let root = app.seed.root_role_id.to_string();
    let (status, body) = app.create_role(admin, "HR", Some(&root)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let role_id = body["data"]["id"].as_str().unwrap().to_string();
    let menus = app.menu_ids(&["users", "roles"]).await;
    let (status, body) = app.grant_menus(admin, &role_id, &menus).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, token) = app.user_in_role(admin, "hr@example.com", &role_id).await;
    Manager { role_id, token }
}

#[tokio::test]
async fn managers_cannot_edit_accounts_above_them() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let hr = hr_manager(&app, &admin).await;

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/users/{}", app.seed.admin_user_id),
            Some(&hr.token),
            Some(json!({ "password": "hijacked-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": common::ADMIN_EMAIL, "password": "hijacked-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD).await;

    let (status, clerk) = app.create_role(&hr.token, "Clerk", Some(&hr.role_id)).await;
    assert_eq!(status, StatusCode::CREATED, "{clerk}");
    let clerk_role = clerk["data"]["id"].as_str().unwrap();
    let (clerk_user, _) = app.user_in_role(&admin, "clerk@example.com", clerk_role).await;
    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/users/{clerk_user}"),
            Some(&hr.token),
            Some(json!({ "display_name": "Renamed clerk" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn managers_only_shape_roles_below_them() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let hr = hr_manager(&app, &admin).await;

    let every_menu = app.all_menu_ids().await;
    let (status, _) = app.grant_menus(&hr.token, &hr.role_id, &every_menu).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "own role is not below the caller");

    let root = app.seed.root_role_id.to_string();
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/roles/{root}"),
            Some(&hr.token),
            Some(json!({ "name": "Taken over" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/roles/{root}"), Some(&hr.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.create_role(&hr.token, "Top level", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, clerk) = app.create_role(&hr.token, "Clerk", Some(&hr.role_id)).await;
    assert_eq!(status, StatusCode::CREATED, "{clerk}");
    let clerk_role = clerk["data"]["id"].as_str().unwrap();
    let payroll = app.menu_ids(&["payroll"]).await;
    let (status, _) = app.grant_menus(&hr.token, clerk_role, &payroll).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "cannot hand out menus it lacks");
    let users = app.menu_ids(&["users"]).await;
    let (status, body) = app.grant_menus(&hr.token, clerk_role, &users).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/roles/{clerk_role}"),
            Some(&hr.token),
            Some(json!({ "parent_id": root })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "cannot move a role out of its own subtree");
}

#[tokio::test]
async fn roles_in_use_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let (_, parent) = app.create_role(&admin, "Operations", None).await;
    let parent_id = parent["data"]["id"].as_str().unwrap().to_string();
    let (_, child) = app.create_role(&admin, "Shift lead", Some(&parent_id)).await;
    let child_id = child["data"]["id"].as_str().unwrap().to_string();
    app.user_in_role(&admin, "lead@example.com", &child_id).await;

    let (status, body) = app
        .request(Method::DELETE, &format!("/api/v1/roles/{parent_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let (status, body) = app
        .request(Method::DELETE, &format!("/api/v1/roles/{child_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, spare) = app.create_role(&admin, "Spare", None).await;
    let spare_id = spare["data"]["id"].as_str().unwrap();
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/roles/{spare_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn moving_a_role_rewrites_descendant_depths() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let mut ids = Vec::new();
    let mut parent: Option<String> = None;
    for name in ["Region", "Branch", "Desk"] {
        let (status, body) = app.create_role(&admin, name, parent.as_deref()).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["data"]["id"].as_str().unwrap().to_string();
        parent = Some(id.clone());
        ids.push(id);
    }
    let (_, holding) = app.create_role(&admin, "Holding", None).await;
    let holding_id = holding["data"]["id"].as_str().unwrap();

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/roles/{}", ids[0]),
            Some(&admin),
            Some(json!({ "parent_id": holding_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["depth"], 2);

    for (id, expected) in ids.iter().zip([2, 3, 4]) {
        let (_, role) = app
            .request(Method::GET, &format!("/api/v1/roles/{id}"), Some(&admin), None)
            .await;
        assert_eq!(role["data"]["depth"], expected, "{role}");
    }
}

#[tokio::test]
async fn granted_child_without_its_parent_surfaces_at_the_root() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let (_, viewer) = app.create_role(&admin, "Viewer", None).await;
    let viewer_id = viewer["data"]["id"].as_str().unwrap().to_string();
    let menus = app.menu_ids(&["dashboard", "roles"]).await;
    let (status, body) = app.grant_menus(&admin, &viewer_id, &menus).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, token) = app.user_in_role(&admin, "viewer@example.com", &viewer_id).await;

    let (status, body) = app.request(Method::GET, "/api/v1/menus/mine", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let mut keys: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["key"].as_str().unwrap())
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, ["dashboard", "roles"]);
}

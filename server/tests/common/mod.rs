#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use entity::menu;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use platform_db::{DatabaseSettings, DbPool, connect};
use serde_json::{Value, json};
use server::{
    AppState, build_router,
    config::AppConfig,
    seed::{self, SeedReport, SeedSettings},
};
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "Sup3rSecret!";

pub struct TestApp {
    pub router: Router,
    pub db: DbPool,
    pub seed: SeedReport,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let db = connect(&DatabaseSettings::new("sqlite::memory:"))
            .await
            .expect("connect sqlite");
        Migrator::up(&db, None).await.expect("migrate");
        let settings = SeedSettings {
            admin_email: ADMIN_EMAIL.into(),
            admin_password: ADMIN_PASSWORD.into(),
            company_name: "Test Co".into(),
        };
        let seed = seed::run(&db, &settings).await.expect("seed");

        let mut config = AppConfig::new("test-secret-at-least-16");
        config.upload_dir = std::env::temp_dir().join(format!("hr-uploads-{}", Uuid::new_v4()));
        let router = build_router(AppState::new(db.clone(), config));
        Self { router, db, seed }
    }

    pub async fn request(
        &self,
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
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    pub async fn login(&self, email: &str, password: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"].clone()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    pub async fn create_employee(&self, token: &str, code: &str, gross_salary_cents: i64) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/employees",
                Some(token),
                Some(json!({
                    "employee_code": code,
                    "first_name": "Test",
                    "last_name": code,
                    "email": format!("{}@example.com", code.to_lowercase()),
                    "joining_date": "2023-01-02",
                    "gross_salary_cents": gross_salary_cents,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create employee failed: {body}");
        body["data"].clone()
    }

    /// Links the seeded administrator to a fresh employee record.
    pub async fn link_admin_employee(&self, token: &str) -> String {
        let employee = self.create_employee(token, "ADM-001", 500_000).await;
        let employee_id = employee["id"].as_str().expect("employee id").to_string();
        let (status, body) = self
            .request(
                Method::PUT,
                &format!("/api/v1/users/{}", self.seed.admin_user_id),
                Some(token),
                Some(json!({ "employee_id": employee_id })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "link employee failed: {body}");
        employee_id
    }

    pub async fn leave_type_id(&self, token: &str, code: &str) -> String {
        let (status, body) = self
            .request(Method::GET, "/api/v1/leave-types", Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]
            .as_array()
            .and_then(|types| types.iter().find(|t| t["code"] == code))
            .and_then(|t| t["id"].as_str())
            .expect("seeded leave type")
            .to_string()
    }

    /// Menu ids for the given keys, straight from the database.
    pub async fn menu_ids(&self, keys: &[&str]) -> Vec<String> {
        let rows = menu::Entity::find()
            .filter(menu::Column::Key.is_in(keys.iter().copied()))
            .all(&self.db)
            .await
            .expect("menus");
        assert_eq!(rows.len(), keys.len(), "unknown menu key in {keys:?}");
        rows.into_iter().map(|m| m.id.to_string()).collect()
    }

    pub async fn all_menu_ids(&self) -> Vec<String> {
        menu::Entity::find()
            .all(&self.db)
            .await
            .expect("menus")
            .into_iter()
            .map(|m| m.id.to_string())
            .collect()
    }

    pub async fn create_role(&self, token: &str, name: &str, parent_id: Option<&str>) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/v1/roles",
            Some(token),
            Some(json!({ "name": name, "parent_id": parent_id })),
        )
        .await
    }

    pub async fn grant_menus(&self, token: &str, role_id: &str, menu_ids: &[String]) -> (StatusCode, Value) {
        self.request(
            Method::PUT,
            &format!("/api/v1/roles/{role_id}/menus"),
            Some(token),
            Some(json!({ "menu_ids": menu_ids })),
        )
        .await
    }

    /// Creates an account in `role_id` and returns `(user id, access token)`.
    pub async fn user_in_role(&self, token: &str, email: &str, role_id: &str) -> (String, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/users",
                Some(token),
                Some(json!({
                    "email": email,
                    "display_name": email,
                    "password": "Passw0rd!23",
                    "role_id": role_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create user failed: {body}");
        let user_id = body["data"]["id"].as_str().expect("user id").to_string();
        let access = self.login(email, "Passw0rd!23").await["access_token"]
            .as_str()
            .expect("access token")
            .to_string();
        (user_id, access)
    }

    /// Posts a single-file multipart form under the `file` field.
    pub async fn upload(&self, token: &str, uri: &str, content_type: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let boundary = "hr-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .expect("request");
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }
}

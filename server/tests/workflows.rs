mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use entity::{employee, salary_deduction_rule};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, sea_query::Expr};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn duplicate_employee_code_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    app.create_employee(&token, "EMP-100", 250_000).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/employees",
            Some(&token),
            Some(json!({
                "employee_code": "EMP-100",
                "first_name": "Other",
                "last_name": "Person",
                "email": "other@example.com",
                "joining_date": "2024-01-01",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn overlapping_leave_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let employee = app.create_employee(&token, "EMP-200", 250_000).await;
    let employee_id = employee["id"].as_str().unwrap();
    let annual = app.leave_type_id(&token, "ANNUAL").await;

    let apply = |start: &str, end: &str| {
        json!({
            "employee_id": employee_id,
            "leave_type_id": annual,
            "start_date": start,
            "end_date": end,
        })
    };
    let (status, first) = app
        .request(
            Method::POST,
            "/api/v1/leaves",
            Some(&token),
            Some(apply("2099-03-02", "2099-03-04")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["data"]["status"], "PENDING");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/leaves",
            Some(&token),
            Some(apply("2099-03-04", "2099-03-06")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/leaves",
            Some(&token),
            Some(apply("2099-03-10", "2099-03-09")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clocking_in_twice_on_one_day_fails() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    app.link_admin_employee(&token).await;

    let (status, body) = app
        .request(Method::POST, "/api/v1/attendance/clock-in", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = app
        .request(Method::POST, "/api/v1/attendance/clock-in", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .request(Method::POST, "/api/v1/attendance/clock-out", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["clock_out"].is_string());
}

#[tokio::test]
async fn payroll_net_is_gross_less_persisted_deductions() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let employee = app.create_employee(&token, "EMP-300", 300_000).await;
    let employee_id = employee["id"].as_str().unwrap();

    let (status, rule) = app
        .request(
            Method::POST,
            "/api/v1/salary-deduction-rules",
            Some(&token),
            Some(json!({ "name": "Pension", "kind": "PERCENT_OF_BASIC", "rate": 10.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{rule}");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/payroll/generate",
            Some(&token),
            Some(json!({ "employee_id": employee_id, "year": 2024, "month": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let payroll = &body["data"];
    assert_eq!(payroll["status"], "DRAFT");
    assert_eq!(payroll["gross_cents"], 300_000);

    let lines = payroll["lines"].as_array().unwrap();
    let deducted: i64 = lines.iter().map(|l| l["amount_cents"].as_i64().unwrap()).sum();
    let gross = payroll["gross_cents"].as_i64().unwrap();
    let net = payroll["net_cents"].as_i64().unwrap();
    assert_eq!(payroll["total_deductions_cents"].as_i64().unwrap(), deducted);
    assert_eq!(net, gross - deducted);
    assert!(net >= 0);

    let id = payroll["id"].as_str().unwrap();
    let (status, _) = app
        .request(Method::POST, &format!("/api/v1/payroll/{id}/pay"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "draft payroll cannot be paid");
    let (status, body) = app
        .request(Method::POST, &format!("/api/v1/payroll/{id}/process"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = app
        .request(Method::POST, &format!("/api/v1/payroll/{id}/pay"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "PAID");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/payroll/generate",
            Some(&token),
            Some(json!({ "employee_id": employee_id, "year": 2024, "month": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "paid payroll is final");
}

#[tokio::test]
async fn leave_beyond_the_yearly_allowance_is_refused() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let employee = app.create_employee(&token, "EMP-400", 250_000).await;
    let sick = app.leave_type_id(&token, "SICK").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/leaves",
            Some(&token),
            Some(json!({
                "employee_id": employee["id"],
                "leave_type_id": sick,
                "start_date": "2099-04-01",
                "end_date": "2099-04-16",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn reviewed_or_started_leave_cannot_change_again() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let employee = app.create_employee(&token, "EMP-410", 250_000).await;
    let annual = app.leave_type_id(&token, "ANNUAL").await;

    let mut ids = Vec::new();
    for (start, end) in [("2099-05-04", "2099-05-05"), ("2020-01-06", "2020-01-07")] {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/v1/leaves",
                Some(&token),
                Some(json!({
                    "employee_id": employee["id"],
                    "leave_type_id": annual,
                    "start_date": start,
                    "end_date": end,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let action = |id: &str, verb: &str| format!("/api/v1/leaves/{id}/{verb}");
    let (status, body) = app.request(Method::POST, &action(&ids[0], "approve"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "APPROVED");
    let (status, _) = app.request(Method::POST, &action(&ids[0], "approve"), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.request(Method::POST, &action(&ids[0], "reject"), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.request(Method::POST, &action(&ids[1], "approve"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = app.request(Method::POST, &action(&ids[1], "cancel"), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app.request(Method::POST, &action(&ids[0], "cancel"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "CANCELLED");
}

#[tokio::test]
async fn failed_regeneration_keeps_the_existing_payroll() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let employee = app.create_employee(&token, "EMP-500", 400_000).await;
    let period = json!({ "employee_id": employee["id"], "year": 2024, "month": 6 });

    let (status, body) = app
        .request(Method::POST, "/api/v1/payroll/generate", Some(&token), Some(period.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let original = body["data"]["id"].as_str().unwrap().to_string();

    let stamp = chrono::Utc::now().fixed_offset();
    salary_deduction_rule::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Broken tax table".into()),
        description: Set(None),
        kind: Set(salary_deduction_rule::Kind::TaxSlab),
        amount_cents: Set(None),
        rate: Set(None),
        slabs: Set(Some(json!("garbage"))),
        is_active: Set(true),
        sort_order: Set(0),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&app.db)
    .await
    .unwrap();

    let (status, _) = app
        .request(Method::POST, "/api/v1/payroll/generate", Some(&token), Some(period))
        .await;
    assert!(!status.is_success(), "corrupt rule must fail generation, got {status}");

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/payroll/{original}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["gross_cents"], 400_000);
}

#[tokio::test]
async fn absurd_salaries_are_rejected() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/employees",
            Some(&token),
            Some(json!({
                "employee_code": "EMP-600",
                "first_name": "Rich",
                "last_name": "Person",
                "email": "rich@example.com",
                "joining_date": "2023-01-02",
                "gross_salary_cents": 1_000_000_000_000_000_000_i64,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn replacing_a_picture_tolerates_a_missing_previous_file() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let created = app.create_employee(&token, "EMP-700", 250_000).await;
    let id = created["id"].as_str().unwrap();

    employee::Entity::update_many()
        .col_expr(employee::Column::ProfilePicture, Expr::value("employees/gone.jpg"))
        .filter(employee::Column::Id.eq(Uuid::parse_str(id).unwrap()))
        .exec(&app.db)
        .await
        .unwrap();

    let (status, body) = app
        .upload(
            &token,
            &format!("/api/v1/employees/{id}/profile-picture"),
            "image/png",
            b"\x89PNG\r\n\x1a\nnot-really-an-image",
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["profile_picture"], format!("employees/{id}.png"));
}

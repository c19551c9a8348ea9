use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::NaiveDate;
use entity::eod_report;
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{DateWindow, PageQuery, find_or_404, now, optional_text, paginate, required_text, today},
};

const MAX_HOURS: f64 = 24.0;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/eod-reports", get(list_reports).post(submit_report))
        .route("/eod-reports/{id}", get(get_report))
}

#[derive(Debug, Deserialize)]
struct SubmitReport {
    /// Defaults to today; back-dating is allowed, future dates are not.
    date: Option<NaiveDate>,
    summary: String,
    tasks_completed: Option<String>,
    blockers: Option<String>,
    #[serde(default)]
    hours_worked: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ReportFilter {
    employee_id: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

fn check_hours(hours: f64) -> ApiResult<()> {
    if !hours.is_finite() || !(0.0..=MAX_HOURS).contains(&hours) {
        return Err(ApiError::bad_request("hours_worked must be between 0 and 24"));
    }
    Ok(())
}

async fn submit_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<SubmitReport>,
) -> ApiResult<ApiResponse<eod_report::Model>> {
    let employee_id = current.employee_id()?;
    let date = body.date.unwrap_or_else(today);
    if date > today() {
        return Err(ApiError::bad_request("cannot report on a future date"));
    }
    check_hours(body.hours_worked)?;
    let filed = eod_report::Entity::find()
        .filter(eod_report::Column::EmployeeId.eq(employee_id))
        .filter(eod_report::Column::Date.eq(date))
        .count(&state.db)
        .await?;
    if filed > 0 {
        return Err(ApiError::bad_request("an end-of-day report already exists for this date"));
    }
    let stamp = now();
    let created = eod_report::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        date: Set(date),
        summary: Set(required_text("summary", &body.summary, 5_000)?),
        tasks_completed: Set(optional_text("tasks_completed", body.tasks_completed, 5_000)?),
        blockers: Set(optional_text("blockers", body.blockers, 5_000)?),
        hours_worked: Set(body.hours_worked),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(report_id = %created.id, %employee_id, %date, "eod report submitted");
    Ok(ApiResponse::created("report submitted", created))
}

async fn list_reports(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<ReportFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<eod_report::Model>>> {
    let window = DateWindow {
        from: filter.from,
        to: filter.to,
    };
    window.validate()?;
    let mut query = eod_report::Entity::find().order_by_desc(eod_report::Column::Date);
    if let Some(employee_id) = current.scope_employee(keys::EOD_REPORTS, filter.employee_id)? {
        query = query.filter(eod_report::Column::EmployeeId.eq(employee_id));
    }
    if let Some(from) = window.from {
        query = query.filter(eod_report::Column::Date.gte(from));
    }
    if let Some(to) = window.to {
        query = query.filter(eod_report::Column::Date.lte(to));
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    Ok(ApiResponse::ok(
        "eod reports",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

async fn get_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<eod_report::Model>> {
    let row = find_or_404::<eod_report::Entity>(&state.db, id, "eod report").await?;
    current.scope_employee(keys::EOD_REPORTS, Some(row.employee_id))?;
    Ok(ApiResponse::ok("eod report", row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_are_bounded_to_a_day() {
        assert!(check_hours(0.0).is_ok());
        assert!(check_hours(7.5).is_ok());
        assert!(check_hours(-1.0).is_err());
        assert!(check_hours(24.5).is_err());
        assert!(check_hours(f64::NAN).is_err());
    }
}

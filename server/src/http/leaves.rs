//! Leave types and leave requests.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::{Datelike, NaiveDate};
use entity::{employee, leave, leave_type};
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use platform_db::DbPool;
use products_hr::leave::{DateRange, LeaveBalance, ensure_no_overlap};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{DateWindow, PageQuery, find_or_404, now, optional_text, paginate, required_text, today},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/leave-types", get(list_types).post(create_type))
        .route(
            "/leave-types/{id}",
            get(get_type).put(update_type).delete(delete_type),
        )
        .route("/leaves", get(list_leaves).post(apply_leave))
        .route("/leaves/balance", get(leave_balance))
        .route("/leaves/{id}", get(get_leave))
        .route("/leaves/{id}/approve", post(approve_leave))
        .route("/leaves/{id}/reject", post(reject_leave))
        .route("/leaves/{id}/cancel", post(cancel_leave))
}

#[derive(Debug, Deserialize)]
struct LeaveTypeBody {
    name: String,
    code: String,
    annual_allowance: i32,
    #[serde(default = "default_paid")]
    is_paid: bool,
}

fn default_paid() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct LeaveTypePatch {
    name: Option<String>,
    code: Option<String>,
    annual_allowance: Option<i32>,
    is_paid: Option<bool>,
}

async fn list_types(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<leave_type::Model>>> {
    let rows = leave_type::Entity::find()
        .order_by_asc(leave_type::Column::Name)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("leave types", rows))
}

async fn get_type(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<leave_type::Model>> {
    let row = find_or_404::<leave_type::Entity>(&state.db, id, "leave type").await?;
    Ok(ApiResponse::ok("leave type", row))
}

async fn create_type(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<LeaveTypeBody>,
) -> ApiResult<ApiResponse<leave_type::Model>> {
    current.require(keys::LEAVE_TYPES)?;
    let code = type_code(&body.code)?;
    ensure_code_free(&state.db, &code, None).await?;
    ensure_allowance(body.annual_allowance)?;
    let stamp = now();
    let created = leave_type::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(required_text("name", &body.name, 80)?),
        code: Set(code),
        annual_allowance: Set(body.annual_allowance),
        is_paid: Set(body.is_paid),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(leave_type_id = %created.id, code = %created.code, "leave type created");
    Ok(ApiResponse::created("leave type created", created))
}

async fn update_type(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<LeaveTypePatch>,
) -> ApiResult<ApiResponse<leave_type::Model>> {
    current.require(keys::LEAVE_TYPES)?;
    let existing = find_or_404::<leave_type::Entity>(&state.db, id, "leave type").await?;
    let mut active: leave_type::ActiveModel = existing.into();
    if let Some(name) = &body.name {
        active.name = Set(required_text("name", name, 80)?);
    }
    if let Some(code) = &body.code {
        let code = type_code(code)?;
        ensure_code_free(&state.db, &code, Some(id)).await?;
        active.code = Set(code);
    }
    if let Some(allowance) = body.annual_allowance {
        ensure_allowance(allowance)?;
        active.annual_allowance = Set(allowance);
    }
    if let Some(is_paid) = body.is_paid {
        active.is_paid = Set(is_paid);
    }
    active.updated_at = Set(now());
    Ok(ApiResponse::ok("leave type updated", active.update(&state.db).await?))
}

async fn delete_type(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::LEAVE_TYPES)?;
    find_or_404::<leave_type::Entity>(&state.db, id, "leave type").await?;
    let used = leave::Entity::find()
        .filter(leave::Column::LeaveTypeId.eq(id))
        .count(&state.db)
        .await?;
    if used > 0 {
        return Err(ApiError::bad_request("leave type is used by leave requests"));
    }
    leave_type::Entity::delete_by_id(id).exec(&state.db).await?;
    info!(leave_type_id = %id, "leave type deleted");
    Ok(ApiResponse::message("leave type deleted"))
}

fn type_code(value: &str) -> ApiResult<String> {
    Ok(required_text("code", value, 16)?.to_uppercase())
}

fn ensure_allowance(days: i32) -> ApiResult<()> {
    if !(0..=366).contains(&days) {
        return Err(ApiError::bad_request(
            "annual_allowance must be between 0 and 366 days",
        ));
    }
    Ok(())
}

async fn ensure_code_free(db: &DbPool, code: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = leave_type::Entity::find().filter(leave_type::Column::Code.eq(code));
    if let Some(id) = except {
        query = query.filter(leave_type::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request("leave type code already exists"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ApplyLeave {
    /// Filing on someone else's behalf needs the leaves grant.
    employee_id: Option<Uuid>,
    leave_type_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewBody {
    note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LeaveFilter {
    employee_id: Option<Uuid>,
    leave_type_id: Option<Uuid>,
    status: Option<leave::Status>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
struct BalanceQuery {
    employee_id: Option<Uuid>,
    year: Option<i32>,
}

#[derive(Debug, Serialize)]
struct TypeBalance {
    leave_type: leave_type::Model,
    #[serde(flatten)]
    balance: LeaveBalance,
    available: i64,
}

#[derive(Debug, Serialize)]
struct BalanceSummary {
    employee_id: Uuid,
    year: i32,
    balances: Vec<TypeBalance>,
}

fn is_live(status: leave::Status) -> bool {
    matches!(status, leave::Status::Pending | leave::Status::Approved)
}

fn range_of(row: &leave::Model) -> DateRange {
    DateRange {
        start: row.start_date,
        end: row.end_date,
    }
}

/// Approved and pending days of one type whose start falls in `year`.
async fn usage(
    db: &DbPool,
    employee_id: Uuid,
    leave_type: &leave_type::Model,
    year: i32,
) -> ApiResult<LeaveBalance> {
    let rows = leave::Entity::find()
        .filter(leave::Column::EmployeeId.eq(employee_id))
        .filter(leave::Column::LeaveTypeId.eq(leave_type.id))
        .filter(leave::Column::Status.is_in([leave::Status::Pending, leave::Status::Approved]))
        .all(db)
        .await?;
    let mut balance = LeaveBalance {
        allowance: i64::from(leave_type.annual_allowance),
        ..LeaveBalance::default()
    };
    for row in rows.iter().filter(|r| r.start_date.year() == year) {
        match row.status {
            leave::Status::Approved => balance.approved += i64::from(row.days),
            _ => balance.pending += i64::from(row.days),
        }
    }
    Ok(balance)
}

async fn apply_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<ApplyLeave>,
) -> ApiResult<ApiResponse<leave::Model>> {
    let employee_id = match body.employee_id {
        Some(other) => current
            .scope_employee(keys::LEAVES, Some(other))?
            .unwrap_or(other),
        None => current.employee_id()?,
    };
    find_or_404::<employee::Entity>(&state.db, employee_id, "employee").await?;
    let leave_type =
        find_or_404::<leave_type::Entity>(&state.db, body.leave_type_id, "leave type").await?;
    let requested = DateRange::new(body.start_date, body.end_date)?;

    let live: Vec<DateRange> = leave::Entity::find()
        .filter(leave::Column::EmployeeId.eq(employee_id))
        .filter(leave::Column::Status.is_in([leave::Status::Pending, leave::Status::Approved]))
        .all(&state.db)
        .await?
        .iter()
        .map(range_of)
        .collect();
    ensure_no_overlap(&requested, &live)?;

    let days = requested.days();
    usage(&state.db, employee_id, &leave_type, requested.start.year())
        .await?
        .ensure_can_take(days)?;

    let stamp = now();
    let created = leave::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        leave_type_id: Set(leave_type.id),
        start_date: Set(requested.start),
        end_date: Set(requested.end),
        days: Set(days as i32),
        reason: Set(optional_text("reason", body.reason, 1000)?),
        status: Set(leave::Status::Pending),
        reviewed_by: Set(None),
        review_note: Set(None),
        reviewed_at: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(leave_id = %created.id, %employee_id, days, "leave requested");
    Ok(ApiResponse::created("leave requested", created))
}

async fn list_leaves(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<LeaveFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<leave::Model>>> {
    let window = DateWindow {
        from: filter.from,
        to: filter.to,
    };
    window.validate()?;
    let mut query = leave::Entity::find().order_by_desc(leave::Column::StartDate);
    if let Some(employee_id) = current.scope_employee(keys::LEAVES, filter.employee_id)? {
        query = query.filter(leave::Column::EmployeeId.eq(employee_id));
    }
    if let Some(type_id) = filter.leave_type_id {
        query = query.filter(leave::Column::LeaveTypeId.eq(type_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(leave::Column::Status.eq(status));
    }
    if let Some(from) = window.from {
        query = query.filter(leave::Column::EndDate.gte(from));
    }
    if let Some(to) = window.to {
        query = query.filter(leave::Column::StartDate.lte(to));
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    Ok(ApiResponse::ok(
        "leaves",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

async fn get_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<leave::Model>> {
    let row = find_or_404::<leave::Entity>(&state.db, id, "leave").await?;
    current.scope_employee(keys::LEAVES, Some(row.employee_id))?;
    Ok(ApiResponse::ok("leave", row))
}

async fn leave_balance(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<ApiResponse<BalanceSummary>> {
    let employee_id = match current.scope_employee(keys::LEAVES, query.employee_id)? {
        Some(id) => id,
        None => current.employee_id()?,
    };
    find_or_404::<employee::Entity>(&state.db, employee_id, "employee").await?;
    let year = query.year.unwrap_or_else(|| today().year());
    let types = leave_type::Entity::find()
        .order_by_asc(leave_type::Column::Name)
        .all(&state.db)
        .await?;
    let mut balances = Vec::with_capacity(types.len());
    for leave_type in types {
        let balance = usage(&state.db, employee_id, &leave_type, year).await?;
        balances.push(TypeBalance {
            available: balance.available(),
            balance,
            leave_type,
        });
    }
    Ok(ApiResponse::ok(
        "leave balance",
        BalanceSummary {
            employee_id,
            year,
            balances,
        },
    ))
}

async fn review(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
    outcome: leave::Status,
    body: ReviewBody,
) -> ApiResult<leave::Model> {
    current.require(keys::LEAVES)?;
    let row = find_or_404::<leave::Entity>(&state.db, id, "leave").await?;
    if row.status != leave::Status::Pending {
        return Err(ApiError::bad_request("only pending leaves can be reviewed"));
    }
    if !current.full_access() && current.user.employee_id == Some(row.employee_id) {
        return Err(ApiError::forbidden("cannot review your own leave"));
    }
    let mut active: leave::ActiveModel = row.into();
    let stamp = now();
    active.status = Set(outcome);
    active.reviewed_by = Set(Some(current.id()));
    active.review_note = Set(optional_text("note", body.note, 1000)?);
    active.reviewed_at = Set(Some(stamp));
    active.updated_at = Set(stamp);
    let updated = active.update(&state.db).await?;
    info!(leave_id = %id, status = ?updated.status, reviewer = %current.id(), "leave reviewed");
    Ok(updated)
}

async fn approve_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<ApiResponse<leave::Model>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let updated = review(&state, &current, id, leave::Status::Approved, body).await?;
    Ok(ApiResponse::ok("leave approved", updated))
}

async fn reject_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<ApiResponse<leave::Model>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let updated = review(&state, &current, id, leave::Status::Rejected, body).await?;
    Ok(ApiResponse::ok("leave rejected", updated))
}

/// Owners and leave managers may withdraw a live request that has not started.
async fn cancel_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<leave::Model>> {
    let row = find_or_404::<leave::Entity>(&state.db, id, "leave").await?;
    current.scope_employee(keys::LEAVES, Some(row.employee_id))?;
    if !is_live(row.status) {
        return Err(ApiError::bad_request(
            "only pending or approved leaves can be cancelled",
        ));
    }
    if row.start_date <= today() {
        return Err(ApiError::bad_request("leave has already started"));
    }
    let mut active: leave::ActiveModel = row.into();
    active.status = Set(leave::Status::Cancelled);
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    info!(leave_id = %id, "leave cancelled");
    Ok(ApiResponse::ok("leave cancelled", updated))
}

/// Approved paid leave of one employee overlapping `period`.
pub async fn paid_leave_ranges(
    db: &DbPool,
    employee_id: Uuid,
    period: &DateRange,
) -> ApiResult<Vec<DateRange>> {
    let paid_types: Vec<Uuid> = leave_type::Entity::find()
        .filter(leave_type::Column::IsPaid.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    if paid_types.is_empty() {
        return Ok(Vec::new());
    }
    let rows = leave::Entity::find()
        .filter(leave::Column::EmployeeId.eq(employee_id))
        .filter(leave::Column::Status.eq(leave::Status::Approved))
        .filter(leave::Column::LeaveTypeId.is_in(paid_types))
        .filter(leave::Column::StartDate.lte(period.end))
        .filter(leave::Column::EndDate.gte(period.start))
        .all(db)
        .await?;
    Ok(rows.iter().map(range_of).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_and_approved_block_dates() {
        assert!(is_live(leave::Status::Pending));
        assert!(is_live(leave::Status::Approved));
        assert!(!is_live(leave::Status::Rejected));
        assert!(!is_live(leave::Status::Cancelled));
    }

    #[test]
    fn codes_are_uppercased_and_allowance_bounded() {
        assert_eq!(type_code(" sick ").unwrap(), "SICK");
        assert!(ensure_allowance(-1).is_err());
        assert!(ensure_allowance(400).is_err());
        assert!(ensure_allowance(24).is_ok());
    }
}

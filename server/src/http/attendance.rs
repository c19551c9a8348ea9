use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post, put},
};
use chrono::{DateTime, FixedOffset, NaiveDate};
use entity::{attendance, employee};
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use platform_db::DbPool;
use products_hr::attendance::{DayStatus, MonthSummary, worked_minutes};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{DateWindow, PageQuery, find_or_404, now, optional_text, paginate, parse_period, today},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/attendance", get(list_attendance))
        .route("/attendance/clock-in", post(clock_in))
        .route("/attendance/clock-out", post(clock_out))
        .route("/attendance/manual", put(upsert_attendance))
        .route("/attendance/summary", get(month_summary))
}

pub fn day_status(status: attendance::Status) -> DayStatus {
    match status {
        attendance::Status::Present => DayStatus::Present,
        attendance::Status::HalfDay => DayStatus::HalfDay,
        attendance::Status::Absent => DayStatus::Absent,
    }
}

fn stored_status(status: DayStatus) -> attendance::Status {
    match status {
        DayStatus::Present => attendance::Status::Present,
        DayStatus::HalfDay => attendance::Status::HalfDay,
        DayStatus::Absent => attendance::Status::Absent,
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClockBody {
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManualEntry {
    employee_id: Uuid,
    date: NaiveDate,
    clock_in: Option<DateTime<FixedOffset>>,
    clock_out: Option<DateTime<FixedOffset>>,
    status: Option<attendance::Status>,
    note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AttendanceFilter {
    employee_id: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    employee_id: Option<Uuid>,
    year: i32,
    month: u32,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    employee_id: Uuid,
    year: i32,
    month: u32,
    #[serde(flatten)]
    summary: MonthSummary,
}

async fn find_day(
    db: &DbPool,
    employee_id: Uuid,
    date: NaiveDate,
) -> ApiResult<Option<attendance::Model>> {
    Ok(attendance::Entity::find()
        .filter(attendance::Column::EmployeeId.eq(employee_id))
        .filter(attendance::Column::Date.eq(date))
        .one(db)
        .await?)
}

/// Opens today's record. Dates are UTC calendar days.
async fn clock_in(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Option<Json<ClockBody>>,
) -> ApiResult<ApiResponse<attendance::Model>> {
    let employee_id = current.employee_id()?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let date = today();
    if find_day(&state.db, employee_id, date).await?.is_some() {
        return Err(ApiError::bad_request("already clocked in today"));
    }
    let stamp = now();
    let created = attendance::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        date: Set(date),
        clock_in: Set(Some(stamp)),
        clock_out: Set(None),
        worked_minutes: Set(0),
        status: Set(attendance::Status::Absent),
        note: Set(optional_text("note", body.note, 500)?),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(%employee_id, %date, "clocked in");
    Ok(ApiResponse::created("clocked in", created))
}

async fn clock_out(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Option<Json<ClockBody>>,
) -> ApiResult<ApiResponse<attendance::Model>> {
    let employee_id = current.employee_id()?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let date = today();
    let record = find_day(&state.db, employee_id, date)
        .await?
        .ok_or_else(|| ApiError::bad_request("no clock-in recorded today"))?;
    if record.clock_out.is_some() {
        return Err(ApiError::bad_request("already clocked out today"));
    }
    let started = record
        .clock_in
        .ok_or_else(|| ApiError::bad_request("no clock-in recorded today"))?;
    let stamp = now();
    let minutes = worked_minutes(started, stamp)?;
    let note = optional_text("note", body.note, 500)?;

    let mut active: attendance::ActiveModel = record.into();
    active.clock_out = Set(Some(stamp));
    active.worked_minutes = Set(minutes);
    active.status = Set(stored_status(DayStatus::from_minutes(minutes)));
    if note.is_some() {
        active.note = Set(note);
    }
    active.updated_at = Set(stamp);
    let updated = active.update(&state.db).await?;
    info!(%employee_id, %date, minutes, status = ?updated.status, "clocked out");
    Ok(ApiResponse::ok("clocked out", updated))
}

/// Creates or replaces one employee-day. With both times the status is derived
/// from worked time unless given explicitly.
async fn upsert_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<ManualEntry>,
) -> ApiResult<ApiResponse<attendance::Model>> {
    current.require(keys::ATTENDANCE)?;
    find_or_404::<employee::Entity>(&state.db, body.employee_id, "employee").await?;
    if body.clock_out.is_some() && body.clock_in.is_none() {
        return Err(ApiError::bad_request("clock_out requires clock_in"));
    }
    let minutes = match (body.clock_in, body.clock_out) {
        (Some(start), Some(end)) => worked_minutes(start, end)?,
        _ => 0,
    };
    let status = match (body.status, body.clock_out) {
        (Some(status), _) => status,
        (None, Some(_)) => stored_status(DayStatus::from_minutes(minutes)),
        (None, None) => {
            return Err(ApiError::bad_request(
                "status is required without clock-in and clock-out times",
            ));
        }
    };
    let note = optional_text("note", body.note, 500)?;

    let stamp = now();
    let saved = match find_day(&state.db, body.employee_id, body.date).await? {
        Some(existing) => {
            let mut active: attendance::ActiveModel = existing.into();
            active.clock_in = Set(body.clock_in);
            active.clock_out = Set(body.clock_out);
            active.worked_minutes = Set(minutes);
            active.status = Set(status);
            active.note = Set(note);
            active.updated_at = Set(stamp);
            active.update(&state.db).await?
        }
        None => {
            attendance::ActiveModel {
                id: Set(Uuid::new_v4()),
                employee_id: Set(body.employee_id),
                date: Set(body.date),
                clock_in: Set(body.clock_in),
                clock_out: Set(body.clock_out),
                worked_minutes: Set(minutes),
                status: Set(status),
                note: Set(note),
                created_at: Set(stamp),
                updated_at: Set(stamp),
            }
            .insert(&state.db)
            .await?
        }
    };
    info!(employee_id = %body.employee_id, date = %body.date, by = %current.id(), "attendance recorded");
    Ok(ApiResponse::ok("attendance saved", saved))
}

async fn list_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<AttendanceFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<attendance::Model>>> {
    let window = DateWindow {
        from: filter.from,
        to: filter.to,
    };
    window.validate()?;
    let mut query = attendance::Entity::find().order_by_desc(attendance::Column::Date);
    if let Some(employee_id) = current.scope_employee(keys::ATTENDANCE, filter.employee_id)? {
        query = query.filter(attendance::Column::EmployeeId.eq(employee_id));
    }
    if let Some(from) = window.from {
        query = query.filter(attendance::Column::Date.gte(from));
    }
    if let Some(to) = window.to {
        query = query.filter(attendance::Column::Date.lte(to));
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    Ok(ApiResponse::ok(
        "attendance",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

/// Attendance of one employee within `[start, end]`.
pub async fn records_between(
    db: &DbPool,
    employee_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> ApiResult<Vec<attendance::Model>> {
    Ok(attendance::Entity::find()
        .filter(attendance::Column::EmployeeId.eq(employee_id))
        .filter(attendance::Column::Date.gte(start))
        .filter(attendance::Column::Date.lte(end))
        .order_by_asc(attendance::Column::Date)
        .all(db)
        .await?)
}

async fn month_summary(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<ApiResponse<SummaryResponse>> {
    let employee_id = match current.scope_employee(keys::ATTENDANCE, query.employee_id)? {
        Some(id) => id,
        None => current.employee_id()?,
    };
    let (start, end) = parse_period(query.year, query.month)?;
    let records = records_between(&state.db, employee_id, start, end).await?;
    let summary = MonthSummary::from_records(
        records
            .iter()
            .map(|r| (day_status(r.status), r.worked_minutes)),
    );
    Ok(ApiResponse::ok(
        "attendance summary",
        SummaryResponse {
            employee_id,
            year: query.year,
            month: query.month,
            summary,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_both_ways() {
        for status in [DayStatus::Present, DayStatus::HalfDay, DayStatus::Absent] {
            assert_eq!(day_status(stored_status(status)), status);
        }
    }

    #[test]
    fn manual_entry_accepts_offset_timestamps() {
        let entry: ManualEntry = serde_json::from_str(&format!(
            r#"{{"employee_id":"{}","date":"2024-06-03","clock_in":"2024-06-03T09:00:00+05:30","clock_out":"2024-06-03T13:30:00+05:30"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        let minutes = worked_minutes(entry.clock_in.unwrap(), entry.clock_out.unwrap()).unwrap();
        assert_eq!(stored_status(DayStatus::from_minutes(minutes)), attendance::Status::HalfDay);
    }
}

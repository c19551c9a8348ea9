use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use chrono::{NaiveDate, NaiveTime};
use entity::{employee, roster};
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use platform_db::DbPool;
use products_hr::leave::DateRange;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{DateWindow, PageQuery, find_or_404, now, optional_text, paginate},
};

const MAX_BULK_DAYS: i64 = 366;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roster", get(list_roster).post(create_entry))
        .route("/roster/bulk", post(bulk_create))
        .route("/roster/{id}", delete(delete_entry))
}

#[derive(Clone, Debug, Deserialize)]
struct Shift {
    shift_start: Option<NaiveTime>,
    shift_end: Option<NaiveTime>,
    #[serde(default)]
    is_off: bool,
    note: Option<String>,
}

impl Shift {
    fn validate(&self) -> ApiResult<()> {
        match (self.shift_start, self.shift_end) {
            (Some(start), Some(end)) if start >= end => {
                Err(ApiError::bad_request("shift_end must be after shift_start"))
            }
            (Some(_), None) | (None, Some(_)) => Err(ApiError::bad_request(
                "shift_start and shift_end must be given together",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateEntry {
    employee_id: Uuid,
    date: NaiveDate,
    #[serde(flatten)]
    shift: Shift,
}

#[derive(Debug, Deserialize)]
struct BulkCreate {
    employee_ids: Vec<Uuid>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(flatten)]
    shift: Shift,
}

#[derive(Debug, Serialize)]
struct BulkResult {
    created: usize,
    updated: usize,
}

#[derive(Debug, Default, Deserialize)]
struct RosterFilter {
    employee_id: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

/// Days within `period` on which the employee is rostered off.
pub async fn off_days(
    db: &DbPool,
    employee_id: Uuid,
    period: &DateRange,
) -> ApiResult<Vec<NaiveDate>> {
    let rows = roster::Entity::find()
        .filter(roster::Column::EmployeeId.eq(employee_id))
        .filter(roster::Column::IsOff.eq(true))
        .filter(roster::Column::Date.gte(period.start))
        .filter(roster::Column::Date.lte(period.end))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| r.date).collect())
}

fn new_row(employee_id: Uuid, date: NaiveDate, shift: &Shift, note: Option<String>) -> roster::ActiveModel {
    let stamp = now();
    roster::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        date: Set(date),
        shift_start: Set(shift.shift_start),
        shift_end: Set(shift.shift_end),
        is_off: Set(shift.is_off),
        note: Set(note),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
}

async fn create_entry(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateEntry>,
) -> ApiResult<ApiResponse<roster::Model>> {
    current.require(keys::ROSTER)?;
    body.shift.validate()?;
    find_or_404::<employee::Entity>(&state.db, body.employee_id, "employee").await?;
    let taken = roster::Entity::find()
        .filter(roster::Column::EmployeeId.eq(body.employee_id))
        .filter(roster::Column::Date.eq(body.date))
        .count(&state.db)
        .await?;
    if taken > 0 {
        return Err(ApiError::bad_request("employee is already rostered on that date"));
    }
    let note = optional_text("note", body.shift.note.clone(), 500)?;
    let created = new_row(body.employee_id, body.date, &body.shift, note)
        .insert(&state.db)
        .await?;
    info!(employee_id = %created.employee_id, date = %created.date, "roster entry created");
    Ok(ApiResponse::created("roster entry created", created))
}

/// Writes the same shift for every employee and day in the range, replacing
/// entries that already exist.
async fn bulk_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<BulkCreate>,
) -> ApiResult<ApiResponse<BulkResult>> {
    current.require(keys::ROSTER)?;
    body.shift.validate()?;
    let range = DateRange::new(body.start_date, body.end_date)?;
    if range.days() > MAX_BULK_DAYS {
        return Err(ApiError::bad_request(format!(
            "bulk roster covers at most {MAX_BULK_DAYS} days"
        )));
    }
    if body.employee_ids.is_empty() {
        return Err(ApiError::bad_request("employee_ids is required"));
    }
    for employee_id in &body.employee_ids {
        find_or_404::<employee::Entity>(&state.db, *employee_id, "employee").await?;
    }
    let note = optional_text("note", body.shift.note.clone(), 500)?;

    let mut result = BulkResult {
        created: 0,
        updated: 0,
    };
    for employee_id in &body.employee_ids {
        let existing: HashMap<NaiveDate, roster::Model> = roster::Entity::find()
            .filter(roster::Column::EmployeeId.eq(*employee_id))
            .filter(roster::Column::Date.gte(range.start))
            .filter(roster::Column::Date.lte(range.end))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|r| (r.date, r))
            .collect();
        for date in range.iter_days() {
            match existing.get(&date) {
                Some(row) => {
                    let mut active: roster::ActiveModel = row.clone().into();
                    active.shift_start = Set(body.shift.shift_start);
                    active.shift_end = Set(body.shift.shift_end);
                    active.is_off = Set(body.shift.is_off);
                    active.note = Set(note.clone());
                    active.updated_at = Set(now());
                    active.update(&state.db).await?;
                    result.updated += 1;
                }
                None => {
                    new_row(*employee_id, date, &body.shift, note.clone())
                        .insert(&state.db)
                        .await?;
                    result.created += 1;
                }
            }
        }
    }
    info!(
        employees = body.employee_ids.len(),
        created = result.created,
        updated = result.updated,
        "bulk roster written"
    );
    Ok(ApiResponse::created("roster saved", result))
}

async fn list_roster(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<RosterFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<roster::Model>>> {
    let window = DateWindow {
        from: filter.from,
        to: filter.to,
    };
    window.validate()?;
    let mut query = roster::Entity::find().order_by_asc(roster::Column::Date);
    if let Some(employee_id) = current.scope_employee(keys::ROSTER, filter.employee_id)? {
        query = query.filter(roster::Column::EmployeeId.eq(employee_id));
    }
    if let Some(from) = window.from {
        query = query.filter(roster::Column::Date.gte(from));
    }
    if let Some(to) = window.to {
        query = query.filter(roster::Column::Date.lte(to));
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    Ok(ApiResponse::ok(
        "roster",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

async fn delete_entry(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::ROSTER)?;
    find_or_404::<roster::Entity>(&state.db, id, "roster entry").await?;
    roster::Entity::delete_by_id(id).exec(&state.db).await?;
    Ok(ApiResponse::message("roster entry deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start: Option<(u32, u32)>, end: Option<(u32, u32)>) -> Shift {
        let at = |(h, m): (u32, u32)| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        Shift {
            shift_start: start.map(at),
            shift_end: end.map(at),
            is_off: false,
            note: None,
        }
    }

    #[test]
    fn shifts_need_both_ends_in_order() {
        assert!(shift(Some((9, 0)), Some((17, 0))).validate().is_ok());
        assert!(shift(None, None).validate().is_ok());
        assert!(shift(Some((17, 0)), Some((9, 0))).validate().is_err());
        assert!(shift(Some((9, 0)), None).validate().is_err());
    }

    #[test]
    fn bulk_body_flattens_the_shift() {
        let body: BulkCreate = serde_json::from_str(&format!(
            r#"{{"employee_ids":["{}"],"start_date":"2024-06-01","end_date":"2024-06-07","is_off":true}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert!(body.shift.is_off);
        assert_eq!(body.shift.shift_start, None);
    }
}

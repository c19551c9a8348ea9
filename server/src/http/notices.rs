use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::NaiveDate;
use entity::{department, employee, notice};
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{PageQuery, double_option, find_or_404, now, paginate, required_text, today},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notices", get(list_notices).post(create_notice))
        .route("/notices/active", get(active_notices))
        .route(
            "/notices/{id}",
            get(get_notice).put(update_notice).delete(delete_notice),
        )
}

#[derive(Debug, Deserialize)]
struct CreateNotice {
    title: String,
    body: String,
    #[serde(default = "default_audience")]
    audience: notice::Audience,
    department_id: Option<Uuid>,
    publish_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pinned: bool,
}

fn default_audience() -> notice::Audience {
    notice::Audience::All
}

#[derive(Debug, Deserialize)]
struct UpdateNotice {
    title: Option<String>,
    body: Option<String>,
    audience: Option<notice::Audience>,
    #[serde(default, deserialize_with = "double_option")]
    department_id: Option<Option<Uuid>>,
    publish_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    expiry_date: Option<Option<NaiveDate>>,
    pinned: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct NoticeFilter {
    audience: Option<notice::Audience>,
    department_id: Option<Uuid>,
}

/// Department notices need a department; company-wide ones must not name one.
fn check_audience(audience: notice::Audience, department_id: Option<Uuid>) -> ApiResult<()> {
    match (audience, department_id) {
        (notice::Audience::Department, None) => Err(ApiError::bad_request(
            "department_id is required for department notices",
        )),
        (notice::Audience::All, Some(_)) => Err(ApiError::bad_request(
            "company-wide notices cannot target a department",
        )),
        _ => Ok(()),
    }
}

fn check_dates(publish: NaiveDate, expiry: Option<NaiveDate>) -> ApiResult<()> {
    if expiry.is_some_and(|expiry| expiry < publish) {
        return Err(ApiError::bad_request("expiry_date must not precede publish_date"));
    }
    Ok(())
}

async fn list_notices(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<NoticeFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<notice::Model>>> {
    current.require(keys::NOTICES)?;
    let mut query = notice::Entity::find()
        .order_by_desc(notice::Column::Pinned)
        .order_by_desc(notice::Column::PublishDate);
    if let Some(audience) = filter.audience {
        query = query.filter(notice::Column::Audience.eq(audience));
    }
    if let Some(department_id) = filter.department_id {
        query = query.filter(notice::Column::DepartmentId.eq(department_id));
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    Ok(ApiResponse::ok(
        "notices",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

/// Published, unexpired notices for everyone plus those for the caller's
/// department.
async fn active_notices(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<notice::Model>>> {
    let department_id = match current.user.employee_id {
        Some(id) => employee::Entity::find_by_id(id)
            .one(&state.db)
            .await?
            .and_then(|e| e.department_id),
        None => None,
    };
    let day = today();
    let mut audience = Condition::any().add(notice::Column::Audience.eq(notice::Audience::All));
    if let Some(department_id) = department_id {
        audience = audience.add(
            Condition::all()
                .add(notice::Column::Audience.eq(notice::Audience::Department))
                .add(notice::Column::DepartmentId.eq(department_id)),
        );
    }
    let rows = notice::Entity::find()
        .filter(notice::Column::PublishDate.lte(day))
        .filter(
            Condition::any()
                .add(notice::Column::ExpiryDate.is_null())
                .add(notice::Column::ExpiryDate.gte(day)),
        )
        .filter(audience)
        .order_by_desc(notice::Column::Pinned)
        .order_by_desc(notice::Column::PublishDate)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("active notices", rows))
}

async fn get_notice(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<notice::Model>> {
    let row = find_or_404::<notice::Entity>(&state.db, id, "notice").await?;
    Ok(ApiResponse::ok("notice", row))
}

async fn create_notice(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateNotice>,
) -> ApiResult<ApiResponse<notice::Model>> {
    current.require(keys::NOTICES)?;
    check_audience(body.audience, body.department_id)?;
    if let Some(department_id) = body.department_id {
        find_or_404::<department::Entity>(&state.db, department_id, "department").await?;
    }
    let publish_date = body.publish_date.unwrap_or_else(today);
    check_dates(publish_date, body.expiry_date)?;
    let stamp = now();
    let created = notice::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(required_text("title", &body.title, 200)?),
        body: Set(required_text("body", &body.body, 10_000)?),
        audience: Set(body.audience),
        department_id: Set(body.department_id),
        publish_date: Set(publish_date),
        expiry_date: Set(body.expiry_date),
        pinned: Set(body.pinned),
        created_by: Set(Some(current.id())),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(notice_id = %created.id, audience = ?created.audience, "notice published");
    Ok(ApiResponse::created("notice created", created))
}

async fn update_notice(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNotice>,
) -> ApiResult<ApiResponse<notice::Model>> {
    current.require(keys::NOTICES)?;
    let existing = find_or_404::<notice::Entity>(&state.db, id, "notice").await?;
    let audience = body.audience.unwrap_or(existing.audience);
    let department_id = body.department_id.unwrap_or(existing.department_id);
    check_audience(audience, department_id)?;
    if department_id != existing.department_id {
        if let Some(department_id) = department_id {
            find_or_404::<department::Entity>(&state.db, department_id, "department").await?;
        }
    }
    let publish_date = body.publish_date.unwrap_or(existing.publish_date);
    let expiry_date = body.expiry_date.unwrap_or(existing.expiry_date);
    check_dates(publish_date, expiry_date)?;

    let mut active: notice::ActiveModel = existing.into();
    if let Some(title) = &body.title {
        active.title = Set(required_text("title", title, 200)?);
    }
    if let Some(text) = &body.body {
        active.body = Set(required_text("body", text, 10_000)?);
    }
    if let Some(pinned) = body.pinned {
        active.pinned = Set(pinned);
    }
    active.audience = Set(audience);
    active.department_id = Set(department_id);
    active.publish_date = Set(publish_date);
    active.expiry_date = Set(expiry_date);
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    Ok(ApiResponse::ok("notice updated", updated))
}

async fn delete_notice(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::NOTICES)?;
    find_or_404::<notice::Entity>(&state.db, id, "notice").await?;
    notice::Entity::delete_by_id(id).exec(&state.db).await?;
    info!(notice_id = %id, "notice deleted");
    Ok(ApiResponse::message("notice deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_and_department_must_agree() {
        assert!(check_audience(notice::Audience::All, None).is_ok());
        assert!(check_audience(notice::Audience::Department, Some(Uuid::new_v4())).is_ok());
        assert!(check_audience(notice::Audience::Department, None).is_err());
        assert!(check_audience(notice::Audience::All, Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn expiry_cannot_precede_publication() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        assert!(check_dates(day(10), Some(day(10))).is_ok());
        assert!(check_dates(day(10), None).is_ok());
        assert!(check_dates(day(10), Some(day(9))).is_err());
    }
}

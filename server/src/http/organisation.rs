//! Departments, designations and the static country list.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use entity::{department, designation, employee};
use platform_api::{ApiError, ApiResponse, ApiResult};
use platform_db::DbPool;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{double_option, ensure_ref, find_or_404, now, optional_text, required_text},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/departments", get(list_departments).post(create_department))
        .route(
            "/departments/{id}",
            get(get_department)
                .put(update_department)
                .delete(delete_department),
        )
        .route(
            "/designations",
            get(list_designations).post(create_designation),
        )
        .route(
            "/designations/{id}",
            get(get_designation)
                .put(update_designation)
                .delete(delete_designation),
        )
        .route("/countries", get(list_countries))
}

#[derive(Debug, Deserialize)]
struct DepartmentBody {
    name: String,
    code: Option<String>,
    description: Option<String>,
    head_employee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct DepartmentPatch {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    head_employee_id: Option<Option<Uuid>>,
}

async fn list_departments(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<department::Model>>> {
    let rows = department::Entity::find()
        .order_by_asc(department::Column::Name)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("departments", rows))
}

async fn get_department(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<department::Model>> {
    let row = find_or_404::<department::Entity>(&state.db, id, "department").await?;
    Ok(ApiResponse::ok("department", row))
}

async fn create_department(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<DepartmentBody>,
) -> ApiResult<ApiResponse<department::Model>> {
    current.require(keys::DEPARTMENTS)?;
    let name = required_text("name", &body.name, 120)?;
    ensure_department_name_free(&state.db, &name, None).await?;
    ensure_ref::<employee::Entity>(&state.db, body.head_employee_id, "head employee").await?;
    let stamp = now();
    let created = department::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        code: Set(optional_text("code", body.code, 32)?),
        description: Set(optional_text("description", body.description, 1000)?),
        head_employee_id: Set(body.head_employee_id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(department_id = %created.id, "department created");
    Ok(ApiResponse::created("department created", created))
}

async fn update_department(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DepartmentPatch>,
) -> ApiResult<ApiResponse<department::Model>> {
    current.require(keys::DEPARTMENTS)?;
    let existing = find_or_404::<department::Entity>(&state.db, id, "department").await?;
    let mut active: department::ActiveModel = existing.into();
    if let Some(name) = &body.name {
        let name = required_text("name", name, 120)?;
        ensure_department_name_free(&state.db, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(code) = body.code {
        active.code = Set(optional_text("code", code, 32)?);
    }
    if let Some(description) = body.description {
        active.description = Set(optional_text("description", description, 1000)?);
    }
    if let Some(head) = body.head_employee_id {
        ensure_ref::<employee::Entity>(&state.db, head, "head employee").await?;
        active.head_employee_id = Set(head);
    }
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    Ok(ApiResponse::ok("department updated", updated))
}

async fn delete_department(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::DEPARTMENTS)?;
    find_or_404::<department::Entity>(&state.db, id, "department").await?;
    let staffed = employee::Entity::find()
        .filter(employee::Column::DepartmentId.eq(id))
        .count(&state.db)
        .await?;
    if staffed > 0 {
        return Err(ApiError::bad_request("department still has employees"));
    }
    department::Entity::delete_by_id(id).exec(&state.db).await?;
    info!(department_id = %id, "department deleted");
    Ok(ApiResponse::message("department deleted"))
}

async fn ensure_department_name_free(
    db: &DbPool,
    name: &str,
    except: Option<Uuid>,
) -> ApiResult<()> {
    let mut query = department::Entity::find().filter(department::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(department::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request("department name already exists"));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct DesignationFilter {
    department_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct DesignationBody {
    title: String,
    department_id: Uuid,
    #[serde(default = "default_level")]
    level: i32,
    description: Option<String>,
}

fn default_level() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct DesignationPatch {
    title: Option<String>,
    department_id: Option<Uuid>,
    level: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
}

async fn list_designations(
    State(state): State<AppState>,
    _current: CurrentUser,
    Query(filter): Query<DesignationFilter>,
) -> ApiResult<ApiResponse<Vec<designation::Model>>> {
    let mut query = designation::Entity::find()
        .order_by_asc(designation::Column::Level)
        .order_by_asc(designation::Column::Title);
    if let Some(department_id) = filter.department_id {
        query = query.filter(designation::Column::DepartmentId.eq(department_id));
    }
    Ok(ApiResponse::ok("designations", query.all(&state.db).await?))
}

async fn get_designation(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<designation::Model>> {
    let row = find_or_404::<designation::Entity>(&state.db, id, "designation").await?;
    Ok(ApiResponse::ok("designation", row))
}

async fn create_designation(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<DesignationBody>,
) -> ApiResult<ApiResponse<designation::Model>> {
    current.require(keys::DESIGNATIONS)?;
    let title = required_text("title", &body.title, 120)?;
    find_or_404::<department::Entity>(&state.db, body.department_id, "department").await?;
    ensure_level(body.level)?;
    ensure_title_free(&state.db, body.department_id, &title, None).await?;
    let stamp = now();
    let created = designation::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        department_id: Set(body.department_id),
        level: Set(body.level),
        description: Set(optional_text("description", body.description, 1000)?),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(designation_id = %created.id, "designation created");
    Ok(ApiResponse::created("designation created", created))
}

async fn update_designation(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DesignationPatch>,
) -> ApiResult<ApiResponse<designation::Model>> {
    current.require(keys::DESIGNATIONS)?;
    let existing = find_or_404::<designation::Entity>(&state.db, id, "designation").await?;
    let department_id = body.department_id.unwrap_or(existing.department_id);
    if department_id != existing.department_id {
        find_or_404::<department::Entity>(&state.db, department_id, "department").await?;
        let assigned = employee::Entity::find()
            .filter(employee::Column::DesignationId.eq(id))
            .count(&state.db)
            .await?;
        if assigned > 0 {
            return Err(ApiError::bad_request(
                "cannot move a designation that is assigned to employees",
            ));
        }
    }
    let title = match &body.title {
        Some(title) => required_text("title", title, 120)?,
        None => existing.title.clone(),
    };
    ensure_title_free(&state.db, department_id, &title, Some(id)).await?;

    let mut active: designation::ActiveModel = existing.into();
    active.title = Set(title);
    active.department_id = Set(department_id);
    if let Some(level) = body.level {
        ensure_level(level)?;
        active.level = Set(level);
    }
    if let Some(description) = body.description {
        active.description = Set(optional_text("description", description, 1000)?);
    }
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    Ok(ApiResponse::ok("designation updated", updated))
}

async fn delete_designation(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::DESIGNATIONS)?;
    find_or_404::<designation::Entity>(&state.db, id, "designation").await?;
    designation::Entity::delete_by_id(id).exec(&state.db).await?;
    info!(designation_id = %id, "designation deleted");
    Ok(ApiResponse::message("designation deleted"))
}

fn ensure_level(level: i32) -> ApiResult<()> {
    if level < 1 {
        return Err(ApiError::bad_request("level must be at least 1"));
    }
    Ok(())
}

async fn ensure_title_free(
    db: &DbPool,
    department_id: Uuid,
    title: &str,
    except: Option<Uuid>,
) -> ApiResult<()> {
    let mut query = designation::Entity::find()
        .filter(designation::Column::DepartmentId.eq(department_id))
        .filter(designation::Column::Title.eq(title));
    if let Some(id) = except {
        query = query.filter(designation::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request(
            "designation title already exists in this department",
        ));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Country {
    pub code: &'static str,
    pub name: &'static str,
    pub currency: &'static str,
}

const fn country(code: &'static str, name: &'static str, currency: &'static str) -> Country {
    Country {
        code,
        name,
        currency,
    }
}

/// ISO 3166-1 alpha-2 codes with their ISO 4217 currency.
pub const COUNTRIES: &[Country] = &[
    country("AE", "United Arab Emirates", "AED"),
    country("AR", "Argentina", "ARS"),
    country("AU", "Australia", "AUD"),
    country("BD", "Bangladesh", "BDT"),
    country("BR", "Brazil", "BRL"),
    country("CA", "Canada", "CAD"),
    country("CH", "Switzerland", "CHF"),
    country("CN", "China", "CNY"),
    country("DE", "Germany", "EUR"),
    country("DK", "Denmark", "DKK"),
    country("EG", "Egypt", "EGP"),
    country("ES", "Spain", "EUR"),
    country("FR", "France", "EUR"),
    country("GB", "United Kingdom", "GBP"),
    country("ID", "Indonesia", "IDR"),
    country("IE", "Ireland", "EUR"),
    country("IN", "India", "INR"),
    country("IT", "Italy", "EUR"),
    country("JP", "Japan", "JPY"),
    country("KE", "Kenya", "KES"),
    country("KR", "South Korea", "KRW"),
    country("LK", "Sri Lanka", "LKR"),
    country("MX", "Mexico", "MXN"),
    country("MY", "Malaysia", "MYR"),
    country("NG", "Nigeria", "NGN"),
    country("NL", "Netherlands", "EUR"),
    country("NO", "Norway", "NOK"),
    country("NP", "Nepal", "NPR"),
    country("NZ", "New Zealand", "NZD"),
    country("PH", "Philippines", "PHP"),
    country("PK", "Pakistan", "PKR"),
    country("PL", "Poland", "PLN"),
    country("PT", "Portugal", "EUR"),
    country("SA", "Saudi Arabia", "SAR"),
    country("SE", "Sweden", "SEK"),
    country("SG", "Singapore", "SGD"),
    country("TH", "Thailand", "THB"),
    country("TR", "Turkey", "TRY"),
    country("US", "United States", "USD"),
    country("VN", "Vietnam", "VND"),
    country("ZA", "South Africa", "ZAR"),
];

pub fn find_country(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

async fn list_countries() -> ApiResponse<&'static [Country]> {
    ApiResponse::ok("countries", COUNTRIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countries_are_sorted_and_unique() {
        for pair in COUNTRIES.windows(2) {
            assert!(pair[0].code < pair[1].code, "{} before {}", pair[0].code, pair[1].code);
        }
        assert_eq!(find_country("in").map(|c| c.currency), Some("INR"));
        assert!(find_country("XX").is_none());
    }
}

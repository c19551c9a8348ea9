use std::collections::{HashMap, HashSet};

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use entity::{assignment_history, department, designation, employee};
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use platform_db::DbPool;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{
        PageQuery, double_option, find_or_404, normalize_email, now, optional_text, paginate,
        required_text,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/{id}",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/employees/{id}/history", get(assignment_history))
        .route("/employees/{id}/profile-picture", post(upload_picture))
}

#[derive(Clone, Debug, Serialize)]
pub struct ManagerSummary {
    pub id: Uuid,
    pub employee_code: String,
    pub name: String,
}

impl From<&employee::Model> for ManagerSummary {
    fn from(model: &employee::Model) -> Self {
        Self {
            id: model.id,
            employee_code: model.employee_code.clone(),
            name: model.full_name(),
        }
    }
}

/// An employee with its references resolved.
#[derive(Clone, Debug, Serialize)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: employee::Model,
    pub department: Option<department::Model>,
    pub designation: Option<designation::Model>,
    pub manager: Option<ManagerSummary>,
}

#[derive(Debug, Default, Deserialize)]
struct EmployeeFilter {
    department_id: Option<Uuid>,
    designation_id: Option<Uuid>,
    manager_id: Option<Uuid>,
    status: Option<employee::Status>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateEmployee {
    employee_code: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
    joining_date: NaiveDate,
    department_id: Option<Uuid>,
    designation_id: Option<Uuid>,
    manager_id: Option<Uuid>,
    #[serde(default)]
    gross_salary_cents: i64,
    status: Option<employee::Status>,
    address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateEmployee {
    employee_code: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    date_of_birth: Option<Option<NaiveDate>>,
    joining_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    department_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    designation_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    manager_id: Option<Option<Uuid>>,
    gross_salary_cents: Option<i64>,
    status: Option<employee::Status>,
    #[serde(default, deserialize_with = "double_option")]
    address: Option<Option<String>>,
}

/// Resolves department, designation and manager for a batch of employees
/// with one query per reference table.
pub async fn populate(db: &DbPool, employees: Vec<employee::Model>) -> ApiResult<Vec<EmployeeView>> {
    let department_ids: HashSet<Uuid> = employees.iter().filter_map(|e| e.department_id).collect();
    let designation_ids: HashSet<Uuid> =
        employees.iter().filter_map(|e| e.designation_id).collect();
    let manager_ids: HashSet<Uuid> = employees.iter().filter_map(|e| e.manager_id).collect();

    let departments: HashMap<Uuid, department::Model> = if department_ids.is_empty() {
        HashMap::new()
    } else {
        department::Entity::find()
            .filter(department::Column::Id.is_in(department_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect()
    };
    let designations: HashMap<Uuid, designation::Model> = if designation_ids.is_empty() {
        HashMap::new()
    } else {
        designation::Entity::find()
            .filter(designation::Column::Id.is_in(designation_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect()
    };
    let managers: HashMap<Uuid, ManagerSummary> = if manager_ids.is_empty() {
        HashMap::new()
    } else {
        employee::Entity::find()
            .filter(employee::Column::Id.is_in(manager_ids))
            .all(db)
            .await?
            .iter()
            .map(|m| (m.id, ManagerSummary::from(m)))
            .collect()
    };

    Ok(employees
        .into_iter()
        .map(|employee| EmployeeView {
            department: employee.department_id.and_then(|id| departments.get(&id).cloned()),
            designation: employee.designation_id.and_then(|id| designations.get(&id).cloned()),
            manager: employee.manager_id.and_then(|id| managers.get(&id).cloned()),
            employee,
        })
        .collect())
}

async fn populate_one(db: &DbPool, employee: employee::Model) -> ApiResult<EmployeeView> {
    populate(db, vec![employee])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("employee"))
}

async fn list_employees(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<EmployeeFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<EmployeeView>>> {
    current.require(keys::EMPLOYEES)?;
    let mut query = employee::Entity::find().order_by_asc(employee::Column::EmployeeCode);
    if let Some(id) = filter.department_id {
        query = query.filter(employee::Column::DepartmentId.eq(id));
    }
    if let Some(id) = filter.designation_id {
        query = query.filter(employee::Column::DesignationId.eq(id));
    }
    if let Some(id) = filter.manager_id {
        query = query.filter(employee::Column::ManagerId.eq(id));
    }
    if let Some(status) = filter.status {
        query = query.filter(employee::Column::Status.eq(status));
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(employee::Column::EmployeeCode.contains(q))
                .add(employee::Column::FirstName.contains(q))
                .add(employee::Column::LastName.contains(q))
                .add(employee::Column::Email.contains(q.to_lowercase())),
        );
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    let items = populate(&state.db, items).await?;
    Ok(ApiResponse::ok(
        "employees",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

async fn get_employee(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<EmployeeView>> {
    current.scope_employee(keys::EMPLOYEES, Some(id))?;
    let employee = find_or_404::<employee::Entity>(&state.db, id, "employee").await?;
    Ok(ApiResponse::ok("employee", populate_one(&state.db, employee).await?))
}

async fn create_employee(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateEmployee>,
) -> ApiResult<ApiResponse<EmployeeView>> {
    current.require(keys::EMPLOYEES)?;
    let code = required_text("employee_code", &body.employee_code, 32)?;
    ensure_code_free(&state.db, &code, None).await?;
    let email = normalize_email(&body.email)?;
    ensure_email_free(&state.db, &email, None).await?;
    ensure_salary(body.gross_salary_cents)?;
    let department_id =
        resolve_placement(&state.db, body.department_id, body.designation_id).await?;
    if let Some(manager) = body.manager_id {
        find_or_404::<employee::Entity>(&state.db, manager, "manager").await?;
    }

    let stamp = now();
    let created = employee::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_code: Set(code),
        first_name: Set(required_text("first_name", &body.first_name, 80)?),
        last_name: Set(required_text("last_name", &body.last_name, 80)?),
        email: Set(email),
        phone: Set(optional_text("phone", body.phone, 32)?),
        date_of_birth: Set(body.date_of_birth),
        joining_date: Set(body.joining_date),
        department_id: Set(department_id),
        designation_id: Set(body.designation_id),
        manager_id: Set(body.manager_id),
        gross_salary_cents: Set(body.gross_salary_cents),
        status: Set(body.status.unwrap_or(employee::Status::Active)),
        profile_picture: Set(None),
        address: Set(optional_text("address", body.address, 500)?),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(employee_id = %created.id, code = %created.employee_code, "employee created");
    Ok(ApiResponse::created(
        "employee created",
        populate_one(&state.db, created).await?,
    ))
}

async fn update_employee(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEmployee>,
) -> ApiResult<ApiResponse<EmployeeView>> {
    current.require(keys::EMPLOYEES)?;
    let existing = find_or_404::<employee::Entity>(&state.db, id, "employee").await?;
    let mut active: employee::ActiveModel = existing.clone().into();

    if let Some(code) = &body.employee_code {
        let code = required_text("employee_code", code, 32)?;
        ensure_code_free(&state.db, &code, Some(id)).await?;
        active.employee_code = Set(code);
    }
    if let Some(email) = &body.email {
        let email = normalize_email(email)?;
        ensure_email_free(&state.db, &email, Some(id)).await?;
        active.email = Set(email);
    }
    if let Some(first_name) = &body.first_name {
        active.first_name = Set(required_text("first_name", first_name, 80)?);
    }
    if let Some(last_name) = &body.last_name {
        active.last_name = Set(required_text("last_name", last_name, 80)?);
    }
    if let Some(phone) = body.phone {
        active.phone = Set(optional_text("phone", phone, 32)?);
    }
    if let Some(date_of_birth) = body.date_of_birth {
        active.date_of_birth = Set(date_of_birth);
    }
    if let Some(joining_date) = body.joining_date {
        active.joining_date = Set(joining_date);
    }
    if let Some(gross) = body.gross_salary_cents {
        ensure_salary(gross)?;
        active.gross_salary_cents = Set(gross);
    }
    if let Some(status) = body.status {
        active.status = Set(status);
    }
    if let Some(address) = body.address {
        active.address = Set(optional_text("address", address, 500)?);
    }

    let designation_id = body.designation_id.unwrap_or(existing.designation_id);
    let requested_department = body.department_id.unwrap_or(existing.department_id);
    let department_id = if body.designation_id.is_some() || body.department_id.is_some() {
        resolve_placement(&state.db, requested_department, designation_id).await?
    } else {
        existing.department_id
    };
    let manager_id = body.manager_id.unwrap_or(existing.manager_id);
    if manager_id != existing.manager_id {
        if let Some(manager) = manager_id {
            ensure_no_reporting_cycle(&state.db, id, manager).await?;
        }
    }
    active.department_id = Set(department_id);
    active.designation_id = Set(designation_id);
    active.manager_id = Set(manager_id);
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;

    let changes = [
        (
            assignment_history::Field::Department,
            existing.department_id,
            updated.department_id,
        ),
        (
            assignment_history::Field::Designation,
            existing.designation_id,
            updated.designation_id,
        ),
        (
            assignment_history::Field::Manager,
            existing.manager_id,
            updated.manager_id,
        ),
    ];
    let stamp = now();
    for (field, previous, next) in changes {
        if previous == next {
            continue;
        }
        assignment_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(id),
            field: Set(field),
            previous_value: Set(previous),
            new_value: Set(next),
            changed_by: Set(Some(current.id())),
            changed_at: Set(stamp),
        }
        .insert(&state.db)
        .await?;
        info!(employee_id = %id, ?field, "assignment changed");
    }

    Ok(ApiResponse::ok(
        "employee updated",
        populate_one(&state.db, updated).await?,
    ))
}

async fn delete_employee(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::EMPLOYEES)?;
    let existing = find_or_404::<employee::Entity>(&state.db, id, "employee").await?;
    employee::Entity::delete_by_id(id).exec(&state.db).await?;
    if let Some(picture) = existing.profile_picture {
        let path = state.config.upload_dir.join(&picture);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!(%err, path = %path.display(), "failed to remove profile picture");
        }
    }
    info!(employee_id = %id, "employee deleted");
    Ok(ApiResponse::message("employee deleted"))
}

async fn assignment_history(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Vec<assignment_history::Model>>> {
    current.scope_employee(keys::EMPLOYEES, Some(id))?;
    find_or_404::<employee::Entity>(&state.db, id, "employee").await?;
    let rows = assignment_history::Entity::find()
        .filter(assignment_history::Column::EmployeeId.eq(id))
        .order_by_desc(assignment_history::Column::ChangedAt)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("assignment history", rows))
}

async fn upload_picture(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<ApiResponse<EmployeeView>> {
    current.scope_employee(keys::EMPLOYEES, Some(id))?;
    let existing = find_or_404::<employee::Entity>(&state.db, id, "employee").await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let extension = field
            .content_type()
            .and_then(image_extension)
            .ok_or_else(|| ApiError::bad_request("file must be a png, jpeg, gif or webp image"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read upload: {err}")))?;
        upload = Some((extension, bytes));
        break;
    }
    let (extension, bytes) = upload.ok_or_else(|| ApiError::bad_request("file is required"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("file is empty"));
    }
    if bytes.len() > state.config.max_upload_bytes {
        return Err(ApiError::bad_request(format!(
            "file exceeds {} bytes",
            state.config.max_upload_bytes
        )));
    }

    let relative = format!("employees/{id}.{extension}");
    let target = state.config.upload_dir.join(&relative);
    if let Some(dir) = target.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(ApiError::internal)?;
    }
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(ApiError::internal)?;
    if let Some(previous) = existing.profile_picture.as_ref().filter(|p| **p != relative) {
        let path = state.config.upload_dir.join(previous);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!(%err, path = %path.display(), "failed to remove previous profile picture");
        }
    }

    let mut active: employee::ActiveModel = existing.into();
    active.profile_picture = Set(Some(relative));
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    info!(employee_id = %id, bytes = bytes.len(), "profile picture stored");
    Ok(ApiResponse::ok(
        "profile picture uploaded",
        populate_one(&state.db, updated).await?,
    ))
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn ensure_salary(gross_cents: i64) -> ApiResult<()> {
    products_hr::payroll::check_gross(gross_cents)?;
    Ok(())
}

/// Checks the references and returns the department to store. A designation
/// given alone pins the employee to its department; given together they must
/// agree.
async fn resolve_placement(
    db: &DbPool,
    department_id: Option<Uuid>,
    designation_id: Option<Uuid>,
) -> ApiResult<Option<Uuid>> {
    if let Some(id) = department_id {
        find_or_404::<department::Entity>(db, id, "department").await?;
    }
    let Some(designation_id) = designation_id else {
        return Ok(department_id);
    };
    let designation = find_or_404::<designation::Entity>(db, designation_id, "designation").await?;
    match department_id {
        Some(department) if department != designation.department_id => Err(
            ApiError::bad_request("designation does not belong to the department"),
        ),
        _ => Ok(Some(designation.department_id)),
    }
}

/// Walks up from `manager`; reaching `employee` means the new line would
/// loop back on itself.
async fn ensure_no_reporting_cycle(db: &DbPool, employee: Uuid, manager: Uuid) -> ApiResult<()> {
    if employee == manager {
        return Err(ApiError::bad_request("an employee cannot manage themself"));
    }
    let mut seen = HashSet::from([employee]);
    let mut cursor = Some(manager);
    while let Some(current) = cursor {
        if !seen.insert(current) {
            return Err(ApiError::bad_request("manager change would create a reporting cycle"));
        }
        let row = find_or_404::<employee::Entity>(db, current, "manager").await?;
        cursor = row.manager_id;
    }
    Ok(())
}

async fn ensure_code_free(db: &DbPool, code: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = employee::Entity::find().filter(employee::Column::EmployeeCode.eq(code));
    if let Some(id) = except {
        query = query.filter(employee::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request(format!("employee code {code} already exists")));
    }
    Ok(())
}

async fn ensure_email_free(db: &DbPool, email: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = employee::Entity::find().filter(employee::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(employee::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request("employee email already exists"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_image_types_are_accepted() {
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("application/pdf"), None);
    }

    #[test]
    fn patch_distinguishes_clearing_a_manager() {
        let body: UpdateEmployee = serde_json::from_str(r#"{"manager_id": null}"#).unwrap();
        assert_eq!(body.manager_id, Some(None));
        assert!(body.department_id.is_none());
    }

    #[test]
    fn salaries_must_be_within_bounds() {
        assert!(ensure_salary(0).is_ok());
        assert!(matches!(ensure_salary(-1), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            ensure_salary(1_000_000_000_000_000_000),
            Err(ApiError::BadRequest(_))
        ));
    }
}

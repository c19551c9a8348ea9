use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use entity::{employee, user};
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use platform_authn::{ensure_password_strength, hash_password};
use platform_db::DbPool;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    roles::{can_manage, load_roles},
    support::{PageQuery, double_option, find_or_404, normalize_email, now, paginate, required_text},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[derive(Debug, Default, Deserialize)]
struct UserFilter {
    role_id: Option<Uuid>,
    is_active: Option<bool>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    email: String,
    display_name: String,
    password: String,
    role_id: Option<Uuid>,
    employee_id: Option<Uuid>,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct UpdateUser {
    email: Option<String>,
    display_name: Option<String>,
    password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    role_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    employee_id: Option<Option<Uuid>>,
    is_active: Option<bool>,
}

async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<UserFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<user::Model>>> {
    current.require(keys::USERS)?;
    let mut query = user::Entity::find().order_by_asc(user::Column::Email);
    if let Some(role_id) = filter.role_id {
        query = query.filter(user::Column::RoleId.eq(role_id));
    }
    if let Some(is_active) = filter.is_active {
        query = query.filter(user::Column::IsActive.eq(is_active));
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(user::Column::Email.contains(q.to_lowercase()))
                .add(user::Column::DisplayName.contains(q)),
        );
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    Ok(ApiResponse::ok(
        "users",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

async fn get_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<user::Model>> {
    if id != current.id() {
        current.require(keys::USERS)?;
    }
    let account = find_or_404::<user::Entity>(&state.db, id, "user").await?;
    Ok(ApiResponse::ok("user", account))
}

async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateUser>,
) -> ApiResult<ApiResponse<user::Model>> {
    current.require(keys::USERS)?;
    let email = normalize_email(&body.email)?;
    ensure_email_free(&state.db, &email, None).await?;
    let display_name = required_text("display_name", &body.display_name, 120)?;
    ensure_password_strength(&body.password).map_err(|err| ApiError::bad_request(err.to_string()))?;
    if let Some(role_id) = body.role_id {
        ensure_assignable(&state.db, &current, role_id).await?;
    }
    if let Some(employee_id) = body.employee_id {
        ensure_employee_linkable(&state.db, employee_id, None).await?;
    }
    let password_hash = hash_password(&body.password).map_err(ApiError::internal)?;

    let stamp = now();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        display_name: Set(display_name),
        password_hash: Set(password_hash),
        role_id: Set(body.role_id),
        employee_id: Set(body.employee_id),
        is_active: Set(body.is_active),
        last_login_at: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(user_id = %created.id, role_id = ?created.role_id, "user created");
    Ok(ApiResponse::created("user created", created))
}

async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUser>,
) -> ApiResult<ApiResponse<user::Model>> {
    current.require(keys::USERS)?;
    let existing = find_or_404::<user::Entity>(&state.db, id, "user").await?;
    if id != current.id() {
        if let Some(role_id) = existing.role_id {
            ensure_assignable(&state.db, &current, role_id).await?;
        }
    }
    let mut active: user::ActiveModel = existing.clone().into();

    if let Some(email) = &body.email {
        let email = normalize_email(email)?;
        ensure_email_free(&state.db, &email, Some(id)).await?;
        active.email = Set(email);
    }
    if let Some(display_name) = &body.display_name {
        active.display_name = Set(required_text("display_name", display_name, 120)?);
    }
    if let Some(password) = &body.password {
        ensure_password_strength(password).map_err(|err| ApiError::bad_request(err.to_string()))?;
        active.password_hash = Set(hash_password(password).map_err(ApiError::internal)?);
    }
    if let Some(role_id) = body.role_id {
        if role_id != existing.role_id {
            if id == current.id() {
                return Err(ApiError::forbidden("cannot change your own role"));
            }
            if let Some(role_id) = role_id {
                ensure_assignable(&state.db, &current, role_id).await?;
            }
            active.role_id = Set(role_id);
        }
    }
    if let Some(employee_id) = body.employee_id {
        if let Some(employee_id) = employee_id {
            ensure_employee_linkable(&state.db, employee_id, Some(id)).await?;
        }
        active.employee_id = Set(employee_id);
    }
    if let Some(is_active) = body.is_active {
        if !is_active && id == current.id() {
            return Err(ApiError::bad_request("cannot deactivate your own account"));
        }
        active.is_active = Set(is_active);
    }

    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    info!(user_id = %id, "user updated");
    Ok(ApiResponse::ok("user updated", updated))
}

async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::USERS)?;
    if id == current.id() {
        return Err(ApiError::bad_request("cannot delete your own account"));
    }
    let existing = find_or_404::<user::Entity>(&state.db, id, "user").await?;
    if let Some(role_id) = existing.role_id {
        ensure_assignable(&state.db, &current, role_id).await?;
    }
    user::Entity::delete_by_id(id).exec(&state.db).await?;
    info!(user_id = %id, "user deleted");
    Ok(ApiResponse::message("user deleted"))
}

async fn ensure_email_free(db: &DbPool, email: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request("email already registered"));
    }
    Ok(())
}

/// The caller may only hand out roles it manages.
async fn ensure_assignable(db: &DbPool, current: &CurrentUser, role_id: Uuid) -> ApiResult<()> {
    let roles = load_roles(db).await?;
    if !roles.contains_key(&role_id) {
        return Err(ApiError::not_found("role"));
    }
    if !can_manage(current.role.as_ref(), role_id, &roles) {
        return Err(ApiError::forbidden("role is outside your hierarchy"));
    }
    Ok(())
}

async fn ensure_employee_linkable(
    db: &DbPool,
    employee_id: Uuid,
    except: Option<Uuid>,
) -> ApiResult<()> {
    find_or_404::<employee::Entity>(db, employee_id, "employee").await?;
    let mut query = user::Entity::find().filter(user::Column::EmployeeId.eq(employee_id));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request("employee is already linked to another user"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accounts_default_to_active() {
        let body: CreateUser = serde_json::from_str(
            r#"{"email":"a@b.co","display_name":"A","password":"longenough"}"#,
        )
        .unwrap();
        assert!(body.is_active);
        assert!(body.role_id.is_none());
    }

    #[test]
    fn role_can_be_cleared_explicitly() {
        let body: UpdateUser = serde_json::from_str(r#"{"role_id": null}"#).unwrap();
        assert_eq!(body.role_id, Some(None));
        let body: UpdateUser = serde_json::from_str("{}").unwrap();
        assert_eq!(body.role_id, None);
    }
}

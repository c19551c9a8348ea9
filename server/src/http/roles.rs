//! Role tree: single-parent hierarchy with stored depth and menu grants.

use std::collections::{HashMap, HashSet};

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use entity::{menu, role, role_menu, user};
use platform_api::{ApiError, ApiResponse, ApiResult};
use platform_db::DbPool;
use products_hr::hierarchy::{
    TreeNode, build_forest, is_ancestor, place_under_parent, subtree_height,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{double_option, find_or_404, now, optional_text, required_text},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/tree", get(role_tree))
        .route(
            "/roles/{id}",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/roles/{id}/menus", get(role_menus).put(assign_menus))
}

/// Every role keyed by id; the tables are small enough to walk in memory.
pub async fn load_roles(db: &DbPool) -> ApiResult<HashMap<Uuid, role::Model>> {
    let roles = role::Entity::find().all(db).await?;
    Ok(roles.into_iter().map(|r| (r.id, r)).collect())
}

fn children_index(roles: &HashMap<Uuid, role::Model>) -> HashMap<Uuid, Vec<Uuid>> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for role in roles.values() {
        if let Some(parent) = role.parent_id {
            children.entry(parent).or_default().push(role.id);
        }
    }
    children
}

/// A manager role may manage exactly the roles strictly below it;
/// `full_access` roles manage every role.
pub fn can_manage(
    manager: Option<&role::Model>,
    target: Uuid,
    roles: &HashMap<Uuid, role::Model>,
) -> bool {
    match manager {
        Some(manager) if manager.full_access => true,
        Some(manager) => is_ancestor(&manager.id, &target, |id| {
            roles.get(id).and_then(|r| r.parent_id)
        }),
        None => false,
    }
}

fn ensure_manages(
    current: &CurrentUser,
    target: Uuid,
    roles: &HashMap<Uuid, role::Model>,
) -> ApiResult<()> {
    if !can_manage(current.role.as_ref(), target, roles) {
        return Err(ApiError::forbidden("role is outside your hierarchy"));
    }
    Ok(())
}

/// New children may hang off the caller's own role or any role it manages.
/// Only full-access callers may create or move roles to the top level.
fn ensure_parent_allowed(
    current: &CurrentUser,
    parent: Option<Uuid>,
    roles: &HashMap<Uuid, role::Model>,
) -> ApiResult<()> {
    if current.full_access() {
        return Ok(());
    }
    let own = current.role.as_ref().map(|r| r.id);
    match parent {
        Some(parent) if Some(parent) == own || can_manage(current.role.as_ref(), parent, roles) => {
            Ok(())
        }
        _ => Err(ApiError::forbidden("parent role is outside your hierarchy")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateRole {
    name: String,
    description: Option<String>,
    parent_id: Option<Uuid>,
    #[serde(default)]
    full_access: bool,
}

#[derive(Debug, Deserialize)]
struct UpdateRole {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    parent_id: Option<Option<Uuid>>,
    full_access: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AssignMenus {
    menu_ids: Vec<Uuid>,
}

async fn list_roles(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<role::Model>>> {
    current.require(keys::ROLES)?;
    let roles = role::Entity::find()
        .order_by_asc(role::Column::Depth)
        .order_by_asc(role::Column::Name)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("roles", roles))
}

async fn role_tree(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<TreeNode<role::Model>>>> {
    current.require(keys::ROLES)?;
    let roles = role::Entity::find()
        .order_by_asc(role::Column::Name)
        .all(&state.db)
        .await?;
    let tree = build_forest(roles, |r| r.id, |r| r.parent_id.into_iter().collect());
    Ok(ApiResponse::ok("role tree", tree))
}

async fn get_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<role::Model>> {
    current.require(keys::ROLES)?;
    let role = find_or_404::<role::Entity>(&state.db, id, "role").await?;
    Ok(ApiResponse::ok("role", role))
}

async fn create_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateRole>,
) -> ApiResult<ApiResponse<role::Model>> {
    current.require(keys::ROLES)?;
    let name = required_text("name", &body.name, 64)?;
    ensure_unique_name(&state.db, &name, None).await?;
    let roles = load_roles(&state.db).await?;
    if let Some(parent) = body.parent_id {
        if !roles.contains_key(&parent) {
            return Err(ApiError::not_found("parent role"));
        }
    }
    ensure_parent_allowed(&current, body.parent_id, &roles)?;
    let depth = place_under_parent(
        None,
        body.parent_id.as_ref(),
        |id| roles.get(id).and_then(|r| r.parent_id),
        1,
    )?;
    if body.full_access && !current.full_access() {
        return Err(ApiError::forbidden("only full-access roles may grant full access"));
    }

    let stamp = now();
    let created = role::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(optional_text("description", body.description, 1000)?),
        parent_id: Set(body.parent_id),
        depth: Set(depth as i32),
        full_access: Set(body.full_access),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    info!(role_id = %created.id, depth, "role created");
    Ok(ApiResponse::created("role created", created))
}

async fn update_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRole>,
) -> ApiResult<ApiResponse<role::Model>> {
    current.require(keys::ROLES)?;
    let mut roles = load_roles(&state.db).await?;
    let existing = roles
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiError::not_found("role"))?;
    ensure_manages(&current, id, &roles)?;
    let mut active: role::ActiveModel = existing.clone().into();

    if let Some(name) = &body.name {
        let name = required_text("name", name, 64)?;
        ensure_unique_name(&state.db, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = body.description {
        active.description = Set(optional_text("description", description, 1000)?);
    }
    if let Some(full_access) = body.full_access {
        if full_access && !current.full_access() {
            return Err(ApiError::forbidden("only full-access roles may grant full access"));
        }
        active.full_access = Set(full_access);
    }

    let mut moved = false;
    if let Some(parent_id) = body.parent_id {
        if parent_id != existing.parent_id {
            if let Some(parent) = parent_id {
                if !roles.contains_key(&parent) {
                    return Err(ApiError::not_found("parent role"));
                }
            }
            ensure_parent_allowed(&current, parent_id, &roles)?;
            let children = children_index(&roles);
            let height = subtree_height(&id, |key| children.get(key).cloned().unwrap_or_default());
            let depth = place_under_parent(
                Some(&id),
                parent_id.as_ref(),
                |key| roles.get(key).and_then(|r| r.parent_id),
                height,
            )?;
            active.parent_id = Set(parent_id);
            active.depth = Set(depth as i32);
            moved = true;
        }
    }

    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    if moved {
        roles.insert(id, updated.clone());
        let touched = refresh_depths(&state.db, &roles, id).await?;
        info!(role_id = %id, parent_id = ?updated.parent_id, touched, "role re-parented");
    }
    Ok(ApiResponse::ok("role updated", updated))
}

/// Rewrites stored depths below `root` after it moved. Returns the number of
/// descendants updated.
async fn refresh_depths(
    db: &DbPool,
    roles: &HashMap<Uuid, role::Model>,
    root: Uuid,
) -> ApiResult<usize> {
    let children = children_index(roles);
    let mut touched = 0;
    let mut stack = vec![root];
    let mut seen = HashSet::new();
    while let Some(parent) = stack.pop() {
        if !seen.insert(parent) {
            continue;
        }
        let parent_depth = roles.get(&parent).map(|r| r.depth).unwrap_or(0);
        let mut next_depth = parent_depth + 1;
        if parent != root {
            // Stored depth for intermediate nodes was rewritten in a previous iteration.
            next_depth = depth_of(roles, parent, root) + 1;
        }
        for child in children.get(&parent).into_iter().flatten() {
            if let Some(model) = roles.get(child) {
                let mut active: role::ActiveModel = model.clone().into();
                active.depth = Set(next_depth);
                active.update(db).await?;
                touched += 1;
                stack.push(*child);
            }
        }
    }
    Ok(touched)
}

/// Depth of `id` measured from the already updated `root`.
fn depth_of(roles: &HashMap<Uuid, role::Model>, id: Uuid, root: Uuid) -> i32 {
    let root_depth = roles.get(&root).map(|r| r.depth).unwrap_or(1);
    let mut steps = 0;
    let mut cursor = Some(id);
    while let Some(current) = cursor {
        if current == root {
            return root_depth + steps;
        }
        steps += 1;
        cursor = roles.get(&current).and_then(|r| r.parent_id);
    }
    root_depth + steps
}

async fn delete_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::ROLES)?;
    let roles = load_roles(&state.db).await?;
    if !roles.contains_key(&id) {
        return Err(ApiError::not_found("role"));
    }
    ensure_manages(&current, id, &roles)?;
    let children = role::Entity::find()
        .filter(role::Column::ParentId.eq(id))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(ApiError::bad_request("role has child roles"));
    }
    let users = user::Entity::find()
        .filter(user::Column::RoleId.eq(id))
        .count(&state.db)
        .await?;
    if users > 0 {
        return Err(ApiError::bad_request("role is assigned to users"));
    }
    role::Entity::delete_by_id(id).exec(&state.db).await?;
    info!(role_id = %id, "role deleted");
    Ok(ApiResponse::message("role deleted"))
}

async fn role_menus(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Vec<menu::Model>>> {
    current.require(keys::ROLES)?;
    find_or_404::<role::Entity>(&state.db, id, "role").await?;
    let menus = menu::Entity::find()
        .inner_join(role_menu::Entity)
        .filter(role_menu::Column::RoleId.eq(id))
        .order_by_asc(menu::Column::SortOrder)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("role menus", menus))
}

/// Replaces the role's grants with `menu_ids`.
async fn assign_menus(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignMenus>,
) -> ApiResult<ApiResponse<Vec<menu::Model>>> {
    current.require(keys::ROLES)?;
    let roles = load_roles(&state.db).await?;
    if !roles.contains_key(&id) {
        return Err(ApiError::not_found("role"));
    }
    ensure_manages(&current, id, &roles)?;
    let wanted: HashSet<Uuid> = body.menu_ids.into_iter().collect();
    let menus = if wanted.is_empty() {
        Vec::new()
    } else {
        menu::Entity::find()
            .filter(menu::Column::Id.is_in(wanted.iter().copied()))
            .order_by_asc(menu::Column::SortOrder)
            .all(&state.db)
            .await?
    };
    if menus.len() != wanted.len() {
        return Err(ApiError::not_found("menu"));
    }
    if let Some(extra) = menus.iter().find(|m| !current.can(&m.key)) {
        return Err(ApiError::forbidden(format!(
            "cannot grant menu {} you do not hold",
            extra.key
        )));
    }

    role_menu::Entity::delete_many()
        .filter(role_menu::Column::RoleId.eq(id))
        .exec(&state.db)
        .await?;
    if !menus.is_empty() {
        let rows = menus.iter().map(|m| role_menu::ActiveModel {
            role_id: Set(id),
            menu_id: Set(m.id),
        });
        role_menu::Entity::insert_many(rows).exec(&state.db).await?;
    }
    info!(role_id = %id, grants = menus.len(), "role menus assigned");
    Ok(ApiResponse::ok("role menus updated", menus))
}

async fn ensure_unique_name(db: &DbPool, name: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = role::Entity::find().filter(role::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(role::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request("role name already exists"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn role(id: Uuid, parent: Option<Uuid>, full_access: bool) -> role::Model {
        let now = Utc::now().into();
        role::Model {
            id,
            name: id.to_string(),
            description: None,
            parent_id: parent,
            depth: 1,
            full_access,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn managers_only_manage_strict_descendants() {
        let (root, hr, clerk, sales) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let roles: HashMap<Uuid, role::Model> = [
            role(root, None, true),
            role(hr, Some(root), false),
            role(clerk, Some(hr), false),
            role(sales, Some(root), false),
        ]
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

        assert!(can_manage(roles.get(&hr), clerk, &roles));
        assert!(!can_manage(roles.get(&hr), hr, &roles));
        assert!(!can_manage(roles.get(&hr), sales, &roles));
        assert!(!can_manage(roles.get(&clerk), hr, &roles));
        assert!(can_manage(roles.get(&root), root, &roles));
        assert!(!can_manage(None, clerk, &roles));
    }

    #[test]
    fn depth_is_measured_from_moved_root() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut moved = role(a, None, false);
        moved.depth = 3;
        let roles: HashMap<Uuid, role::Model> = [moved, role(b, Some(a), false), role(c, Some(b), false)]
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        assert_eq!(depth_of(&roles, c, a), 5);
        assert_eq!(depth_of(&roles, b, a), 4);
    }
}

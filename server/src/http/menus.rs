//! Navigation menus. A menu may hang under several parents; the longest
//! ancestor path is capped like the role tree.

use std::collections::{HashMap, HashSet};

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use entity::{menu, menu_parent};
use platform_api::{ApiError, ApiResponse, ApiResult};
use platform_db::DbPool;
use products_hr::hierarchy::{TreeNode, build_forest, place_under_parents, subtree_height};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{double_option, now, optional_text, required_text},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/menus", get(list_menus).post(create_menu))
        .route("/menus/tree", get(menu_tree))
        .route("/menus/mine", get(my_menus))
        .route(
            "/menus/{id}",
            get(get_menu).put(update_menu).delete(delete_menu),
        )
}

#[derive(Clone, Debug, Serialize)]
pub struct MenuView {
    #[serde(flatten)]
    pub menu: menu::Model,
    pub parent_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CreateMenu {
    key: String,
    label: String,
    path: Option<String>,
    icon: Option<String>,
    #[serde(default)]
    sort_order: i32,
    #[serde(default)]
    parent_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct UpdateMenu {
    key: Option<String>,
    label: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    path: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    icon: Option<Option<String>>,
    sort_order: Option<i32>,
    is_active: Option<bool>,
    parent_ids: Option<Vec<Uuid>>,
}

/// Parent links of every menu, keyed by child.
async fn parent_index(db: &DbPool) -> ApiResult<HashMap<Uuid, Vec<Uuid>>> {
    let links = menu_parent::Entity::find().all(db).await?;
    let mut parents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for link in links {
        parents.entry(link.menu_id).or_default().push(link.parent_id);
    }
    Ok(parents)
}

fn with_parents(menus: Vec<menu::Model>, parents: &HashMap<Uuid, Vec<Uuid>>) -> Vec<MenuView> {
    menus
        .into_iter()
        .map(|menu| MenuView {
            parent_ids: parents.get(&menu.id).cloned().unwrap_or_default(),
            menu,
        })
        .collect()
}

fn forest(views: Vec<MenuView>) -> Vec<TreeNode<MenuView>> {
    build_forest(views, |view| view.menu.id, |view| view.parent_ids.clone())
}

async fn all_menus(db: &DbPool) -> ApiResult<Vec<menu::Model>> {
    Ok(menu::Entity::find()
        .order_by_asc(menu::Column::SortOrder)
        .order_by_asc(menu::Column::Label)
        .all(db)
        .await?)
}

async fn list_menus(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<MenuView>>> {
    current.require(keys::MENUS)?;
    let parents = parent_index(&state.db).await?;
    let menus = all_menus(&state.db).await?;
    Ok(ApiResponse::ok("menus", with_parents(menus, &parents)))
}

async fn menu_tree(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<TreeNode<MenuView>>>> {
    current.require(keys::MENUS)?;
    let parents = parent_index(&state.db).await?;
    let menus = all_menus(&state.db).await?;
    Ok(ApiResponse::ok("menu tree", forest(with_parents(menus, &parents))))
}

/// Active menus the caller's role is granted, nested. A granted child whose
/// parent is not granted is lifted to the root.
async fn my_menus(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<TreeNode<MenuView>>>> {
    let parents = parent_index(&state.db).await?;
    let menus: Vec<menu::Model> = all_menus(&state.db)
        .await?
        .into_iter()
        .filter(|m| m.is_active && (current.full_access() || current.grants.contains(&m.key)))
        .collect();
    Ok(ApiResponse::ok("my menus", forest(with_parents(menus, &parents))))
}

async fn get_menu(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<MenuView>> {
    current.require(keys::MENUS)?;
    let menu = menu::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("menu"))?;
    let parents = parent_index(&state.db).await?;
    let view = MenuView {
        parent_ids: parents.get(&id).cloned().unwrap_or_default(),
        menu,
    };
    Ok(ApiResponse::ok("menu", view))
}

async fn create_menu(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateMenu>,
) -> ApiResult<ApiResponse<MenuView>> {
    current.require(keys::MENUS)?;
    let key = menu_key(&body.key)?;
    ensure_unique_key(&state.db, &key, None).await?;
    let label = required_text("label", &body.label, 80)?;
    let parent_ids = dedup(body.parent_ids);
    ensure_menus_exist(&state.db, &parent_ids).await?;

    let parents = parent_index(&state.db).await?;
    let level = place_under_parents(
        None,
        &parent_ids,
        |id| parents.get(id).cloned().unwrap_or_default(),
        1,
    )?;

    let stamp = now();
    let created = menu::ActiveModel {
        id: Set(Uuid::new_v4()),
        key: Set(key),
        label: Set(label),
        path: Set(optional_text("path", body.path, 255)?),
        icon: Set(optional_text("icon", body.icon, 64)?),
        sort_order: Set(body.sort_order),
        is_active: Set(true),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&state.db)
    .await?;
    link_parents(&state.db, created.id, &parent_ids).await?;
    info!(menu_id = %created.id, key = %created.key, level, "menu created");
    Ok(ApiResponse::created(
        "menu created",
        MenuView {
            menu: created,
            parent_ids,
        },
    ))
}

async fn update_menu(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMenu>,
) -> ApiResult<ApiResponse<MenuView>> {
    current.require(keys::MENUS)?;
    let existing = menu::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("menu"))?;
    let parents = parent_index(&state.db).await?;
    let mut parent_ids = parents.get(&id).cloned().unwrap_or_default();

    let mut active: menu::ActiveModel = existing.into();
    if let Some(key) = &body.key {
        let key = menu_key(key)?;
        ensure_unique_key(&state.db, &key, Some(id)).await?;
        active.key = Set(key);
    }
    if let Some(label) = &body.label {
        active.label = Set(required_text("label", label, 80)?);
    }
    if let Some(path) = body.path {
        active.path = Set(optional_text("path", path, 255)?);
    }
    if let Some(icon) = body.icon {
        active.icon = Set(optional_text("icon", icon, 64)?);
    }
    if let Some(sort_order) = body.sort_order {
        active.sort_order = Set(sort_order);
    }
    if let Some(is_active) = body.is_active {
        active.is_active = Set(is_active);
    }

    let relink = match body.parent_ids {
        Some(requested) => {
            let requested = dedup(requested);
            ensure_menus_exist(&state.db, &requested).await?;
            let children = children_index(&parents);
            let height = subtree_height(&id, |key| children.get(key).cloned().unwrap_or_default());
            place_under_parents(
                Some(&id),
                &requested,
                |key| parents.get(key).cloned().unwrap_or_default(),
                height,
            )?;
            parent_ids = requested;
            true
        }
        None => false,
    };

    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    if relink {
        menu_parent::Entity::delete_many()
            .filter(menu_parent::Column::MenuId.eq(id))
            .exec(&state.db)
            .await?;
        link_parents(&state.db, id, &parent_ids).await?;
        info!(menu_id = %id, parents = parent_ids.len(), "menu re-parented");
    }
    Ok(ApiResponse::ok(
        "menu updated",
        MenuView {
            menu: updated,
            parent_ids,
        },
    ))
}

async fn delete_menu(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::MENUS)?;
    if menu::Entity::find_by_id(id).one(&state.db).await?.is_none() {
        return Err(ApiError::not_found("menu"));
    }
    let children = menu_parent::Entity::find()
        .filter(menu_parent::Column::ParentId.eq(id))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(ApiError::bad_request("menu has child menus"));
    }
    menu::Entity::delete_by_id(id).exec(&state.db).await?;
    info!(menu_id = %id, "menu deleted");
    Ok(ApiResponse::message("menu deleted"))
}

fn children_index(parents: &HashMap<Uuid, Vec<Uuid>>) -> HashMap<Uuid, Vec<Uuid>> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (child, links) in parents {
        for parent in links {
            children.entry(*parent).or_default().push(*child);
        }
    }
    children
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Lowercase slug of letters, digits, `_` and `-`.
fn menu_key(value: &str) -> ApiResult<String> {
    let key = required_text("key", value, 64)?.to_lowercase();
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::bad_request(
            "key may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(key)
}

async fn ensure_unique_key(db: &DbPool, key: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = menu::Entity::find().filter(menu::Column::Key.eq(key));
    if let Some(id) = except {
        query = query.filter(menu::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::bad_request("menu key already exists"));
    }
    Ok(())
}

async fn ensure_menus_exist(db: &DbPool, ids: &[Uuid]) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let found = menu::Entity::find()
        .filter(menu::Column::Id.is_in(ids.iter().copied()))
        .count(db)
        .await?;
    if found != ids.len() as u64 {
        return Err(ApiError::not_found("parent menu"));
    }
    Ok(())
}

async fn link_parents(db: &DbPool, menu_id: Uuid, parent_ids: &[Uuid]) -> ApiResult<()> {
    if parent_ids.is_empty() {
        return Ok(());
    }
    let rows = parent_ids.iter().map(|parent| menu_parent::ActiveModel {
        menu_id: Set(menu_id),
        parent_id: Set(*parent),
    });
    menu_parent::Entity::insert_many(rows).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_slugs() {
        assert_eq!(menu_key(" Leave_Types ").unwrap(), "leave_types");
        assert!(menu_key("pay roll").is_err());
        assert!(menu_key("").is_err());
    }

    #[test]
    fn children_are_indexed_under_every_parent() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let parents = HashMap::from([(c, vec![a, b])]);
        let children = children_index(&parents);
        assert_eq!(children.get(&a), Some(&vec![c]));
        assert_eq!(children.get(&b), Some(&vec![c]));
        assert_eq!(dedup(vec![a, a, b]), vec![a, b]);
    }
}

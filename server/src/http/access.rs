//! Request authentication and menu-grant authorisation.
//!
//! A management endpoint names the menu key it belongs to; the caller's role
//! must hold that grant unless it is a `full_access` role. Self-service
//! endpoints only need a valid token and a linked employee.

use std::collections::{BTreeSet, HashSet};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use entity::{menu, role, role_menu, user};
use platform_api::{ApiError, ApiResult};
use platform_authn::decode_access_token;
use platform_db::DbPool;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use super::AppState;

/// Menu keys seeded by default; each guards one management area.
pub mod keys {
    pub const DASHBOARD: &str = "dashboard";
    pub const EMPLOYEES: &str = "employees";
    pub const DEPARTMENTS: &str = "departments";
    pub const DESIGNATIONS: &str = "designations";
    pub const USERS: &str = "users";
    pub const ROLES: &str = "roles";
    pub const MENUS: &str = "menus";
    pub const LEAVE_TYPES: &str = "leave_types";
    pub const LEAVES: &str = "leaves";
    pub const ATTENDANCE: &str = "attendance";
    pub const ROSTER: &str = "roster";
    pub const PAYROLL: &str = "payroll";
    pub const DEDUCTION_RULES: &str = "deduction_rules";
    pub const COMPANY: &str = "company";
    pub const NOTICES: &str = "notices";
    pub const EOD_REPORTS: &str = "eod_reports";
}

#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: user::Model,
    pub role: Option<role::Model>,
    pub grants: HashSet<String>,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn full_access(&self) -> bool {
        self.role.as_ref().is_some_and(|role| role.full_access)
    }

    pub fn can(&self, key: &str) -> bool {
        self.full_access() || self.grants.contains(key)
    }

    pub fn require(&self, key: &str) -> ApiResult<()> {
        if self.can(key) {
            Ok(())
        } else {
            Err(ApiError::forbidden("insufficient permissions"))
        }
    }

    pub fn employee_id(&self) -> ApiResult<Uuid> {
        self.user
            .employee_id
            .ok_or_else(|| ApiError::forbidden("no employee profile is linked to this account"))
    }

    /// Which employee a read may cover. Holders of `key` may ask for anyone
    /// (or everyone with `None`); others are pinned to their own record.
    pub fn scope_employee(&self, key: &str, requested: Option<Uuid>) -> ApiResult<Option<Uuid>> {
        if self.can(key) {
            return Ok(requested);
        }
        let own = self.employee_id()?;
        match requested {
            Some(other) if other != own => Err(ApiError::forbidden("insufficient permissions")),
            _ => Ok(Some(own)),
        }
    }

    /// Grants as a sorted list, for responses.
    pub fn grant_list(&self) -> Vec<String> {
        self.grants.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect()
    }
}

pub async fn granted_menu_keys(db: &DbPool, role_id: Uuid) -> ApiResult<HashSet<String>> {
    let menus = menu::Entity::find()
        .inner_join(role_menu::Entity)
        .filter(role_menu::Column::RoleId.eq(role_id))
        .filter(menu::Column::IsActive.eq(true))
        .all(db)
        .await?;
    Ok(menus.into_iter().map(|m| m.key).collect())
}

pub async fn load_current_user(db: &DbPool, user_id: Uuid) -> ApiResult<CurrentUser> {
    let user = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("user not found"))?;
    if !user.is_active {
        return Err(ApiError::forbidden("account disabled"));
    }
    let role = match user.role_id {
        Some(role_id) => role::Entity::find_by_id(role_id).one(db).await?,
        None => None,
    };
    let grants = match &role {
        Some(role) => granted_menu_keys(db, role.id).await?,
        None => HashSet::new(),
    };
    Ok(CurrentUser { user, role, grants })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::unauthorized("missing bearer token"))?;
        let claims = decode_access_token(bearer.token(), &state.auth)
            .map_err(|_| ApiError::unauthorized("invalid or expired token"))?;
        load_current_user(&state.db, claims.sub).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn caller(full_access: bool, grants: &[&str], employee_id: Option<Uuid>) -> CurrentUser {
        let now = Utc::now().into();
        CurrentUser {
            user: user::Model {
                id: Uuid::new_v4(),
                email: "hr@example.com".into(),
                display_name: "HR".into(),
                password_hash: String::new(),
                role_id: None,
                employee_id,
                is_active: true,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
            role: Some(role::Model {
                id: Uuid::new_v4(),
                name: "Staff".into(),
                description: None,
                parent_id: None,
                depth: 1,
                full_access,
                created_at: now,
                updated_at: now,
            }),
            grants: grants.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn grants_gate_management_keys() {
        let staff = caller(false, &[keys::LEAVES], None);
        assert!(staff.require(keys::LEAVES).is_ok());
        assert!(matches!(
            staff.require(keys::PAYROLL),
            Err(ApiError::Forbidden(_))
        ));
        let root = caller(true, &[], None);
        assert!(root.require(keys::PAYROLL).is_ok());
    }

    #[test]
    fn self_service_reads_are_pinned_to_own_record() {
        let own = Uuid::new_v4();
        let staff = caller(false, &[], Some(own));
        assert_eq!(staff.scope_employee(keys::LEAVES, None).unwrap(), Some(own));
        assert_eq!(staff.scope_employee(keys::LEAVES, Some(own)).unwrap(), Some(own));
        assert!(staff.scope_employee(keys::LEAVES, Some(Uuid::new_v4())).is_err());

        let manager = caller(false, &[keys::LEAVES], Some(own));
        let other = Uuid::new_v4();
        assert_eq!(manager.scope_employee(keys::LEAVES, Some(other)).unwrap(), Some(other));
        assert_eq!(manager.scope_employee(keys::LEAVES, None).unwrap(), None);
    }
}

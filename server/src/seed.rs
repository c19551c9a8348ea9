//! Idempotent bootstrap data: the root role, default menus, an administrator,
//! standard leave types and a company profile.

use anyhow::{Context, Result, anyhow};
use entity::{company, leave_type, menu, menu_parent, role, role_menu, user};
use platform_authn::{ensure_password_strength, hash_password};
use platform_db::DbPool;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};
use uuid::Uuid;

use crate::http::{access::keys, company::DEFAULT_WEEKLY_OFFS, support::now};

pub const ROOT_ROLE: &str = "Super Admin";
const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_PASSWORD: &str = "ChangeMe123!";

/// `(key, label, path, parent key)` in display order.
const DEFAULT_MENUS: &[(&str, &str, &str, Option<&str>)] = &[
    (keys::DASHBOARD, "Dashboard", "/dashboard", None),
    (keys::EMPLOYEES, "Employees", "/employees", None),
    (keys::DEPARTMENTS, "Departments", "/departments", None),
    (keys::DESIGNATIONS, "Designations", "/designations", Some(keys::DEPARTMENTS)),
    (keys::ATTENDANCE, "Attendance", "/attendance", None),
    (keys::ROSTER, "Roster", "/roster", Some(keys::ATTENDANCE)),
    (keys::LEAVES, "Leaves", "/leaves", None),
    (keys::LEAVE_TYPES, "Leave types", "/leave-types", Some(keys::LEAVES)),
    (keys::PAYROLL, "Payroll", "/payroll", None),
    (keys::DEDUCTION_RULES, "Deduction rules", "/salary-deduction-rules", Some(keys::PAYROLL)),
    (keys::NOTICES, "Notices", "/notices", None),
    (keys::EOD_REPORTS, "EOD reports", "/eod-reports", None),
    (keys::USERS, "Users", "/users", None),
    (keys::ROLES, "Roles", "/roles", Some(keys::USERS)),
    (keys::MENUS, "Menus", "/menus", Some(keys::USERS)),
    (keys::COMPANY, "Company", "/company", None),
];

/// `(code, name, annual allowance, paid)`.
const DEFAULT_LEAVE_TYPES: &[(&str, &str, i32, bool)] = &[
    ("ANNUAL", "Annual leave", 18, true),
    ("SICK", "Sick leave", 12, true),
    ("UNPAID", "Unpaid leave", 30, false),
];

#[derive(Clone, Debug)]
pub struct SeedSettings {
    pub admin_email: String,
    pub admin_password: String,
    pub company_name: String,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            admin_email: DEFAULT_ADMIN_EMAIL.into(),
            admin_password: DEFAULT_ADMIN_PASSWORD.into(),
            company_name: "Acme Ltd".into(),
        }
    }
}

impl SeedSettings {
    /// Reads `SEED_ADMIN_EMAIL`, `SEED_ADMIN_PASSWORD` and `SEED_COMPANY_NAME`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            admin_email: std::env::var("SEED_ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            admin_password: std::env::var("SEED_ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
            company_name: std::env::var("SEED_COMPANY_NAME").unwrap_or(defaults.company_name),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SeedReport {
    pub root_role_id: Uuid,
    pub admin_user_id: Uuid,
    pub menus_created: usize,
    pub leave_types_created: usize,
}

pub async fn run(db: &DbPool, settings: &SeedSettings) -> Result<SeedReport> {
    let root = ensure_root_role(db).await?;
    let menus_created = ensure_menus(db, root.id).await?;
    let admin = ensure_admin(db, root.id, settings).await?;
    let leave_types_created = ensure_leave_types(db).await?;
    ensure_company(db, &settings.company_name).await?;

    let report = SeedReport {
        root_role_id: root.id,
        admin_user_id: admin.id,
        menus_created,
        leave_types_created,
    };
    info!(?report, "seed complete");
    Ok(report)
}

async fn ensure_root_role(db: &DbPool) -> Result<role::Model> {
    if let Some(existing) = role::Entity::find()
        .filter(role::Column::Name.eq(ROOT_ROLE))
        .one(db)
        .await?
    {
        return Ok(existing);
    }
    let stamp = now();
    let created = role::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(ROOT_ROLE.into()),
        description: Set(Some("Unrestricted access".into())),
        parent_id: Set(None),
        depth: Set(1),
        full_access: Set(true),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(db)
    .await?;
    info!(role_id = %created.id, "root role created");
    Ok(created)
}

/// Creates missing default menus and grants every menu to the root role.
async fn ensure_menus(db: &DbPool, root_role: Uuid) -> Result<usize> {
    let mut created = 0;
    for (position, (key, label, path, parent)) in DEFAULT_MENUS.iter().enumerate() {
        let menu_id = match find_menu(db, key).await? {
            Some(existing) => existing.id,
            None => {
                let stamp = now();
                let row = menu::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    key: Set((*key).into()),
                    label: Set((*label).into()),
                    path: Set(Some((*path).into())),
                    icon: Set(None),
                    sort_order: Set(position as i32 * 10),
                    is_active: Set(true),
                    created_at: Set(stamp),
                    updated_at: Set(stamp),
                }
                .insert(db)
                .await?;
                if let Some(parent_key) = parent {
                    let parent = find_menu(db, parent_key)
                        .await?
                        .ok_or_else(|| anyhow!("parent menu {parent_key} must be seeded first"))?;
                    menu_parent::ActiveModel {
                        menu_id: Set(row.id),
                        parent_id: Set(parent.id),
                    }
                    .insert(db)
                    .await?;
                }
                created += 1;
                row.id
            }
        };
        let granted = role_menu::Entity::find_by_id((root_role, menu_id))
            .one(db)
            .await?
            .is_some();
        if !granted {
            role_menu::ActiveModel {
                role_id: Set(root_role),
                menu_id: Set(menu_id),
            }
            .insert(db)
            .await?;
        }
    }
    Ok(created)
}

async fn find_menu(db: &DbPool, key: &str) -> Result<Option<menu::Model>> {
    Ok(menu::Entity::find()
        .filter(menu::Column::Key.eq(key))
        .one(db)
        .await?)
}

async fn ensure_admin(db: &DbPool, root_role: Uuid, settings: &SeedSettings) -> Result<user::Model> {
    let email = settings.admin_email.trim().to_lowercase();
    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    {
        return Ok(existing);
    }
    ensure_password_strength(&settings.admin_password).context("seed admin password")?;
    if settings.admin_password == DEFAULT_ADMIN_PASSWORD {
        warn!(%email, "seeding admin with the default password; change it after first login");
    }
    let stamp = now();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        display_name: Set("Administrator".into()),
        password_hash: Set(hash_password(&settings.admin_password)?),
        role_id: Set(Some(root_role)),
        employee_id: Set(None),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(db)
    .await?;
    info!(user_id = %created.id, email = %created.email, "admin user created");
    Ok(created)
}

async fn ensure_leave_types(db: &DbPool) -> Result<usize> {
    let mut created = 0;
    for (code, name, allowance, is_paid) in DEFAULT_LEAVE_TYPES {
        let exists = leave_type::Entity::find()
            .filter(leave_type::Column::Code.eq(*code))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }
        let stamp = now();
        leave_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set((*name).into()),
            code: Set((*code).into()),
            annual_allowance: Set(*allowance),
            is_paid: Set(*is_paid),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        }
        .insert(db)
        .await?;
        created += 1;
    }
    Ok(created)
}

async fn ensure_company(db: &DbPool, name: &str) -> Result<()> {
    if company::Entity::find().one(db).await?.is_some() {
        return Ok(());
    }
    let stamp = now();
    company::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        legal_name: Set(None),
        email: Set(None),
        phone: Set(None),
        address: Set(None),
        country_code: Set(None),
        currency: Set("USD".into()),
        timezone: Set("UTC".into()),
        weekly_offs: Set(DEFAULT_WEEKLY_OFFS.into()),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_menus_list_parents_before_children() {
        let mut seen = HashSet::new();
        for (key, _, _, parent) in DEFAULT_MENUS {
            if let Some(parent) = parent {
                assert!(seen.contains(parent), "{key} listed before its parent {parent}");
            }
            assert!(seen.insert(*key), "duplicate menu key {key}");
        }
    }
}

use sea_orm_migration::prelude::*;

use crate::m20250301_000001_org_structure::timestamp;

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Role {
    Table,
    Id,
    Name,
    Description,
    ParentId,
    Depth,
    FullAccess,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Menu {
    Table,
    Id,
    Key,
    Label,
    Path,
    Icon,
    SortOrder,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MenuParent {
    Table,
    MenuId,
    ParentId,
}

#[derive(DeriveIden)]
enum RoleMenu {
    Table,
    RoleId,
    MenuId,
}

#[derive(DeriveIden)]
enum AppUser {
    Table,
    Id,
    Email,
    DisplayName,
    PasswordHash,
    RoleId,
    EmployeeId,
    IsActive,
    LastLoginAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RefreshToken {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    RevokedAt,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Role::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Role::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Role::Name)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Role::Description).text())
                    .col(ColumnDef::new(Role::ParentId).uuid())
                    .col(ColumnDef::new(Role::Depth).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(Role::FullAccess)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(&mut timestamp(Role::CreatedAt))
                    .col(&mut timestamp(Role::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_parent")
                            .from(Role::Table, Role::ParentId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Menu::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Menu::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Menu::Key)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Menu::Label).string_len(128).not_null())
                    .col(ColumnDef::new(Menu::Path).string_len(256))
                    .col(ColumnDef::new(Menu::Icon).string_len(64))
                    .col(
                        ColumnDef::new(Menu::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Menu::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(&mut timestamp(Menu::CreatedAt))
                    .col(&mut timestamp(Menu::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MenuParent::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MenuParent::MenuId).uuid().not_null())
                    .col(ColumnDef::new(MenuParent::ParentId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(MenuParent::MenuId)
                            .col(MenuParent::ParentId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_menu_parent_menu")
                            .from(MenuParent::Table, MenuParent::MenuId)
                            .to(Menu::Table, Menu::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_menu_parent_parent")
                            .from(MenuParent::Table, MenuParent::ParentId)
                            .to(Menu::Table, Menu::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleMenu::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RoleMenu::RoleId).uuid().not_null())
                    .col(ColumnDef::new(RoleMenu::MenuId).uuid().not_null())
                    .primary_key(Index::create().col(RoleMenu::RoleId).col(RoleMenu::MenuId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_menu_role")
                            .from(RoleMenu::Table, RoleMenu::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_menu_menu")
                            .from(RoleMenu::Table, RoleMenu::MenuId)
                            .to(Menu::Table, Menu::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AppUser::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(AppUser::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AppUser::DisplayName).string_len(256).not_null())
                    .col(ColumnDef::new(AppUser::PasswordHash).text().not_null())
                    .col(ColumnDef::new(AppUser::RoleId).uuid())
                    .col(ColumnDef::new(AppUser::EmployeeId).uuid())
                    .col(
                        ColumnDef::new(AppUser::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(AppUser::LastLoginAt).timestamp_with_time_zone())
                    .col(&mut timestamp(AppUser::CreatedAt))
                    .col(&mut timestamp(AppUser::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_user_role")
                            .from(AppUser::Table, AppUser::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_user_employee")
                            .from(AppUser::Table, AppUser::EmployeeId)
                            .to(Employee::Table, Employee::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_app_user_role")
                    .table(AppUser::Table)
                    .col(AppUser::RoleId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RefreshToken::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RefreshToken::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RefreshToken::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(RefreshToken::TokenHash)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(&mut timestamp(RefreshToken::ExpiresAt))
                    .col(ColumnDef::new(RefreshToken::RevokedAt).timestamp_with_time_zone())
                    .col(&mut timestamp(RefreshToken::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_refresh_token_user")
                            .from(RefreshToken::Table, RefreshToken::UserId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RefreshToken::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppUser::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleMenu::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MenuParent::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Menu::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Role::Table).to_owned())
            .await?;
        Ok(())
    }
}

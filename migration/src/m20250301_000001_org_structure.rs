use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Company {
    Table,
    Id,
    Name,
    LegalName,
    Email,
    Phone,
    Address,
    CountryCode,
    Currency,
    Timezone,
    WeeklyOffs,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Department {
    Table,
    Id,
    Name,
    Code,
    Description,
    HeadEmployeeId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Designation {
    Table,
    Id,
    Title,
    DepartmentId,
    Level,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
    EmployeeCode,
    FirstName,
    LastName,
    Email,
    Phone,
    DateOfBirth,
    JoiningDate,
    DepartmentId,
    DesignationId,
    ManagerId,
    GrossSalaryCents,
    Status,
    ProfilePicture,
    Address,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AssignmentHistory {
    Table,
    Id,
    EmployeeId,
    Field,
    PreviousValue,
    NewValue,
    ChangedBy,
    ChangedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Company::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Company::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Company::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Company::LegalName).string_len(256))
                    .col(ColumnDef::new(Company::Email).string_len(320))
                    .col(ColumnDef::new(Company::Phone).string_len(64))
                    .col(ColumnDef::new(Company::Address).text())
                    .col(ColumnDef::new(Company::CountryCode).string_len(2))
                    .col(ColumnDef::new(Company::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Company::Timezone).string_len(64).not_null())
                    .col(ColumnDef::new(Company::WeeklyOffs).string_len(64).not_null())
                    .col(&mut timestamp(Company::CreatedAt))
                    .col(&mut timestamp(Company::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Department::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Department::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Department::Name)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Department::Code).string_len(32))
                    .col(ColumnDef::new(Department::Description).text())
                    .col(ColumnDef::new(Department::HeadEmployeeId).uuid())
                    .col(&mut timestamp(Department::CreatedAt))
                    .col(&mut timestamp(Department::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Designation::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Designation::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Designation::Title).string_len(128).not_null())
                    .col(ColumnDef::new(Designation::DepartmentId).uuid().not_null())
                    .col(
                        ColumnDef::new(Designation::Level)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Designation::Description).text())
                    .col(&mut timestamp(Designation::CreatedAt))
                    .col(&mut timestamp(Designation::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_designation_department")
                            .from(Designation::Table, Designation::DepartmentId)
                            .to(Department::Table, Department::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_designation_department_title")
                    .table(Designation::Table)
                    .col(Designation::DepartmentId)
                    .col(Designation::Title)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Employee::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Employee::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Employee::EmployeeCode)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Employee::FirstName).string_len(128).not_null())
                    .col(ColumnDef::new(Employee::LastName).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Employee::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Employee::Phone).string_len(64))
                    .col(ColumnDef::new(Employee::DateOfBirth).date())
                    .col(ColumnDef::new(Employee::JoiningDate).date().not_null())
                    .col(ColumnDef::new(Employee::DepartmentId).uuid())
                    .col(ColumnDef::new(Employee::DesignationId).uuid())
                    .col(ColumnDef::new(Employee::ManagerId).uuid())
                    .col(
                        ColumnDef::new(Employee::GrossSalaryCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Employee::Status)
                            .string_len(16)
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(ColumnDef::new(Employee::ProfilePicture).string_len(512))
                    .col(ColumnDef::new(Employee::Address).text())
                    .col(&mut timestamp(Employee::CreatedAt))
                    .col(&mut timestamp(Employee::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_department")
                            .from(Employee::Table, Employee::DepartmentId)
                            .to(Department::Table, Department::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_designation")
                            .from(Employee::Table, Employee::DesignationId)
                            .to(Designation::Table, Designation::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_manager")
                            .from(Employee::Table, Employee::ManagerId)
                            .to(Employee::Table, Employee::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_employee_department", Employee::DepartmentId),
            ("idx_employee_designation", Employee::DesignationId),
            ("idx_employee_manager", Employee::ManagerId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Employee::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(AssignmentHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AssignmentHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AssignmentHistory::EmployeeId).uuid().not_null())
                    .col(
                        ColumnDef::new(AssignmentHistory::Field)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AssignmentHistory::PreviousValue).uuid())
                    .col(ColumnDef::new(AssignmentHistory::NewValue).uuid())
                    .col(ColumnDef::new(AssignmentHistory::ChangedBy).uuid())
                    .col(&mut timestamp(AssignmentHistory::ChangedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignment_history_employee")
                            .from(AssignmentHistory::Table, AssignmentHistory::EmployeeId)
                            .to(Employee::Table, Employee::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_assignment_history_employee")
                    .table(AssignmentHistory::Table)
                    .col(AssignmentHistory::EmployeeId)
                    .col(AssignmentHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AssignmentHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Employee::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Designation::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Department::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Company::Table).to_owned())
            .await?;
        Ok(())
    }
}

pub(crate) fn timestamp<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

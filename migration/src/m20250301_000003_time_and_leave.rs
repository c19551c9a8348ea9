use sea_orm_migration::prelude::*;

use crate::m20250301_000001_org_structure::timestamp;

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Department {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum LeaveType {
    Table,
    Id,
    Name,
    Code,
    AnnualAllowance,
    IsPaid,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Leave {
    Table,
    Id,
    EmployeeId,
    LeaveTypeId,
    StartDate,
    EndDate,
    Days,
    Reason,
    Status,
    ReviewedBy,
    ReviewNote,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Attendance {
    Table,
    Id,
    EmployeeId,
    Date,
    ClockIn,
    ClockOut,
    WorkedMinutes,
    Status,
    Note,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Roster {
    Table,
    Id,
    EmployeeId,
    Date,
    ShiftStart,
    ShiftEnd,
    IsOff,
    Note,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Notice {
    Table,
    Id,
    Title,
    Body,
    Audience,
    DepartmentId,
    PublishDate,
    ExpiryDate,
    Pinned,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EodReport {
    Table,
    Id,
    EmployeeId,
    Date,
    Summary,
    TasksCompleted,
    Blockers,
    HoursWorked,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn employee_fk<T: IntoIden + 'static>(name: &str, table: T, column: T) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, column)
        .to(Employee::Table, Employee::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LeaveType::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LeaveType::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(LeaveType::Name).string_len(128).not_null())
                    .col(
                        ColumnDef::new(LeaveType::Code)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(LeaveType::AnnualAllowance)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LeaveType::IsPaid)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(&mut timestamp(LeaveType::CreatedAt))
                    .col(&mut timestamp(LeaveType::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Leave::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Leave::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Leave::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Leave::LeaveTypeId).uuid().not_null())
                    .col(ColumnDef::new(Leave::StartDate).date().not_null())
                    .col(ColumnDef::new(Leave::EndDate).date().not_null())
                    .col(ColumnDef::new(Leave::Days).integer().not_null())
                    .col(ColumnDef::new(Leave::Reason).text())
                    .col(
                        ColumnDef::new(Leave::Status)
                            .string_len(16)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Leave::ReviewedBy).uuid())
                    .col(ColumnDef::new(Leave::ReviewNote).text())
                    .col(ColumnDef::new(Leave::ReviewedAt).timestamp_with_time_zone())
                    .col(&mut timestamp(Leave::CreatedAt))
                    .col(&mut timestamp(Leave::UpdatedAt))
                    .foreign_key(&mut employee_fk(
                        "fk_leave_employee",
                        Leave::Table,
                        Leave::EmployeeId,
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_leave_type")
                            .from(Leave::Table, Leave::LeaveTypeId)
                            .to(LeaveType::Table, LeaveType::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_leave_employee_start")
                    .table(Leave::Table)
                    .col(Leave::EmployeeId)
                    .col(Leave::StartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Attendance::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Attendance::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Attendance::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Attendance::Date).date().not_null())
                    .col(ColumnDef::new(Attendance::ClockIn).timestamp_with_time_zone())
                    .col(ColumnDef::new(Attendance::ClockOut).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Attendance::WorkedMinutes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Attendance::Status)
                            .string_len(16)
                            .not_null()
                            .default("ABSENT"),
                    )
                    .col(ColumnDef::new(Attendance::Note).text())
                    .col(&mut timestamp(Attendance::CreatedAt))
                    .col(&mut timestamp(Attendance::UpdatedAt))
                    .foreign_key(&mut employee_fk(
                        "fk_attendance_employee",
                        Attendance::Table,
                        Attendance::EmployeeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_employee_date")
                    .table(Attendance::Table)
                    .col(Attendance::EmployeeId)
                    .col(Attendance::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Roster::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Roster::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Roster::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Roster::Date).date().not_null())
                    .col(ColumnDef::new(Roster::ShiftStart).time())
                    .col(ColumnDef::new(Roster::ShiftEnd).time())
                    .col(
                        ColumnDef::new(Roster::IsOff)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Roster::Note).text())
                    .col(&mut timestamp(Roster::CreatedAt))
                    .col(&mut timestamp(Roster::UpdatedAt))
                    .foreign_key(&mut employee_fk(
                        "fk_roster_employee",
                        Roster::Table,
                        Roster::EmployeeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_roster_employee_date")
                    .table(Roster::Table)
                    .col(Roster::EmployeeId)
                    .col(Roster::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notice::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Notice::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Notice::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Notice::Body).text().not_null())
                    .col(
                        ColumnDef::new(Notice::Audience)
                            .string_len(16)
                            .not_null()
                            .default("ALL"),
                    )
                    .col(ColumnDef::new(Notice::DepartmentId).uuid())
                    .col(ColumnDef::new(Notice::PublishDate).date().not_null())
                    .col(ColumnDef::new(Notice::ExpiryDate).date())
                    .col(
                        ColumnDef::new(Notice::Pinned)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Notice::CreatedBy).uuid())
                    .col(&mut timestamp(Notice::CreatedAt))
                    .col(&mut timestamp(Notice::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notice_department")
                            .from(Notice::Table, Notice::DepartmentId)
                            .to(Department::Table, Department::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EodReport::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EodReport::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(EodReport::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(EodReport::Date).date().not_null())
                    .col(ColumnDef::new(EodReport::Summary).text().not_null())
                    .col(ColumnDef::new(EodReport::TasksCompleted).text())
                    .col(ColumnDef::new(EodReport::Blockers).text())
                    .col(
                        ColumnDef::new(EodReport::HoursWorked)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(&mut timestamp(EodReport::CreatedAt))
                    .col(&mut timestamp(EodReport::UpdatedAt))
                    .foreign_key(&mut employee_fk(
                        "fk_eod_report_employee",
                        EodReport::Table,
                        EodReport::EmployeeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_eod_report_employee_date")
                    .table(EodReport::Table)
                    .col(EodReport::EmployeeId)
                    .col(EodReport::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EodReport::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notice::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roster::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Attendance::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Leave::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LeaveType::Table).to_owned())
            .await?;
        Ok(())
    }
}

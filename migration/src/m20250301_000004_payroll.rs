use sea_orm_migration::prelude::*;

use crate::m20250301_000001_org_structure::timestamp;

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum SalaryDeductionRule {
    Table,
    Id,
    Name,
    Description,
    Kind,
    AmountCents,
    Rate,
    Slabs,
    IsActive,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Payroll {
    Table,
    Id,
    EmployeeId,
    Year,
    Month,
    GrossCents,
    BasicCents,
    HraCents,
    AllowanceCents,
    WorkingDays,
    PaidDays,
    LopDays,
    LopCents,
    TotalDeductionsCents,
    NetCents,
    Status,
    GeneratedBy,
    ProcessedAt,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PayrollDeduction {
    Table,
    Id,
    PayrollId,
    RuleId,
    Name,
    AmountCents,
    Position,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn cents<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

fn days<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .double()
        .not_null()
        .default(0.0)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalaryDeductionRule::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalaryDeductionRule::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalaryDeductionRule::Name)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalaryDeductionRule::Description).text())
                    .col(
                        ColumnDef::new(SalaryDeductionRule::Kind)
                            .string_len(24)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalaryDeductionRule::AmountCents).big_integer())
                    .col(ColumnDef::new(SalaryDeductionRule::Rate).double())
                    .col(ColumnDef::new(SalaryDeductionRule::Slabs).json())
                    .col(
                        ColumnDef::new(SalaryDeductionRule::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SalaryDeductionRule::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(&mut timestamp(SalaryDeductionRule::CreatedAt))
                    .col(&mut timestamp(SalaryDeductionRule::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payroll::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payroll::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Payroll::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Payroll::Year).integer().not_null())
                    .col(ColumnDef::new(Payroll::Month).integer().not_null())
                    .col(&mut cents(Payroll::GrossCents))
                    .col(&mut cents(Payroll::BasicCents))
                    .col(&mut cents(Payroll::HraCents))
                    .col(&mut cents(Payroll::AllowanceCents))
                    .col(&mut days(Payroll::WorkingDays))
                    .col(&mut days(Payroll::PaidDays))
                    .col(&mut days(Payroll::LopDays))
                    .col(&mut cents(Payroll::LopCents))
                    .col(&mut cents(Payroll::TotalDeductionsCents))
                    .col(&mut cents(Payroll::NetCents))
                    .col(
                        ColumnDef::new(Payroll::Status)
                            .string_len(16)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(ColumnDef::new(Payroll::GeneratedBy).uuid())
                    .col(ColumnDef::new(Payroll::ProcessedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Payroll::PaidAt).timestamp_with_time_zone())
                    .col(&mut timestamp(Payroll::CreatedAt))
                    .col(&mut timestamp(Payroll::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payroll_employee")
                            .from(Payroll::Table, Payroll::EmployeeId)
                            .to(Employee::Table, Employee::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payroll_employee_period")
                    .table(Payroll::Table)
                    .col(Payroll::EmployeeId)
                    .col(Payroll::Year)
                    .col(Payroll::Month)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PayrollDeduction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PayrollDeduction::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PayrollDeduction::PayrollId).uuid().not_null())
                    .col(ColumnDef::new(PayrollDeduction::RuleId).uuid())
                    .col(
                        ColumnDef::new(PayrollDeduction::Name)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(&mut cents(PayrollDeduction::AmountCents))
                    .col(
                        ColumnDef::new(PayrollDeduction::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payroll_deduction_payroll")
                            .from(PayrollDeduction::Table, PayrollDeduction::PayrollId)
                            .to(Payroll::Table, Payroll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payroll_deduction_rule")
                            .from(PayrollDeduction::Table, PayrollDeduction::RuleId)
                            .to(SalaryDeductionRule::Table, SalaryDeductionRule::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PayrollDeduction::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payroll::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalaryDeductionRule::Table).to_owned())
            .await?;
        Ok(())
    }
}

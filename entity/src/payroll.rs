use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A payslip for one employee and month. Amounts are in cents.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "payroll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub employee_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub gross_cents: i64,
    pub basic_cents: i64,
    pub hra_cents: i64,
    pub allowance_cents: i64,
    pub working_days: f64,
    pub paid_days: f64,
    pub lop_days: f64,
    pub lop_cents: i64,
    pub total_deductions_cents: i64,
    pub net_cents: i64,
    pub status: Status,
    pub generated_by: Option<Uuid>,
    pub processed_at: Option<DateTimeWithTimeZone>,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::EmployeeId",
        to = "super::employee::Column::Id",
        on_delete = "Cascade"
    )]
    Employee,
    #[sea_orm(has_many = "super::payroll_deduction::Entity")]
    Deduction,
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::payroll_deduction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deduction.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "PROCESSED")]
    Processed,
    #[sea_orm(string_value = "PAID")]
    Paid,
}

impl ActiveModelBehavior for ActiveModel {}

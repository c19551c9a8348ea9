use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `amount_cents` is set for fixed rules, `rate` for the percentage kinds and
/// `slabs` (a JSON array) for tax tables.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "salary_deduction_rule")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub kind: Kind,
    pub amount_cents: Option<i64>,
    pub rate: Option<f64>,
    pub slabs: Option<Json>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(24))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    #[sea_orm(string_value = "FIXED")]
    Fixed,
    #[sea_orm(string_value = "PERCENT_OF_BASIC")]
    PercentOfBasic,
    #[sea_orm(string_value = "PERCENT_OF_GROSS")]
    PercentOfGross,
    #[sea_orm(string_value = "TAX_SLAB")]
    TaxSlab,
}

impl ActiveModelBehavior for ActiveModel {}

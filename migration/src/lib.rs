pub use sea_orm_migration::prelude::*;

mod m20250301_000001_org_structure;
mod m20250301_000002_access_control;
mod m20250301_000003_time_and_leave;
mod m20250301_000004_payroll;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_org_structure::Migration),
            Box::new(m20250301_000002_access_control::Migration),
            Box::new(m20250301_000003_time_and_leave::Migration),
            Box::new(m20250301_000004_payroll::Migration),
        ]
    }
}

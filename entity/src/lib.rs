//! sea-orm entities for the HR suite.

pub mod assignment_history;
pub mod attendance;
pub mod company;
pub mod department;
pub mod designation;
pub mod employee;
pub mod eod_report;
pub mod leave;
pub mod leave_type;
pub mod menu;
pub mod menu_parent;
pub mod notice;
pub mod payroll;
pub mod payroll_deduction;
pub mod refresh_token;
pub mod role;
pub mod role_menu;
pub mod roster;
pub mod salary_deduction_rule;
pub mod user;

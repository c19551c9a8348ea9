//! HR vertical slice.
//!
//! Pure business rules with no I/O: the server loads rows, hands them to these
//! functions, and persists whatever comes back.

pub mod attendance;
pub mod calendar;
pub mod error;
pub mod hierarchy;
pub mod leave;
pub mod payroll;

pub use error::{HrError, HrResult};

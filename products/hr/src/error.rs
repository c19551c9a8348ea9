use chrono::NaiveDate;
use thiserror::Error;

pub type HrResult<T> = Result<T, HrError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HrError {
    #[error("hierarchy cannot be deeper than {max} levels")]
    DepthExceeded { max: usize },
    #[error("{0} would become its own ancestor")]
    Cycle(String),
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("invalid period {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },
    #[error("leave overlaps an existing request from {start} to {end}")]
    LeaveOverlap { start: NaiveDate, end: NaiveDate },
    #[error("insufficient leave balance: {requested} day(s) requested, {available} available")]
    InsufficientBalance { requested: i64, available: i64 },
    #[error("invalid deduction rule: {0}")]
    InvalidRule(String),
    #[error("gross salary cannot be negative")]
    NegativeSalary,
    #[error("gross salary cannot exceed {max} cents")]
    SalaryTooLarge { max: i64 },
    #[error("clock-out must be after clock-in")]
    ClockOutBeforeClockIn,
}

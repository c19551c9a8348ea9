use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{HrError, HrResult, calendar::WorkCalendar, leave::DateRange};

pub const FULL_DAY_MINUTES: i64 = 8 * 60;
pub const HALF_DAY_MINUTES: i64 = 4 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayStatus {
    Present,
    HalfDay,
    Absent,
}

impl DayStatus {
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes >= FULL_DAY_MINUTES {
            DayStatus::Present
        } else if minutes >= HALF_DAY_MINUTES {
            DayStatus::HalfDay
        } else {
            DayStatus::Absent
        }
    }

    /// Fraction of a day this status pays for.
    pub fn credit(self) -> f64 {
        match self {
            DayStatus::Present => 1.0,
            DayStatus::HalfDay => 0.5,
            DayStatus::Absent => 0.0,
        }
    }
}

pub fn worked_minutes(
    clock_in: DateTime<FixedOffset>,
    clock_out: DateTime<FixedOffset>,
) -> HrResult<i64> {
    if clock_out <= clock_in {
        return Err(HrError::ClockOutBeforeClockIn);
    }
    Ok((clock_out - clock_in).num_minutes())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub present: u32,
    pub half_days: u32,
    pub absent: u32,
    pub worked_minutes: i64,
}

impl MonthSummary {
    pub fn from_records(records: impl IntoIterator<Item = (DayStatus, i64)>) -> Self {
        records
            .into_iter()
            .fold(Self::default(), |mut acc, (status, minutes)| {
                match status {
                    DayStatus::Present => acc.present += 1,
                    DayStatus::HalfDay => acc.half_days += 1,
                    DayStatus::Absent => acc.absent += 1,
                }
                acc.worked_minutes += minutes;
                acc
            })
    }
}

/// Days the employee is paid for within `period`.
///
/// Only working days count. Each one is credited with the better of its
/// attendance status and any approved paid leave covering it, so the result
/// never exceeds the number of working days.
pub fn paid_days(
    calendar: &WorkCalendar,
    period: &DateRange,
    attendance: &[(NaiveDate, DayStatus)],
    paid_leave: &[DateRange],
) -> f64 {
    let by_day: HashMap<NaiveDate, DayStatus> = attendance.iter().copied().collect();
    calendar
        .working_days(period.start, period.end)
        .into_iter()
        .map(|day| {
            let attended = by_day.get(&day).map(|s| s.credit()).unwrap_or(0.0);
            let on_leave = if paid_leave.iter().any(|leave| leave.contains(day)) {
                1.0
            } else {
                0.0
            };
            f64::max(attended, on_leave)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 3, hour, minute, 0)
            .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn classifies_worked_time() {
        let minutes = worked_minutes(at(9, 0), at(17, 30)).unwrap();
        assert_eq!(minutes, 510);
        assert_eq!(DayStatus::from_minutes(minutes), DayStatus::Present);
        assert_eq!(DayStatus::from_minutes(300), DayStatus::HalfDay);
        assert_eq!(DayStatus::from_minutes(90), DayStatus::Absent);
        assert_eq!(
            worked_minutes(at(9, 0), at(8, 0)),
            Err(HrError::ClockOutBeforeClockIn)
        );
    }

    #[test]
    fn summary_tallies_statuses() {
        let summary = MonthSummary::from_records([
            (DayStatus::Present, 480),
            (DayStatus::HalfDay, 250),
            (DayStatus::Present, 500),
        ]);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.half_days, 1);
        assert_eq!(summary.worked_minutes, 1230);
    }

    #[test]
    fn paid_days_combine_attendance_and_leave() {
        // Mon 3rd .. Sun 9th June 2024: six working days.
        let period = DateRange::new(day(3), day(9)).unwrap();
        let calendar = WorkCalendar::default();
        let attendance = [
            (day(3), DayStatus::Present),
            (day(4), DayStatus::HalfDay),
            (day(5), DayStatus::HalfDay),
            // Sunday attendance is not paid extra.
            (day(9), DayStatus::Present),
        ];
        let leave = [DateRange::new(day(5), day(6)).unwrap()];
        let paid = paid_days(&calendar, &period, &attendance, &leave);
        assert_eq!(paid, 1.0 + 0.5 + 1.0 + 1.0);
    }
}

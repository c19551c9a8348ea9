use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::{HrError, HrResult};

/// First and last calendar day of a month.
pub fn month_bounds(year: i32, month: u32) -> HrResult<(NaiveDate, NaiveDate)> {
    let start =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(HrError::InvalidPeriod { year, month })?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(HrError::InvalidPeriod { year, month })?;
    Ok((start, next - Duration::days(1)))
}

pub fn days_in_month(year: i32, month: u32) -> HrResult<u32> {
    let (_, end) = month_bounds(year, month)?;
    Ok(end.day())
}

/// Parses a comma separated weekday list such as `"sat,sun"`. Unknown entries
/// are skipped; the result is unique and ordered Monday first.
pub fn parse_weekdays(value: &str) -> Vec<Weekday> {
    let mut days: Vec<Weekday> = value
        .split(',')
        .filter_map(|raw| raw.trim().parse::<Weekday>().ok())
        .collect();
    days.sort_by_key(Weekday::num_days_from_monday);
    days.dedup();
    days
}

pub fn format_weekdays(days: &[Weekday]) -> String {
    days.iter()
        .map(|day| format!("{:?}", day).to_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

/// Which days count as working days for one employee.
#[derive(Clone, Debug)]
pub struct WorkCalendar {
    weekly_offs: Vec<Weekday>,
    off_dates: BTreeSet<NaiveDate>,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::new(vec![Weekday::Sun])
    }
}

impl WorkCalendar {
    pub fn new(weekly_offs: Vec<Weekday>) -> Self {
        Self {
            weekly_offs,
            off_dates: BTreeSet::new(),
        }
    }

    /// Adds individual days off, e.g. rostered rest days.
    pub fn with_off_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.off_dates.extend(dates);
        self
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !self.weekly_offs.contains(&date.weekday()) && !self.off_dates.contains(&date)
    }

    pub fn working_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| self.is_working_day(*day))
            .collect()
    }

    pub fn working_days_in_month(&self, year: i32, month: u32) -> HrResult<Vec<NaiveDate>> {
        let (start, end) = month_bounds(year, month)?;
        Ok(self.working_days(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_bounds_handle_leap_years_and_december() {
        assert_eq!(month_bounds(2024, 2).unwrap(), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_bounds(2023, 12).unwrap().1, date(2023, 12, 31));
        assert_eq!(days_in_month(2023, 2).unwrap(), 28);
        assert!(month_bounds(2024, 13).is_err());
    }

    #[test]
    fn sundays_and_rostered_days_are_excluded() {
        // June 2024 has five Sundays.
        let calendar = WorkCalendar::default();
        assert_eq!(calendar.working_days_in_month(2024, 6).unwrap().len(), 25);

        let rostered = WorkCalendar::default().with_off_dates([date(2024, 6, 3), date(2024, 6, 9)]);
        // The 9th is already a Sunday.
        assert_eq!(rostered.working_days_in_month(2024, 6).unwrap().len(), 24);
    }

    #[test]
    fn weekday_lists_round_trip() {
        let days = parse_weekdays("sat, Sunday,bogus");
        assert_eq!(days, vec![Weekday::Sat, Weekday::Sun]);
        assert_eq!(format_weekdays(&days), "sat,sun");
    }

    #[test]
    fn repeated_weekdays_collapse_wherever_they_appear() {
        let days = parse_weekdays("sun,sat,sun,fri");
        assert_eq!(days, vec![Weekday::Fri, Weekday::Sat, Weekday::Sun]);
        assert_eq!(format_weekdays(&days), "fri,sat,sun");
    }
}

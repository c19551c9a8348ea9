use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{HrError, HrResult};

/// Inclusive calendar range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> HrResult<Self> {
        if start > end {
            return Err(HrError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, existing: &DateRange) -> bool {
        let starts_inside = existing.start <= self.start && self.start <= existing.end;
        let ends_inside = existing.start <= self.end && self.end <= existing.end;
        let encloses = self.start <= existing.start && existing.end <= self.end;
        let enclosed = existing.start <= self.start && self.end <= existing.end;
        starts_inside || ends_inside || encloses || enclosed
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let mut next = Some(self.start);
        std::iter::from_fn(move || {
            let current = next?;
            next = if current < self.end {
                Some(current + Duration::days(1))
            } else {
                None
            };
            Some(current)
        })
    }
}

/// Rejects `candidate` if it overlaps any of the employee's live requests.
pub fn ensure_no_overlap<'a>(
    candidate: &DateRange,
    existing: impl IntoIterator<Item = &'a DateRange>,
) -> HrResult<()> {
    match existing.into_iter().find(|range| candidate.overlaps(range)) {
        Some(clash) => Err(HrError::LeaveOverlap {
            start: clash.start,
            end: clash.end,
        }),
        None => Ok(()),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub allowance: i64,
    pub approved: i64,
    pub pending: i64,
}

impl LeaveBalance {
    pub fn available(&self) -> i64 {
        (self.allowance - self.approved - self.pending).max(0)
    }

    pub fn ensure_can_take(&self, requested: i64) -> HrResult<()> {
        let available = self.available();
        if requested > available {
            return Err(HrError::InsufficientBalance {
                requested,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: (u32, u32), end: (u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, start.0, start.1).unwrap(),
            NaiveDate::from_ymd_opt(2024, end.0, end.1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_inverted_ranges() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(matches!(
            DateRange::new(start, end),
            Err(HrError::InvalidRange { .. })
        ));
    }

    #[test]
    fn counts_days_inclusively() {
        assert_eq!(range((3, 1), (3, 1)).days(), 1);
        assert_eq!(range((2, 27), (3, 2)).days(), 5);
        assert_eq!(range((2, 27), (3, 2)).iter_days().count(), 5);
    }

    #[test]
    fn detects_each_overlap_case() {
        let existing = range((3, 10), (3, 15));
        assert!(range((3, 12), (3, 20)).overlaps(&existing), "starts inside");
        assert!(range((3, 5), (3, 10)).overlaps(&existing), "ends inside");
        assert!(range((3, 1), (3, 31)).overlaps(&existing), "encloses");
        assert!(range((3, 11), (3, 14)).overlaps(&existing), "enclosed");
        assert!(!range((3, 1), (3, 9)).overlaps(&existing));
        assert!(!range((3, 16), (3, 18)).overlaps(&existing));
    }

    #[test]
    fn reports_the_clashing_range() {
        let existing = [range((1, 1), (1, 3)), range((3, 10), (3, 15))];
        let err = ensure_no_overlap(&range((3, 15), (3, 16)), existing.iter()).unwrap_err();
        assert_eq!(
            err,
            HrError::LeaveOverlap {
                start: existing[1].start,
                end: existing[1].end
            }
        );
        assert!(ensure_no_overlap(&range((2, 1), (2, 2)), existing.iter()).is_ok());
    }

    #[test]
    fn balance_counts_pending_requests() {
        let balance = LeaveBalance {
            allowance: 12,
            approved: 5,
            pending: 4,
        };
        assert_eq!(balance.available(), 3);
        assert!(balance.ensure_can_take(3).is_ok());
        assert_eq!(
            balance.ensure_can_take(4),
            Err(HrError::InsufficientBalance {
                requested: 4,
                available: 3
            })
        );
    }
}

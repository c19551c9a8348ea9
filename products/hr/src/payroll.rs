//! Salary split, rule-based deductions and loss of pay.
//!
//! Money is carried as integer cents. Percentages are applied in floating
//! point and rounded half away from zero back to whole cents, so every
//! persisted figure is exact and `net = gross - total_deductions` holds
//! without tolerance.

use serde::{Deserialize, Serialize};

use crate::{HrError, HrResult};

pub const BASIC_PERCENT: f64 = 50.0;
pub const HRA_PERCENT: f64 = 20.0;
pub const MONTHS_PER_YEAR: i64 = 12;
/// Monthly ceiling. Keeps annualised figures well inside both `i64` and the
/// exact integer range of `f64`.
pub const MAX_GROSS_CENTS: i64 = 100_000_000_000_000;

pub fn check_gross(gross_cents: i64) -> HrResult<()> {
    if gross_cents < 0 {
        return Err(HrError::NegativeSalary);
    }
    if gross_cents > MAX_GROSS_CENTS {
        return Err(HrError::SalaryTooLarge {
            max: MAX_GROSS_CENTS,
        });
    }
    Ok(())
}

/// `rate` percent of `amount`, rounded to the nearest cent.
pub fn percent_of(amount_cents: i64, rate: f64) -> i64 {
    (amount_cents as f64 * rate / 100.0).round() as i64
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalarySplit {
    pub gross_cents: i64,
    pub basic_cents: i64,
    pub hra_cents: i64,
    pub allowance_cents: i64,
}

impl SalarySplit {
    /// Basic and HRA are fixed shares of gross; the allowance absorbs the
    /// remainder so the parts always add back up to gross.
    pub fn from_gross(gross_cents: i64) -> HrResult<Self> {
        check_gross(gross_cents)?;
        let basic_cents = percent_of(gross_cents, BASIC_PERCENT);
        let hra_cents = percent_of(gross_cents, HRA_PERCENT);
        Ok(Self {
            gross_cents,
            basic_cents,
            hra_cents,
            allowance_cents: gross_cents - basic_cents - hra_cents,
        })
    }
}

/// One band of an annual income tax table. `to_cents` is exclusive; `None`
/// means unbounded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxSlab {
    pub from_cents: i64,
    #[serde(default)]
    pub to_cents: Option<i64>,
    pub rate: f64,
}

impl TaxSlab {
    fn contains(&self, annual_cents: i64) -> bool {
        self.from_cents <= annual_cents && self.to_cents.is_none_or(|to| annual_cents < to)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeductionKind {
    Fixed { amount_cents: i64 },
    PercentOfBasic { rate: f64 },
    PercentOfGross { rate: f64 },
    TaxSlab { slabs: Vec<TaxSlab> },
}

impl DeductionKind {
    pub fn validate(&self) -> HrResult<()> {
        match self {
            DeductionKind::Fixed { amount_cents } if *amount_cents < 0 => Err(
                HrError::InvalidRule("fixed amount cannot be negative".into()),
            ),
            DeductionKind::Fixed { .. } => Ok(()),
            DeductionKind::PercentOfBasic { rate } | DeductionKind::PercentOfGross { rate } => {
                validate_rate(*rate)
            }
            DeductionKind::TaxSlab { slabs } => validate_slabs(slabs),
        }
    }

    pub fn amount(&self, split: &SalarySplit) -> i64 {
        let raw = match self {
            DeductionKind::Fixed { amount_cents } => *amount_cents,
            DeductionKind::PercentOfBasic { rate } => percent_of(split.basic_cents, *rate),
            DeductionKind::PercentOfGross { rate } => percent_of(split.gross_cents, *rate),
            DeductionKind::TaxSlab { slabs } => {
                let annual = split.gross_cents.saturating_mul(MONTHS_PER_YEAR);
                slabs
                    .iter()
                    .find(|slab| slab.contains(annual))
                    .map(|slab| percent_of(split.gross_cents, slab.rate))
                    .unwrap_or(0)
            }
        };
        raw.max(0)
    }
}

fn validate_rate(rate: f64) -> HrResult<()> {
    if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
        return Err(HrError::InvalidRule(format!(
            "rate {rate} must be between 0 and 100"
        )));
    }
    Ok(())
}

fn validate_slabs(slabs: &[TaxSlab]) -> HrResult<()> {
    if slabs.is_empty() {
        return Err(HrError::InvalidRule(
            "tax slab rule needs at least one slab".into(),
        ));
    }
    let mut sorted: Vec<&TaxSlab> = slabs.iter().collect();
    sorted.sort_by_key(|slab| slab.from_cents);
    for slab in &sorted {
        validate_rate(slab.rate)?;
        if slab.from_cents < 0 {
            return Err(HrError::InvalidRule("slab start cannot be negative".into()));
        }
        if let Some(to) = slab.to_cents {
            if to <= slab.from_cents {
                return Err(HrError::InvalidRule(format!(
                    "slab starting at {} must end after it starts",
                    slab.from_cents
                )));
            }
        }
    }
    for pair in sorted.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        match lower.to_cents {
            None => {
                return Err(HrError::InvalidRule(
                    "only the highest slab may be unbounded".into(),
                ));
            }
            Some(to) if to > upper.from_cents => {
                return Err(HrError::InvalidRule(format!(
                    "slabs starting at {} and {} overlap",
                    lower.from_cents, upper.from_cents
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeductionRule {
    pub name: String,
    #[serde(flatten)]
    pub kind: DeductionKind,
}

/// A computed deduction. `rule_index` points back into the rule slice passed to
/// [`compute`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionLine {
    pub rule_index: usize,
    pub name: String,
    pub amount_cents: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossOfPay {
    pub working_days: f64,
    pub paid_days: f64,
    pub lop_days: f64,
    pub amount_cents: i64,
}

impl LossOfPay {
    /// Per-day rate is gross spread over the month's working days. A month with
    /// no working days has nothing to lose.
    pub fn compute(gross_cents: i64, working_days: u32, paid_days: f64) -> Self {
        let working = f64::from(working_days);
        let paid = paid_days.clamp(0.0, working);
        let lop_days = working - paid;
        let amount_cents = if working_days == 0 {
            0
        } else {
            ((gross_cents as f64 / working * lop_days).round() as i64).clamp(0, gross_cents.max(0))
        };
        Self {
            working_days: working,
            paid_days: paid,
            lop_days,
            amount_cents,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PayrollInput<'a> {
    pub gross_cents: i64,
    pub working_days: u32,
    pub paid_days: f64,
    pub rules: &'a [DeductionRule],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayrollBreakdown {
    pub split: SalarySplit,
    pub loss_of_pay: LossOfPay,
    pub lines: Vec<DeductionLine>,
    pub total_deductions_cents: i64,
    pub net_cents: i64,
}

impl PayrollBreakdown {
    pub fn rule_deductions_cents(&self) -> i64 {
        self.lines
            .iter()
            .fold(0i64, |sum, line| sum.saturating_add(line.amount_cents))
    }
}

/// Runs the whole pipeline for one employee-month.
///
/// Loss of pay is taken first, then each rule in order. Once deductions reach
/// gross, later amounts are trimmed so net bottoms out at zero and the total
/// still equals the sum of the parts.
pub fn compute(input: &PayrollInput<'_>) -> HrResult<PayrollBreakdown> {
    let split = SalarySplit::from_gross(input.gross_cents)?;
    for rule in input.rules {
        rule.kind.validate()?;
    }

    let mut remaining = split.gross_cents;
    let mut take = |amount: i64| {
        let taken = amount.min(remaining);
        remaining -= taken;
        taken
    };

    let mut loss_of_pay = LossOfPay::compute(split.gross_cents, input.working_days, input.paid_days);
    loss_of_pay.amount_cents = take(loss_of_pay.amount_cents);

    let lines: Vec<DeductionLine> = input
        .rules
        .iter()
        .enumerate()
        .map(|(rule_index, rule)| DeductionLine {
            rule_index,
            name: rule.name.clone(),
            amount_cents: take(rule.kind.amount(&split)),
        })
        .collect();

    let total_deductions_cents = lines
        .iter()
        .fold(loss_of_pay.amount_cents, |sum, line| sum.saturating_add(line.amount_cents));
    Ok(PayrollBreakdown {
        split,
        loss_of_pay,
        lines,
        total_deductions_cents,
        net_cents: split.gross_cents - total_deductions_cents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, kind: DeductionKind) -> DeductionRule {
        DeductionRule {
            name: name.into(),
            kind,
        }
    }

    fn slabs() -> Vec<TaxSlab> {
        vec![
            TaxSlab {
                from_cents: 0,
                to_cents: Some(50_000_000),
                rate: 0.0,
            },
            TaxSlab {
                from_cents: 50_000_000,
                to_cents: Some(100_000_000),
                rate: 10.0,
            },
            TaxSlab {
                from_cents: 100_000_000,
                to_cents: None,
                rate: 20.0,
            },
        ]
    }

    #[test]
    fn split_always_sums_to_gross() {
        for gross in [0, 1, 99, 100_001, 5_000_000, 123_456_789] {
            let split = SalarySplit::from_gross(gross).unwrap();
            assert_eq!(
                split.basic_cents + split.hra_cents + split.allowance_cents,
                gross
            );
        }
        let split = SalarySplit::from_gross(6_000_000).unwrap();
        assert_eq!(split.basic_cents, 3_000_000);
        assert_eq!(split.hra_cents, 1_200_000);
        assert_eq!(split.allowance_cents, 1_800_000);
        assert_eq!(SalarySplit::from_gross(-1), Err(HrError::NegativeSalary));
    }

    #[test]
    fn each_rule_kind_is_applied() {
        let split = SalarySplit::from_gross(6_000_000).unwrap();
        assert_eq!(
            DeductionKind::Fixed {
                amount_cents: 20_000
            }
            .amount(&split),
            20_000
        );
        assert_eq!(
            DeductionKind::PercentOfBasic { rate: 12.0 }.amount(&split),
            360_000
        );
        assert_eq!(
            DeductionKind::PercentOfGross { rate: 1.5 }.amount(&split),
            90_000
        );
        // 60k/month is 720k/year: the 10% band.
        assert_eq!(
            DeductionKind::TaxSlab { slabs: slabs() }.amount(&split),
            600_000
        );
    }

    #[test]
    fn tax_slab_bounds_are_half_open() {
        let kind = DeductionKind::TaxSlab { slabs: slabs() };
        // Just over 1,000,000.00 a year lands in the top band.
        let split = SalarySplit::from_gross(100_000_000 / 12 + 1).unwrap();
        assert_eq!(kind.amount(&split), percent_of(split.gross_cents, 20.0));
        let below = SalarySplit::from_gross(100_000_000 / 12 - 1).unwrap();
        assert_eq!(kind.amount(&below), percent_of(below.gross_cents, 10.0));
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(DeductionKind::Fixed { amount_cents: -5 }.validate().is_err());
        assert!(DeductionKind::PercentOfGross { rate: 101.0 }.validate().is_err());
        assert!(DeductionKind::PercentOfBasic { rate: f64::NAN }.validate().is_err());
        assert!(DeductionKind::TaxSlab { slabs: vec![] }.validate().is_err());
        let overlapping = vec![
            TaxSlab {
                from_cents: 0,
                to_cents: Some(200),
                rate: 0.0,
            },
            TaxSlab {
                from_cents: 100,
                to_cents: None,
                rate: 5.0,
            },
        ];
        assert!(
            DeductionKind::TaxSlab {
                slabs: overlapping
            }
            .validate()
            .is_err()
        );
        assert!(DeductionKind::TaxSlab { slabs: slabs() }.validate().is_ok());
    }

    #[test]
    fn loss_of_pay_uses_working_days() {
        let lop = LossOfPay::compute(2_600_000, 26, 24.5);
        assert_eq!(lop.lop_days, 1.5);
        assert_eq!(lop.amount_cents, 150_000);
        assert_eq!(LossOfPay::compute(2_600_000, 26, 30.0).amount_cents, 0);
        assert_eq!(LossOfPay::compute(2_600_000, 0, 0.0).amount_cents, 0);
    }

    #[test]
    fn net_equals_gross_minus_deductions() {
        let rules = vec![
            rule("PF", DeductionKind::PercentOfBasic { rate: 12.0 }),
            rule(
                "Professional tax",
                DeductionKind::Fixed {
                    amount_cents: 20_000,
                },
            ),
            rule("Income tax", DeductionKind::TaxSlab { slabs: slabs() }),
        ];
        let breakdown = compute(&PayrollInput {
            gross_cents: 6_000_000,
            working_days: 25,
            paid_days: 23.0,
            rules: &rules,
        })
        .unwrap();
        assert_eq!(breakdown.loss_of_pay.amount_cents, 480_000);
        assert_eq!(breakdown.rule_deductions_cents(), 360_000 + 20_000 + 600_000);
        assert_eq!(
            breakdown.net_cents,
            6_000_000 - breakdown.loss_of_pay.amount_cents - breakdown.rule_deductions_cents()
        );
        assert_eq!(
            breakdown.total_deductions_cents,
            breakdown.split.gross_cents - breakdown.net_cents
        );
        assert_eq!(breakdown.lines[2].rule_index, 2);
    }

    #[test]
    fn deductions_never_push_net_below_zero() {
        let rules = vec![
            rule(
                "Advance recovery",
                DeductionKind::Fixed {
                    amount_cents: 900_000,
                },
            ),
            rule("Canteen", DeductionKind::Fixed { amount_cents: 5_000 }),
        ];
        let breakdown = compute(&PayrollInput {
            gross_cents: 1_000_000,
            working_days: 20,
            paid_days: 5.0,
            rules: &rules,
        })
        .unwrap();
        assert_eq!(breakdown.loss_of_pay.amount_cents, 750_000);
        assert_eq!(breakdown.lines[0].amount_cents, 250_000);
        assert_eq!(breakdown.lines[1].amount_cents, 0);
        assert_eq!(breakdown.net_cents, 0);
        assert_eq!(breakdown.total_deductions_cents, 1_000_000);
    }

    #[test]
    fn oversized_salaries_are_refused_before_any_arithmetic() {
        assert_eq!(
            SalarySplit::from_gross(1_000_000_000_000_000_000),
            Err(HrError::SalaryTooLarge {
                max: MAX_GROSS_CENTS
            })
        );
        let rules = vec![rule(
            "Income tax",
            DeductionKind::TaxSlab {
                slabs: vec![TaxSlab {
                    from_cents: 0,
                    to_cents: None,
                    rate: 10.0,
                }],
            },
        )];
        let input = |gross_cents| PayrollInput {
            gross_cents,
            working_days: 22,
            paid_days: 22.0,
            rules: &rules,
        };
        assert!(compute(&input(1_000_000_000_000_000_000)).is_err());

        let top = compute(&input(MAX_GROSS_CENTS)).unwrap();
        assert_eq!(top.lines[0].amount_cents, MAX_GROSS_CENTS / 10);
        assert_eq!(top.net_cents, MAX_GROSS_CENTS - top.total_deductions_cents);
    }

    #[test]
    fn slab_lookup_saturates_instead_of_overflowing() {
        let split = SalarySplit {
            gross_cents: i64::MAX / 2,
            basic_cents: 0,
            hra_cents: 0,
            allowance_cents: 0,
        };
        let kind = DeductionKind::TaxSlab {
            slabs: vec![TaxSlab {
                from_cents: 0,
                to_cents: None,
                rate: 0.0,
            }],
        };
        assert_eq!(kind.amount(&split), 0);
    }

    #[test]
    fn rules_deserialize_from_tagged_json() {
        let parsed: DeductionRule = serde_json::from_value(serde_json::json!({
            "name": "ESI",
            "kind": "PERCENT_OF_GROSS",
            "rate": 0.75
        }))
        .unwrap();
        assert_eq!(parsed.kind, DeductionKind::PercentOfGross { rate: 0.75 });
    }
}

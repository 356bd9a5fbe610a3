//! Balance threshold evaluation.

use std::fmt;

use crate::monitor::types::{BalanceSnapshot, Breach};

/// Configured minimum balance, a finite non-negative real.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Minimum(f64);

impl Minimum {
    /// Returns `None` for negative, NaN or infinite values.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// `true` when `amount` is strictly below the minimum.
    pub fn is_breached_by(&self, amount: i64) -> bool {
        (amount as f64) < self.0
    }
}

// Shortest round-trip decimal: 100.0 renders as "100", 0.5 as "0.5".
impl fmt::Display for Minimum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Emit one breach per entry whose amount is strictly below `minimum`.
///
/// Each entry is judged on its own; callers must not rely on the order of
/// the returned breaches.
pub fn evaluate(snapshot: &BalanceSnapshot, minimum: Minimum) -> Vec<Breach> {
    snapshot
        .entries
        .iter()
        .filter(|entry| minimum.is_breached_by(entry.amount))
        .map(|entry| Breach {
            amount: entry.amount,
            currency: entry.currency.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::BalanceEntry;
    use proptest::prelude::*;

    fn snapshot(amounts: &[i64]) -> BalanceSnapshot {
        BalanceSnapshot::new(
            amounts
                .iter()
                .map(|amount| BalanceEntry::new(*amount, "usd"))
                .collect(),
        )
    }

    fn sorted_amounts(breaches: &[Breach]) -> Vec<i64> {
        let mut amounts: Vec<i64> = breaches.iter().map(|b| b.amount).collect();
        amounts.sort_unstable();
        amounts
    }

    #[test]
    fn minimum_rejects_negative_and_non_finite_values() {
        assert!(Minimum::new(-1.0).is_none());
        assert!(Minimum::new(f64::NAN).is_none());
        assert!(Minimum::new(f64::INFINITY).is_none());
        assert!(Minimum::new(0.0).is_some());
    }

    #[test]
    fn minimum_displays_like_a_plain_decimal() {
        assert_eq!(Minimum::new(100.0).unwrap().to_string(), "100");
        assert_eq!(Minimum::new(99.5).unwrap().to_string(), "99.5");
    }

    #[test]
    fn only_entries_strictly_below_minimum_breach() {
        let minimum = Minimum::new(100.0).unwrap();
        let breaches = evaluate(&snapshot(&[50, 150, 99, 100]), minimum);

        assert_eq!(sorted_amounts(&breaches), vec![50, 99]);
    }

    #[test]
    fn fractional_minimum_compares_against_integer_amounts() {
        let minimum = Minimum::new(100.5).unwrap();
        let breaches = evaluate(&snapshot(&[100, 101]), minimum);

        assert_eq!(sorted_amounts(&breaches), vec![100]);
    }

    #[test]
    fn empty_snapshot_yields_no_breaches() {
        let minimum = Minimum::new(10.0).unwrap();
        assert!(evaluate(&BalanceSnapshot::default(), minimum).is_empty());
    }

    #[test]
    fn breach_keeps_currency_of_entry() {
        let minimum = Minimum::new(10.0).unwrap();
        let snapshot = BalanceSnapshot::new(vec![BalanceEntry::new(5, "eur")]);

        let breaches = evaluate(&snapshot, minimum);
        assert_eq!(breaches[0].currency, "eur");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn breaches_are_exactly_entries_below_minimum(
            amounts in prop::collection::vec(-1_000_000i64..1_000_000i64, 0..40),
            minimum in 0u32..1_000_000u32,
        ) {
            let min = Minimum::new(minimum as f64).unwrap();
            let breaches = evaluate(&snapshot(&amounts), min);

            let mut expected: Vec<i64> = amounts
                .iter()
                .copied()
                .filter(|amount| *amount < minimum as i64)
                .collect();
            expected.sort_unstable();

            prop_assert_eq!(sorted_amounts(&breaches), expected);
        }

        #[test]
        fn entries_equal_to_minimum_never_breach(minimum in 0u32..1_000_000u32) {
            let min = Minimum::new(minimum as f64).unwrap();
            prop_assert!(evaluate(&snapshot(&[minimum as i64]), min).is_empty());
        }
    }
}

//! Apportionment

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::money::{self, AmountError};

/// Split `total` minor units proportionally to `weights`.
///
/// Each share is rounded down and the remainder goes to the last entry with a
/// non-zero weight, so the shares always sum to `total`. Negative weights count
/// as zero. When every weight is zero the total is split evenly, with the
/// remainder on the last entry.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the weights overflow.
pub fn apportion(total: i64, weights: &[i64]) -> Result<SmallVec<[i64; 8]>, AmountError> {
    if weights.is_empty() {
        return Ok(SmallVec::new());
    }

    let clamped: SmallVec<[i128; 8]> = weights.iter().map(|w| i128::from((*w).max(0))).collect();
    let positive: i128 = clamped.iter().sum();

    let (effective, sum) = if positive == 0 {
        let ones: SmallVec<[i128; 8]> = clamped.iter().map(|_| 1).collect();
        let count = i128::try_from(ones.len()).ok().ok_or(AmountError::Overflow)?;

        (ones, count)
    } else {
        (clamped, positive)
    };

    let mut shares: SmallVec<[i64; 8]> = SmallVec::with_capacity(effective.len());
    let mut allocated: i64 = 0;
    let mut last = 0;

    for (index, weight) in effective.iter().enumerate() {
        let share = i64::try_from(i128::from(total) * weight / sum)
            .ok()
            .ok_or(AmountError::Overflow)?;

        allocated = allocated.checked_add(share).ok_or(AmountError::Overflow)?;
        shares.push(share);

        if *weight > 0 {
            last = index;
        }
    }

    if let Some(share) = shares.get_mut(last) {
        *share = share
            .checked_add(total - allocated)
            .ok_or(AmountError::Overflow)?;
    }

    Ok(shares)
}

/// Split `total` proportionally to the `weights` amounts.
///
/// # Errors
///
/// Returns an [`AmountError`] if any weight is in another currency.
pub fn apportion_money<'a>(
    total: Money<'a, Currency>,
    weights: &[Money<'a, Currency>],
) -> Result<SmallVec<[Money<'a, Currency>; 8]>, AmountError> {
    let currency = total.currency();

    let minor: SmallVec<[i64; 8]> = weights
        .iter()
        .map(|weight| {
            money::ensure_currency(weight, currency)?;

            Ok(weight.to_minor_units())
        })
        .collect::<Result<_, AmountError>>()?;

    Ok(apportion(total.to_minor_units(), &minor)?
        .into_iter()
        .map(|share| Money::from_minor(share, currency))
        .collect())
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn remainder_goes_to_last_item() -> TestResult {
        assert_eq!(apportion(1_000, &[1_000, 1_000, 1_000])?.as_slice(), &[333, 333, 334]);

        Ok(())
    }

    #[test]
    fn shares_follow_weights() -> TestResult {
        assert_eq!(apportion(900, &[2_000, 1_000])?.as_slice(), &[600, 300]);
        assert_eq!(apportion(100, &[1, 1, 1, 0])?.as_slice(), &[33, 33, 34, 0]);

        Ok(())
    }

    #[test]
    fn zero_weights_split_evenly() -> TestResult {
        assert_eq!(apportion(100, &[0, 0, 0])?.as_slice(), &[33, 33, 34]);

        Ok(())
    }

    #[test]
    fn empty_weights_yield_nothing() -> TestResult {
        assert!(apportion(100, &[])?.is_empty());

        Ok(())
    }

    #[test]
    fn shares_always_sum_to_total() -> TestResult {
        let cases: [(i64, &[i64]); 4] = [
            (9_999, &[1, 2, 3, 4, 5, 6, 7]),
            (1, &[500, 500]),
            (12_345, &[333, 0, 667]),
            (0, &[10, 20]),
        ];

        for (total, weights) in cases {
            let shares = apportion(total, weights)?;

            assert_eq!(shares.iter().sum::<i64>(), total, "weights {weights:?}");
        }

        Ok(())
    }

    #[test]
    fn money_apportionment_checks_currency() -> TestResult {
        let shares = apportion_money(
            Money::from_minor(1_000, USD),
            &[Money::from_minor(1_000, USD), Money::from_minor(3_000, USD)],
        )?;

        assert_eq!(
            shares.as_slice(),
            &[Money::from_minor(250, USD), Money::from_minor(750, USD)]
        );
        assert!(
            apportion_money(Money::from_minor(1_000, USD), &[Money::from_minor(1, GBP)]).is_err()
        );

        Ok(())
    }
}

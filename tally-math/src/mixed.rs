//! Multi-commodity amounts
//!
//! A MixedAmount is an ordered collection of Amounts, merged internally so
//! that there is one entry per (commodity, price) combination. The raw view
//! exposes that internal structure, zeros included; the normalized view
//! additionally prunes zero components. The price inferrer depends on this
//! normalization, so the merge keys are part of the engine's semantics, not
//! a storage detail.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use num_rational::BigRational;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::amount::{Amount, AmountPrice};
use crate::style::{Commodity, StyleMap};

/// An ordered multiset of amounts, one entry per (commodity, price)
/// combination.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MixedAmount {
    amounts: SmallVec<[Amount; 2]>,
}

/// Merge identity for amounts: same commodity, and prices that denote the
/// same conversion (none, same-rate unit, or same-commodity total).
fn same_key(a: &Amount, b: &Amount) -> bool {
    if a.commodity != b.commodity {
        return false;
    }
    match (&a.price, &b.price) {
        (None, None) => true,
        (Some(AmountPrice::Unit(pa)), Some(AmountPrice::Unit(pb))) => {
            pa.commodity == pb.commodity && pa.quantity == pb.quantity
        }
        (Some(AmountPrice::Total(pa)), Some(AmountPrice::Total(pb))) => {
            pa.commodity == pb.commodity
        }
        _ => false,
    }
}

impl MixedAmount {
    /// An empty mixed amount (zero in no particular commodity).
    pub fn new() -> Self {
        Self::default()
    }

    /// A mixed amount holding a single amount.
    pub fn from_amount(amount: Amount) -> Self {
        let mut m = Self::new();
        m.add_amount(amount);
        m
    }

    /// True when no amounts are stored at all.
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Add a single amount, merging it into an existing entry with the
    /// same (commodity, price) key. Merging two total-priced entries sums
    /// the total prices as well.
    pub fn add_amount(&mut self, amount: Amount) {
        if let Some(existing) = self.amounts.iter_mut().find(|e| same_key(&**e, &amount)) {
            existing.quantity += &amount.quantity;
            if let (Some(AmountPrice::Total(ep)), Some(AmountPrice::Total(ap))) =
                (&mut existing.price, &amount.price)
            {
                ep.quantity += &ap.quantity;
            }
        } else {
            self.amounts.push(amount);
        }
    }

    /// The internal entries, zeros included, in first-appearance order.
    pub fn amounts_raw(&self) -> &[Amount] {
        &self.amounts
    }

    /// The normalized view: zero entries dropped, unless every entry is
    /// zero, in which case a single zero survives (commodity-less when the
    /// zeros span several commodities).
    pub fn amounts(&self) -> Vec<Amount> {
        let nonzeros: Vec<Amount> =
            self.amounts.iter().filter(|a| !a.is_really_zero()).cloned().collect();
        if !nonzeros.is_empty() {
            return nonzeros;
        }
        match self.amounts.len() {
            0 => Vec::new(),
            1 => vec![self.amounts[0].clone()],
            _ => vec![Amount::zero()],
        }
    }

    /// The single normalized amount, when there is exactly one.
    pub fn only_amount(&self) -> Option<Amount> {
        let mut normalized = self.amounts();
        if normalized.len() == 1 { normalized.pop() } else { None }
    }

    /// The normalized amount in one commodity, a zero of that commodity
    /// when absent. Entries differing only by price are collapsed.
    pub fn amount_in_commodity(&self, commodity: &Commodity) -> Amount {
        let mut matching =
            self.amounts().into_iter().filter(|a| &a.commodity == commodity);
        let Some(first) = matching.next() else {
            return Amount::from_i64(commodity.clone(), 0);
        };
        let mut total = first.strip_price();
        for a in matching {
            total.quantity += a.quantity;
        }
        total
    }

    /// Entries satisfying the predicate.
    pub fn filtered(&self, predicate: impl Fn(&Amount) -> bool) -> MixedAmount {
        self.amounts.iter().filter(|a| predicate(*a)).cloned().collect()
    }

    /// All entries negated.
    pub fn negated(&self) -> MixedAmount {
        self.amounts.iter().map(Amount::negated).collect()
    }

    /// Every entry converted to cost via its price, then re-merged.
    pub fn to_cost(&self) -> MixedAmount {
        self.amounts.iter().map(Amount::to_cost).collect()
    }

    /// Every entry without its conversion price, re-merged.
    pub fn strip_prices(&self) -> MixedAmount {
        self.amounts.iter().map(Amount::strip_price).collect()
    }

    /// Canonicalize under a style map: restyle every entry, then normalize
    /// (the rebuild re-merges entries).
    pub fn canonicalized(&self, styles: &StyleMap) -> MixedAmount {
        self.amounts.iter().map(|a| a.styled(styles)).collect()
    }

    /// Does every normalized entry round to zero at its display precision?
    pub fn looks_zero(&self) -> bool {
        self.amounts().iter().all(Amount::looks_zero)
    }

    /// Is every entry exactly zero?
    pub fn is_really_zero(&self) -> bool {
        self.amounts.iter().all(Amount::is_really_zero)
    }

    /// The overall sign, ignoring prices: `Some(true)` when every nonzero
    /// entry is negative, `Some(false)` when none is (or there are none),
    /// `None` when both signs occur.
    pub fn is_negative(&self) -> Option<bool> {
        let entries = self.strip_prices().amounts();
        if entries.is_empty() {
            return Some(false);
        }
        let negatives = entries.iter().filter(|a| a.is_negative()).count();
        if negatives == entries.len() {
            Some(true)
        } else if negatives == 0 {
            Some(false)
        } else {
            None
        }
    }

    /// Divide the single-commodity value by a rational quantity. `None`
    /// when the mixed amount does not normalize to one amount.
    pub fn divided_by(&self, divisor: &BigRational) -> Option<Amount> {
        self.only_amount().and_then(|a| a.divided_by(divisor).ok())
    }
}

impl FromIterator<Amount> for MixedAmount {
    fn from_iter<I: IntoIterator<Item = Amount>>(iter: I) -> Self {
        let mut m = MixedAmount::new();
        for a in iter {
            m.add_amount(a);
        }
        m
    }
}

impl From<Amount> for MixedAmount {
    fn from(amount: Amount) -> Self {
        MixedAmount::from_amount(amount)
    }
}

// Mixed amounts absorb any commodity, so their arithmetic is total, unlike
// single-amount arithmetic.
impl AddAssign<&MixedAmount> for MixedAmount {
    fn add_assign(&mut self, other: &MixedAmount) {
        for a in other.amounts_raw() {
            self.add_amount(a.clone());
        }
    }
}

impl AddAssign<MixedAmount> for MixedAmount {
    fn add_assign(&mut self, other: MixedAmount) {
        for a in other.amounts {
            self.add_amount(a);
        }
    }
}

impl Add for MixedAmount {
    type Output = MixedAmount;

    fn add(self, other: MixedAmount) -> Self::Output {
        let mut result = self;
        result += other;
        result
    }
}

impl Add<&MixedAmount> for MixedAmount {
    type Output = MixedAmount;

    fn add(self, other: &MixedAmount) -> Self::Output {
        let mut result = self;
        result += other;
        result
    }
}

impl SubAssign<&MixedAmount> for MixedAmount {
    fn sub_assign(&mut self, other: &MixedAmount) {
        for a in other.amounts_raw() {
            self.add_amount(a.negated());
        }
    }
}

impl Sub<&MixedAmount> for MixedAmount {
    type Output = MixedAmount;

    fn sub(self, other: &MixedAmount) -> Self::Output {
        let mut result = self;
        result -= other;
        result
    }
}

impl Neg for MixedAmount {
    type Output = MixedAmount;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl Sum for MixedAmount {
    fn sum<I: Iterator<Item = MixedAmount>>(iter: I) -> Self {
        iter.fold(MixedAmount::new(), |acc, m| acc + m)
    }
}

// Equality is on the normalized view, so internal zero entries don't
// distinguish otherwise equal values.
impl PartialEq for MixedAmount {
    fn eq(&self, other: &Self) -> bool {
        self.amounts() == other.amounts()
    }
}

impl fmt::Debug for MixedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MixedAmount({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn usd(n: i64) -> Amount {
        Amount::from_i64("USD", n)
    }

    fn eur(n: i64) -> Amount {
        Amount::from_i64("EUR", n)
    }

    #[test]
    fn test_same_commodity_amounts_merge() {
        let mut m = MixedAmount::new();
        m.add_amount(usd(5));
        m.add_amount(usd(-2));
        assert_eq!(m.amounts_raw().len(), 1);
        assert_eq!(m.amounts()[0].quantity, usd(3).quantity);
    }

    #[test]
    fn test_different_commodities_stay_separate() {
        let m: MixedAmount = [usd(5), eur(3)].into_iter().collect();
        assert_eq!(m.amounts().len(), 2);
        // first-appearance order is preserved
        assert_eq!(m.amounts()[0].commodity, "USD");
        assert_eq!(m.amounts()[1].commodity, "EUR");
    }

    #[test]
    fn test_priced_amounts_keep_their_own_entry() {
        let priced = usd(5).with_price(AmountPrice::Unit(Box::new(eur(1))));
        let m: MixedAmount = [usd(5), priced].into_iter().collect();
        assert_eq!(m.amounts().len(), 2);
    }

    #[test]
    fn test_merging_total_prices_sums_the_price() {
        let a = eur(3).with_price(AmountPrice::Total(Box::new(usd(4))));
        let b = eur(2).with_price(AmountPrice::Total(Box::new(usd(3))));
        let m: MixedAmount = [a, b].into_iter().collect();

        let merged = &m.amounts()[0];
        assert_eq!(merged.quantity, eur(5).quantity);
        match &merged.price {
            Some(AmountPrice::Total(p)) => assert_eq!(p.quantity, usd(7).quantity),
            other => panic!("expected total price, got {:?}", other),
        }
    }

    #[test]
    fn test_zeros_are_pruned_unless_all_zero() {
        let m: MixedAmount = [usd(5), usd(-5), eur(3)].into_iter().collect();
        assert_eq!(m.amounts().len(), 1);
        assert_eq!(m.amounts()[0].commodity, "EUR");

        let all_zero: MixedAmount = [usd(5), usd(-5)].into_iter().collect();
        assert_eq!(all_zero.amounts().len(), 1);
        assert!(all_zero.amounts()[0].is_really_zero());

        let two_zeros: MixedAmount = [usd(0), eur(0)].into_iter().collect();
        let normalized = two_zeros.amounts();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].commodity, "");
    }

    #[test]
    fn test_to_cost_merges_into_price_commodity() {
        // -5 USD + 3 EUR @@ 4 USD -> -1 USD
        let priced = eur(3).with_price(AmountPrice::Total(Box::new(usd(4))));
        let m: MixedAmount = [usd(-5), priced].into_iter().collect();
        let cost = m.to_cost();
        assert_eq!(cost.amounts().len(), 1);
        assert_eq!(cost.amounts()[0].quantity, usd(-1).quantity);
    }

    #[test]
    fn test_sign() {
        let both: MixedAmount = [usd(5), eur(-3)].into_iter().collect();
        assert_eq!(both.is_negative(), None);

        let neg: MixedAmount = [usd(-5), eur(-3)].into_iter().collect();
        assert_eq!(neg.is_negative(), Some(true));

        let pos: MixedAmount = MixedAmount::from_amount(usd(5));
        assert_eq!(pos.is_negative(), Some(false));

        assert_eq!(MixedAmount::new().is_negative(), Some(false));
    }

    #[test]
    fn test_looks_zero_uses_display_precision() {
        let tiny = Amount::from_decimal("USD", Decimal::new(4, 3)); // 0.004
        let m = MixedAmount::from_amount(tiny.with_precision(crate::style::Precision::Fixed(2)));
        assert!(m.looks_zero());
        assert!(!m.is_really_zero());
    }

    #[test]
    fn test_amount_in_commodity() {
        let m: MixedAmount = [usd(5), eur(3)].into_iter().collect();
        assert_eq!(m.amount_in_commodity(&"EUR".into()).quantity, eur(3).quantity);
        assert!(m.amount_in_commodity(&"CHF".into()).is_really_zero());
    }

    #[test]
    fn test_sum_and_subtract() {
        let total: MixedAmount =
            [MixedAmount::from_amount(usd(5)), MixedAmount::from_amount(usd(7))]
                .into_iter()
                .sum();
        assert_eq!(total.amounts()[0].quantity, usd(12).quantity);

        let diff = total - &MixedAmount::from_amount(usd(12));
        assert!(diff.looks_zero());
    }
}

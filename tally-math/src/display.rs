//! Rendering of amounts and mixed amounts
//!
//! Amounts render according to their style: symbol side and spacing,
//! decimal mark, digit grouping, and precision. `Natural` precision shows
//! the shortest exact decimal expansion of the quantity, rounded at
//! sixteen digits when the expansion does not terminate. Conversion prices
//! render as ` @ unit` / ` @@ total`.

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::amount::{round_to, Amount, AmountPrice};
use crate::mixed::MixedAmount;
use crate::style::{AmountStyle, DigitGroups, Precision, Side};

/// Digits shown for a non-terminating decimal expansion at `Natural`
/// precision.
const MAX_NATURAL_DIGITS: u8 = 16;

/// The number of decimal digits in the exact expansion of a rational, or
/// [`MAX_NATURAL_DIGITS`] when the expansion does not terminate.
fn natural_precision(quantity: &BigRational) -> u8 {
    let two = BigInt::from(2);
    let five = BigInt::from(5);
    let mut denom = quantity.denom().clone();
    let mut twos: u8 = 0;
    let mut fives: u8 = 0;
    while twos < MAX_NATURAL_DIGITS && (&denom % &two).is_zero() {
        denom /= &two;
        twos += 1;
    }
    while fives < MAX_NATURAL_DIGITS && (&denom % &five).is_zero() {
        denom /= &five;
        fives += 1;
    }
    if denom.is_one() {
        twos.max(fives)
    } else {
        MAX_NATURAL_DIGITS
    }
}

fn group_digits(digits: &str, groups: &DigitGroups) -> String {
    if groups.sizes.is_empty() || digits.len() <= groups.sizes[0] as usize {
        return digits.to_string();
    }
    let chars: Vec<char> = digits.chars().collect();
    let mut parts: Vec<String> = Vec::new();
    let mut sizes = groups.sizes.iter().copied();
    let mut size = sizes.next().unwrap_or(3).max(1) as usize;
    let mut pos = chars.len();
    while pos > 0 {
        let start = pos.saturating_sub(size);
        parts.push(chars[start..pos].iter().collect());
        pos = start;
        if let Some(next) = sizes.next() {
            size = next.max(1) as usize;
        }
    }
    parts.reverse();
    parts.join(&groups.separator.to_string())
}

/// Render a quantity at a given number of decimal digits, honoring the
/// style's decimal mark and digit grouping.
fn format_quantity(quantity: &BigRational, digits: u8, style: &AmountStyle) -> String {
    let scale = BigInt::from(10u64).pow(digits as u32);
    let rounded = round_to(quantity, digits);
    let scaled = (rounded * BigRational::from_integer(scale)).to_integer();

    let negative = scaled.is_negative();
    let mut text = scaled.abs().to_string();
    while text.len() <= digits as usize {
        text.insert(0, '0');
    }

    let split = text.len() - digits as usize;
    let (int_part, frac_part) = text.split_at(split);
    let int_part = match &style.digit_groups {
        Some(groups) => group_digits(int_part, groups),
        None => int_part.to_string(),
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&int_part);
    if digits > 0 {
        out.push(style.decimal_mark.unwrap_or('.'));
        out.push_str(frac_part);
    }
    out
}

/// Render a single amount per its style, price included.
pub fn format_amount(amount: &Amount) -> String {
    let digits = match amount.style.precision {
        Precision::Fixed(p) => p,
        Precision::Natural => natural_precision(&amount.quantity),
    };
    let quantity = format_quantity(&amount.quantity, digits, &amount.style);

    let sep = if amount.style.spaced { " " } else { "" };
    let mut out = if amount.commodity.is_empty() {
        quantity
    } else {
        match amount.style.side {
            Side::Left => format!("{}{}{}", amount.commodity, sep, quantity),
            Side::Right => format!("{}{}{}", quantity, sep, amount.commodity),
        }
    };

    match &amount.price {
        None => {}
        Some(AmountPrice::Unit(p)) => {
            out.push_str(" @ ");
            out.push_str(&format_amount(p));
        }
        Some(AmountPrice::Total(p)) => {
            out.push_str(" @@ ");
            out.push_str(&format_amount(p));
        }
    }
    out
}

/// Render a mixed amount on one line: normalized entries joined with
/// commas, a bare `0` when empty.
pub fn format_mixed_amount(mixed: &MixedAmount) -> String {
    let entries = mixed.amounts();
    if entries.is_empty() {
        return "0".to_string();
    }
    entries.iter().map(format_amount).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_amount(self))
    }
}

impl fmt::Display for MixedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_mixed_amount(self))
    }
}

//! Single-commodity amounts with optional conversion prices
//!
//! An Amount pairs an exact BigRational quantity with a commodity symbol, a
//! display style, and optionally a conversion price into another commodity.
//! Balancing works on exact quantities; only zero tests round, at the
//! style's display precision.

use std::fmt;
use std::ops::Neg;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::style::{AmountStyle, Commodity, Precision, StyleMap};

/// Errors that can occur during amount operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Division by a zero quantity
    #[error("division by zero")]
    DivisionByZero,
}

/// Result type for amount operations
pub type AmountResult<T> = Result<T, AmountError>;

/// A conversion price attached to an amount, denominated in another
/// commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AmountPrice {
    /// Price per unit of the priced amount (`@`)
    Unit(Box<Amount>),
    /// Price for the whole amount (`@@`)
    Total(Box<Amount>),
}

/// An exact quantity of one commodity, with display style and optional
/// conversion price.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    /// Commodity symbol; empty for plain numbers
    pub commodity: Commodity,
    /// The exact rational quantity
    pub quantity: BigRational,
    /// Optional conversion price into another commodity
    pub price: Option<AmountPrice>,
    /// Display style
    pub style: AmountStyle,
}

impl Amount {
    /// Create an amount from a commodity and an exact rational quantity.
    pub fn new(commodity: impl Into<Commodity>, quantity: BigRational) -> Self {
        Self { commodity: commodity.into(), quantity, price: None, style: AmountStyle::default() }
    }

    /// Create an amount from an integer quantity, displayed with no
    /// decimal places.
    pub fn from_i64(commodity: impl Into<Commodity>, quantity: i64) -> Self {
        let mut a = Self::new(commodity, BigRational::from_integer(BigInt::from(quantity)));
        a.style.precision = Precision::Fixed(0);
        a
    }

    /// Create an amount from a Decimal. The decimal's scale becomes the
    /// display precision, matching what a journal parser would record.
    pub fn from_decimal(commodity: impl Into<Commodity>, value: Decimal) -> Self {
        let scale = value.scale();
        let numerator = BigInt::from(value.mantissa());
        let denominator = BigInt::from(10u64).pow(scale);
        let mut a = Self::new(commodity, BigRational::new(numerator, denominator));
        a.style.precision = Precision::Fixed(scale.min(u8::MAX as u32) as u8);
        a
    }

    /// A commodity-less zero.
    pub fn zero() -> Self {
        Self::from_i64("", 0)
    }

    /// This amount with a conversion price attached.
    pub fn with_price(mut self, price: AmountPrice) -> Self {
        self.price = Some(price);
        self
    }

    /// This amount with its display precision replaced.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.style.precision = precision;
        self
    }

    /// Is the exact quantity negative?
    pub fn is_negative(&self) -> bool {
        self.quantity.is_negative()
    }

    /// Is the exact quantity zero?
    pub fn is_really_zero(&self) -> bool {
        self.quantity.is_zero()
    }

    /// The quantity rounded at the style's display precision. `Natural`
    /// precision rounds nothing.
    pub fn rounded_quantity(&self) -> BigRational {
        match self.style.precision {
            Precision::Natural => self.quantity.clone(),
            Precision::Fixed(places) => round_to(&self.quantity, places),
        }
    }

    /// Does the quantity round to zero at display precision? This, not
    /// exact zeroness, is the balancing engine's notion of zero: humans
    /// see rounded numbers.
    pub fn looks_zero(&self) -> bool {
        self.rounded_quantity().is_zero()
    }

    /// This amount with a zero quantity, keeping commodity and style.
    pub fn zeroed(&self) -> Self {
        let mut a = self.strip_price();
        a.quantity = BigRational::zero();
        a
    }

    /// The negated amount. The price is kept: cost conversion takes its
    /// sign from the quantity.
    pub fn negated(&self) -> Self {
        let mut a = self.clone();
        a.quantity = -a.quantity;
        a
    }

    /// Convert to cost: an amount with no price, denominated in the price
    /// commodity. A unit price multiplies; a total price substitutes the
    /// total magnitude with the sign of the original quantity. Unpriced
    /// amounts are returned unchanged.
    pub fn to_cost(&self) -> Amount {
        match &self.price {
            None => self.clone(),
            Some(AmountPrice::Unit(p)) => Amount {
                commodity: p.commodity.clone(),
                quantity: &p.quantity * &self.quantity,
                price: None,
                style: p.style.clone(),
            },
            Some(AmountPrice::Total(p)) => {
                let magnitude = p.quantity.abs();
                let quantity = if self.quantity.is_zero() {
                    BigRational::zero()
                } else if self.quantity.is_negative() {
                    -magnitude
                } else {
                    magnitude
                };
                Amount { commodity: p.commodity.clone(), quantity, price: None, style: p.style.clone() }
            }
        }
    }

    /// This amount without its conversion price.
    pub fn strip_price(&self) -> Amount {
        let mut a = self.clone();
        a.price = None;
        a
    }

    /// Adopt the canonical style for this amount's commodity, keeping the
    /// current style when the commodity is unmapped. Price amounts are
    /// restyled too, except for their precision, which the price inferrer
    /// chooses deliberately.
    pub fn styled(&self, styles: &StyleMap) -> Amount {
        let mut a = self.clone();
        if let Some(style) = styles.get(&a.commodity) {
            a.style = style.clone();
        }
        a.price = a.price.map(|price| match price {
            AmountPrice::Unit(p) => AmountPrice::Unit(Box::new(restyle_keeping_precision(&p, styles))),
            AmountPrice::Total(p) => {
                AmountPrice::Total(Box::new(restyle_keeping_precision(&p, styles)))
            }
        });
        a
    }

    /// Divide the quantity by a rational, dropping any price. Errors on a
    /// zero divisor.
    pub fn divided_by(&self, divisor: &BigRational) -> AmountResult<Amount> {
        if divisor.is_zero() {
            return Err(AmountError::DivisionByZero);
        }
        let mut a = self.strip_price();
        a.quantity = &a.quantity / divisor;
        Ok(a)
    }
}

fn restyle_keeping_precision(amount: &Amount, styles: &StyleMap) -> Amount {
    let mut a = amount.clone();
    if let Some(style) = styles.get(&a.commodity) {
        a.style = style.clone().with_precision(a.style.precision);
    }
    a
}

/// Round a rational to `places` decimal digits, half away from zero.
pub(crate) fn round_to(quantity: &BigRational, places: u8) -> BigRational {
    let scale = BigInt::from(10u64).pow(places as u32);
    let scaled = quantity * BigRational::from_integer(scale.clone());
    let half = BigRational::new(BigInt::from(1), BigInt::from(2));
    let rounded = if scaled.is_negative() { (scaled - half).ceil() } else { (scaled + half).floor() };
    BigRational::new(rounded.to_integer(), scale)
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self)?;
        if f.alternate() {
            write!(f, " [raw: {}]", self.quantity)?;
        }
        Ok(())
    }
}

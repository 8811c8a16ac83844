//! Amount algebra for the tally balancing engine
//!
//! This crate provides the mathematical core of the engine: commodity
//! symbols, display styles, exact-rational amounts with optional conversion
//! prices, and the multi-commodity MixedAmount container. Quantities are
//! BigRational so that balancing decisions are made on exact values while
//! zero tests honor display precision.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod amount;
pub mod display;
pub mod mixed;
pub mod style;

// Re-export main types
pub use amount::{Amount, AmountError, AmountPrice, AmountResult};
pub use display::{format_amount, format_mixed_amount};
pub use mixed::MixedAmount;
pub use style::{AmountStyle, Commodity, DigitGroups, Precision, Side, StyleMap};

// Re-export for convenience
pub use num_bigint::BigInt;
pub use num_rational::BigRational;
pub use rust_decimal::Decimal;

//! Commodity symbols and their display styles
//!
//! A commodity is an opaque symbol; everything about how its amounts look
//! (symbol side, spacing, precision, decimal mark, digit grouping) lives in
//! an AmountStyle. Styles never change quantities; they only decide how a
//! quantity is rounded for display and therefore what "looks zero" means.

use std::cmp::Ordering;
use std::collections::HashMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A commodity symbol, e.g. "USD", "€", "AAPL". Empty means no commodity.
pub type Commodity = CompactString;

/// Map from commodity to its canonical display style.
pub type StyleMap = HashMap<Commodity, AmountStyle>;

/// Which side of the quantity the commodity symbol is written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Symbol before the quantity, like `$1`
    Left,
    /// Symbol after the quantity, like `1 USD`
    Right,
}

/// Display precision: a bounded number of decimal places, or `Natural`,
/// meaning "whatever the source had".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// Round to exactly this many decimal places
    Fixed(u8),
    /// Show the full decimal expansion of the quantity
    Natural,
}

impl Precision {
    /// Saturating sum of two precisions. Any `Natural` operand wins.
    pub fn saturating_add(self, other: Precision) -> Precision {
        match (self, other) {
            (Precision::Fixed(a), Precision::Fixed(b)) => Precision::Fixed(a.saturating_add(b)),
            _ => Precision::Natural,
        }
    }
}

// Natural compares greater than any fixed precision, so that taking the
// maximum across observed styles widens rather than truncates.
impl Ord for Precision {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Precision::Fixed(a), Precision::Fixed(b)) => a.cmp(b),
            (Precision::Fixed(_), Precision::Natural) => Ordering::Less,
            (Precision::Natural, Precision::Fixed(_)) => Ordering::Greater,
            (Precision::Natural, Precision::Natural) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Precision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Digit grouping for the integer part of a quantity.
///
/// Group sizes run from the decimal mark outward; the last size repeats,
/// so `sizes = [3]` is the usual thousands grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitGroups {
    /// Separator written between groups
    pub separator: char,
    /// Group sizes, innermost first
    pub sizes: Vec<u8>,
}

/// How amounts of one commodity are displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountStyle {
    /// Side the commodity symbol sits on
    pub side: Side,
    /// Whether a space separates symbol and quantity
    pub spaced: bool,
    /// Display precision
    pub precision: Precision,
    /// Decimal mark; `None` falls back to `.`
    pub decimal_mark: Option<char>,
    /// Digit grouping of the integer part, if any
    pub digit_groups: Option<DigitGroups>,
}

impl Default for AmountStyle {
    fn default() -> Self {
        Self {
            side: Side::Right,
            spaced: true,
            precision: Precision::Natural,
            decimal_mark: Some('.'),
            digit_groups: None,
        }
    }
}

impl AmountStyle {
    /// A default style with a fixed number of decimal places.
    pub fn fixed(precision: u8) -> Self {
        Self { precision: Precision::Fixed(precision), ..Self::default() }
    }

    /// This style with its precision replaced.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Merge another observed style into this one: everything is kept from
    /// the first-seen style except the precision, which widens to the
    /// maximum observed.
    pub fn merge(&self, other: &AmountStyle) -> AmountStyle {
        AmountStyle { precision: self.precision.max(other.precision), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_ordering() {
        assert!(Precision::Fixed(2) < Precision::Fixed(5));
        assert!(Precision::Fixed(255) < Precision::Natural);
        assert_eq!(Precision::Natural.max(Precision::Fixed(8)), Precision::Natural);
    }

    #[test]
    fn test_precision_saturating_add() {
        assert_eq!(
            Precision::Fixed(2).saturating_add(Precision::Fixed(3)),
            Precision::Fixed(5)
        );
        assert_eq!(
            Precision::Fixed(200).saturating_add(Precision::Fixed(100)),
            Precision::Fixed(255)
        );
        assert_eq!(
            Precision::Natural.saturating_add(Precision::Fixed(3)),
            Precision::Natural
        );
    }

    #[test]
    fn test_style_merge_widens_precision() {
        let narrow = AmountStyle::fixed(2);
        let wide = AmountStyle { side: Side::Left, ..AmountStyle::fixed(4) };

        let merged = narrow.merge(&wide);
        assert_eq!(merged.precision, Precision::Fixed(4));
        // everything else comes from the first-seen style
        assert_eq!(merged.side, Side::Right);
    }
}

//! # Product Size Module
//!
//! Interprets the free-form `size_value` descriptor of a catalog product
//! ("500g", "1,5 L", "6 par pack", "4 pièces") into a [`ParsedSize`].
//!
//! This is the single parser shared by the compatibility checker and the
//! proportional pricer, so both always agree on what a product contains.

use log::{debug, trace};
use serde::Serialize;

use crate::size_patterns::{PACK_REGEX, SIZE_REGEX};
use crate::units::{to_base_units, UnitTag};

/// Result of interpreting a product size descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSize {
    /// Numeric amount as written (e.g. 1.5 for "1.5L")
    pub value: f64,
    /// Unit of the amount
    pub unit: UnitTag,
    /// `true` when the descriptor is a count pack ("6 par pack")
    pub is_packaging: bool,
}

impl ParsedSize {
    /// Amount expressed in the unit family's base unit (grams, millilitres or pieces)
    pub fn base_amount(&self) -> f64 {
        to_base_units(self.value, &self.unit)
    }
}

/// Parse a size descriptor, trying the "`<N> par pack`" form first
///
/// Returns `None` when neither the pack form nor a `<number><unit>` pair can be
/// found; callers treat that as "sold as one indivisible unit".
///
/// # Examples
///
/// ```rust
/// use recipe_cost::product_size::parse_size;
/// use recipe_cost::units::UnitTag;
///
/// let pack = parse_size("6 par pack").unwrap();
/// assert_eq!(pack.value, 6.0);
/// assert_eq!(pack.unit, UnitTag::Piece);
/// assert!(pack.is_packaging);
///
/// let bottle = parse_size("Bouteille 1,5L").unwrap();
/// assert_eq!(bottle.value, 1.5);
/// assert_eq!(bottle.unit, UnitTag::Liter);
///
/// assert!(parse_size("la barquette").is_none());
/// ```
pub fn parse_size(size_value: &str) -> Option<ParsedSize> {
    if let Some(captures) = PACK_REGEX.captures(size_value) {
        let count = captures.get(1)?.as_str().parse::<u32>().ok()?;
        trace!("Parsed pack descriptor '{}' as {} pieces", size_value, count);
        return Some(ParsedSize {
            value: f64::from(count),
            unit: UnitTag::Piece,
            is_packaging: true,
        });
    }

    parse_measured_size(size_value)
}

/// Parse only the generic `<number><unit>` form of a size descriptor
pub fn parse_measured_size(size_value: &str) -> Option<ParsedSize> {
    let captures = match SIZE_REGEX.captures(size_value) {
        Some(captures) => captures,
        None => {
            debug!("No size pattern found in '{}'", size_value);
            return None;
        }
    };

    let value = captures.get(1)?.as_str().replace(',', ".").parse::<f64>().ok()?;
    let unit = UnitTag::parse(captures.get(2)?.as_str());

    trace!("Parsed size '{}' -> {} {}", size_value, value, unit);
    Some(ParsedSize {
        value,
        unit,
        is_packaging: false,
    })
}

/// Parse an optional descriptor, as stored on catalog products
pub fn parse_optional_size(size_value: Option<&str>) -> Option<ParsedSize> {
    size_value.and_then(parse_size)
}

//! # Units Module
//!
//! This module defines the closed set of unit tags used by ingredients and product
//! sizes, the families they belong to, and conversion into comparable base units.
//!
//! ## Families
//!
//! - **Mass**: mg, g, kg (base unit: gram)
//! - **Volume**: ml, cl, l (base unit: millilitre)
//! - **Small volume**: tsp/càc, tbsp/càs (approximate gram/millilitre equivalents)
//! - **Count**: piece/pièce, singular or plural
//!
//! Any other unit text is preserved as [`UnitTag::Other`] and passes through
//! conversions unchanged.

use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A measurement unit attached to an ingredient amount or a product size
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UnitTag {
    /// Milligrams
    Milligram,
    /// Grams
    Gram,
    /// Kilograms
    Kilogram,
    /// Millilitres
    Milliliter,
    /// Centilitres
    Centiliter,
    /// Litres
    Liter,
    /// Teaspoon (tsp, càc)
    Teaspoon,
    /// Tablespoon (tbsp, càs)
    Tablespoon,
    /// Discrete pieces (piece, pièce, pieces, pièces)
    Piece,
    /// Unrecognized unit, kept verbatim
    Other(String),
}

/// Unit families used for cross-unit comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitFamily {
    /// Weight units, normalized to grams
    Mass,
    /// Volume units, normalized to millilitres
    Volume,
    /// Spoon measures, normalized to an approximate 5/15 equivalent
    SmallVolume,
    /// Countable items
    Count,
}

impl UnitTag {
    /// Parse a unit label, accepting English and French spellings
    ///
    /// Never fails: unknown labels become [`UnitTag::Other`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use recipe_cost::units::UnitTag;
    ///
    /// assert_eq!(UnitTag::parse("KG"), UnitTag::Kilogram);
    /// assert_eq!(UnitTag::parse("càs"), UnitTag::Tablespoon);
    /// assert_eq!(UnitTag::parse("pièces"), UnitTag::Piece);
    /// assert_eq!(UnitTag::parse("pincée"), UnitTag::Other("pincée".to_string()));
    /// ```
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "mg" | "milligramme" | "milligrammes" | "milligram" | "milligrams" => UnitTag::Milligram,
            "g" | "gr" | "gramme" | "grammes" | "gram" | "grams" => UnitTag::Gram,
            "kg" | "kilogramme" | "kilogrammes" | "kilogram" | "kilograms" => UnitTag::Kilogram,
            "ml" | "millilitre" | "millilitres" | "milliliter" | "milliliters" => {
                UnitTag::Milliliter
            }
            "cl" | "centilitre" | "centilitres" => UnitTag::Centiliter,
            "l" | "litre" | "litres" | "liter" | "liters" => UnitTag::Liter,
            "tsp" | "càc" | "cac" | "c.à.c" | "cuillère à café" | "cuillères à café" => {
                UnitTag::Teaspoon
            }
            "tbsp" | "càs" | "cas" | "c.à.s" | "cuillère à soupe" | "cuillères à soupe" => {
                UnitTag::Tablespoon
            }
            "piece" | "pieces" | "pièce" | "pièces" => UnitTag::Piece,
            _ => {
                trace!("Unrecognized unit label kept verbatim: '{}'", label);
                UnitTag::Other(label.trim().to_string())
            }
        }
    }

    /// Short canonical label for the unit
    pub fn label(&self) -> &str {
        match self {
            UnitTag::Milligram => "mg",
            UnitTag::Gram => "g",
            UnitTag::Kilogram => "kg",
            UnitTag::Milliliter => "ml",
            UnitTag::Centiliter => "cl",
            UnitTag::Liter => "l",
            UnitTag::Teaspoon => "tsp",
            UnitTag::Tablespoon => "tbsp",
            UnitTag::Piece => "piece",
            UnitTag::Other(label) => label,
        }
    }

    /// Family this unit belongs to, if any
    pub fn family(&self) -> Option<UnitFamily> {
        match self {
            UnitTag::Milligram | UnitTag::Gram | UnitTag::Kilogram => Some(UnitFamily::Mass),
            UnitTag::Milliliter | UnitTag::Centiliter | UnitTag::Liter => Some(UnitFamily::Volume),
            UnitTag::Teaspoon | UnitTag::Tablespoon => Some(UnitFamily::SmallVolume),
            UnitTag::Piece => Some(UnitFamily::Count),
            UnitTag::Other(_) => None,
        }
    }

    /// Multiplier into the family's base unit, `None` for unrecognized units
    pub fn base_factor(&self) -> Option<f64> {
        match self {
            UnitTag::Milligram => Some(0.001),
            UnitTag::Gram => Some(1.0),
            UnitTag::Kilogram => Some(1000.0),
            UnitTag::Milliliter => Some(1.0),
            UnitTag::Centiliter => Some(10.0),
            UnitTag::Liter => Some(1000.0),
            UnitTag::Teaspoon => Some(5.0),
            UnitTag::Tablespoon => Some(15.0),
            UnitTag::Piece => Some(1.0),
            UnitTag::Other(_) => None,
        }
    }

    /// Whether this unit counts discrete pieces
    pub fn is_piece(&self) -> bool {
        matches!(self, UnitTag::Piece)
    }

    /// Whether this unit measures weight
    pub fn is_weight(&self) -> bool {
        self.family() == Some(UnitFamily::Mass)
    }

    /// Whether this unit measures volume, spoon measures included
    pub fn is_volume(&self) -> bool {
        matches!(
            self.family(),
            Some(UnitFamily::Volume) | Some(UnitFamily::SmallVolume)
        )
    }
}

/// Convert an amount into its family's base unit (grams or millilitres)
///
/// Count units and unrecognized units pass through unchanged; this is a best-effort
/// normalization and never fails.
///
/// # Examples
///
/// ```rust
/// use recipe_cost::units::{to_base_units, UnitTag};
///
/// assert_eq!(to_base_units(1.5, &UnitTag::Kilogram), 1500.0);
/// assert_eq!(to_base_units(20.0, &UnitTag::Centiliter), 200.0);
/// assert_eq!(to_base_units(2.0, &UnitTag::Tablespoon), 30.0);
/// assert_eq!(to_base_units(4.0, &UnitTag::Piece), 4.0);
/// ```
pub fn to_base_units(amount: f64, unit: &UnitTag) -> f64 {
    match unit.base_factor() {
        Some(factor) => amount * factor,
        None => amount,
    }
}

impl From<String> for UnitTag {
    fn from(label: String) -> Self {
        UnitTag::parse(&label)
    }
}

impl From<&str> for UnitTag {
    fn from(label: &str) -> Self {
        UnitTag::parse(label)
    }
}

impl From<UnitTag> for String {
    fn from(unit: UnitTag) -> Self {
        unit.label().to_string()
    }
}

impl fmt::Display for UnitTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mass_and_volume_units() {
        assert_eq!(UnitTag::parse("g"), UnitTag::Gram);
        assert_eq!(UnitTag::parse("Kg"), UnitTag::Kilogram);
        assert_eq!(UnitTag::parse("mg"), UnitTag::Milligram);
        assert_eq!(UnitTag::parse("ml"), UnitTag::Milliliter);
        assert_eq!(UnitTag::parse("CL"), UnitTag::Centiliter);
        assert_eq!(UnitTag::parse("L"), UnitTag::Liter);
        assert_eq!(UnitTag::parse("litres"), UnitTag::Liter);
    }

    #[test]
    fn test_parse_spoon_and_piece_units() {
        assert_eq!(UnitTag::parse("tsp"), UnitTag::Teaspoon);
        assert_eq!(UnitTag::parse("càc"), UnitTag::Teaspoon);
        assert_eq!(UnitTag::parse("tbsp"), UnitTag::Tablespoon);
        assert_eq!(UnitTag::parse("càs"), UnitTag::Tablespoon);
        for label in ["piece", "pieces", "pièce", "Pièces"] {
            assert_eq!(UnitTag::parse(label), UnitTag::Piece, "label: {}", label);
        }
    }

    #[test]
    fn test_unknown_unit_is_preserved() {
        let unit = UnitTag::parse(" pincée ");
        assert_eq!(unit, UnitTag::Other("pincée".to_string()));
        assert_eq!(unit.label(), "pincée");
        assert_eq!(unit.family(), None);
    }

    #[test]
    fn test_to_base_units_multipliers() {
        assert_eq!(to_base_units(2.0, &UnitTag::Kilogram), 2000.0);
        assert_eq!(to_base_units(250.0, &UnitTag::Gram), 250.0);
        assert_eq!(to_base_units(1.5, &UnitTag::Liter), 1500.0);
        assert_eq!(to_base_units(20.0, &UnitTag::Centiliter), 200.0);
        assert_eq!(to_base_units(60.0, &UnitTag::Milliliter), 60.0);
        assert_eq!(to_base_units(3.0, &UnitTag::Teaspoon), 15.0);
        assert_eq!(to_base_units(2.0, &UnitTag::Tablespoon), 30.0);
        assert!((to_base_units(500.0, &UnitTag::Milligram) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_to_base_units_passes_through_counts_and_unknowns() {
        assert_eq!(to_base_units(4.0, &UnitTag::Piece), 4.0);
        assert_eq!(to_base_units(1.0, &UnitTag::parse("pincée")), 1.0);
        assert_eq!(to_base_units(7.0, &UnitTag::parse("botte")), 7.0);
    }

    #[test]
    fn test_families() {
        assert!(UnitTag::Gram.is_weight());
        assert!(UnitTag::Liter.is_volume());
        assert!(UnitTag::Teaspoon.is_volume());
        assert!(!UnitTag::Teaspoon.is_weight());
        assert!(UnitTag::Piece.is_piece());
        assert_eq!(UnitTag::Tablespoon.family(), Some(UnitFamily::SmallVolume));
    }

    #[test]
    fn test_serde_uses_labels() {
        let unit: UnitTag = serde_json::from_str("\"pièces\"").unwrap();
        assert_eq!(unit, UnitTag::Piece);
        assert_eq!(serde_json::to_string(&UnitTag::Centiliter).unwrap(), "\"cl\"");
        assert_eq!(
            serde_json::to_string(&UnitTag::Other("botte".to_string())).unwrap(),
            "\"botte\""
        );
    }
}

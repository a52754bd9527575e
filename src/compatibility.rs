//! # Compatibility Checker Module
//!
//! Decides whether a candidate product's package size is a reasonable fit for the
//! quantity an ingredient requires.
//!
//! The check is deliberately permissive: when the size cannot be read, or the two
//! units are not comparable, the product is considered compatible.

use log::trace;
use serde::Serialize;

use crate::catalog::Product;
use crate::matching_config::CompatibilityConfig;
use crate::model::Ingredient;
use crate::product_size::parse_optional_size;
use crate::units::{to_base_units, UnitFamily};

/// A pre-filtered candidate annotated with its compatibility verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedCandidate<'a> {
    /// The candidate product
    pub product: &'a Product,
    /// Whether its package size fits the ingredient quantity
    pub compatible: bool,
}

/// Package-size compatibility checker
#[derive(Debug, Clone, Default)]
pub struct CompatibilityChecker {
    config: CompatibilityConfig,
}

impl CompatibilityChecker {
    /// Create a checker with the default 0.5-3.0 ratio bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a checker with custom bounds
    pub fn with_config(config: CompatibilityConfig) -> Self {
        Self { config }
    }

    /// Whether `product`'s package size fits `ingredient`'s quantity
    ///
    /// - Weight/volume: compatible when `min_ratio <= product / needed <= max_ratio`
    /// - Pieces: compatible when the package holds at least the needed count
    /// - Unreadable size or incomparable units: compatible
    ///
    /// # Examples
    ///
    /// ```rust
    /// use recipe_cost::catalog::Product;
    /// use recipe_cost::compatibility::CompatibilityChecker;
    /// use recipe_cost::model::Ingredient;
    /// use recipe_cost::units::UnitTag;
    ///
    /// let checker = CompatibilityChecker::new();
    /// let eggs = Ingredient::new("oeuf", 4.0, UnitTag::Piece);
    ///
    /// let six = Product::new("1", "Oeufs frais", "Crèmerie").with_size("6 par pack");
    /// let three = Product::new("2", "Oeufs bio", "Crèmerie").with_size("3 par pack");
    /// assert!(checker.is_compatible(&eggs, &six));
    /// assert!(!checker.is_compatible(&eggs, &three));
    /// ```
    pub fn is_compatible(&self, ingredient: &Ingredient, product: &Product) -> bool {
        let size = match parse_optional_size(product.size_value.as_deref()) {
            Some(size) => size,
            None => return true,
        };

        let ingredient_family = match comparable_family(ingredient.unit.family()) {
            Some(family) => family,
            None => return true,
        };
        if comparable_family(size.unit.family()) != Some(ingredient_family) {
            trace!(
                "Units {} and {} are not comparable for '{}'",
                ingredient.unit,
                size.unit,
                product.name
            );
            return true;
        }

        let needed = to_base_units(ingredient.amount, &ingredient.unit);
        let available = size.base_amount();
        if needed <= 0.0 {
            return true;
        }

        let compatible = match ingredient_family {
            UnitFamily::Count => available >= needed,
            _ => {
                let ratio = available / needed;
                ratio >= self.config.min_ratio && ratio <= self.config.max_ratio
            }
        };

        trace!(
            "Compatibility of '{}' ({}) for {}: {}",
            product.name,
            available,
            ingredient,
            compatible
        );
        compatible
    }

    /// Annotate every candidate with its compatibility verdict
    pub fn annotate<'a>(
        &self,
        ingredient: &Ingredient,
        candidates: &[&'a Product],
    ) -> Vec<AnnotatedCandidate<'a>> {
        candidates
            .iter()
            .map(|&product| AnnotatedCandidate {
                product,
                compatible: self.is_compatible(ingredient, product),
            })
            .collect()
    }
}

// Spoon measures have no package-size counterpart
fn comparable_family(family: Option<UnitFamily>) -> Option<UnitFamily> {
    match family {
        Some(UnitFamily::SmallVolume) | None => None,
        other => other,
    }
}

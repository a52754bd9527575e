//! # Proportional Pricer Module
//!
//! Computes the part of a product's price attributable to the exact quantity an
//! ingredient needs, e.g. 200 g out of a 500 g bag, or 4 eggs out of a pack of 6.
//!
//! ## Branches, evaluated in order
//!
//! 1. Ingredient counted in pieces, product is a count pack: `price x needed / pack`
//! 2. Ingredient counted in pieces, product sold by weight: convert pieces to grams
//!    with the piece-weight table, then scale
//! 3. Same family (weight/weight or volume/volume): linear scaling in base units
//! 4. Anything else: the full, unscaled product price
//!
//! Unreadable sizes and zero denominators also yield the unscaled price. These
//! fallbacks are reported through [`PriceBasis`] rather than as errors.

use log::debug;
use serde::Serialize;

use crate::catalog::Product;
use crate::matching_config::KnowledgeBase;
use crate::model::{Ingredient, Match};
use crate::product_size::{parse_optional_size, ParsedSize};
use crate::units::{to_base_units, UnitTag};

/// How a price was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// No product was selected
    NoProduct,
    /// The product carries no numeric price
    NoPrice,
    /// Fraction of a count pack
    PackFraction,
    /// Pieces converted to weight through the piece-weight table
    PieceWeight,
    /// Linear scaling within one unit family
    Linear,
    /// Full product price, no scaling possible
    Unscaled,
}

/// A computed price together with the branch that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    /// Price in euros, never negative
    pub amount: f64,
    /// Branch that produced the price
    pub basis: PriceBasis,
}

impl PriceQuote {
    fn new(amount: f64, basis: PriceBasis) -> Self {
        Self {
            amount: amount.max(0.0),
            basis,
        }
    }
}

/// Proportional pricer backed by the piece-weight table of a [`KnowledgeBase`]
#[derive(Debug, Clone, Default)]
pub struct ProportionalPricer {
    knowledge: KnowledgeBase,
}

impl ProportionalPricer {
    /// Create a pricer with the default piece weights
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pricer with a custom knowledge base
    pub fn with_knowledge(knowledge: KnowledgeBase) -> Self {
        Self { knowledge }
    }

    /// Price of a match; 0 when nothing was selected or the product has no price
    pub fn price(&self, matched: &Match) -> f64 {
        self.quote(&matched.ingredient, matched.selected_product.as_ref())
            .amount
    }

    /// Price for an ingredient and an optional selected product
    ///
    /// # Examples
    ///
    /// ```rust
    /// use recipe_cost::catalog::Product;
    /// use recipe_cost::model::Ingredient;
    /// use recipe_cost::pricing::{PriceBasis, ProportionalPricer};
    /// use recipe_cost::units::UnitTag;
    ///
    /// let pricer = ProportionalPricer::new();
    /// let flour = Ingredient::new("farine", 200.0, UnitTag::Gram);
    /// let bag = Product::new("1", "Farine de blé", "Epicerie").with_size("500g").with_price(1.50);
    ///
    /// let quote = pricer.quote(&flour, Some(&bag));
    /// assert!((quote.amount - 0.60).abs() < 1e-9);
    /// assert_eq!(quote.basis, PriceBasis::Linear);
    /// ```
    pub fn quote(&self, ingredient: &Ingredient, product: Option<&Product>) -> PriceQuote {
        let product = match product {
            Some(product) => product,
            None => return PriceQuote::new(0.0, PriceBasis::NoProduct),
        };
        let price = match product.price_eur {
            Some(price) if price.is_finite() => price,
            _ => return PriceQuote::new(0.0, PriceBasis::NoPrice),
        };
        let size = match parse_optional_size(product.size_value.as_deref()) {
            Some(size) => size,
            None => {
                debug!("Unreadable size for '{}', charging full price", product.name);
                return PriceQuote::new(price, PriceBasis::Unscaled);
            }
        };

        let quote = self
            .piece_quote(ingredient, &size, price)
            .or_else(|| linear_quote(ingredient, &size, price))
            .unwrap_or_else(|| PriceQuote::new(price, PriceBasis::Unscaled));

        debug!(
            "Priced {} with '{}' ({:?}): {:.2} via {:?}",
            ingredient, product.name, product.size_value, quote.amount, quote.basis
        );
        quote
    }

    fn piece_quote(&self, ingredient: &Ingredient, size: &ParsedSize, price: f64) -> Option<PriceQuote> {
        if !ingredient.unit.is_piece() {
            return None;
        }

        if size.is_packaging {
            if size.value <= 0.0 {
                return Some(PriceQuote::new(price, PriceBasis::Unscaled));
            }
            return Some(PriceQuote::new(
                price * (ingredient.amount / size.value),
                PriceBasis::PackFraction,
            ));
        }

        if !size.unit.is_weight() {
            return None;
        }
        let average_weight = self.knowledge.piece_weight(&ingredient.name)?;
        let product_grams = size.base_amount();
        if product_grams <= 0.0 {
            return Some(PriceQuote::new(price, PriceBasis::Unscaled));
        }
        let needed_grams = ingredient.amount * average_weight;
        Some(PriceQuote::new(
            (needed_grams / product_grams) * price,
            PriceBasis::PieceWeight,
        ))
    }
}

fn linear_quote(ingredient: &Ingredient, size: &ParsedSize, price: f64) -> Option<PriceQuote> {
    let same_family = (ingredient.unit.is_weight() && is_sold_by_weight(&size.unit))
        || (ingredient.unit.is_volume() && is_sold_by_volume(&size.unit));
    if !same_family {
        return None;
    }

    let required = to_base_units(ingredient.amount, &ingredient.unit);
    let available = size.base_amount();
    if available <= 0.0 {
        return Some(PriceQuote::new(price, PriceBasis::Unscaled));
    }
    Some(PriceQuote::new((required / available) * price, PriceBasis::Linear))
}

fn is_sold_by_weight(unit: &UnitTag) -> bool {
    unit.is_weight()
}

// Packages are labelled in metric volumes only, never in spoons
fn is_sold_by_volume(unit: &UnitTag) -> bool {
    matches!(unit, UnitTag::Milliliter | UnitTag::Centiliter | UnitTag::Liter)
}

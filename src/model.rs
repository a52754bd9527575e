//! # Ingredient and Match Data Model
//!
//! This module defines the data structures flowing through the matching pipeline:
//! structured ingredients produced by recipe parsing, and the per-ingredient match
//! results produced by the orchestrator.
//!
//! ## Core Concepts
//!
//! - **Ingredient**: a generic, singular food item with an amount and a [`UnitTag`]
//! - **CategorizedIngredient**: an ingredient with its ordered candidate categories
//! - **Match**: the product chosen for one ingredient, with its proportional price
//! - **MatchOutcome**: either a `Match` or a per-ingredient error record
//!
//! ## Usage
//!
//! ```rust
//! use recipe_cost::model::Ingredient;
//! use recipe_cost::units::UnitTag;
//!
//! let apples = Ingredient::new("pomme", 4.0, UnitTag::Piece)
//!     .with_alternatives(&["poire"])
//!     .critical();
//!
//! let for_six = apples.rescaled(6.0 / 4.0);
//! assert_eq!(for_six.amount, 6.0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::Product;
use crate::errors::MatchError;
use crate::units::UnitTag;

/// Maximum number of substitute names kept on an ingredient
pub const MAX_ALTERNATIVES: usize = 3;

/// A structured recipe ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    /// Generic, singular name (e.g. "farine", "pomme")
    pub name: String,

    /// Required amount, strictly positive
    pub amount: f64,

    /// Unit of the amount
    pub unit: UnitTag,

    /// Declared substitute ingredient names (0-3)
    #[serde(default)]
    pub possible_alternatives: Vec<String>,

    /// Whether the recipe cannot be made without this ingredient
    #[serde(default)]
    pub is_critical: bool,
}

impl Ingredient {
    /// Create an ingredient with no alternatives
    pub fn new(name: &str, amount: f64, unit: UnitTag) -> Self {
        Self {
            name: name.to_string(),
            amount,
            unit,
            possible_alternatives: Vec::new(),
            is_critical: false,
        }
    }

    /// Add substitute names, keeping at most three
    pub fn with_alternatives(mut self, alternatives: &[&str]) -> Self {
        self.possible_alternatives = alternatives
            .iter()
            .take(MAX_ALTERNATIVES)
            .map(|alt| alt.to_string())
            .collect();
        self
    }

    /// Mark the ingredient as critical
    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    /// Check the shape required before the ingredient may enter the pipeline
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.name.trim().is_empty() {
            return Err(MatchError::InputValidation(
                "ingredient name must not be empty".to_string(),
            ));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(MatchError::InputValidation(format!(
                "amount for '{}' must be a positive number, got {}",
                self.name, self.amount
            )));
        }
        if self.unit.label().trim().is_empty() {
            return Err(MatchError::InputValidation(format!(
                "unit for '{}' must not be empty",
                self.name
            )));
        }
        Ok(())
    }

    /// Copy of this ingredient with its amount multiplied by `ratio`, rounded to 1 decimal
    pub fn rescaled(&self, ratio: f64) -> Self {
        let mut scaled = self.clone();
        scaled.amount = round_to_tenth(self.amount * ratio);
        scaled
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.amount, self.unit, self.name)
    }
}

/// An ingredient annotated with its candidate catalog categories, most relevant first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedIngredient {
    /// The ingredient to match
    #[serde(flatten)]
    pub ingredient: Ingredient,

    /// Up to three category names drawn from the catalog
    #[serde(default)]
    pub categories: Vec<String>,
}

impl CategorizedIngredient {
    /// Attach categories to an ingredient
    pub fn new(ingredient: Ingredient, categories: Vec<String>) -> Self {
        Self {
            ingredient,
            categories,
        }
    }
}

/// The product chosen for one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// The ingredient as matched (amount rescaled on serving changes)
    pub ingredient: Ingredient,

    /// Chosen product, `None` when nothing suitable was found
    pub selected_product: Option<Product>,

    /// Selector confidence in [0, 1]
    pub confidence: f64,

    /// Whether the package size fits the required quantity
    pub compatible: bool,

    /// Free-text note when a substitute was chosen
    pub substitution_notes: Option<String>,

    /// Category the candidates were drawn from
    pub category: String,

    /// Price attributable to the required quantity, in euros
    pub proportional_price: f64,

    /// When the match was produced
    pub timestamp: DateTime<Utc>,
}

impl Match {
    /// Product id of the selection, if any
    pub fn product_id(&self) -> Option<&str> {
        self.selected_product
            .as_ref()
            .map(|product| product.product_id.as_str())
    }
}

/// Error record for an ingredient whose pipeline failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedMatch {
    /// The ingredient that could not be matched
    pub ingredient: Ingredient,
    /// Human-readable failure message
    pub error: String,
}

/// Outcome of one ingredient's pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MatchOutcome {
    /// The pipeline completed (the selection may still be empty)
    #[serde(rename = "ok")]
    Matched(Match),
    /// The pipeline failed for this ingredient only
    Error(FailedMatch),
}

impl MatchOutcome {
    /// Build an error outcome from any displayable failure
    pub fn failed(ingredient: Ingredient, error: impl fmt::Display) -> Self {
        MatchOutcome::Error(FailedMatch {
            ingredient,
            error: error.to_string(),
        })
    }

    /// The ingredient this outcome is about
    pub fn ingredient(&self) -> &Ingredient {
        match self {
            MatchOutcome::Matched(matched) => &matched.ingredient,
            MatchOutcome::Error(failed) => &failed.ingredient,
        }
    }

    /// The match, when the pipeline succeeded
    pub fn as_match(&self) -> Option<&Match> {
        match self {
            MatchOutcome::Matched(matched) => Some(matched),
            MatchOutcome::Error(_) => None,
        }
    }

    /// Whether this is an error record
    pub fn is_error(&self) -> bool {
        matches!(self, MatchOutcome::Error(_))
    }
}

/// Batch request accepted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    /// Ingredients with their categories attached
    pub ingredients: Vec<CategorizedIngredient>,
}

/// Batch response: one outcome per requested ingredient, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    /// Per-ingredient outcomes
    pub matches: Vec<MatchOutcome>,
}

impl MatchResponse {
    /// Number of ingredients whose pipeline failed
    pub fn error_count(&self) -> usize {
        self.matches.iter().filter(|outcome| outcome.is_error()).count()
    }
}

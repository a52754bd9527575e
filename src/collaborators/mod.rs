//! # Collaborators Module
//!
//! The matching pipeline delegates three judgement calls to external
//! collaborators: turning recipe text into ingredients, picking catalog
//! categories for an ingredient, and choosing one product among the
//! pre-filtered candidates. Each is a trait so the orchestrator and the tests
//! can swap implementations; the shipped implementations ask a
//! [`LanguageModel`](crate::llm::LanguageModel).
//!
//! - [`LlmRecipeParser`]: recipe text -> [`ParsedRecipe`]
//! - [`LlmCategorySuggester`]: keyword table first, model second
//! - [`LlmProductSelector`]: candidate list -> [`Selection`]

mod category_suggester;
mod product_selector;
mod recipe_parser;

pub use category_suggester::LlmCategorySuggester;
pub use product_selector::LlmProductSelector;
pub use recipe_parser::{LlmRecipeParser, DEFAULT_SERVINGS};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::compatibility::AnnotatedCandidate;
use crate::errors::MatchError;
use crate::model::Ingredient;

/// Structured form of a free-text recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRecipe {
    /// Validated ingredients, in recipe order
    pub ingredients: Vec<Ingredient>,
    /// Number of people the quantities are for
    pub servings: u32,
    /// Recipe title, when the model found one
    pub title: Option<String>,
    /// Dish type (dessert, plat, ...)
    pub recipe_type: Option<String>,
    /// Cuisine the recipe comes from
    pub cuisine_origin: Option<String>,
}

/// A selector's verdict for one ingredient
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Id of the chosen candidate, `None` when nothing fits
    pub product_id: Option<String>,
    /// Confidence in the choice, not yet clamped
    pub confidence: f64,
    /// The selector's own size verdict, when it gave one
    pub compatible: Option<bool>,
    /// Explanation when a substitute was chosen
    pub substitution_notes: Option<String>,
}

impl Selection {
    /// A selection that picked nothing
    pub fn none() -> Self {
        Self {
            product_id: None,
            confidence: 0.0,
            compatible: None,
            substitution_notes: None,
        }
    }

    /// A selection of the given product id
    pub fn of(product_id: &str, confidence: f64) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            confidence,
            compatible: None,
            substitution_notes: None,
        }
    }
}

/// Turns recipe text into structured ingredients
#[async_trait]
pub trait RecipeParser: Send + Sync {
    /// Parse a whole recipe; any malformed ingredient fails the whole recipe
    async fn parse(&self, recipe_text: &str) -> Result<ParsedRecipe, MatchError>;
}

/// Picks catalog categories likely to hold an ingredient
#[async_trait]
pub trait CategorySuggester: Send + Sync {
    /// Up to three names drawn from `known_categories`, most relevant first
    ///
    /// An empty list is a valid answer: the ingredient is then searched for
    /// across the whole catalog.
    async fn suggest(
        &self,
        ingredient: &Ingredient,
        known_categories: &[String],
    ) -> Result<Vec<String>, MatchError>;
}

/// Chooses one product among pre-filtered candidates
#[async_trait]
pub trait ProductSelector: Send + Sync {
    /// Pick a candidate, or none; must never name a product outside `candidates`
    async fn select<'a>(
        &self,
        ingredient: &Ingredient,
        candidates: &[AnnotatedCandidate<'a>],
    ) -> Result<Selection, MatchError>;
}

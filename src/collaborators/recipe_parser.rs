//! Recipe parsing through the language model.

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{ParsedRecipe, RecipeParser};
use crate::catalog::coerce_number;
use crate::errors::MatchError;
use crate::llm::{parse_json_reply, LanguageModel};
use crate::model::{Ingredient, MAX_ALTERNATIVES};
use crate::units::UnitTag;

/// Servings assumed when the recipe does not say
pub const DEFAULT_SERVINGS: u32 = 4;

const PARSE_PROMPT: &str = r#"Parse this recipe into a structured ingredients list. Only provide the JSON output, no other text.
Recipe: "{recipe}"

Expected format:
{
  "title": "Tarte aux pommes",
  "recipeType": "dessert",
  "cuisineOrigin": "française",
  "servings": 4,
  "ingredients": [
    {
      "name": "farine",
      "amount": 200,
      "unit": "g",
      "possibleAlternatives": ["farine de blé"],
      "isCritical": true
    }
  ]
}

Requirements:
- Ingredient names must be in French
- Ingredient names must be in singular (e.g., "pomme" not "pommes")
- Ingredient names should be simple and generic (e.g., "farine" not "farine multi-usage")
- Units should be standardized (g, ml, tsp, tbsp, piece)
- Amounts should be numbers only
- List at most 3 possibleAlternatives per ingredient
- isCritical is true when the recipe cannot be made without the ingredient
- Servings should be a number
- Return valid JSON only, no explanatory text"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeReply {
    ingredients: Option<Vec<IngredientReply>>,
    #[serde(default)]
    servings: Value,
    title: Option<String>,
    recipe_type: Option<String>,
    cuisine_origin: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngredientReply {
    #[serde(default)]
    name: String,
    #[serde(default)]
    amount: Value,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    possible_alternatives: Vec<String>,
    #[serde(default)]
    is_critical: bool,
}

impl IngredientReply {
    fn into_ingredient(self) -> Result<Ingredient, MatchError> {
        let amount = coerce_number(&self.amount).ok_or_else(|| {
            MatchError::InputValidation(format!(
                "amount for '{}' is not a number: {}",
                self.name, self.amount
            ))
        })?;
        let ingredient = Ingredient {
            name: self.name.trim().to_lowercase(),
            amount,
            unit: UnitTag::parse(&self.unit),
            possible_alternatives: self
                .possible_alternatives
                .into_iter()
                .map(|alt| alt.trim().to_lowercase())
                .filter(|alt| !alt.is_empty())
                .take(MAX_ALTERNATIVES)
                .collect(),
            is_critical: self.is_critical,
        };
        ingredient.validate()?;
        Ok(ingredient)
    }
}

fn servings_from(value: &Value) -> u32 {
    match coerce_number(value) {
        Some(servings) if servings >= 1.0 => servings.round() as u32,
        _ => DEFAULT_SERVINGS,
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Recipe parser asking a language model for structured JSON
#[derive(Debug, Clone)]
pub struct LlmRecipeParser {
    model: Arc<dyn LanguageModel>,
}

impl LlmRecipeParser {
    /// Create a parser over the given model
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl RecipeParser for LlmRecipeParser {
    async fn parse(&self, recipe_text: &str) -> Result<ParsedRecipe, MatchError> {
        if recipe_text.trim().is_empty() {
            return Err(MatchError::InputValidation("recipe text is empty".to_string()));
        }

        let prompt = PARSE_PROMPT.replace("{recipe}", recipe_text.trim());
        let reply = self.model.complete(&prompt).await?;
        debug!("Recipe parser reply: {}", reply);

        let parsed: RecipeReply = parse_json_reply(&reply)?;
        let raw_ingredients = parsed.ingredients.ok_or_else(|| {
            MatchError::ExternalCollaborator("reply has no ingredients list".to_string())
        })?;

        let ingredients = raw_ingredients
            .into_iter()
            .map(IngredientReply::into_ingredient)
            .collect::<Result<Vec<_>, _>>()?;

        let recipe = ParsedRecipe {
            ingredients,
            servings: servings_from(&parsed.servings),
            title: optional_text(parsed.title),
            recipe_type: optional_text(parsed.recipe_type),
            cuisine_origin: optional_text(parsed.cuisine_origin),
        };
        info!(
            "Parsed recipe {:?}: {} ingredients for {} servings",
            recipe.title,
            recipe.ingredients.len(),
            recipe.servings
        );
        Ok(recipe)
    }
}

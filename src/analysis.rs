//! # Recipe Analysis Module
//!
//! End-to-end flow from recipe text to a priced shopping list:
//!
//! 1. Parse the recipe into ingredients (fatal on failure)
//! 2. Suggest catalog categories for every ingredient, concurrently
//! 3. Match the categorized ingredients through the [`MatchOrchestrator`]
//!
//! The resulting [`AnalysisReport`] supports the interactive adjustments of a
//! shopping list: changing the number of servings, excluding products the user
//! already has, and totalling what is left.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::collaborators::{
    CategorySuggester, LlmCategorySuggester, LlmProductSelector, LlmRecipeParser, ParsedRecipe,
    ProductSelector, RecipeParser,
};
use crate::errors::{AnalysisError, MatchError};
use crate::llm::LanguageModel;
use crate::matching_config::MatchingConfig;
use crate::model::{CategorizedIngredient, Ingredient, Match, MatchOutcome, MatchRequest};
use crate::orchestrator::MatchOrchestrator;
use crate::pricing::ProportionalPricer;

/// Full recipe analysis pipeline
pub struct RecipeAnalyzer {
    parser: Arc<dyn RecipeParser>,
    suggester: Arc<dyn CategorySuggester>,
    orchestrator: MatchOrchestrator,
    suggestion_timeout: Duration,
    batch_timeout: Option<Duration>,
}

impl RecipeAnalyzer {
    /// Assemble an analyzer from explicit collaborators
    pub fn new(
        parser: Arc<dyn RecipeParser>,
        suggester: Arc<dyn CategorySuggester>,
        selector: Arc<dyn ProductSelector>,
        config: &MatchingConfig,
    ) -> Self {
        Self {
            parser,
            suggester,
            orchestrator: MatchOrchestrator::with_config(selector, config),
            suggestion_timeout: Duration::from_secs(config.recovery.selection_timeout_secs),
            batch_timeout: config.recovery.batch_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Assemble an analyzer whose collaborators all ask the same language model
    pub fn from_model(model: Arc<dyn LanguageModel>, config: &MatchingConfig) -> Self {
        Self::new(
            Arc::new(LlmRecipeParser::new(Arc::clone(&model))),
            Arc::new(LlmCategorySuggester::with_knowledge(
                Arc::clone(&model),
                config.knowledge.clone(),
            )),
            Arc::new(LlmProductSelector::new(model)),
            config,
        )
    }

    /// Analyze a recipe against the catalog
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::EmptyCategories`] when the catalog has no categories
    /// - [`AnalysisError::RecipeParse`] when the recipe cannot be parsed
    ///
    /// Per-ingredient failures do not fail the analysis; they appear as error
    /// outcomes in the report. An ingredient whose categories could not be
    /// suggested is still matched, against the whole catalog.
    pub async fn analyze(
        &self,
        recipe_text: &str,
        catalog: Arc<Catalog>,
    ) -> Result<AnalysisReport, AnalysisError> {
        if catalog.categories().is_empty() {
            return Err(AnalysisError::EmptyCategories);
        }

        let recipe = self
            .parser
            .parse(recipe_text)
            .await
            .map_err(|e| AnalysisError::RecipeParse(e.to_string()))?;
        info!(
            ingredients = recipe.ingredients.len(),
            servings = recipe.servings,
            "Recipe parsed"
        );

        let categorized = self.categorize(&recipe.ingredients, catalog.categories()).await;
        let response = self
            .orchestrator
            .match_batch(MatchRequest { ingredients: categorized }, catalog)
            .await;

        Ok(AnalysisReport::new(
            &recipe,
            response.matches,
            self.orchestrator.pricer().clone(),
        ))
    }

    /// Suggest categories for every ingredient concurrently, in input order
    ///
    /// A failed, late or abandoned suggestion leaves the ingredient without
    /// categories.
    async fn categorize(
        &self,
        ingredients: &[Ingredient],
        known_categories: &[String],
    ) -> Vec<CategorizedIngredient> {
        let known: Arc<Vec<String>> = Arc::new(known_categories.to_vec());
        let mut results: Vec<Option<Result<Vec<String>, MatchError>>> = vec![None; ingredients.len()];
        let mut positions = HashMap::with_capacity(ingredients.len());
        let mut tasks = JoinSet::new();

        for (index, ingredient) in ingredients.iter().enumerate() {
            let suggester = Arc::clone(&self.suggester);
            let known = Arc::clone(&known);
            let ingredient = ingredient.clone();
            let limit = self.suggestion_timeout;
            let handle = tasks.spawn(async move {
                match tokio::time::timeout(limit, suggester.suggest(&ingredient, &known)).await {
                    Ok(result) => result,
                    Err(_) => Err(MatchError::Timeout(format!(
                        "no categories for '{}' within {}s",
                        ingredient.name,
                        limit.as_secs()
                    ))),
                }
            });
            positions.insert(handle.id(), index);
        }

        let deadline = self.batch_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await,
                None => Ok(tasks.join_next_with_id().await),
            };
            let joined = match next {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(unfinished = tasks.len(), "Batch deadline elapsed during category suggestion");
                    tasks.abort_all();
                    break;
                }
            };

            match joined {
                Some(Ok((id, result))) => {
                    if let Some(&index) = positions.get(&id) {
                        results[index] = Some(result);
                    }
                }
                Some(Err(join_error)) => {
                    if let Some(&index) = positions.get(&join_error.id()) {
                        results[index] = Some(Err(MatchError::ExternalCollaborator(format!(
                            "category suggestion aborted: {join_error}"
                        ))));
                    }
                }
                None => break,
            }
        }

        ingredients
            .iter()
            .cloned()
            .zip(results)
            .map(|(ingredient, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(MatchError::Cancelled("batch deadline elapsed".to_string()))
                });
                let categories = match result {
                    Ok(categories) => categories,
                    Err(e) => {
                        warn!(
                            ingredient = %ingredient.name,
                            "Category suggestion failed, searching the whole catalog: {}", e
                        );
                        Vec::new()
                    }
                };
                CategorizedIngredient::new(ingredient, categories)
            })
            .collect()
    }
}

/// A priced shopping list for one recipe
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Recipe title, when known
    pub title: Option<String>,
    /// Dish type, when known
    pub recipe_type: Option<String>,
    /// Cuisine of origin, when known
    pub cuisine_origin: Option<String>,
    /// Servings the current amounts are for
    pub servings: u32,
    /// One outcome per ingredient, in recipe order
    pub outcomes: Vec<MatchOutcome>,
    /// Products the user chose to leave out
    #[serde(rename = "excludedProductIds")]
    excluded: BTreeSet<String>,
    #[serde(skip)]
    base_servings: u32,
    #[serde(skip)]
    base_ingredients: Vec<Ingredient>,
    #[serde(skip)]
    pricer: ProportionalPricer,
}

impl AnalysisReport {
    /// Build a report from a parsed recipe and its match outcomes
    pub fn new(recipe: &ParsedRecipe, outcomes: Vec<MatchOutcome>, pricer: ProportionalPricer) -> Self {
        let base_ingredients = outcomes
            .iter()
            .map(|outcome| outcome.ingredient().clone())
            .collect();
        Self {
            title: recipe.title.clone(),
            recipe_type: recipe.recipe_type.clone(),
            cuisine_origin: recipe.cuisine_origin.clone(),
            servings: recipe.servings,
            outcomes,
            excluded: BTreeSet::new(),
            base_servings: recipe.servings.max(1),
            base_ingredients,
            pricer,
        }
    }

    /// Rescale every ingredient to a new number of servings and re-price
    ///
    /// Amounts are always derived from the originally parsed quantities, so
    /// repeated adjustments do not accumulate rounding drift.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InputValidation`] when `servings` is zero.
    pub fn adjust_servings(&mut self, servings: u32) -> Result<(), MatchError> {
        if servings == 0 {
            return Err(MatchError::InputValidation(
                "servings must be at least 1".to_string(),
            ));
        }

        let ratio = f64::from(servings) / f64::from(self.base_servings);
        for (outcome, base) in self.outcomes.iter_mut().zip(&self.base_ingredients) {
            let rescaled = base.rescaled(ratio);
            match outcome {
                MatchOutcome::Matched(matched) => {
                    matched.ingredient = rescaled;
                    matched.proportional_price = self.pricer.price(matched);
                }
                MatchOutcome::Error(failed) => failed.ingredient = rescaled,
            }
        }
        info!(from = self.servings, to = servings, "Servings adjusted");
        self.servings = servings;
        Ok(())
    }

    /// Exclude a product from the list, or include it back
    ///
    /// Returns `true` when the product is now excluded.
    pub fn toggle_exclusion(&mut self, product_id: &str) -> bool {
        if self.excluded.remove(product_id) {
            false
        } else {
            self.excluded.insert(product_id.to_string());
            true
        }
    }

    /// Whether a product is excluded
    pub fn is_excluded(&self, product_id: &str) -> bool {
        self.excluded.contains(product_id)
    }

    /// Matches still on the list, in recipe order
    ///
    /// Matches with no product are kept so the list can flag them as not found.
    pub fn listed_matches(&self) -> impl Iterator<Item = &Match> {
        self.outcomes
            .iter()
            .filter_map(MatchOutcome::as_match)
            .filter(move |matched| {
                matched
                    .product_id()
                    .map_or(true, |product_id| !self.is_excluded(product_id))
            })
    }

    /// Critical ingredients left without a product, in recipe order
    pub fn missing_critical(&self) -> impl Iterator<Item = &Ingredient> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.as_match().and_then(Match::product_id).is_none())
            .map(MatchOutcome::ingredient)
            .filter(|ingredient| ingredient.is_critical)
    }

    /// Outcomes whose pipeline failed
    pub fn failures(&self) -> impl Iterator<Item = &MatchOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_error())
    }

    /// Sum of proportional prices of the listed matches, rounded to cents
    pub fn total_cost(&self) -> f64 {
        let total: f64 = self
            .listed_matches()
            .map(|matched| matched.proportional_price)
            .sum();
        round_to_cents(total)
    }

    /// Total cost divided by the number of servings, rounded to cents
    pub fn cost_per_serving(&self) -> f64 {
        round_to_cents(self.total_cost() / f64::from(self.servings.max(1)))
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! # Match Orchestrator Module
//!
//! Runs one matching pipeline per ingredient, concurrently, and gathers the
//! outcomes back in request order:
//!
//! ```text
//! validate -> pre-filter (per category, then catalog-wide) -> annotate
//!          -> select (bounded, with timeout) -> resolve -> price
//! ```
//!
//! A failure anywhere in a pipeline, including a panic, becomes an error outcome
//! for that ingredient only. Selector calls share a semaphore so a large recipe
//! never floods the language model. An optional batch deadline abandons
//! pipelines still running; they are reported as cancelled.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, Product};
use crate::collaborators::{ProductSelector, Selection};
use crate::compatibility::{AnnotatedCandidate, CompatibilityChecker};
use crate::errors::MatchError;
use crate::matching_config::{MatchingConfig, RecoveryConfig};
use crate::model::{CategorizedIngredient, Ingredient, Match, MatchOutcome, MatchRequest, MatchResponse};
use crate::prefilter::CandidatePreFilter;
use crate::pricing::ProportionalPricer;

/// Everything one pipeline needs, shared by all spawned tasks
struct Pipeline {
    selector: Arc<dyn ProductSelector>,
    prefilter: CandidatePreFilter,
    checker: CompatibilityChecker,
    pricer: ProportionalPricer,
    permits: Semaphore,
    selection_timeout: Duration,
}

/// Concurrent ingredient-to-product matcher
pub struct MatchOrchestrator {
    pipeline: Arc<Pipeline>,
    batch_timeout: Option<Duration>,
}

impl MatchOrchestrator {
    /// Create an orchestrator with the default configuration
    pub fn new(selector: Arc<dyn ProductSelector>) -> Self {
        Self::with_config(selector, &MatchingConfig::default())
    }

    /// Create an orchestrator from a full matching configuration
    pub fn with_config(selector: Arc<dyn ProductSelector>, config: &MatchingConfig) -> Self {
        let recovery: &RecoveryConfig = &config.recovery;
        let pipeline = Pipeline {
            selector,
            prefilter: CandidatePreFilter::with_config(config.prefilter.clone()),
            checker: CompatibilityChecker::with_config(config.compatibility.clone()),
            pricer: ProportionalPricer::with_knowledge(config.knowledge.clone()),
            permits: Semaphore::new(recovery.max_concurrent_selections.max(1)),
            selection_timeout: Duration::from_secs(recovery.selection_timeout_secs),
        };
        Self {
            pipeline: Arc::new(pipeline),
            batch_timeout: recovery.batch_timeout_secs.map(Duration::from_secs),
        }
    }

    /// The pricer used for matches, so callers can re-price rescaled ingredients
    pub fn pricer(&self) -> &ProportionalPricer {
        &self.pipeline.pricer
    }

    /// Match every ingredient of the request against the catalog
    ///
    /// # Arguments
    ///
    /// * `request` - Ingredients with their candidate categories
    /// * `catalog` - The shared, read-only product catalog
    ///
    /// # Returns
    ///
    /// One outcome per requested ingredient, in request order. This never fails
    /// as a whole: individual failures are reported as error outcomes.
    pub async fn match_batch(&self, request: MatchRequest, catalog: Arc<Catalog>) -> MatchResponse {
        let total = request.ingredients.len();
        info!(ingredients = total, products = catalog.len(), "Starting match batch");

        let ingredients: Vec<Ingredient> = request
            .ingredients
            .iter()
            .map(|item| item.ingredient.clone())
            .collect();
        let mut slots: Vec<Option<MatchOutcome>> = vec![None; total];
        let mut positions = HashMap::with_capacity(total);
        let mut tasks = JoinSet::new();

        for (index, item) in request.ingredients.into_iter().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let catalog = Arc::clone(&catalog);
            let handle = tasks.spawn(async move { pipeline.run(&catalog, item).await });
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
                    warn!(unfinished = tasks.len(), "Batch deadline elapsed, cancelling pipelines");
                    tasks.abort_all();
                    break;
                }
            };

            match joined {
                Some(Ok((id, outcome))) => {
                    if let Some(&index) = positions.get(&id) {
                        slots[index] = Some(outcome);
                    }
                }
                Some(Err(join_error)) => {
                    if let Some(&index) = positions.get(&join_error.id()) {
                        error!(ingredient = %ingredients[index].name, "Pipeline aborted: {}", join_error);
                        slots[index] = Some(MatchOutcome::failed(
                            ingredients[index].clone(),
                            MatchError::ExternalCollaborator(format!("pipeline aborted: {join_error}")),
                        ));
                    }
                }
                None => break,
            }
        }

        let matches: Vec<MatchOutcome> = slots
            .into_iter()
            .zip(ingredients)
            .map(|(slot, ingredient)| {
                slot.unwrap_or_else(|| {
                    MatchOutcome::failed(
                        ingredient,
                        MatchError::Cancelled("batch deadline elapsed".to_string()),
                    )
                })
            })
            .collect();

        let response = MatchResponse { matches };
        info!(
            ingredients = total,
            errors = response.error_count(),
            "Match batch finished"
        );
        response
    }
}

impl Pipeline {
    async fn run(&self, catalog: &Catalog, item: CategorizedIngredient) -> MatchOutcome {
        let CategorizedIngredient {
            ingredient,
            categories,
        } = item;
        match self.match_one(catalog, &ingredient, &categories).await {
            Ok(matched) => MatchOutcome::Matched(matched),
            Err(e) => {
                warn!(ingredient = %ingredient.name, "Matching failed: {}", e);
                MatchOutcome::failed(ingredient, e)
            }
        }
    }

    async fn match_one(
        &self,
        catalog: &Catalog,
        ingredient: &Ingredient,
        categories: &[String],
    ) -> Result<Match, MatchError> {
        ingredient.validate()?;

        let (category, candidates) = match self.gather_candidates(catalog, ingredient, categories) {
            Ok(found) => found,
            Err(MatchError::NoCandidates(reason)) => {
                debug!(ingredient = %ingredient.name, "{}", reason);
                (categories.first().cloned().unwrap_or_default(), Vec::new())
            }
            Err(e) => return Err(e),
        };

        let annotated = self.checker.annotate(ingredient, &candidates);
        let selection = self.select(ingredient, &annotated).await?;
        let (product, compatible) = resolve_selection(&selection, &annotated)?;

        let mut matched = Match {
            ingredient: ingredient.clone(),
            selected_product: product.cloned(),
            confidence: clamp_confidence(selection.confidence),
            compatible,
            substitution_notes: selection.substitution_notes,
            category,
            proportional_price: 0.0,
            timestamp: Utc::now(),
        };
        let quote = self
            .pricer
            .quote(&matched.ingredient, matched.selected_product.as_ref());
        matched.proportional_price = quote.amount;

        info!(
            ingredient = %ingredient.name,
            product = ?matched.product_id(),
            price = quote.amount,
            basis = ?quote.basis,
            "Ingredient matched"
        );
        Ok(matched)
    }

    /// Candidates from the first suggested category that yields any, else catalog-wide
    fn gather_candidates<'a>(
        &self,
        catalog: &'a Catalog,
        ingredient: &Ingredient,
        categories: &[String],
    ) -> Result<(String, Vec<&'a Product>), MatchError> {
        for category in categories {
            let pool = catalog
                .in_category(category)
                .filter(|product| product.available);
            let candidates = self.prefilter.filter(ingredient, pool);
            if !candidates.is_empty() {
                debug!(
                    ingredient = %ingredient.name,
                    category = %category,
                    candidates = candidates.len(),
                    "Candidates found in category"
                );
                return Ok((category.clone(), candidates));
            }
        }

        let pool = catalog.products().iter().filter(|product| product.available);
        let candidates = self.prefilter.filter(ingredient, pool);
        if candidates.is_empty() {
            return Err(MatchError::NoCandidates(format!(
                "no available product for '{}'",
                ingredient.name
            )));
        }
        debug!(
            ingredient = %ingredient.name,
            candidates = candidates.len(),
            "Candidates found catalog-wide"
        );
        Ok((categories.first().cloned().unwrap_or_default(), candidates))
    }

    async fn select(
        &self,
        ingredient: &Ingredient,
        candidates: &[AnnotatedCandidate<'_>],
    ) -> Result<Selection, MatchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MatchError::Cancelled("selection pool closed".to_string()))?;

        match tokio::time::timeout(self.selection_timeout, self.selector.select(ingredient, candidates)).await {
            Ok(selection) => selection,
            Err(_) => Err(MatchError::Timeout(format!(
                "no selection for '{}' within {}s",
                ingredient.name,
                self.selection_timeout.as_secs()
            ))),
        }
    }
}

/// Look the selected id up among the candidates
fn resolve_selection<'a>(
    selection: &Selection,
    candidates: &[AnnotatedCandidate<'a>],
) -> Result<(Option<&'a Product>, bool), MatchError> {
    let product_id = match selection.product_id.as_deref() {
        Some(id) => id,
        None => return Ok((None, false)),
    };

    let candidate = candidates
        .iter()
        .find(|candidate| candidate.product.product_id == product_id)
        .ok_or_else(|| {
            MatchError::ExternalCollaborator(format!(
                "selected product '{}' is not among the {} candidates",
                product_id,
                candidates.len()
            ))
        })?;

    let compatible = selection.compatible.unwrap_or(candidate.compatible);
    Ok((Some(candidate.product), compatible))
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

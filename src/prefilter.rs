//! # Candidate Pre-Filter Module
//!
//! Narrows a (possibly large) pool of catalog products down to a short, ordered
//! candidate list for one ingredient, so the external selector only ever sees a
//! handful of relevant choices.
//!
//! ## Passes, in priority order
//!
//! 1. **Exact**: product name contains the whole ingredient name. Enough exact
//!    matches short-circuit everything else.
//! 2. **Token**: product name contains any significant word of the ingredient name.
//! 3. **Alternatives**: product name contains one of the declared substitutes.
//!
//! The union is de-duplicated by product id and capped. When it is still too
//! short, it is padded with the remaining pool in its original order so the
//! selector is never starved while any product exists.

use log::{debug, trace};
use std::collections::HashSet;

use crate::catalog::Product;
use crate::matching_config::PrefilterConfig;
use crate::model::Ingredient;

/// Candidate pre-filter driven by [`PrefilterConfig`]
#[derive(Debug, Clone, Default)]
pub struct CandidatePreFilter {
    config: PrefilterConfig,
}

impl CandidatePreFilter {
    /// Create a pre-filter with the default limits (10 candidates, 5 confident matches)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pre-filter with custom limits
    pub fn with_config(config: PrefilterConfig) -> Self {
        Self { config }
    }

    /// Filter a candidate pool for one ingredient
    ///
    /// # Arguments
    ///
    /// * `ingredient` - The ingredient to find products for
    /// * `candidates` - The product pool, in catalog order
    ///
    /// # Returns
    ///
    /// At most `max_candidates` products, every one of them drawn from `candidates`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use recipe_cost::catalog::Product;
    /// use recipe_cost::model::Ingredient;
    /// use recipe_cost::prefilter::CandidatePreFilter;
    /// use recipe_cost::units::UnitTag;
    ///
    /// let products = vec![
    ///     Product::new("1", "Beurre doux", "Crèmerie"),
    ///     Product::new("2", "Lait entier", "Crèmerie"),
    /// ];
    /// let butter = Ingredient::new("beurre", 100.0, UnitTag::Gram);
    ///
    /// let candidates = CandidatePreFilter::new().filter(&butter, &products);
    /// assert_eq!(candidates[0].product_id, "1");
    /// ```
    pub fn filter<'a, I>(&self, ingredient: &Ingredient, candidates: I) -> Vec<&'a Product>
    where
        I: IntoIterator<Item = &'a Product>,
    {
        let pool: Vec<&'a Product> = candidates.into_iter().collect();
        if pool.is_empty() {
            return Vec::new();
        }

        let max = self.config.max_candidates;
        let confident = self.config.min_confident_matches;
        let name = ingredient.name.trim().to_lowercase();
        let tokens: Vec<&str> = name
            .split_whitespace()
            .filter(|token| token.chars().count() >= self.config.min_token_chars)
            .collect();

        let lowered: Vec<String> = pool.iter().map(|product| product.name.to_lowercase()).collect();

        let exact: Vec<usize> = if name.is_empty() {
            Vec::new()
        } else {
            (0..pool.len()).filter(|&i| lowered[i].contains(&name)).collect()
        };
        trace!("Exact pass for '{}' found {} products", name, exact.len());

        if exact.len() >= confident {
            debug!(
                "Short-circuit for '{}': {} exact matches",
                ingredient.name,
                exact.len()
            );
            return exact.into_iter().take(max).map(|i| pool[i]).collect();
        }

        let token_matches: Vec<usize> = (0..pool.len())
            .filter(|&i| tokens.iter().any(|token| lowered[i].contains(token)))
            .collect();
        trace!(
            "Token pass for '{}' ({:?}) found {} products",
            name,
            tokens,
            token_matches.len()
        );

        let mut alternative_matches: Vec<usize> = Vec::new();
        for alternative in &ingredient.possible_alternatives {
            if alternative_matches.len() >= confident {
                break;
            }
            let alternative = alternative.trim().to_lowercase();
            if alternative.is_empty() {
                continue;
            }
            alternative_matches
                .extend((0..pool.len()).filter(|&i| lowered[i].contains(&alternative)));
        }
        trace!(
            "Alternative pass for '{}' found {} products",
            name,
            alternative_matches.len()
        );

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut selected: Vec<&'a Product> = Vec::new();
        for index in exact
            .into_iter()
            .chain(token_matches)
            .chain(alternative_matches)
        {
            if selected.len() >= max {
                break;
            }
            let product = pool[index];
            if seen_ids.insert(product.product_id.as_str()) {
                selected.push(product);
            }
        }

        if selected.len() < confident {
            let matched = selected.len();
            for &product in &pool {
                if selected.len() >= max {
                    break;
                }
                if seen_ids.insert(product.product_id.as_str()) {
                    selected.push(product);
                }
            }
            debug!(
                "Padded candidates for '{}' from {} to {}",
                ingredient.name,
                matched,
                selected.len()
            );
        }

        debug!(
            "Pre-filter kept {} of {} products for '{}'",
            selected.len(),
            pool.len(),
            ingredient.name
        );
        selected
    }
}

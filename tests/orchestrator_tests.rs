//! # Match Orchestrator Tests
//!
//! Concurrent batch matching: order preservation, per-ingredient failure
//! isolation, selection timeouts, batch deadlines, bounded selector
//! concurrency and category fallback.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use recipe_cost::catalog::{Catalog, Product};
    use recipe_cost::collaborators::{LlmProductSelector, ProductSelector, Selection};
    use recipe_cost::compatibility::AnnotatedCandidate;
    use recipe_cost::errors::MatchError;
    use recipe_cost::llm::FakeLanguageModel;
    use recipe_cost::matching_config::MatchingConfig;
    use recipe_cost::model::{CategorizedIngredient, Ingredient, MatchOutcome, MatchRequest};
    use recipe_cost::orchestrator::MatchOrchestrator;
    use recipe_cost::units::UnitTag;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Selector picking the first candidate unless told otherwise
    #[derive(Default)]
    struct ScriptedSelector {
        delays: HashMap<String, Duration>,
        picks: HashMap<String, Option<String>>,
        panic_on: Option<String>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedSelector {
        fn delay(mut self, name: &str, delay: Duration) -> Self {
            self.delays.insert(name.to_string(), delay);
            self
        }

        fn pick(mut self, name: &str, product_id: Option<&str>) -> Self {
            self.picks
                .insert(name.to_string(), product_id.map(|id| id.to_string()));
            self
        }

        fn panicking_on(mut self, name: &str) -> Self {
            self.panic_on = Some(name.to_string());
            self
        }
    }

    #[async_trait]
    impl ProductSelector for ScriptedSelector {
        async fn select<'a>(
            &self,
            ingredient: &Ingredient,
            candidates: &[AnnotatedCandidate<'a>],
        ) -> Result<Selection, MatchError> {
            let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(&ingredient.name) {
                tokio::time::sleep(*delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.panic_on.as_deref() == Some(ingredient.name.as_str()) {
                panic!("selector crashed on {}", ingredient.name);
            }
            Ok(match self.picks.get(&ingredient.name) {
                Some(Some(id)) => Selection::of(id, 0.9),
                Some(None) => Selection::none(),
                None => candidates
                    .first()
                    .map(|candidate| Selection::of(&candidate.product.product_id, 0.9))
                    .unwrap_or_else(Selection::none),
            })
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            Product::new("f1", "Farine de blé T55", "Epicerie sucrée")
                .with_size("1kg")
                .with_price(1.20),
            Product::new("f2", "Farine complète", "Epicerie sucrée")
                .with_size("500g")
                .with_price(1.50),
            Product::new("s1", "Sucre en poudre", "Epicerie sucrée")
                .with_size("1kg")
                .with_price(1.10),
            Product::new("b1", "Beurre doux", "Crèmerie")
                .with_size("250g")
                .with_price(2.50),
            Product::new("b2", "Beurre demi-sel", "Crèmerie")
                .with_size("250g")
                .with_price(2.60)
                .unavailable(),
            Product::new("o1", "Oeufs frais", "Crèmerie")
                .with_size("6 par pack")
                .with_price(2.40),
            Product::new("l1", "Lait entier", "Crèmerie")
                .with_size("1L")
                .with_price(1.05),
            Product::new("p1", "Pommes Golden", "Fruits et légumes")
                .with_size("1kg")
                .with_price(2.00),
        ]))
    }

    fn item(name: &str, amount: f64, unit: UnitTag, categories: &[&str]) -> CategorizedIngredient {
        CategorizedIngredient::new(
            Ingredient::new(name, amount, unit),
            categories.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn config() -> MatchingConfig {
        MatchingConfig::default()
    }

    fn error_of(outcome: &MatchOutcome) -> String {
        match outcome {
            MatchOutcome::Error(failed) => failed.error.clone(),
            MatchOutcome::Matched(matched) => panic!("expected an error, got {:?}", matched.product_id()),
        }
    }

    #[tokio::test]
    async fn test_outcomes_follow_request_order() {
        let selector = ScriptedSelector::default()
            .delay("farine", Duration::from_millis(150))
            .delay("beurre", Duration::from_millis(50));
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config());
        let request = MatchRequest {
            ingredients: vec![
                item("farine", 200.0, UnitTag::Gram, &["Epicerie sucrée"]),
                item("beurre", 100.0, UnitTag::Gram, &["Crèmerie"]),
                item("pomme", 4.0, UnitTag::Piece, &["Fruits et légumes"]),
            ],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        let names: Vec<&str> = response
            .matches
            .iter()
            .map(|outcome| outcome.ingredient().name.as_str())
            .collect();
        assert_eq!(names, vec!["farine", "beurre", "pomme"]);
        assert_eq!(response.error_count(), 0);

        let flour = response.matches[0].as_match().unwrap();
        assert_eq!(flour.product_id(), Some("f1"));
        assert_eq!(flour.category, "Epicerie sucrée");
        assert!((flour.proportional_price - 0.24).abs() < 1e-9);

        let apples = response.matches[2].as_match().unwrap();
        assert!((apples.proportional_price - 1.60).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_ingredient_fails_alone() {
        let orchestrator = MatchOrchestrator::with_config(Arc::new(ScriptedSelector::default()), &config());
        let request = MatchRequest {
            ingredients: vec![
                item("sucre", 0.0, UnitTag::Gram, &["Epicerie sucrée"]),
                item("lait", 250.0, UnitTag::Milliliter, &["Crèmerie"]),
            ],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        assert!(error_of(&response.matches[0]).starts_with("Invalid input"));
        assert_eq!(response.matches[1].as_match().unwrap().product_id(), Some("l1"));
    }

    #[tokio::test]
    async fn test_panicking_selector_fails_alone() {
        let selector = ScriptedSelector::default().panicking_on("beurre");
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config());
        let request = MatchRequest {
            ingredients: vec![
                item("beurre", 100.0, UnitTag::Gram, &["Crèmerie"]),
                item("farine", 200.0, UnitTag::Gram, &["Epicerie sucrée"]),
            ],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        assert!(response.matches[0].is_error());
        assert_eq!(response.matches[0].ingredient().name, "beurre");
        assert!(!response.matches[1].is_error());
    }

    #[tokio::test]
    async fn test_selection_outside_candidates_is_rejected() {
        let selector = ScriptedSelector::default().pick("farine", Some("p1"));
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config());
        let request = MatchRequest {
            ingredients: vec![item("farine", 200.0, UnitTag::Gram, &["Epicerie sucrée"])],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        let error = error_of(&response.matches[0]);
        assert!(error.contains("'p1' is not among"), "{error}");
    }

    #[tokio::test]
    async fn test_unavailable_products_are_never_candidates() {
        let selector = ScriptedSelector::default().pick("beurre demi-sel", Some("b2"));
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config());
        let request = MatchRequest {
            ingredients: vec![item("beurre demi-sel", 100.0, UnitTag::Gram, &["Crèmerie"])],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        assert!(error_of(&response.matches[0]).contains("'b2' is not among"));
    }

    #[tokio::test]
    async fn test_null_selection_is_a_priceless_match() {
        let selector = ScriptedSelector::default().pick("safran", None);
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config());
        let request = MatchRequest {
            ingredients: vec![item("safran", 1.0, UnitTag::Gram, &["Epices"])],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        let saffron = response.matches[0].as_match().unwrap();
        assert!(saffron.selected_product.is_none());
        assert_eq!(saffron.proportional_price, 0.0);
        assert!(!saffron.compatible);
        assert_eq!(saffron.category, "Epices");
    }

    #[tokio::test]
    async fn test_category_fallback() {
        let orchestrator = MatchOrchestrator::with_config(Arc::new(ScriptedSelector::default()), &config());
        let request = MatchRequest {
            ingredients: vec![
                // Empty category skipped, second one yields candidates
                item("farine", 200.0, UnitTag::Gram, &["Surgelés", "Epicerie sucrée"]),
                // No category yields anything: catalog-wide, first suggestion kept
                item("lait", 250.0, UnitTag::Milliliter, &["Surgelés"]),
                // No suggestion at all
                item("sucre", 100.0, UnitTag::Gram, &[]),
            ],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        let flour = response.matches[0].as_match().unwrap();
        assert_eq!(flour.category, "Epicerie sucrée");

        let milk = response.matches[1].as_match().unwrap();
        assert_eq!(milk.category, "Surgelés");
        assert_eq!(milk.product_id(), Some("l1"));

        let sugar = response.matches[2].as_match().unwrap();
        assert_eq!(sugar.category, "");
        assert_eq!(sugar.product_id(), Some("s1"));
    }

    #[tokio::test]
    async fn test_slow_selection_times_out() {
        let mut config = config();
        config.recovery.selection_timeout_secs = 1;
        let selector = ScriptedSelector::default().delay("farine", Duration::from_secs(5));
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config);
        let request = MatchRequest {
            ingredients: vec![
                item("farine", 200.0, UnitTag::Gram, &["Epicerie sucrée"]),
                item("beurre", 100.0, UnitTag::Gram, &["Crèmerie"]),
            ],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        assert!(error_of(&response.matches[0]).starts_with("Timeout"));
        assert!(!response.matches[1].is_error());
    }

    #[tokio::test]
    async fn test_batch_deadline_cancels_unfinished_pipelines() {
        let mut config = config();
        config.recovery.batch_timeout_secs = Some(1);
        let selector = ScriptedSelector::default().delay("farine", Duration::from_secs(5));
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config);
        let request = MatchRequest {
            ingredients: vec![
                item("farine", 200.0, UnitTag::Gram, &["Epicerie sucrée"]),
                item("beurre", 100.0, UnitTag::Gram, &["Crèmerie"]),
            ],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        assert_eq!(response.matches.len(), 2);
        assert!(error_of(&response.matches[0]).starts_with("Cancelled"));
        assert_eq!(response.matches[1].as_match().unwrap().product_id(), Some("b1"));
    }

    #[tokio::test]
    async fn test_selector_concurrency_is_bounded() {
        let mut config = config();
        config.recovery.max_concurrent_selections = 2;
        let names = ["farine", "sucre", "beurre", "lait", "pomme", "oeuf"];
        let selector = names.iter().fold(ScriptedSelector::default(), |selector, name| {
            selector.delay(name, Duration::from_millis(50))
        });
        let selector = Arc::new(selector);
        let orchestrator = MatchOrchestrator::with_config(selector.clone(), &config);
        let request = MatchRequest {
            ingredients: names
                .iter()
                .map(|name| item(name, 1.0, UnitTag::Piece, &[]))
                .collect(),
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        assert_eq!(response.error_count(), 0);
        let peak = selector.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak concurrency {peak}");
    }

    #[tokio::test]
    async fn test_empty_request() {
        let orchestrator = MatchOrchestrator::new(Arc::new(ScriptedSelector::default()));
        let response = orchestrator
            .match_batch(MatchRequest { ingredients: Vec::new() }, catalog())
            .await;
        assert!(response.matches.is_empty());
    }

    #[tokio::test]
    async fn test_model_backed_selection_is_clamped() {
        let model = FakeLanguageModel::new().with_default_response(
            r#"{"selectedProductId": "b1", "confidence": 1.4, "compatible": true, "substitutionNotes": "Beurre doux à la place du demi-sel"}"#,
        );
        let selector = LlmProductSelector::new(Arc::new(model));
        let orchestrator = MatchOrchestrator::with_config(Arc::new(selector), &config());
        let request = MatchRequest {
            ingredients: vec![item("beurre demi-sel", 100.0, UnitTag::Gram, &["Crèmerie"])],
        };

        let response = orchestrator.match_batch(request, catalog()).await;

        let butter = response.matches[0].as_match().unwrap();
        assert_eq!(butter.product_id(), Some("b1"));
        assert_eq!(butter.confidence, 1.0);
        assert!(butter.compatible);
        assert_eq!(
            butter.substitution_notes.as_deref(),
            Some("Beurre doux à la place du demi-sel")
        );
        assert!((butter.proportional_price - 1.00).abs() < 1e-9);
    }
}

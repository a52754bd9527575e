//! # Recipe Analysis Tests
//!
//! End-to-end analysis with a scripted language model: parsing, category
//! suggestion, matching, servings adjustment, exclusions and the localized
//! shopping-list export.

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use async_trait::async_trait;
    use recipe_cost::analysis::{AnalysisReport, RecipeAnalyzer};
    use recipe_cost::catalog::{Catalog, Product};
    use recipe_cost::collaborators::{
        CategorySuggester, LlmCategorySuggester, LlmProductSelector, LlmRecipeParser,
    };
    use recipe_cost::errors::{AnalysisError, MatchError};
    use recipe_cost::llm::FakeLanguageModel;
    use recipe_cost::localization::{Language, LocalizationManager};
    use recipe_cost::matching_config::MatchingConfig;
    use recipe_cost::model::Ingredient;
    use recipe_cost::shopping_list::ShoppingListExporter;
    use std::sync::Arc;
    use std::time::Duration;

    const CREPES: &str = "Crêpes pour 4 personnes : 250 g de farine, 50 cl de lait, 3 oeufs, une pincée de safran";

    const RECIPE_REPLY: &str = r#"```json
{
  "title": "Crêpes",
  "recipeType": "dessert",
  "servings": 4,
  "ingredients": [
    {"name": "farine", "amount": 250, "unit": "g", "isCritical": true},
    {"name": "lait", "amount": 500, "unit": "ml", "isCritical": true},
    {"name": "oeuf", "amount": 3, "unit": "piece"},
    {"name": "safran", "amount": 1, "unit": "g"}
  ]
}
```"#;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            Product::new("f1", "Farine de blé T55", "Epicerie sucrée")
                .with_size("1kg")
                .with_price(1.20),
            Product::new("s1", "Sucre en poudre", "Epicerie sucrée")
                .with_size("1kg")
                .with_price(1.10),
            Product::new("l1", "Lait entier", "Crèmerie")
                .with_size("1L")
                .with_price(1.00),
            Product::new("o1", "Oeufs frais", "Crèmerie")
                .with_size("6 par pack")
                .with_price(2.40),
            Product::new("p1", "Pommes Golden", "Fruits et légumes")
                .with_size("1kg")
                .with_price(2.00),
        ]))
    }

    fn scripted_model() -> Arc<FakeLanguageModel> {
        Arc::new(
            FakeLanguageModel::new()
                .with_response("Parse this recipe", RECIPE_REPLY)
                .with_response("ingredient: \"safran\"", r#"{"categories": []}"#)
                .with_response(r#""name":"farine""#, r#"{"selectedProductId": "f1", "confidence": 0.95}"#)
                .with_response(r#""name":"lait""#, r#"{"selectedProductId": "l1", "confidence": 0.9}"#)
                .with_response(r#""name":"oeuf""#, r#"{"selectedProductId": "o1", "confidence": 0.9}"#)
                .with_response(r#""name":"safran""#, r#"{"selectedProductId": null, "confidence": 0}"#),
        )
    }

    /// Suggests categories from the keyword table, but never answers for one ingredient
    struct StallingSuggester {
        stalled: &'static str,
        inner: LlmCategorySuggester,
    }

    #[async_trait]
    impl CategorySuggester for StallingSuggester {
        async fn suggest(
            &self,
            ingredient: &Ingredient,
            known_categories: &[String],
        ) -> Result<Vec<String>, MatchError> {
            if ingredient.name == self.stalled {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.inner.suggest(ingredient, known_categories).await
        }
    }

    fn stalling_analyzer(config: &MatchingConfig) -> RecipeAnalyzer {
        let model = scripted_model();
        RecipeAnalyzer::new(
            Arc::new(LlmRecipeParser::new(model.clone())),
            Arc::new(StallingSuggester {
                stalled: "safran",
                inner: LlmCategorySuggester::new(model.clone()),
            }),
            Arc::new(LlmProductSelector::new(model)),
            config,
        )
    }

    async fn analyze() -> AnalysisReport {
        let analyzer = RecipeAnalyzer::from_model(scripted_model(), &MatchingConfig::default());
        analyzer.analyze(CREPES, catalog()).await.unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[tokio::test]
    async fn test_analysis_matches_in_recipe_order() {
        let report = analyze().await;

        assert_eq!(report.title.as_deref(), Some("Crêpes"));
        assert_eq!(report.recipe_type.as_deref(), Some("dessert"));
        assert_eq!(report.servings, 4);
        assert_eq!(report.outcomes.len(), 4);

        let ids: Vec<Option<&str>> = report
            .outcomes
            .iter()
            .map(|outcome| outcome.as_match().and_then(|m| m.product_id()))
            .collect();
        assert_eq!(ids, vec![Some("f1"), Some("l1"), Some("o1"), None]);

        // Categories came from the keyword table
        assert_eq!(report.outcomes[0].as_match().unwrap().category, "Epicerie sucrée");
        assert_eq!(report.outcomes[2].as_match().unwrap().category, "Crèmerie");

        // Saffron has no known category: searched catalog-wide, nothing fits
        let saffron = report.outcomes[3].as_match().unwrap();
        assert_eq!(saffron.category, "");
        assert!(saffron.selected_product.is_none());
        assert_eq!(report.failures().count(), 0);

        assert!((report.total_cost() - 2.00).abs() < 1e-9);
        assert!((report.cost_per_serving() - 0.50).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_adjusting_servings_reprices_everything() {
        let mut report = analyze().await;
        report.adjust_servings(8).unwrap();

        assert_eq!(report.servings, 8);
        assert_eq!(report.outcomes[0].ingredient().amount, 500.0);
        assert_eq!(report.outcomes[2].ingredient().amount, 6.0);
        assert!((report.total_cost() - 4.00).abs() < 1e-9);

        report.adjust_servings(3).unwrap();
        assert_eq!(report.outcomes[2].ingredient().amount, 2.3);
        assert_eq!(report.outcomes[1].ingredient().amount, 375.0);
    }

    #[tokio::test]
    async fn test_excluded_products_leave_the_total() {
        let mut report = analyze().await;

        assert!(report.toggle_exclusion("o1"));
        assert!(report.is_excluded("o1"));
        assert!((report.total_cost() - 0.80).abs() < 1e-9);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["excludedProductIds"][0], "o1");
        assert_eq!(json["outcomes"][0]["status"], "ok");
        assert_eq!(json["outcomes"][3]["status"], "ok");
        assert!(json["outcomes"][3]["selectedProduct"].is_null());
    }

    #[tokio::test]
    async fn test_french_export() {
        let report = analyze().await;
        let localization = LocalizationManager::new().unwrap();

        let text = ShoppingListExporter::new(&localization, Language::French).render(&report, date());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Liste de courses - 15/03/2024");
        assert_eq!(lines[1], "Recette : Crêpes");
        assert_eq!(lines[2], "Pour 4 personnes");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Farine de blé T55 - 250 g - 0,30 €");
        assert_eq!(lines[5], "Lait entier - 500 ml - 0,50 €");
        assert_eq!(lines[6], "Oeufs frais - 3 pièces - 1,20 €");
        assert_eq!(lines[7], "safran - Produit non trouvé");
        assert_eq!(lines[9], "Total : 2,00 €");
        assert_eq!(lines[10], "Soit 0,50 € par personne");
        assert_eq!(lines.len(), 11);
    }

    #[tokio::test]
    async fn test_english_export_skips_excluded_products() {
        let mut report = analyze().await;
        report.toggle_exclusion("o1");
        let localization = LocalizationManager::new().unwrap();

        let text = ShoppingListExporter::new(&localization, Language::English).render(&report, date());

        assert!(text.starts_with("Shopping list - 2024-03-15\nRecipe: Crêpes\nFor 4 people\n"));
        assert!(text.contains("Farine de blé T55 - 250 g - €0.30"));
        assert!(!text.contains("Oeufs frais"));
        assert!(text.contains("Total: €0.80"));
    }

    #[tokio::test]
    async fn test_product_not_found_line() {
        let model = Arc::new(
            FakeLanguageModel::new()
                .with_response(
                    "Parse this recipe",
                    r#"{"servings": 1, "ingredients": [{"name": "pomme", "amount": 2, "unit": "pièces", "isCritical": true}]}"#,
                )
                .with_response("Ingredient needed", r#"{"selectedProductId": null, "confidence": 0}"#),
        );
        let analyzer = RecipeAnalyzer::from_model(model, &MatchingConfig::default());
        let report = analyzer.analyze("2 pommes", catalog()).await.unwrap();
        let localization = LocalizationManager::new().unwrap();

        let text = ShoppingListExporter::new(&localization, Language::French).render(&report, date());

        assert!(text.contains("Pour 1 personne\n"));
        assert!(text.contains("pomme - Produit non trouvé"));
        assert!(text.contains("Total : 0,00 €"));
        assert!(text.ends_with("\nIngrédients essentiels manquants : pomme"));
    }

    #[tokio::test]
    async fn test_ingredient_without_category_is_matched_catalog_wide() {
        let mut products = catalog().products().to_vec();
        products.push(
            Product::new("x1", "Safran en filaments", "Epicerie salée")
                .with_size("1g")
                .with_price(5.90),
        );
        let model = Arc::new(
            FakeLanguageModel::new()
                .with_response(
                    "Parse this recipe",
                    r#"{"ingredients": [{"name": "safran", "amount": 1, "unit": "g"}]}"#,
                )
                .with_response("ingredient: \"safran\"", r#"{"categories": []}"#)
                .with_response(r#""name":"safran""#, r#"{"selectedProductId": "x1", "confidence": 0.8}"#),
        );
        let analyzer = RecipeAnalyzer::from_model(model, &MatchingConfig::default());

        let report = analyzer
            .analyze("une pincée de safran", Arc::new(Catalog::new(products)))
            .await
            .unwrap();

        let saffron = report.outcomes[0].as_match().unwrap();
        assert_eq!(saffron.product_id(), Some("x1"));
        assert_eq!(saffron.category, "");
        assert!((report.total_cost() - 5.90).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stalled_category_suggestion_times_out() {
        let mut config = MatchingConfig::default();
        config.recovery.selection_timeout_secs = 1;
        let analyzer = stalling_analyzer(&config);

        let report = tokio::time::timeout(Duration::from_secs(10), analyzer.analyze(CREPES, catalog()))
            .await
            .expect("analysis must not wait for the stalled suggestion")
            .unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.outcomes[0].as_match().unwrap().product_id(), Some("f1"));
        // Still matched, against the whole catalog
        let saffron = report.outcomes[3].as_match().unwrap();
        assert_eq!(saffron.category, "");
        assert!(saffron.selected_product.is_none());
    }

    #[tokio::test]
    async fn test_batch_deadline_bounds_category_suggestion() {
        let mut config = MatchingConfig::default();
        config.recovery.batch_timeout_secs = Some(1);
        let analyzer = stalling_analyzer(&config);

        let report = tokio::time::timeout(Duration::from_secs(10), analyzer.analyze(CREPES, catalog()))
            .await
            .expect("analysis must stop at the batch deadline")
            .unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.outcomes[1].as_match().unwrap().product_id(), Some("l1"));
        assert_eq!(report.outcomes[3].as_match().unwrap().category, "");
    }

    #[tokio::test]
    async fn test_empty_catalog_is_fatal_before_any_model_call() {
        let model = scripted_model();
        let analyzer = RecipeAnalyzer::from_model(model.clone(), &MatchingConfig::default());

        let error = analyzer
            .analyze(CREPES, Arc::new(Catalog::new(Vec::new())))
            .await
            .unwrap_err();

        assert_eq!(error.code(), "CATEGORY_LIST_EMPTY");
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_recipe_is_fatal() {
        let model = Arc::new(FakeLanguageModel::new().with_default_response("Désolé, je ne peux pas."));
        let analyzer = RecipeAnalyzer::from_model(model, &MatchingConfig::default());

        let error = analyzer.analyze(CREPES, catalog()).await.unwrap_err();

        assert!(matches!(error, AnalysisError::RecipeParse(_)));
        assert_eq!(error.code(), "RECIPE_PARSE_FAILED");
    }
}

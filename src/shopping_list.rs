//! # Shopping List Export
//!
//! Renders an [`AnalysisReport`] as a localized plain-text shopping list:
//!
//! ```text
//! Liste de courses - 17/10/2026
//! Recette : Crêpes
//! Pour 4 personnes
//!
//! Farine de blé - 250 g - 0,25 €
//! fleur d'oranger - Produit non trouvé
//!
//! Total : 0,25 €
//! Soit 0,06 € par personne
//! ```
//!
//! Excluded products are left out of both the lines and the total. Critical
//! ingredients that found no product are listed at the end.

use chrono::{Local, NaiveDate};
use fluent_bundle::FluentValue;

use crate::analysis::AnalysisReport;
use crate::localization::{Language, LocalizationManager};
use crate::model::{Ingredient, MatchOutcome};
use crate::units::UnitTag;

/// Plain-text shopping list renderer for one language
pub struct ShoppingListExporter<'a> {
    localization: &'a LocalizationManager,
    language: Language,
}

impl<'a> ShoppingListExporter<'a> {
    /// Create an exporter writing in `language`
    pub fn new(localization: &'a LocalizationManager, language: Language) -> Self {
        Self {
            localization,
            language,
        }
    }

    /// Render the report as of `date`
    pub fn render(&self, report: &AnalysisReport, date: NaiveDate) -> String {
        let mut lines = vec![self.message(
            "shopping-list-title",
            &[("date", FluentValue::from(date.format(self.language.date_format()).to_string()))],
        )];
        if let Some(title) = &report.title {
            lines.push(self.message(
                "shopping-list-recipe",
                &[("title", FluentValue::from(title.as_str()))],
            ));
        }
        lines.push(self.message(
            "shopping-list-servings",
            &[("count", FluentValue::from(report.servings))],
        ));
        lines.push(String::new());

        for outcome in &report.outcomes {
            match outcome {
                MatchOutcome::Matched(matched) => match &matched.selected_product {
                    Some(product) if report.is_excluded(&product.product_id) => {}
                    Some(product) => lines.push(self.message(
                        "shopping-list-item",
                        &[
                            ("product", FluentValue::from(product.name.as_str())),
                            ("quantity", FluentValue::from(self.quantity(&matched.ingredient))),
                            ("price", FluentValue::from(self.price(matched.proportional_price))),
                        ],
                    )),
                    None => lines.push(self.message(
                        "shopping-list-not-found",
                        &[("ingredient", FluentValue::from(matched.ingredient.name.as_str()))],
                    )),
                },
                MatchOutcome::Error(failed) => lines.push(self.message(
                    "shopping-list-failed",
                    &[
                        ("ingredient", FluentValue::from(failed.ingredient.name.as_str())),
                        ("error", FluentValue::from(failed.error.as_str())),
                    ],
                )),
            }
        }

        lines.push(String::new());
        lines.push(self.message(
            "shopping-list-total",
            &[("price", FluentValue::from(self.price(report.total_cost())))],
        ));
        lines.push(self.message(
            "shopping-list-per-serving",
            &[("price", FluentValue::from(self.price(report.cost_per_serving())))],
        ));

        let missing: Vec<&str> = report
            .missing_critical()
            .map(|ingredient| ingredient.name.as_str())
            .collect();
        if !missing.is_empty() {
            lines.push(self.message(
                "shopping-list-missing-critical",
                &[("ingredients", FluentValue::from(missing.join(", ")))],
            ));
        }
        lines.join("\n")
    }

    fn message(&self, key: &str, args: &[(&str, FluentValue<'_>)]) -> String {
        self.localization
            .get_message_with_args(key, self.language, args)
    }

    fn price(&self, amount: f64) -> String {
        self.message(
            "price",
            &[("amount", FluentValue::from(self.language.format_decimal(amount, 2)))],
        )
    }

    fn quantity(&self, ingredient: &Ingredient) -> String {
        let amount = if ingredient.amount.fract() == 0.0 {
            format!("{:.0}", ingredient.amount)
        } else {
            self.language.format_decimal(ingredient.amount, 1)
        };
        let unit = match &ingredient.unit {
            UnitTag::Teaspoon => self.message("unit-tsp", &[]),
            UnitTag::Tablespoon => self.message("unit-tbsp", &[]),
            UnitTag::Piece => {
                self.message("unit-piece", &[("count", FluentValue::from(ingredient.amount))])
            }
            other => other.label().to_string(),
        };
        format!("{} {}", amount, unit)
    }
}

impl AnalysisReport {
    /// Render the shopping list dated today
    pub fn export(&self, localization: &LocalizationManager, language: Language) -> String {
        ShoppingListExporter::new(localization, language).render(self, Local::now().date_naive())
    }
}

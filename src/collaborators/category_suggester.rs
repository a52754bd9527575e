//! Category suggestion: keyword table first, language model second.

use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use std::sync::Arc;

use super::CategorySuggester;
use crate::errors::MatchError;
use crate::llm::{parse_json_reply, LanguageModel};
use crate::matching_config::{KnowledgeBase, MAX_SUGGESTED_CATEGORIES};
use crate::model::Ingredient;

const CATEGORY_PROMPT: &str = r#"Given this ingredient: "{ingredient}"
And these categories: {categories}
Select the most relevant categories that might contain this ingredient, in order of relevance.
Return only a JSON object with the format: {"categories": ["primary-category", "fallback-category1", "fallback-category2"]}
All categories must be from the provided list.
Limit to 3 most relevant categories.
Return only the JSON, no other text."#;

#[derive(Debug, Deserialize)]
struct CategoryReply {
    #[serde(default)]
    categories: Vec<String>,
    // Older prompt shape answering with a single category
    #[serde(default)]
    category: Option<String>,
}

/// Category suggester backed by the keyword table and a language model
#[derive(Debug, Clone)]
pub struct LlmCategorySuggester {
    model: Arc<dyn LanguageModel>,
    knowledge: KnowledgeBase,
}

impl LlmCategorySuggester {
    /// Create a suggester with the default keyword table
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::with_knowledge(model, KnowledgeBase::default())
    }

    /// Create a suggester with a custom keyword table
    pub fn with_knowledge(model: Arc<dyn LanguageModel>, knowledge: KnowledgeBase) -> Self {
        Self { model, knowledge }
    }

    /// Categories from the keyword table, restricted to the known set
    ///
    /// A rule applies when its keyword is a whole word of the ingredient name,
    /// so "lait" covers "lait entier" but not "laitue".
    pub fn keyword_categories(&self, ingredient_name: &str, known_categories: &[String]) -> Vec<String> {
        let name = ingredient_name.trim().to_lowercase();
        let words: Vec<&str> = name
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();

        for rule in &self.knowledge.category_keywords {
            let keyword = rule.keyword.to_lowercase();
            if !words.iter().any(|word| *word == keyword) {
                continue;
            }
            let categories = restrict_to_known(rule.categories.iter(), known_categories);
            if !categories.is_empty() {
                trace!("Keyword '{}' matched '{}'", rule.keyword, name);
                return categories;
            }
        }
        Vec::new()
    }
}

fn restrict_to_known<'a, I>(suggested: I, known_categories: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut kept: Vec<String> = Vec::new();
    for category in suggested {
        let category = category.trim();
        if let Some(known) = known_categories.iter().find(|known| known.as_str() == category) {
            if !kept.contains(known) {
                kept.push(known.clone());
            }
        }
        if kept.len() == MAX_SUGGESTED_CATEGORIES {
            break;
        }
    }
    kept
}

#[async_trait]
impl CategorySuggester for LlmCategorySuggester {
    async fn suggest(
        &self,
        ingredient: &Ingredient,
        known_categories: &[String],
    ) -> Result<Vec<String>, MatchError> {
        if known_categories.is_empty() {
            return Err(MatchError::InputValidation(
                "no known categories to choose from".to_string(),
            ));
        }

        let from_keywords = self.keyword_categories(&ingredient.name, known_categories);
        if !from_keywords.is_empty() {
            debug!("Categories for '{}' from keywords: {:?}", ingredient.name, from_keywords);
            return Ok(from_keywords);
        }

        let prompt = CATEGORY_PROMPT
            .replace("{ingredient}", &ingredient.name)
            .replace("{categories}", &serde_json::to_string(known_categories)?);
        let reply: CategoryReply = parse_json_reply(&self.model.complete(&prompt).await?)?;

        let suggested: Vec<String> = reply.categories.into_iter().chain(reply.category).collect();
        let categories = restrict_to_known(suggested.iter(), known_categories);
        if categories.is_empty() {
            // Leaves the orchestrator to search the whole catalog
            debug!(
                "No known category suggested for '{}' (got {:?})",
                ingredient.name, suggested
            );
            return Ok(categories);
        }

        debug!("Categories for '{}' from model: {:?}", ingredient.name, categories);
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeLanguageModel;
    use crate::units::UnitTag;

    fn known() -> Vec<String> {
        ["Crèmerie", "Fruits et légumes", "Epicerie salée", "Boissons"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let suggester = LlmCategorySuggester::new(Arc::new(FakeLanguageModel::new()));

        assert_eq!(
            suggester.keyword_categories("lait entier", &known()),
            vec!["Crèmerie".to_string()]
        );
        assert!(suggester.keyword_categories("laitue", &known()).is_empty());
        assert_eq!(
            suggester.keyword_categories("huile d'olive", &known()),
            vec!["Epicerie salée".to_string()]
        );
    }

    #[tokio::test]
    async fn test_keyword_hit_skips_the_model() {
        let model = Arc::new(FakeLanguageModel::new());
        let suggester = LlmCategorySuggester::new(model.clone());
        let butter = Ingredient::new("beurre", 100.0, UnitTag::Gram);

        let categories = suggester.suggest(&butter, &known()).await.unwrap();
        assert_eq!(categories, vec!["Crèmerie".to_string()]);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_answer_is_restricted_and_capped() {
        let model = Arc::new(FakeLanguageModel::new().with_default_response(
            r#"{"categories": ["Boissons", "Rayon imaginaire", "Boissons", "Crèmerie", "Epicerie salée", "Fruits et légumes"]}"#,
        ));
        let suggester = LlmCategorySuggester::new(model);
        let cider = Ingredient::new("cidre", 250.0, UnitTag::Milliliter);

        let categories = suggester.suggest(&cider, &known()).await.unwrap();
        assert_eq!(categories, vec!["Boissons", "Crèmerie", "Epicerie salée"]);
    }

    #[tokio::test]
    async fn test_no_known_category_is_an_empty_suggestion() {
        let cider = Ingredient::new("cidre", 250.0, UnitTag::Milliliter);

        for reply in [r#"{"categories": ["Rayon imaginaire"]}"#, r#"{"categories": []}"#] {
            let model = Arc::new(FakeLanguageModel::new().with_default_response(reply));
            let suggester = LlmCategorySuggester::new(model);

            let categories = suggester.suggest(&cider, &known()).await.unwrap();
            assert!(categories.is_empty(), "{reply}");
        }
    }

    #[tokio::test]
    async fn test_model_failure_is_a_collaborator_error() {
        let model = Arc::new(FakeLanguageModel::new().with_default_response("je ne sais pas"));
        let suggester = LlmCategorySuggester::new(model);
        let cider = Ingredient::new("cidre", 250.0, UnitTag::Milliliter);

        let result = suggester.suggest(&cider, &known()).await;
        assert!(matches!(result, Err(MatchError::ExternalCollaborator(_))));
    }
}

//! Product selection through the language model.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{ProductSelector, Selection};
use crate::catalog::coerce_number;
use crate::compatibility::AnnotatedCandidate;
use crate::errors::MatchError;
use crate::llm::{parse_json_reply, LanguageModel};
use crate::model::Ingredient;

const SELECTION_PROMPT: &str = r#"Ingredient needed: {ingredient}
Available products: {candidates}
Select the best match among the available products only. Each product is flagged
"compatible" when its package size fits the needed quantity; prefer compatible
products. If a substitute is chosen, explain it in substitutionNotes. If nothing
fits, set selectedProductId to null.
Return only JSON:
{
  "selectedProductId": "<productId or null>",
  "confidence": 0.95,
  "compatible": true,
  "substitutionNotes": null
}"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateView<'a> {
    product_id: &'a str,
    name: &'a str,
    brand: Option<&'a str>,
    size: Option<&'a str>,
    price_eur: Option<f64>,
    compatible: bool,
}

impl<'a> From<&AnnotatedCandidate<'a>> for CandidateView<'a> {
    fn from(candidate: &AnnotatedCandidate<'a>) -> Self {
        let product = candidate.product;
        Self {
            product_id: &product.product_id,
            name: &product.name,
            brand: product.brand.as_deref(),
            size: product.size_value.as_deref(),
            price_eur: product.price_eur,
            compatible: candidate.compatible,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionReply {
    #[serde(default)]
    selected_product_id: Value,
    // Whole product object, as returned by the first prompt version
    #[serde(default)]
    selected_product: Value,
    #[serde(default)]
    confidence: Value,
    compatible: Option<bool>,
    substitution_notes: Option<String>,
}

impl SelectionReply {
    fn product_id(&self) -> Option<String> {
        id_text(&self.selected_product_id).or_else(|| match &self.selected_product {
            Value::Object(product) => product.get("productId").and_then(id_text),
            other => id_text(other),
        })
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() && text.trim() != "null" => {
            Some(text.trim().to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Product selector asking a language model to choose among candidates
#[derive(Debug, Clone)]
pub struct LlmProductSelector {
    model: Arc<dyn LanguageModel>,
}

impl LlmProductSelector {
    /// Create a selector over the given model
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ProductSelector for LlmProductSelector {
    async fn select<'a>(
        &self,
        ingredient: &Ingredient,
        candidates: &[AnnotatedCandidate<'a>],
    ) -> Result<Selection, MatchError> {
        if candidates.is_empty() {
            debug!("No candidates for '{}', nothing to select", ingredient.name);
            return Ok(Selection::none());
        }

        let views: Vec<CandidateView<'_>> = candidates.iter().map(CandidateView::from).collect();
        let prompt = SELECTION_PROMPT
            .replace("{ingredient}", &serde_json::to_string(ingredient)?)
            .replace("{candidates}", &serde_json::to_string(&views)?);

        let reply: SelectionReply = parse_json_reply(&self.model.complete(&prompt).await?)?;
        let selection = Selection {
            product_id: reply.product_id(),
            confidence: coerce_number(&reply.confidence).unwrap_or(0.0),
            compatible: reply.compatible,
            substitution_notes: reply
                .substitution_notes
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
        };
        debug!(
            "Selector chose {:?} for '{}' (confidence {})",
            selection.product_id, ingredient.name, selection.confidence
        );
        Ok(selection)
    }
}

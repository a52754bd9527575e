//! # Matching Configuration Module
//!
//! This module defines configuration structures for the matching pipeline,
//! including pre-filter limits, compatibility bounds, the injectable knowledge
//! tables (piece weights, category keywords), recovery settings for the language
//! model, and the language model itself.
//!
//! Every structure deserializes with `#[serde(default)]`, so a JSON override file
//! only needs the keys it changes.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// Constants for candidate pre-filtering
pub const MAX_CANDIDATES: usize = 10;
pub const MIN_CONFIDENT_MATCHES: usize = 5;
pub const MIN_TOKEN_CHARS: usize = 3;

// Constants for compatibility checks
pub const MIN_SIZE_RATIO: f64 = 0.5;
pub const MAX_SIZE_RATIO: f64 = 3.0;

// Constants for the language model
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const MAX_SUGGESTED_CATEGORIES: usize = 3;

/// Candidate pre-filter limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefilterConfig {
    /// Maximum number of candidates passed downstream
    pub max_candidates: usize,
    /// Exact-name matches needed to short-circuit, and the padding threshold
    pub min_confident_matches: usize,
    /// Minimum token length (in characters) kept for the token pass
    pub min_token_chars: usize,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            max_candidates: MAX_CANDIDATES,
            min_confident_matches: MIN_CONFIDENT_MATCHES,
            min_token_chars: MIN_TOKEN_CHARS,
        }
    }
}

/// Package-size compatibility bounds, inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityConfig {
    /// Smallest accepted product/ingredient ratio
    pub min_ratio: f64,
    /// Largest accepted product/ingredient ratio
    pub max_ratio: f64,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            min_ratio: MIN_SIZE_RATIO,
            max_ratio: MAX_SIZE_RATIO,
        }
    }
}

/// Keyword rule short-circuiting category suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Lowercase fragment looked for in the ingredient name
    pub keyword: String,
    /// Preferred catalog categories, most relevant first
    pub categories: Vec<String>,
}

impl CategoryRule {
    fn new(keyword: &str, categories: &[&str]) -> Self {
        Self {
            keyword: keyword.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Static knowledge tables, extendable without code changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBase {
    /// Average weight in grams of one piece, keyed by lowercase ingredient name
    pub piece_weights: HashMap<String, f64>,
    /// Ingredient keyword -> preferred categories
    pub category_keywords: Vec<CategoryRule>,
}

impl KnowledgeBase {
    /// Average weight of one piece of the named ingredient, in grams
    pub fn piece_weight(&self, ingredient_name: &str) -> Option<f64> {
        self.piece_weights
            .get(&ingredient_name.trim().to_lowercase())
            .copied()
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        let piece_weights = [
            ("oignon", 150.0),
            ("pomme", 200.0),
            ("ail", 30.0),
            ("citron", 100.0),
            ("orange", 150.0),
            ("banane", 120.0),
            ("poireau", 200.0),
            ("carotte", 100.0),
            ("courgette", 200.0),
        ]
        .into_iter()
        .map(|(name, grams)| (name.to_string(), grams))
        .collect();

        let baking = ["Epicerie sucrée", "Pâtisserie", "Aides à la pâtisserie"];
        let dairy = ["Crèmerie", "Produits laitiers", "Beurre, oeufs et crèmes"];
        let produce = ["Fruits et légumes", "Fruits", "Légumes"];
        let savory = ["Epicerie salée", "Condiments et sauces", "Huiles et vinaigres"];
        let deli = ["Charcuterie", "Boucherie", "Traiteur"];

        let category_keywords = vec![
            CategoryRule::new("farine", &baking),
            CategoryRule::new("sucre", &baking),
            CategoryRule::new("levure", &baking),
            CategoryRule::new("chocolat", &baking),
            CategoryRule::new("lait", &dairy),
            CategoryRule::new("beurre", &dairy),
            CategoryRule::new("crème", &dairy),
            CategoryRule::new("oeuf", &dairy),
            CategoryRule::new("œuf", &dairy),
            CategoryRule::new("fromage", &dairy),
            CategoryRule::new("yaourt", &dairy),
            CategoryRule::new("lardon", &deli),
            CategoryRule::new("jambon", &deli),
            CategoryRule::new("pomme", &produce),
            CategoryRule::new("oignon", &produce),
            CategoryRule::new("citron", &produce),
            CategoryRule::new("carotte", &produce),
            CategoryRule::new("courgette", &produce),
            CategoryRule::new("poireau", &produce),
            CategoryRule::new("huile", &savory),
            CategoryRule::new("vinaigre", &savory),
            CategoryRule::new("sel", &savory),
            CategoryRule::new("poivre", &savory),
        ];

        Self {
            piece_weights,
            category_keywords,
        }
    }
}

/// Recovery configuration for language model calls and batch scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts for transient model failures
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Deadline for one ingredient's product selection, in seconds
    pub selection_timeout_secs: u64,
    /// Optional deadline for a whole batch, in seconds
    pub batch_timeout_secs: Option<u64>,
    /// Maximum number of selector calls in flight at once
    pub max_concurrent_selections: usize,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,   // 0.5 second
            max_retry_delay_ms: 8000,   // 8 seconds
            selection_timeout_secs: 30, // 30 seconds
            batch_timeout_secs: None,
            max_concurrent_selections: 4,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,
    /// Messages endpoint
    pub api_url: String,
    /// Response token budget
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Deadline for one HTTP request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            request_timeout_secs: 60, // 1 minute
        }
    }
}

/// Configuration structure for the whole matching system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Candidate pre-filter limits
    pub prefilter: PrefilterConfig,
    /// Package-size compatibility bounds
    pub compatibility: CompatibilityConfig,
    /// Piece weights and category keywords
    pub knowledge: KnowledgeBase,
    /// Retry, timeout and concurrency settings
    pub recovery: RecoveryConfig,
    /// Language model settings
    pub llm: LlmConfig,
}

impl MatchingConfig {
    /// Load a JSON override file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read matching config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid matching config {}", path.display()))?;
        info!("Loaded matching configuration from {}", path.display());
        Ok(config)
    }
}

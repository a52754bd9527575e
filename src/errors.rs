//! # Error Types Module
//!
//! This module defines the error types used throughout the matching system.
//! Per-ingredient failures ([`MatchError`]) are isolated by the orchestrator and
//! turned into error outcomes; request-level failures ([`AnalysisError`]) abort
//! a whole recipe analysis and carry a stable error code.
//!
//! Pricing fallbacks are not errors: they are reported through
//! [`crate::pricing::PriceBasis`].

use crate::llm::LlmError;

/// Errors raised inside a single ingredient's matching pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Malformed ingredient or product shape, rejected before pipeline entry
    InputValidation(String),
    /// A parser, categorizer or selector returned unusable output
    ExternalCollaborator(String),
    /// Pre-filtering produced no candidates at all
    NoCandidates(String),
    /// The per-ingredient selection deadline elapsed
    Timeout(String),
    /// The batch was cancelled before this ingredient finished
    Cancelled(String),
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::InputValidation(msg) => write!(f, "Invalid input: {msg}"),
            MatchError::ExternalCollaborator(msg) => write!(f, "Collaborator error: {msg}"),
            MatchError::NoCandidates(msg) => write!(f, "No candidates: {msg}"),
            MatchError::Timeout(msg) => write!(f, "Timeout: {msg}"),
            MatchError::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
        }
    }
}

impl std::error::Error for MatchError {}

impl From<LlmError> for MatchError {
    fn from(err: LlmError) -> Self {
        MatchError::ExternalCollaborator(err.to_string())
    }
}

impl From<serde_json::Error> for MatchError {
    fn from(err: serde_json::Error) -> Self {
        MatchError::ExternalCollaborator(format!("malformed JSON: {err}"))
    }
}

/// Errors that abort a whole recipe analysis
#[derive(Debug)]
pub enum AnalysisError {
    /// The product catalog could not be loaded
    CatalogLoad(String),
    /// The recipe text could not be turned into an ingredient list
    RecipeParse(String),
    /// The catalog exposes no categories to match against
    EmptyCategories,
}

impl AnalysisError {
    /// Stable machine-readable error code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::CatalogLoad(_) => "CATALOG_LOAD_FAILED",
            AnalysisError::RecipeParse(_) => "RECIPE_PARSE_FAILED",
            AnalysisError::EmptyCategories => "CATEGORY_LIST_EMPTY",
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::CatalogLoad(msg) => write!(f, "Catalog load error: {msg}"),
            AnalysisError::RecipeParse(msg) => write!(f, "Recipe parse error: {msg}"),
            AnalysisError::EmptyCategories => write!(f, "Catalog has no product categories"),
        }
    }
}

impl std::error::Error for AnalysisError {}

//! # Recipe Cost
//!
//! Turns a free-text recipe into a priced shopping list. A language model
//! extracts structured ingredients and suggests catalog categories; the
//! matching pipeline then narrows the catalog to a few candidates per
//! ingredient, checks package sizes against the required quantities, lets the
//! model pick a product, and charges only the fraction of the price the recipe
//! actually uses.
//!
//! ## Modules
//!
//! - [`units`], [`product_size`], [`size_patterns`]: quantities and package sizes
//! - [`prefilter`], [`compatibility`], [`pricing`]: the pure matching steps
//! - [`orchestrator`]: concurrent per-ingredient pipelines
//! - [`collaborators`], [`llm`], [`circuit_breaker`]: model-backed judgement calls
//! - [`analysis`], [`shopping_list`], [`localization`]: end-to-end flow and export
//! - [`catalog`], [`model`], [`matching_config`], [`errors`]: data and configuration

pub mod analysis;
pub mod catalog;
pub mod circuit_breaker;
pub mod collaborators;
pub mod compatibility;
pub mod errors;
pub mod llm;
pub mod localization;
pub mod matching_config;
pub mod model;
pub mod orchestrator;
pub mod prefilter;
pub mod pricing;
pub mod product_size;
pub mod shopping_list;
pub mod size_patterns;
pub mod units;

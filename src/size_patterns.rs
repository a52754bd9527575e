//! # Size Patterns Module
//!
//! This module contains regex patterns and constants used to read product size descriptors.

use lazy_static::lazy_static;
use regex::Regex;

// Count packaging such as "6 par pack" or "12 PAR PACK"
pub const PACK_PATTERN: &str = r"(?i)(\d+)\s*par\s*pack";

// First "<number><unit>" occurrence; accepts "." or "," as decimal separator ("1,5L").
// The unit must end a word, so "10 galettes" is not ten grams.
pub const SIZE_PATTERN: &str = r"(?i)(\d+(?:[.,]\d+)?)\s*(kilogrammes?|kg|milligrammes?|mg|grammes?|gr|g|millilitres?|ml|centilitres?|cl|litres?|l|pièces?|pieces?)\b";

// Lazy static regexes to avoid recompilation
lazy_static! {
    pub static ref PACK_REGEX: Regex =
        Regex::new(PACK_PATTERN).expect("Pack size pattern should be valid");
    pub static ref SIZE_REGEX: Regex =
        Regex::new(SIZE_PATTERN).expect("Product size pattern should be valid");
}

//! # Product Catalog Module
//!
//! Loads the product catalog once from a flat source into an in-memory,
//! read-only [`Catalog`]. Files ending in `.csv` are read as a spreadsheet
//! export with a header row; anything else is a JSON array of rows or one
//! JSON object per line.
//!
//! Rows exported from spreadsheets are loosely typed, so numeric fields accept
//! numbers, numeric strings ("1,99") or empty strings, and `available` accepts
//! booleans or "True"/"False". CSV cells go through the same coercions, with
//! empty cells read as missing. Rows without a `productId` or `name` are skipped.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// A product sold by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product key
    #[serde(rename = "productId", deserialize_with = "string_like")]
    pub product_id: String,

    /// Display name (e.g. "Pommes Golden")
    #[serde(deserialize_with = "string_like")]
    pub name: String,

    /// Brand, when known
    #[serde(default, deserialize_with = "optional_string")]
    pub brand: Option<String>,

    /// Top-level catalog category
    #[serde(default, deserialize_with = "string_like")]
    pub main_category: String,

    /// Shelf price in euros
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_eur: Option<f64>,

    /// Price per kilogram in euros
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_per_kg_eur: Option<f64>,

    /// Free-form size descriptor ("500g", "6 par pack", "1.5L")
    #[serde(default, deserialize_with = "optional_string")]
    pub size_value: Option<String>,

    /// Product image URL
    #[serde(default, deserialize_with = "optional_string")]
    pub image_src: Option<String>,

    /// Whether the product can currently be bought
    #[serde(default = "default_available", deserialize_with = "lenient_bool")]
    pub available: bool,
}

impl Product {
    /// Create an available product with only the fields matching needs
    pub fn new(product_id: &str, name: &str, main_category: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            name: name.to_string(),
            brand: None,
            main_category: main_category.to_string(),
            price_eur: None,
            price_per_kg_eur: None,
            size_value: None,
            image_src: None,
            available: true,
        }
    }

    /// Set the shelf price
    pub fn with_price(mut self, price_eur: f64) -> Self {
        self.price_eur = Some(price_eur);
        self
    }

    /// Set the size descriptor
    pub fn with_size(mut self, size_value: &str) -> Self {
        self.size_value = Some(size_value.to_string());
        self
    }

    /// Set the brand
    pub fn with_brand(mut self, brand: &str) -> Self {
        self.brand = Some(brand.to_string());
        self
    }

    /// Mark the product as unavailable
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

fn default_available() -> bool {
    true
}

/// Coerce a loosely typed cell into a number
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let cleaned = text.trim().trim_end_matches('€').trim().replace(',', ".");
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::String(text) => !matches!(text.trim().to_lowercase().as_str(), "false" | "0" | "no"),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        _ => true,
    })
}

fn optional_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn string_like<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_string(deserializer)?.unwrap_or_default())
}

/// Read-only product collection shared by all matching pipelines
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    categories: Vec<String>,
}

impl Catalog {
    /// Build a catalog from already-typed products
    ///
    /// Products with an empty id or name are dropped, as are repeated ids
    /// (the first occurrence wins).
    pub fn new(products: Vec<Product>) -> Self {
        let mut seen_ids = HashSet::new();
        let mut seen_categories = HashSet::new();
        let mut categories = Vec::new();
        let mut kept = Vec::with_capacity(products.len());

        for product in products {
            if product.product_id.trim().is_empty() || product.name.trim().is_empty() {
                warn!("Skipping catalog row without productId or name: {:?}", product);
                continue;
            }
            if !seen_ids.insert(product.product_id.clone()) {
                warn!("Skipping duplicate productId '{}'", product.product_id);
                continue;
            }
            if !product.main_category.is_empty()
                && seen_categories.insert(product.main_category.clone())
            {
                categories.push(product.main_category.clone());
            }
            kept.push(product);
        }

        debug!(
            "Catalog built with {} products in {} categories",
            kept.len(),
            categories.len()
        );
        Self {
            products: kept,
            categories,
        }
    }

    /// Load a catalog file (CSV, JSON array or JSON Lines)
    ///
    /// The format is chosen from the extension: `.csv` is read as CSV,
    /// everything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or its structure is
    /// invalid. Individual malformed rows are skipped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let parsed = if is_csv {
            Self::from_csv_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        let catalog =
            parsed.with_context(|| format!("Failed to parse catalog file {}", path.display()))?;
        info!(
            "Loaded {} products from {}",
            catalog.products.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse catalog rows from a JSON array or JSON Lines text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let trimmed = content.trim_start();
        let rows: Vec<Value> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed).context("Catalog is not a valid JSON array")?
        } else {
            trimmed
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| {
                    serde_json::from_str(line)
                        .with_context(|| format!("Invalid JSON on catalog line {}", index + 1))
                })
                .collect::<Result<Vec<Value>>>()?
        };
        Ok(Self::from_rows(rows))
    }

    /// Parse catalog rows from CSV text with a header row
    ///
    /// Every cell is read as text and coerced like a JSON string cell.
    /// Records the CSV reader rejects are skipped with a warning.
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(content.as_bytes());
        let headers = reader.headers().context("Catalog CSV has no header row")?;
        if headers.is_empty() {
            anyhow::bail!("Catalog CSV has an empty header row");
        }

        let mut rows = Vec::new();
        for (index, record) in reader.deserialize::<HashMap<String, String>>().enumerate() {
            match record {
                Ok(cells) => rows.push(Value::Object(
                    cells
                        .into_iter()
                        .map(|(column, cell)| (column, Value::String(cell)))
                        .collect(),
                )),
                // Header is line 1
                Err(e) => warn!("Skipping unreadable catalog CSV line {}: {}", index + 2, e),
            }
        }
        Ok(Self::from_rows(rows))
    }

    fn from_rows(rows: Vec<Value>) -> Self {
        let total = rows.len();
        let products: Vec<Product> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value::<Product>(row) {
                Ok(product) => Some(product),
                Err(e) => {
                    warn!("Skipping malformed catalog row {}: {}", index, e);
                    None
                }
            })
            .collect();

        if products.len() < total {
            warn!(
                "{} of {} catalog rows could not be read",
                total - products.len(),
                total
            );
        }
        Self::new(products)
    }

    /// All products, in source order
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Distinct categories, in order of first appearance
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Products of one category, in source order
    pub fn in_category<'a, 'b>(&'a self, category: &'b str) -> impl Iterator<Item = &'a Product> + 'b
    where
        'a: 'b,
    {
        self.products
            .iter()
            .filter(move |product| product.main_category == category)
    }

    /// Look a product up by id
    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products
            .iter()
            .find(|product| product.product_id == product_id)
    }

    /// Number of products
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog holds no products
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

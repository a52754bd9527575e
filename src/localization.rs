//! # Localization Module
//!
//! Fluent-based message catalog for user-facing text. French and English
//! bundles are compiled into the binary from `locales/<lang>/main.ftl`; any
//! other language falls back to French, the catalog's own language.

use anyhow::{anyhow, Result};
use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

const FRENCH_FTL: &str = include_str!("../locales/fr/main.ftl");
const ENGLISH_FTL: &str = include_str!("../locales/en/main.ftl");

/// Languages with a bundled message catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    French,
    English,
}

impl Language {
    /// Resolve a language code such as "fr", "en-GB" or "FR_fr"; unknown codes give French
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .trim()
            .split(|c: char| c == '-' || c == '_')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match primary.as_str() {
            "en" => Language::English,
            _ => Language::French,
        }
    }

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::French => "fr",
            Language::English => "en",
        }
    }

    /// `chrono` format string for dates in this language
    pub fn date_format(&self) -> &'static str {
        match self {
            Language::French => "%d/%m/%Y",
            Language::English => "%Y-%m-%d",
        }
    }

    /// Format a number with the local decimal separator
    pub fn format_decimal(&self, value: f64, decimals: usize) -> String {
        let formatted = format!("{:.*}", decimals, value);
        match self {
            Language::French => formatted.replace('.', ","),
            Language::English => formatted,
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Language::French => FRENCH_FTL,
            Language::English => ENGLISH_FTL,
        }
    }
}

/// Localization manager holding one Fluent bundle per supported language
pub struct LocalizationManager {
    bundles: HashMap<Language, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every bundled language loaded
    ///
    /// # Errors
    ///
    /// Fails when a bundled `.ftl` file does not parse, which is a build defect.
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for language in [Language::French, Language::English] {
            bundles.insert(language, Self::create_bundle(language)?);
        }
        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific language
    fn create_bundle(language: Language) -> Result<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = language.code().parse()?;
        let mut bundle = FluentBundle::new(vec![locale]);
        // Exported lists are plain text; no bidi isolation marks around arguments
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(language.source().to_string())
            .map_err(|(_, errors)| anyhow!("Invalid {} messages: {:?}", language.code(), errors))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate {} messages: {:?}", language.code(), errors))?;
        Ok(bundle)
    }

    /// Get a localized message in a specific language
    ///
    /// Missing keys render as `Missing translation: <key>` rather than failing,
    /// so a gap in one catalog never breaks an export.
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: Language,
        args: Option<&FluentArgs>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(&language)
            .or_else(|| self.bundles.get(&Language::French))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None => return format!("Missing translation: {}", key),
        };

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            log::warn!("Formatting '{}' in {}: {:?}", key, language.code(), errors);
        }
        value.into_owned()
    }

    /// Get a localized message with named arguments
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fluent_bundle::FluentValue;
    /// use recipe_cost::localization::{Language, LocalizationManager};
    ///
    /// let manager = LocalizationManager::new().unwrap();
    /// let line = manager.get_message_with_args(
    ///     "shopping-list-servings",
    ///     Language::French,
    ///     &[("count", FluentValue::from(1))],
    /// );
    /// assert_eq!(line, "Pour 1 personne");
    /// ```
    pub fn get_message_with_args(
        &self,
        key: &str,
        language: Language,
        args: &[(&str, FluentValue<'_>)],
    ) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, value.clone());
        }
        self.get_message_in_language(key, language, Some(&fluent_args))
    }

    /// Get a localized message without arguments
    pub fn get_message(&self, key: &str, language: Language) -> String {
        self.get_message_in_language(key, language, None)
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recipe_cost::analysis::RecipeAnalyzer;
use recipe_cost::catalog::Catalog;
use recipe_cost::errors::AnalysisError;
use recipe_cost::llm::AnthropicClient;
use recipe_cost::localization::{Language, LocalizationManager};
use recipe_cost::matching_config::MatchingConfig;

/// Price a recipe against a product catalog
#[derive(Debug, Parser)]
#[command(name = "recipe-cost")]
#[command(about = "Turn a recipe into a priced shopping list", long_about = None)]
struct Cli {
    /// Print the full analysis report as JSON instead of the shopping list
    #[arg(long)]
    json: bool,

    /// Recipe text file, or "-" to read standard input
    input: String,
}

fn read_recipe(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read recipe from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read recipe {input}"))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so stdout only carries the shopping list
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config() -> Result<MatchingConfig> {
    let mut config = match env::var("MATCHING_CONFIG") {
        Ok(path) if !path.trim().is_empty() => MatchingConfig::load(Path::new(&path))?,
        _ => MatchingConfig::default(),
    };
    if let Ok(model) = env::var("LLM_MODEL") {
        if !model.trim().is_empty() {
            config.llm.model = model.trim().to_string();
        }
    }
    Ok(config)
}

fn load_catalog() -> Result<Catalog, AnalysisError> {
    let path = env::var("CATALOG_PATH")
        .map_err(|_| AnalysisError::CatalogLoad("CATALOG_PATH must be set".to_string()))?;
    Catalog::load(Path::new(&path)).map_err(|e| AnalysisError::CatalogLoad(format!("{e:#}")))
}

async fn run(cli: Cli) -> Result<()> {
    let recipe = read_recipe(&cli.input)?;

    let config = load_config()?;
    let catalog = Arc::new(load_catalog()?);
    info!(
        "Catalog loaded: {} products in {} categories",
        catalog.len(),
        catalog.categories().len()
    );

    // Get API key from environment
    let api_key = env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY must be set")?;
    let model = AnthropicClient::new(&api_key, config.llm.clone(), config.recovery.clone())?;
    let analyzer = RecipeAnalyzer::from_model(Arc::new(model), &config);

    let report = analyzer.analyze(&recipe, catalog).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let language = Language::from_code(&env::var("RECIPE_LANGUAGE").unwrap_or_default());
        let localization = LocalizationManager::new()?;
        println!("{}", report.export(&localization, language));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting recipe-cost");

    if let Err(e) = run(cli).await {
        let code = e
            .downcast_ref::<AnalysisError>()
            .map(AnalysisError::code)
            .unwrap_or("FAILED");
        eprintln!("error [{code}]: {e:#}");
        std::process::exit(1);
    }
}

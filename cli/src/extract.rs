use anyhow::{Context, Result};
use souschef_core::{clarification_prompt, interpret, parse_recipe_url, Config, CommandIntent};
use std::fs;
use std::path::Path;

/// Extract a recipe from an HTML file.
/// Outputs the extraction report as JSON, or an error object on failure.
pub fn extract_file(file: &Path) -> Result<()> {
    let html = fs::read_to_string(file)
        .with_context(|| format!("Failed to read HTML file: {}", file.display()))?;

    match souschef_core::extract_recipe_with_report(&html) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            let error_json = serde_json::json!({ "error": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&error_json)?);
            // Non-zero exit code
            Err(anyhow::anyhow!("Failed to extract recipe: {}", e))
        }
    }
}

/// Fetch `url` with the configured client and host policy.
pub async fn parse_url(url: &str) -> Result<()> {
    let config = Config::from_env()?;
    let client = config.fetch_client()?;

    let recipe = parse_recipe_url(&client, url, &config.allowed_hosts)
        .await
        .with_context(|| format!("Failed to parse {}", url))?;
    println!("{}", serde_json::to_string_pretty(&recipe)?);
    Ok(())
}

pub fn interpret_text(text: &str) -> Result<()> {
    match interpret(text) {
        None => println!("(nothing heard)"),
        Some(CommandIntent::Unrecognized(heard)) => {
            println!("{}", clarification_prompt(&heard));
        }
        Some(intent) => println!("{}", serde_json::to_string_pretty(&intent)?),
    }
    Ok(())
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use souschef_core::{
    extract_recipe, parse_recipe_url, spawn_narrator, Config, FileStore, SessionActor,
    SpeechSink, SystemClock,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub enum RecipeSource {
    Url(String),
    File(PathBuf),
}

/// Speaks by printing to stdout.
struct ConsoleSpeaker;

#[async_trait]
impl SpeechSink for ConsoleSpeaker {
    async fn speak(&self, text: &str) {
        println!("> {}", text);
    }
}

async fn load(source: &RecipeSource, config: &Config) -> Result<souschef_core::Recipe> {
    match source {
        RecipeSource::Url(url) => {
            let client = config.fetch_client()?;
            parse_recipe_url(&client, url, &config.allowed_hosts)
                .await
                .with_context(|| format!("Failed to parse {}", url))
        }
        RecipeSource::File(path) => {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read HTML file: {}", path.display()))?;
            Ok(extract_recipe(&html)?)
        }
    }
}

/// Run a session on stdin transcripts until EOF.
pub async fn cook(source: RecipeSource, session_path: &Path, resume: bool) -> Result<()> {
    let config = Config::from_env()?;
    let store = Arc::new(FileStore::new(session_path));

    let (handle, actor_task) =
        SessionActor::spawn(Some(store), Arc::new(SystemClock), config.actor_config());
    let narrator = spawn_narrator(handle.subscribe(), Arc::new(ConsoleSpeaker));

    let session = handle.snapshot().await?;
    if resume && session.recipe.is_some() {
        let step = session.current_step()?;
        println!(
            "> Resuming at step {}: {}",
            session.current_step_index + 1,
            step
        );
    } else {
        let recipe = load(&source, &config).await?;
        tracing::info!(title = %recipe.title, steps = recipe.total_steps(), "recipe loaded");
        handle.load_recipe(recipe).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Err(e) = handle.transcript(line).await {
            eprintln!("{}", e);
        }
    }

    handle.shutdown().await;
    drop(handle);
    actor_task.await.context("Session task panicked")?;
    // Let the narrator drain what is left before exiting
    narrator.await.context("Narrator task panicked")?;
    Ok(())
}

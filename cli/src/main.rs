mod cook;
mod extract;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "souschef")]
#[command(about = "Souschef CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a recipe from a saved HTML page and print which strategies matched
    Extract {
        /// Path to the HTML file
        file: PathBuf,
    },
    /// Fetch a recipe URL and print the extracted recipe
    Parse {
        /// Recipe page URL
        url: String,
    },
    /// Show how a spoken phrase would be interpreted
    Interpret {
        /// The transcript, e.g. "set a timer for 5 minutes"
        text: Vec<String>,
    },
    /// Cook a recipe hands-free: one transcript per line on stdin
    Cook {
        /// Recipe page URL
        #[arg(required_unless_present = "html")]
        url: Option<String>,
        /// Read the recipe from a saved HTML file instead of fetching it
        #[arg(long, conflicts_with = "url")]
        html: Option<PathBuf>,
        /// Where the session is saved between runs
        #[arg(long, default_value = "souschef-session.json")]
        session: PathBuf,
        /// Continue the saved session instead of loading the recipe afresh
        #[arg(long)]
        resume: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { file } => {
            extract::extract_file(&file)?;
        }
        Commands::Parse { url } => {
            extract::parse_url(&url).await?;
        }
        Commands::Interpret { text } => {
            extract::interpret_text(&text.join(" "))?;
        }
        Commands::Cook {
            url,
            html,
            session,
            resume,
        } => {
            let source = match (url, html) {
                (_, Some(path)) => cook::RecipeSource::File(path),
                (Some(url), None) => cook::RecipeSource::Url(url),
                (None, None) => anyhow::bail!("Either a URL or --html is required"),
            };
            cook::cook(source, &session, resume).await?;
        }
    }

    Ok(())
}

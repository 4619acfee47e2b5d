use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use infralens_core::bootstrap::{App, resolve_config_path};
use infralens_core::config::Config;

#[derive(Debug, Parser)]
#[command(name = "infralens", version, about = "Ask questions about GitHub repositories")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User whose repositories and credentials are used
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clone, chunk and index a repository
    Ingest { url: String },
    /// Answer a question from an ingested repository
    Ask {
        question: String,
        /// Repository name; defaults to the most recently ingested one
        #[arg(long)]
        repo: Option<String>,
    },
    /// Delete a repository's index and record
    Remove { repo: String },
    /// List ingested repositories
    Repos,
    /// Manage the GitHub access token used for private repositories
    Github {
        #[command(subcommand)]
        action: GithubAction,
    },
}

#[derive(Debug, Subcommand)]
enum GithubAction {
    Connect { token: String },
    Status,
    Disconnect,
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate()?;
    tracing::debug!(path = %config_path.display(), "config loaded");

    let app = App::build(&config).await?;
    run(&app, &cli.user, cli.command).await
}

async fn run(app: &App, user: &str, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ingest { url } => {
            let report = app.pipeline().ingest(user, &url).await?;
            println!(
                "Ingested {} ({} files, {} chunks) into {}",
                report.repository_name,
                report.files_processed,
                report.chunks_stored,
                report.collection_name
            );
            if !report.persisted {
                println!("warning: repository record was not saved; it will not be listed");
            }
        }
        Command::Ask { question, repo } => {
            let answer = app
                .chat()
                .answer(user, &question, repo.as_deref())
                .await
                .context("failed to answer question")?;
            println!("{answer}");
        }
        Command::Remove { repo } => {
            let removed = app.pipeline().remove(user, &repo).await?;
            println!("Removed {} ({})", removed.name, removed.collection_name);
        }
        Command::Repos => {
            let repos = app.repositories(user).await?;
            if repos.is_empty() {
                println!("No repositories ingested.");
            }
            for r in repos {
                println!(
                    "{}\t{}\t{} files\t{} chunks\t{}{}",
                    r.name,
                    r.source_url,
                    r.files_processed,
                    r.chunks_stored,
                    r.ingested_at,
                    if r.private { "\tprivate" } else { "" }
                );
            }
        }
        Command::Github { action } => match action {
            GithubAction::Connect { token } => {
                let status = app.connect_github(user, &token).await?;
                println!(
                    "Connected as {}",
                    status.display_name.as_deref().unwrap_or("unknown user")
                );
            }
            GithubAction::Status => {
                let status = app.github_status(user).await?;
                if status.connected {
                    println!(
                        "Connected as {} since {}",
                        status.display_name.as_deref().unwrap_or("unknown user"),
                        status.connected_at.as_deref().unwrap_or("unknown")
                    );
                } else {
                    println!("Not connected");
                }
            }
            GithubAction::Disconnect => {
                if app.disconnect_github(user).await? {
                    println!("Disconnected");
                } else {
                    println!("Nothing to disconnect");
                }
            }
        },
    }
    Ok(())
}

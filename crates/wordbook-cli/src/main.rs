//! Wordbook command-line driver.
//!
//! Usage:
//!   # Two clients on one in-memory backend; the second is told about the
//!   # first one's new word
//!   cargo run -p wordbook-cli -- demo
//!   cargo run -p wordbook-cli -- demo --word "Efímero" --meaning "Que dura poco"
//!
//!   # Show the effective client configuration
//!   cargo run -p wordbook-cli -- config
//!   cargo run -p wordbook-cli -- config --path ./wordbook.ron

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use wordbook_client::{
    ChannelSink, ClientConfig, DictionarySession, MemorySessionStorage, TracingSink,
};
use wordbook_store::{AuthDirectory, MemoryAuth, MemoryStore};
use wordbook_types::Entry;

/// Shared dictionary client.
#[derive(Parser, Debug)]
#[command(name = "wordbook")]
#[command(about = "Shared dictionary client")]
struct Args {
    /// Config file (RON). Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run two sessions against one in-memory backend
    Demo {
        /// Headword the first session adds
        #[arg(long, default_value = "Efímero")]
        word: String,

        /// Meaning of the headword
        #[arg(long, default_value = "Que dura poco tiempo")]
        meaning: String,

        /// Optional usage example
        #[arg(long)]
        example: Option<String>,
    },
    /// Print the effective configuration as RON
    Config {
        /// Print this file's configuration instead
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => ClientConfig::load_or_default().context("loading config"),
    }
}

fn print_entries(label: &str, entries: &[Entry]) {
    println!("{label}:");
    for entry in entries {
        let star = if entry.is_favorite { "★" } else { " " };
        let author = entry.author_label().unwrap_or("?");
        println!("  {star} {} ({author}): {}", entry.text, entry.meaning);
    }
}

async fn demo(config: ClientConfig, word: String, meaning: String, example: Option<String>) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let directory = AuthDirectory::new();

    let writer = DictionarySession::start(
        config.clone(),
        store.clone(),
        Arc::new(MemoryAuth::with_directory(directory.clone())),
        Arc::new(MemorySessionStorage::new()),
        Arc::new(TracingSink),
    )
    .await?;
    let (sink, mut notes) = ChannelSink::new();
    let reader = DictionarySession::start(
        config.clone(),
        store,
        Arc::new(MemoryAuth::with_directory(directory)),
        Arc::new(MemorySessionStorage::new()),
        sink,
    )
    .await?;

    writer.sign_up("ana@example.com", "ana-secret", Some("Ana")).await?;
    reader.sign_up("beto@example.com", "beto-secret", Some("Beto")).await?;

    // Anything observed inside the initial window is treated as replay.
    tokio::time::sleep(config.initial_load_window() + Duration::from_millis(100)).await;

    let id = writer
        .create(&word, &meaning, example.as_deref())
        .await
        .context("adding word")?;
    tracing::info!(entry_id = %id, "word added");

    match tokio::time::timeout(Duration::from_secs(2), notes.recv()).await {
        Ok(Some(note)) => println!("Beto was notified: New word added: {}", note.headword),
        Ok(None) => println!("notification channel closed"),
        Err(_) => println!("no notification within 2s"),
    }

    let mut snapshots = reader.snapshots();
    snapshots
        .wait_for(|entries| entries.iter().any(|e| e.id == id))
        .await
        .context("waiting for the new entry")?;
    print_entries("Beto sees", &reader.visible_entries());

    writer.shutdown();
    reader.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Demo {
            word,
            meaning,
            example,
        } => {
            let config = load_config(args.config.as_ref())?;
            demo(config, word, meaning, example).await
        }
        Command::Config { path } => {
            let config = load_config(path.as_ref().or(args.config.as_ref()))?;
            match path.or(args.config).or_else(ClientConfig::default_path) {
                Some(path) => println!("// {}", path.display()),
                None => println!("// no config directory"),
            }
            println!("{}", config.to_ron_string()?);
            Ok(())
        }
    }
}

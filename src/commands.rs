use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use tokio::sync::RwLock;
use tracing::info;

use crate::agent::Agent;
use crate::config::Config;
use crate::embeddings::{EmbeddingProvider, OpenAiEmbedder};
use crate::indexer::FileIndexer;
use crate::llm::{LlmProvider, OpenAiChatClient};

/// CLI overrides for provider and model selection.
#[derive(Debug, Clone, Default)]
pub struct LlmSelection {
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Ask the agent a single question and print its answer.
#[inline]
pub async fn query(selection: LlmSelection, text: String) -> Result<()> {
    let config = Config::load()?;
    let agent = build_agent(&config, &selection).await?;

    let response = agent.query(&text).await?;
    println!("Response: {}", response);
    Ok(())
}

/// Add documents from a directory to the vector store.
#[inline]
pub async fn add_docs(directory: String) -> Result<()> {
    let config = Config::load()?;
    let mut indexer = build_indexer(&config).await?;

    let documents = indexer.load_documents(Path::new(&directory))?;
    if documents.is_empty() {
        println!("No new documents found.");
        return Ok(());
    }

    let chunks = indexer.process_documents(&documents);
    let chunk_count = chunks.len();

    indexer
        .add_documents(chunks)
        .await
        .context("Failed to add documents to the vector store")?;

    println!("Added {} document chunks to the vector store.", chunk_count);
    Ok(())
}

/// Run an interactive question/answer session. A failing turn is reported
/// and the session continues.
#[inline]
pub async fn interactive(selection: LlmSelection) -> Result<()> {
    let config = Config::load()?;
    let agent = build_agent(&config, &selection).await?;

    println!("{}", style("fsagent - Interactive Mode").bold());
    println!("Type 'exit' to quit.");

    loop {
        let input: String = Input::new().with_prompt("You").interact_text()?;
        let question = input.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match agent.query(question).await {
            Ok(response) => println!("{} {}", style("Agent:").green().bold(), response),
            Err(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
        }
    }

    Ok(())
}

/// Print the resolved configuration.
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Construct the indexer, restoring the persisted index when one exists and
/// building a fresh one from the configured directories otherwise.
async fn build_indexer(config: &Config) -> Result<FileIndexer> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
    let mut indexer = FileIndexer::new(config, embedder)?;

    if config.paths.index_dir.exists() {
        indexer.load(&config.paths.index_dir).await?;
        info!("Loaded existing vector store.");
    } else {
        initialize_vector_store(config, &mut indexer).await?;
    }

    Ok(indexer)
}

async fn initialize_vector_store(config: &Config, indexer: &mut FileIndexer) -> Result<()> {
    println!("Initializing vector store...");

    let mut documents = indexer.load_documents(&config.paths.documents_dir)?;
    documents.extend(indexer.load_documents(&config.paths.files_dir)?);

    if documents.is_empty() {
        println!("No documents found. Creating empty vector store.");
        indexer.create_vector_store(Vec::new()).await?;
        indexer.save()?;
        return Ok(());
    }

    let chunks = indexer.process_documents(&documents);
    let chunk_count = chunks.len();

    indexer.create_vector_store(chunks).await?;
    indexer.save()?;

    println!(
        "Vector store initialized with {} document chunks.",
        chunk_count
    );
    Ok(())
}

async fn build_agent(config: &Config, selection: &LlmSelection) -> Result<Agent> {
    let provider = match &selection.provider {
        Some(selector) => LlmProvider::from_str(selector)?,
        None => LlmProvider::from_str(&config.llm.provider)?,
    };

    let mut llm_config = config.llm.clone();
    if selection.model.is_some() {
        llm_config.model = selection.model.clone();
    }

    let model = OpenAiChatClient::new(provider, &llm_config)?;
    info!("Using {:?} with model {}", provider, model.model());

    let indexer = build_indexer(config).await?;

    Ok(Agent::new(
        Box::new(model),
        Arc::new(RwLock::new(indexer)),
        llm_config.max_turns,
    ))
}

//! Regulatory retrieval - command line entry point
//!
//! Indexes the given files and prints the augmented prompt for a query:
//!
//! ```text
//! regrag "minimum stair width for a clinic" ibc_ch10.txt local_amendments.txt
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regrag::batch::{BatchConfig, BatchIndexer, DocumentInput};
use regrag::context::InMemoryRuleProvider;
use regrag::embedding::{EmbeddingProvider, HashEmbeddingProvider, HttpEmbeddingProvider};
use regrag::engine::RagEngine;
use regrag::types::{BuildingRule, RagConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "regrag=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = match std::env::var("RAG_CONFIG") {
        Ok(path) => RagConfig::load(Some(Path::new(&path)))?,
        Err(_) => RagConfig::from_env(),
    };

    let mut args = std::env::args().skip(1);
    let query = args
        .next()
        .ok_or_else(|| anyhow!("usage: regrag <query> <file>..."))?;
    let files: Vec<String> = args.collect();

    info!("Starting regrag v{}", env!("CARGO_PKG_VERSION"));

    let provider: Arc<dyn EmbeddingProvider> = match std::env::var("RAG_EMBEDDING_URL") {
        Ok(url) => {
            let model = std::env::var("RAG_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".into());
            Arc::new(
                HttpEmbeddingProvider::new(&url, &model, config.embedder.request_timeout())?
                    .with_api_key(std::env::var("RAG_EMBEDDING_API_KEY").ok()),
            )
        }
        Err(_) => {
            info!("RAG_EMBEDDING_URL not set, using local hash embeddings");
            Arc::new(HashEmbeddingProvider::default())
        }
    };

    let rules = Arc::new(InMemoryRuleProvider::new());
    if let Ok(path) = std::env::var("RAG_RULES_FILE") {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading rules file {path}"))?;
        let by_document: HashMap<String, Vec<BuildingRule>> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing rules file {path}"))?;
        for (document_id, document_rules) in by_document {
            rules.set_rules(document_id, document_rules);
        }
    }

    let engine = Arc::new(RagEngine::new(config.clone(), provider, rules)?);

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let text = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("reading {file}"))?;
        documents.push(DocumentInput::new(file.clone(), text));
    }

    let indexer = BatchIndexer::new(Arc::clone(&engine), BatchConfig::default());
    let (_, result) = indexer.index_batch(documents, &config.chunking).await?;
    for error in &result.errors {
        eprintln!("skipped {}: {}", error.document_id, error.error);
    }

    let prompt = engine
        .query(
            &query,
            config.retrieval.default_max_chunks,
            config.prompt.max_context_length,
        )
        .await?;
    println!("{prompt}");

    Ok(())
}

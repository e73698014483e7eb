use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

use regrag::context::{InMemoryRuleProvider, NoRules};
use regrag::embedding::{EmbeddingProvider, HashEmbeddingProvider};
use regrag::prompt::tag_overhead;
use regrag::types::{BuildingRule, RagConfig};
use regrag::{RagEngine, RagError};

const STAIRS: &str = "Section 1011.5 Stair treads and risers\n\nStair riser heights shall be 7 inches maximum and 4 inches minimum. Stair tread depths shall be 11 inches minimum.";
const ROOFS: &str = "Section 1505.1 Roof coverings\n\nRoof coverings shall be Class A fire rated assemblies where the building exceeds two storeys.";

/// Hash embeddings, except texts containing `POISON` or any text during an outage.
struct FlakyProvider {
    inner: HashEmbeddingProvider,
    outage: AtomicBool,
}

impl FlakyProvider {
    fn new() -> Self {
        Self {
            inner: HashEmbeddingProvider::new(64),
            outage: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(anyhow!("service unavailable"));
        }
        if text.contains("POISON") {
            return Err(anyhow!("input rejected"));
        }
        self.inner.embed(text).await
    }

    fn model_name(&self) -> &str {
        "flaky"
    }

    fn provider_key(&self) -> &str {
        "flaky"
    }
}

fn fast_retry_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embedder.max_attempts = 2;
    config.embedder.base_backoff_ms = 1;
    config.embedder.max_backoff_ms = 2;
    config
}

fn hash_engine() -> RagEngine {
    RagEngine::new(
        RagConfig::default(),
        Arc::new(HashEmbeddingProvider::default()),
        Arc::new(NoRules),
    )
    .unwrap()
}

#[tokio::test]
async fn query_prefers_matching_document() {
    let engine = hash_engine();
    assert_ok!(engine.index_document("stairs", STAIRS, 1000, 200).await);
    assert_ok!(engine.index_document("roofs", ROOFS, 1000, 200).await);

    let context = assert_ok!(engine.get_context("stair riser tread depths", 2).await);
    assert_eq!(context.relevant_chunks.len(), 2);
    assert_eq!(context.relevant_chunks[0].document_id, "stairs");
    assert!(context.relevant_chunks[0].similarity_score >= context.relevant_chunks[1].similarity_score);
    assert!(context.confidence_score > 0.0 && context.confidence_score <= 1.0);

    let prompt = assert_ok!(engine.query("stair riser tread depths", 1, 2_000).await);
    assert!(prompt.starts_with("stair riser tread depths"));
    assert!(prompt.contains("Stair riser heights shall be 7 inches maximum"));
    assert!(!prompt.contains("Roof coverings shall be"));
}

#[tokio::test]
async fn reindex_replaces_previous_chunks() {
    let engine = hash_engine();
    let first = assert_ok!(engine.index_document("code", "Alpha clause about guards.", 100, 10).await);
    let second = assert_ok!(engine.index_document("code", "Gamma clause about handrails.", 100, 10).await);
    assert_eq!(first.version, Some(1));
    assert_eq!(second.version, Some(2));

    let context = assert_ok!(engine.get_context("alpha guards", 10).await);
    assert_eq!(context.relevant_chunks.len(), 1);
    assert_eq!(context.relevant_chunks[0].text, "Gamma clause about handrails.");
}

#[tokio::test]
async fn failed_chunks_are_reported_and_left_out() {
    let engine = RagEngine::new(fast_retry_config(), Arc::new(FlakyProvider::new()), Arc::new(NoRules)).unwrap();
    let text = format!("{}POISON", "Exit doors shall swing in the direction of egress travel. ".repeat(8));

    let report = assert_ok!(engine.index_document("doors", &text, 100, 10).await);
    assert!(report.chunks > 2);
    assert!(!report.failed.is_empty());
    assert!(report.embedded > 0);
    assert_eq!(report.embedded + report.failed.len(), report.chunks);

    let stored = engine.store().get("doors");
    assert_eq!(stored.len(), report.embedded);
    assert!(stored.iter().all(|v| !v.text.contains("POISON")));
    assert!(stored.iter().all(|v| !report.failed.contains(&v.chunk_index)));
}

#[tokio::test]
async fn total_failure_keeps_previous_version() {
    let provider = Arc::new(FlakyProvider::new());
    let engine = RagEngine::new(fast_retry_config(), provider.clone(), Arc::new(NoRules)).unwrap();
    assert_ok!(engine.index_document("egress", "Travel distance limits apply.", 100, 10).await);

    provider.outage.store(true, Ordering::SeqCst);
    let err = assert_err!(engine.index_document("egress", "Revised travel distance limits.", 100, 10).await);
    assert!(matches!(err, RagError::IndexingFailed { .. }));
    assert!(err.is_retryable());

    assert_eq!(engine.store().version("egress"), Some(1));
    assert_eq!(engine.store().get("egress")[0].text, "Travel distance limits apply.");

    let err = assert_err!(engine.get_context("an uncached question", 3).await);
    assert!(matches!(err, RagError::Embedding(_)));
}

#[tokio::test]
async fn rules_follow_retrieved_sections() {
    let rules = Arc::new(InMemoryRuleProvider::new());
    rules.set_rules(
        "stairs",
        vec![
            BuildingRule::new("stair_geometry", "Maximum riser height", 0.95, "1011.5").with_value(7.0, "in"),
            BuildingRule::new("guards", "Guard height", 0.9, "1015.3").with_value(42.0, "in"),
        ],
    );
    let engine = RagEngine::new(RagConfig::default(), Arc::new(HashEmbeddingProvider::default()), rules).unwrap();
    assert_ok!(engine.index_document("stairs", STAIRS, 1000, 200).await);

    let context = assert_ok!(engine.get_context("stair riser", 1).await);
    assert_eq!(context.relevant_chunks[0].section.as_deref(), Some("1011.5"));
    let texts: Vec<&str> = context.building_rules.iter().map(|r| r.rule_text.as_str()).collect();
    assert_eq!(texts, vec!["Maximum riser height"]);

    let prompt = assert_ok!(engine.query("stair riser", 1, 4_000).await);
    assert!(prompt.contains("- stair_geometry: Maximum riser height (7 in) [§1011.5]"));
}

#[tokio::test]
async fn augmented_prompt_respects_budget() {
    let engine = hash_engine();
    let corpus = "Accessible routes shall connect every accessible space. Ramps shall have a running slope not steeper than 1:12. ".repeat(40);
    assert_ok!(engine.index_document("access", &corpus, 300, 50).await);

    let query = "ramp slope for accessible routes";
    for budget in [0, 50, 400, 1_000, 10_000] {
        let prompt = assert_ok!(engine.query(query, 5, budget).await);
        assert!(prompt.starts_with(query));
        assert!(prompt.chars().count() <= query.chars().count() + budget + tag_overhead());
    }
}

#[tokio::test]
async fn unbounded_max_chunks_returns_whole_index() {
    let engine = hash_engine();
    assert_ok!(engine.index_document("stairs", STAIRS, 1000, 200).await);
    assert_ok!(engine.index_document("roofs", ROOFS, 1000, 200).await);

    let context = assert_ok!(engine.get_context("stairs", usize::MAX).await);
    assert_eq!(context.relevant_chunks.len(), 2);

    let prompt = assert_ok!(engine.query("stairs", 1 << 40, 4_000).await);
    assert!(prompt.contains("Roof coverings shall be"));
}

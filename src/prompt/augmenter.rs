//! Folds a [`RagContext`] into a model prompt under a length budget.

use tracing::debug;

use crate::types::{BuildingRule, RagContext, RetrievedChunk};

/// Placed between the original prompt and the retrieved chunks.
pub const CONTEXT_HEADER: &str = "\n\n## Relevant regulatory context\n";

/// Placed before matched building rules.
pub const RULES_HEADER: &str = "\n## Applicable building rules\n";

/// Characters the headers may add beyond `max_context_length`.
pub fn tag_overhead() -> usize {
    CONTEXT_HEADER.chars().count() + RULES_HEADER.chars().count()
}

/// Appends ranked evidence to a prompt.
///
/// Items are appended in rank order (chunks by relevance, then rules) until the
/// next one would push the appended items past `max_context_length`
/// characters; that item and everything ranked below it are dropped. The
/// original prompt is never altered.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAugmenter;

impl PromptAugmenter {
    pub fn new() -> Self {
        Self
    }

    pub fn augment(&self, original_prompt: &str, context: &RagContext, max_context_length: usize) -> String {
        if context.relevant_chunks.is_empty() {
            return original_prompt.to_string();
        }

        let mut used = 0;
        let mut chunk_block = String::new();
        let mut included_chunks = 0;
        let mut budget_hit = false;

        for chunk in &context.relevant_chunks {
            let item = format_chunk(chunk);
            let len = item.chars().count();
            if used + len > max_context_length {
                budget_hit = true;
                break;
            }
            used += len;
            chunk_block.push_str(&item);
            included_chunks += 1;
        }

        if included_chunks == 0 {
            debug!(max_context_length, "No context item fits the budget");
            return original_prompt.to_string();
        }

        let mut rule_block = String::new();
        let mut included_rules = 0;
        if !budget_hit {
            for rule in &context.building_rules {
                let item = format_rule(rule);
                let len = item.chars().count();
                if used + len > max_context_length {
                    break;
                }
                used += len;
                rule_block.push_str(&item);
                included_rules += 1;
            }
        }

        debug!(
            chunks = included_chunks,
            rules = included_rules,
            context_chars = used,
            "Augmented prompt"
        );

        let mut prompt = String::with_capacity(original_prompt.len() + CONTEXT_HEADER.len() + used * 2);
        prompt.push_str(original_prompt);
        prompt.push_str(CONTEXT_HEADER);
        prompt.push_str(&chunk_block);
        if included_rules > 0 {
            prompt.push_str(RULES_HEADER);
            prompt.push_str(&rule_block);
        }
        prompt
    }
}

fn format_chunk(chunk: &RetrievedChunk) -> String {
    format!(
        "[{} | relevance {:.2}]\n{}\n",
        chunk.provenance(),
        chunk.similarity_score,
        chunk.text.trim()
    )
}

fn format_rule(rule: &BuildingRule) -> String {
    let mut line = format!("- {}: {}", rule.category, rule.rule_text);
    if let Some(value) = rule.numeric_value {
        match &rule.unit {
            Some(unit) => line.push_str(&format!(" ({value} {unit})")),
            None => line.push_str(&format!(" ({value})")),
        }
    }
    if !rule.source_section.is_empty() {
        line.push_str(&format!(" [§{}]", rule.source_section));
    }
    line.push_str(&format!(" (confidence {:.2})\n", rule.confidence));
    line
}

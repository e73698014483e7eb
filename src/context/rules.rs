//! Building-rule lookup and the section join.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::types::BuildingRule;

/// The rule-extraction collaborator, queried by document identity.
///
/// Implementations own their failure handling: a lookup that cannot be served
/// yields no rules rather than an error, since missing rules are not fatal to
/// context assembly.
#[async_trait]
pub trait RuleProvider: Send + Sync {
    /// All rules extracted from `document_id`, in any order.
    async fn rules_for_document(&self, document_id: &str) -> Vec<BuildingRule>;
}

/// Rules held in memory, keyed by document.
#[derive(Debug, Default)]
pub struct InMemoryRuleProvider {
    rules: RwLock<HashMap<String, Vec<BuildingRule>>>,
}

impl InMemoryRuleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rules recorded for a document.
    pub fn set_rules(&self, document_id: impl Into<String>, rules: Vec<BuildingRule>) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document_id.into(), rules);
    }

    pub fn clear(&self, document_id: &str) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id);
    }
}

#[async_trait]
impl RuleProvider for InMemoryRuleProvider {
    async fn rules_for_document(&self, document_id: &str) -> Vec<BuildingRule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Provider for deployments without rule extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRules;

#[async_trait]
impl RuleProvider for NoRules {
    async fn rules_for_document(&self, _document_id: &str) -> Vec<BuildingRule> {
        Vec::new()
    }
}

/// Canonical form of a section label: lowercase, without a leading
/// `section`/`sec.`/`§` marker or trailing dot.
///
/// A word marker only counts when a space, a digit or the end of the label
/// follows it, so "Sectional doors" keeps its first word.
pub fn normalize_section(section: &str) -> String {
    let lower = section.trim().to_lowercase();
    let stripped = lower
        .strip_prefix('§')
        .or_else(|| {
            ["section", "sec."].iter().find_map(|marker| {
                lower.strip_prefix(marker).filter(|rest| {
                    rest.chars()
                        .next()
                        .map_or(true, |c| c.is_whitespace() || c.is_ascii_digit())
                })
            })
        })
        .unwrap_or(lower.as_str());
    stripped.trim().trim_end_matches('.').to_string()
}

/// Whether a rule from `rule_section` applies to a chunk in `chunk_section`.
///
/// Empty rule sections apply to the whole document; otherwise the sections
/// must be equal or the rule's section must be a parent (`1004` → `1004.1`).
pub fn section_matches(rule_section: &str, chunk_section: Option<&str>) -> bool {
    let rule = normalize_section(rule_section);
    if rule.is_empty() {
        return true;
    }
    let Some(chunk) = chunk_section.map(normalize_section) else {
        return false;
    };
    chunk == rule || chunk.strip_prefix(&rule).is_some_and(|rest| rest.starts_with('.'))
}

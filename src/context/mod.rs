//! Context assembly: retrieval plus the building-rule join.

mod assembler;
mod rules;

pub use assembler::ContextAssembler;
pub use rules::{normalize_section, section_matches, InMemoryRuleProvider, NoRules, RuleProvider};

//! Structured building-code facts produced by the rule-extraction collaborator.

use serde::{Deserialize, Serialize};

/// A structured fact (category, value, unit, source) extracted from regulatory text.
///
/// Read-only from this crate's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRule {
    /// Rule category (e.g. "egress", "fire_separation", "stair_geometry")
    pub category: String,

    /// Human-readable rule statement
    pub rule_text: String,

    /// Numeric limit carried by the rule, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,

    /// Unit of `numeric_value` (e.g. "mm", "ft", "m2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Extraction confidence in [0, 1]
    pub confidence: f32,

    /// Section of the source document the rule came from
    pub source_section: String,
}

impl BuildingRule {
    /// Create a rule without a numeric value.
    pub fn new(
        category: impl Into<String>,
        rule_text: impl Into<String>,
        confidence: f32,
        source_section: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            rule_text: rule_text.into(),
            numeric_value: None,
            unit: None,
            confidence: confidence.clamp(0.0, 1.0),
            source_section: source_section.into(),
        }
    }

    /// Set the numeric limit and its unit.
    pub fn with_value(mut self, value: f64, unit: impl Into<String>) -> Self {
        self.numeric_value = Some(value);
        self.unit = Some(unit.into());
        self
    }
}

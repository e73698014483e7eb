//! Section heading detection for chunk provenance.
//!
//! Recognises markdown headings (`## Means of Egress`) and code-style section
//! labels (`Section 1004.1`, `SECTION R311`, `§ 903.2`). Code-style numbers
//! win over free heading text so that chunks can be joined with extracted
//! rules by section identity.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HEADING: Regex = Regex::new(
        r"(?m)^[ \t]*(?:#{1,6}[ \t]+(?P<md>[^\n]+?)[ \t]*$|(?:SECTION|Section|Sec\.|§)[ \t]*(?P<code>[A-Z]?\d+(?:\.\d+)*))"
    )
    .unwrap();
    static ref SECTION_NUMBER: Regex =
        Regex::new(r"(?:SECTION|Section|Sec\.|§)[ \t]*([A-Z]?\d+(?:\.\d+)*)|^([A-Z]?\d+(?:\.\d+)+)\b")
            .unwrap();
}

/// Headings found in a document, ordered by character position.
#[derive(Debug, Default)]
pub struct SectionIndex {
    headings: Vec<(usize, String)>,
}

impl SectionIndex {
    /// Scan `text` for headings. `char_offsets[i]` is the byte offset of char `i`.
    pub fn build(text: &str, char_offsets: &[usize]) -> Self {
        let headings = HEADING
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let label = match (caps.name("code"), caps.name("md")) {
                    (Some(code), _) => code.as_str().to_string(),
                    (None, Some(md)) => section_label(md.as_str()),
                    (None, None) => return None,
                };
                let position = char_offsets.partition_point(|&o| o < whole.start());
                Some((position, label))
            })
            .collect();
        Self { headings }
    }

    /// Section in effect at `start`, or else the first heading inside `[start, end)`.
    pub fn section_for(&self, start: usize, end: usize) -> Option<String> {
        let idx = self.headings.partition_point(|(pos, _)| *pos <= start);
        if idx > 0 {
            return Some(self.headings[idx - 1].1.clone());
        }
        self.headings
            .first()
            .filter(|(pos, _)| *pos < end)
            .map(|(_, label)| label.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }
}

/// Reduce a heading to its section number when it carries one.
fn section_label(heading: &str) -> String {
    let heading = heading.trim();
    SECTION_NUMBER
        .captures(heading)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| heading.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(text: &str) -> SectionIndex {
        let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        SectionIndex::build(text, &offsets)
    }

    #[test]
    fn test_code_style_labels() {
        let text = "Intro text.\nSection 1004.1 Occupant load\nBody.\n§ 1005 Egress width\nMore.";
        let sections = index(text);
        assert_eq!(sections.section_for(0, 5), None);
        assert_eq!(sections.section_for(0, 20), Some("1004.1".to_string()));
        assert_eq!(sections.section_for(30, 40), Some("1004.1".to_string()));
        assert_eq!(sections.section_for(60, 70), Some("1005".to_string()));
    }

    #[test]
    fn test_markdown_headings() {
        let text = "# Means of Egress\nDoors.\n## 1010.1.1 Door width\nWide doors.";
        let sections = index(text);
        assert_eq!(sections.section_for(0, 10), Some("Means of Egress".to_string()));
        assert_eq!(sections.section_for(50, 55), Some("1010.1.1".to_string()));
    }

    #[test]
    fn test_no_headings() {
        assert!(index("plain text without any headings").is_empty());
    }

    #[test]
    fn test_multibyte_positions_are_chars() {
        let text = "Éé ü\nSection 12 Stairs";
        let sections = index(text);
        // "Éé ü\n" is 5 chars but 8 bytes
        assert_eq!(sections.section_for(5, 10), Some("12".to_string()));
        assert_eq!(sections.section_for(0, 5), None);
    }
}

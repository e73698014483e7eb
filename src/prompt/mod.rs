//! Prompt augmentation.

mod augmenter;

pub use augmenter::{tag_overhead, PromptAugmenter, CONTEXT_HEADER, RULES_HEADER};

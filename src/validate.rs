// src/validate.rs
//! Eligibility filter for fetched items. Only complete stories are delivered.

use crate::feed::types::{Item, ItemKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAStory,
    MissingTitle,
    MissingUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Eligible,
    Skip(SkipReason),
}

pub fn validate(item: &Item) -> Validation {
    if item.kind() != ItemKind::Story {
        return Validation::Skip(SkipReason::NotAStory);
    }
    if item.title.as_deref().unwrap_or_default().is_empty() {
        return Validation::Skip(SkipReason::MissingTitle);
    }
    if item.url.as_deref().unwrap_or_default().is_empty() {
        return Validation::Skip(SkipReason::MissingUrl);
    }
    Validation::Eligible
}

pub fn is_eligible(item: &Item) -> bool {
    validate(item) == Validation::Eligible
}

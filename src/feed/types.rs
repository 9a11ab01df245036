// src/feed/types.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RelayError;

/// Upstream-assigned item identifier.
pub type ItemId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Story,
    /// Anything else upstream publishes (job, comment, poll, ...).
    Other,
}

/// One upstream item, as much of it as the relay forwards.
///
/// Every field defaults, so a deleted item (`null`) reads as an untyped
/// zero item and is filtered out by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: ItemId,
    #[serde(default, serialize_with = "absent_as_empty")]
    pub title: Option<String>,
    #[serde(default, serialize_with = "absent_as_empty")]
    pub url: Option<String>,
    #[serde(default)]
    pub by: String,
    #[serde(default)]
    pub score: u32,
    #[serde(rename = "type", default)]
    pub kind: RawKind,
}

/// The `type` tag as received; kept verbatim so clients see what upstream sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawKind(pub String);

impl RawKind {
    pub fn kind(&self) -> ItemKind {
        if self.0 == "story" {
            ItemKind::Story
        } else {
            ItemKind::Other
        }
    }
}

impl<'de> Deserialize<'de> for RawKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        // upstream sometimes sends null for deleted fields
        Ok(RawKind(Option::<String>::deserialize(d)?.unwrap_or_default()))
    }
}

fn absent_as_empty<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v.as_deref().unwrap_or_default())
}

impl Item {
    pub fn story(id: ItemId, title: &str, url: &str) -> Self {
        Self {
            id,
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            by: String::new(),
            score: 0,
            kind: RawKind("story".into()),
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.kind.kind()
    }
}

/// Read side of the upstream feed. Implementations hold no per-call state.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Ranked identifiers, best first.
    async fn fetch_top_ids(&self) -> Result<Vec<ItemId>, RelayError>;
    async fn fetch_item(&self, id: ItemId) -> Result<Item, RelayError>;
    fn name(&self) -> &'static str;
}

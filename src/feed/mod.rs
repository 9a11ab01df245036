// src/feed/mod.rs
pub mod fixture;
pub mod http;
pub mod types;

pub use fixture::FixtureFeed;
pub use http::HnFeedClient;
pub use types::{FeedSource, Item, ItemId, ItemKind};

// src/feed/fixture.rs
//! In-memory feed for tests and offline runs. Scriptable: swap the ranked
//! list between ticks, inject one-shot list failures, break single items.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::feed::types::{FeedSource, Item, ItemId};

#[derive(Default)]
pub struct FixtureFeed {
    state: Mutex<State>,
    list_calls: AtomicUsize,
    item_calls: AtomicUsize,
}

#[derive(Default)]
struct State {
    top: Vec<ItemId>,
    items: HashMap<ItemId, Item>,
    broken_items: HashSet<ItemId>,
    pending_list_failures: usize,
}

impl FixtureFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranked list plus a story body for every id in it.
    pub fn with_stories(ids: &[ItemId]) -> Self {
        let feed = Self::new();
        for &id in ids {
            feed.put_item(Item::story(id, &format!("Story {id}"), &format!("https://example.com/{id}")));
        }
        feed.set_top_ids(ids.to_vec());
        feed
    }

    pub fn set_top_ids(&self, ids: Vec<ItemId>) {
        self.state.lock().expect("fixture mutex poisoned").top = ids;
    }

    pub fn put_item(&self, item: Item) {
        let mut st = self.state.lock().expect("fixture mutex poisoned");
        st.items.insert(item.id, item);
    }

    /// Next `n` list fetches fail like an upstream timeout.
    pub fn fail_next_lists(&self, n: usize) {
        self.state.lock().expect("fixture mutex poisoned").pending_list_failures = n;
    }

    pub fn break_item(&self, id: ItemId) {
        let mut st = self.state.lock().expect("fixture mutex poisoned");
        st.broken_items.insert(id);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for FixtureFeed {
    async fn fetch_top_ids(&self) -> Result<Vec<ItemId>, RelayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut st = self.state.lock().expect("fixture mutex poisoned");
        if st.pending_list_failures > 0 {
            st.pending_list_failures -= 1;
            return Err(RelayError::fetch(None, "operation timed out"));
        }
        Ok(st.top.clone())
    }

    async fn fetch_item(&self, id: ItemId) -> Result<Item, RelayError> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        let st = self.state.lock().expect("fixture mutex poisoned");
        if st.broken_items.contains(&id) {
            return Err(RelayError::decode(Some(id), "expected value at line 1 column 1"));
        }
        st.items
            .get(&id)
            .cloned()
            .ok_or_else(|| RelayError::fetch(Some(id), "404 Not Found"))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

// src/feed/http.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::RelayError;
use crate::feed::types::{FeedSource, Item, ItemId};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Hacker News Firebase API client.
///
/// One `reqwest::Client` is shared by every session; each call is bounded by
/// `timeout` and never retried.
#[derive(Clone)]
pub struct HnFeedClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HnFeedClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn top_ids_url(&self) -> String {
        format!("{}/topstories.json", self.base_url)
    }

    pub fn item_url(&self, id: ItemId) -> String {
        format!("{}/item/{}.json", self.base_url, id)
    }

    /// GET + decode. The response body is consumed and dropped before returning.
    async fn get_json<T: DeserializeOwned + Default>(
        &self,
        url: &str,
        id: Option<ItemId>,
    ) -> Result<T, RelayError> {
        let t0 = Instant::now();
        let res = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|rsp| rsp.error_for_status());

        let rsp = match res {
            Ok(rsp) => rsp,
            Err(e) => {
                counter!("relay_feed_errors_total").increment(1);
                tracing::warn!(target: "relay::feed", error = %e, ?id, "upstream request failed");
                return Err(RelayError::fetch(id, e));
            }
        };

        let body = rsp.bytes().await.map_err(|e| {
            counter!("relay_feed_errors_total").increment(1);
            RelayError::fetch(id, e)
        })?;
        histogram!("relay_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        decode_body(&body, id)
    }
}

fn decode_body<T: DeserializeOwned + Default>(
    body: &[u8],
    id: Option<ItemId>,
) -> Result<T, RelayError> {
    // deleted items come back as a literal `null`
    let v: Option<T> = serde_json::from_slice(body).map_err(|e| {
        counter!("relay_feed_errors_total").increment(1);
        RelayError::decode(id, e)
    })?;
    Ok(v.unwrap_or_default())
}

#[async_trait]
impl FeedSource for HnFeedClient {
    async fn fetch_top_ids(&self) -> Result<Vec<ItemId>, RelayError> {
        self.get_json(&self.top_ids_url(), None).await
    }

    async fn fetch_item(&self, id: ItemId) -> Result<Item, RelayError> {
        self.get_json(&self.item_url(id), Some(id)).await
    }

    fn name(&self) -> &'static str {
        "hacker-news"
    }
}

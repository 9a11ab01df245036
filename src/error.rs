// src/error.rs
//! Error taxonomy for the relay core.
//!
//! A filtered (ineligible) item is not an error; see [`crate::validate::Validation`].

use thiserror::Error;

use crate::feed::types::ItemId;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Network failure, timeout, or non-2xx status from the upstream feed.
    #[error("fetch failed{}: {}", fmt_id(.id), .cause)]
    Fetch { id: Option<ItemId>, cause: String },

    /// Upstream body was not the JSON shape we expect.
    #[error("decode failed{}: {}", fmt_id(.id), .cause)]
    Decode { id: Option<ItemId>, cause: String },

    /// An item could not be serialized for the client.
    #[error("encode failed for item {id}: {cause}")]
    Encode { id: ItemId, cause: String },

    /// Client transport is closed or not draining.
    #[error("write failed: {0}")]
    Write(String),
}

fn fmt_id(id: &Option<ItemId>) -> String {
    match id {
        Some(id) => format!(" for item {id}"),
        None => String::new(),
    }
}

impl RelayError {
    pub fn fetch(id: Option<ItemId>, cause: impl ToString) -> Self {
        Self::Fetch {
            id,
            cause: cause.to_string(),
        }
    }

    pub fn decode(id: Option<ItemId>, cause: impl ToString) -> Self {
        Self::Decode {
            id,
            cause: cause.to_string(),
        }
    }

    /// Write errors end the session; everything else is reported to the client.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

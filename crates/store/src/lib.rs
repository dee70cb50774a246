//! Historical message retrieval over direct peer streams.
//!
//! A node that keeps an archive answers paged queries on the store protocol;
//! any node can query. Pages are bounded, resumable via opaque cursors, and
//! always ascend in the archive's canonical order so results stitch together
//! deterministically.

pub mod client;
pub mod service;
pub mod wire;

pub use client::{
    exchange, HistoryPage, HistoryQuery, StoreClient, StoreError, DEFAULT_QUERY_TIMEOUT,
};
pub use service::{resolve, serve, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use wire::{Cursor, Query, Response, WireEntry};

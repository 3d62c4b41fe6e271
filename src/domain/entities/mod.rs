//! Core domain entities representing the business data model.
//!
//! Entities are plain data structures without persistence logic.
//!
//! # Entity Types
//!
//! - [`ShortUrl`] - A stored short id to target mapping
//! - [`NewShortUrl`] - One batch item before an id is assigned
//! - [`StoreStats`] - Store-wide aggregate counters

pub mod short_url;

pub use short_url::{NewShortUrl, ShortUrl, StoreStats};

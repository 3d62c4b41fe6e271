//! Application layer services implementing business logic.
//!
//! This layer orchestrates the store, the deletion pipeline and the id
//! generator, and is the API the transport layer calls.
//!
//! # Available Services
//!
//! - [`services::shortener_service::ShortenerService`] - Create, resolve, list and delete short URLs

pub mod services;

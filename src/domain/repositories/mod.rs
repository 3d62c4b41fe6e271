//! Repository trait definitions for the domain layer.
//!
//! The Store is a single trait with interchangeable backends living in
//! `crate::infrastructure::persistence`. A mock implementation is generated
//! with `mockall` for unit tests.
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod short_url_repository;

pub use short_url_repository::ShortUrlRepository;

#[cfg(test)]
pub use short_url_repository::MockShortUrlRepository;

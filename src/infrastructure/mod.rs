//! Infrastructure layer for external integrations.
//!
//! This layer implements the repository trait defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - Memory, file and PostgreSQL repository implementations

pub mod persistence;

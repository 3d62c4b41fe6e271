//! Utility functions shared by the service layer.
//!
//! - [`id_generator`] - Random short id and owner id generation
//! - [`url_validator`] - Target URL validation

pub mod id_generator;
pub mod url_validator;

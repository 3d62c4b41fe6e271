//! Domain layer containing business entities and logic.
//!
//! The domain layer has no dependencies on the infrastructure layer; the
//! repository trait defines the contract the storage backends implement.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`delete_job`] - Soft delete job model
//! - [`delete_worker`] - Asynchronous deletion pipeline
//!
//! # Deletion Flow
//!
//! 1. The service receives a delete request for an owner and a list of ids
//! 2. A [`delete_job::DeleteJob`] is queued on [`delete_worker::DeletionPipeline`]
//! 3. A pipeline worker applies it via [`repositories::ShortUrlRepository::soft_delete`]
//! 4. Failures are logged; the caller already got "accepted"

pub mod delete_job;
pub mod delete_worker;
pub mod entities;
pub mod repositories;

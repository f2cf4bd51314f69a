//! Cloudflare R2 storage client.
//!
//! This crate provides:
//! - Environment-driven R2 configuration
//! - File upload returning a public URL
//! - Collision-resistant upload keys
//! - A publisher that is either configured or explicitly unconfigured

pub mod client;
pub mod error;
pub mod keys;
pub mod publisher;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{content_type_for, UploadKey};
pub use publisher::{PublishOutcome, Publisher};
pub use store::ObjectStore;

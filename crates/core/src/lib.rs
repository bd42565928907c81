//! `patentdesk-core`: identifiers and error primitives shared by every crate.
//!
//! This crate has no IO and no async.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::UserId;

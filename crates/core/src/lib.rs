//! `forgeerp-core`: domain foundation building blocks (ids, errors, aggregate root).
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{BomDocumentId, BomItemId, UserId};

//! Domain error model.

use thiserror::Error;

/// Domain-level error shared by the id types.
///
/// Richer failure taxonomies live with the layers that produce them (the
/// cart crate carries its own error enum); this stays limited to what the
/// core types can actually fail on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

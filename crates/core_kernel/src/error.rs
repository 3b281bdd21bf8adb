//! Kernel errors that are not port failures

use thiserror::Error;

use crate::money::MoneyError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Text that is neither a bare UUID nor a prefixed identifier
    #[error("malformed {kind} id '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },

    /// Durable instance key that does not name a bill
    #[error("'{0}' is not a bill instance key")]
    UnknownInstanceKey(String),
}

impl CoreError {
    pub fn invalid_identifier(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            kind,
            value: value.into(),
        }
    }
}

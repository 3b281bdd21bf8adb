//! Bill and line-item identifiers
//!
//! Both wrap a UUID. Display adds a short type prefix (`BILL-…`, `ITEM-…`);
//! parsing accepts the prefixed and the bare form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

const INSTANCE_KEY_PREFIX: &str = "bill-";

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident => $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Random (v4) id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Time-ordered (v7) id
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "-{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($tag, "-")).unwrap_or(s);
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|_| CoreError::invalid_identifier($tag, s))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

typed_id!(
    /// Identifies a bill; also names its durable instance
    BillId => "BILL"
);
typed_id!(
    /// Caller-chosen line item id; the idempotency key for add-item
    LineItemId => "ITEM"
);

impl BillId {
    /// Key of the durable instance that owns this bill's lifecycle
    pub fn instance_key(&self) -> String {
        format!("{INSTANCE_KEY_PREFIX}{}", self.0)
    }

    /// Inverse of [`BillId::instance_key`]
    pub fn from_instance_key(key: &str) -> Result<Self, CoreError> {
        key.strip_prefix(INSTANCE_KEY_PREFIX)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Self)
            .ok_or_else(|| CoreError::UnknownInstanceKey(key.to_string()))
    }
}

//! Opaque tokens for registered operations and async bindings.
//!
//! Tokens are random (UUID v4), so they are never reused, never guessable, and
//! never equal across two registrations, even for the same label.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! new_token {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh token.
            pub fn fresh() -> Self {
                Self(Uuid::new_v4())
            }
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.simple())
            }
        }
    };
}

new_token!(OperationToken);
new_token!(BindingToken);

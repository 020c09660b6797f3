//! Branded ID newtypes.
//!
//! [`PeerId`] names a logical participant and is handed to us by whatever
//! identifies the user (a path segment, a token claim). [`ConnectionId`] names
//! one accepted transport and is always generated locally as a UUID v7.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Logical identity of a chat or signaling participant, independent of
    /// any single connection.
    PeerId
}

branded_id! {
    /// Identity of one accepted transport. Two connections are the same
    /// connection only if their IDs match.
    ConnectionId
}

impl From<i64> for PeerId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for PeerId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

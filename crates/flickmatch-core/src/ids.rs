//! Branded ID newtypes.
//!
//! Connection, session and item identifiers are all plain strings on the
//! wire. Wrapping them keeps a session id from being passed where a
//! connection id is expected.

use std::borrow::Borrow;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alphabet used for generated session ids (lowercase base-36).
const SESSION_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Default length of a generated session id.
pub const DEFAULT_SESSION_ID_LENGTH: usize = 9;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
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

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
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
    /// Transport-assigned identifier of one live connection.
    ConnectionId
}

branded_id! {
    /// Identifier of a pairing session, shared out-of-band between the two
    /// participants.
    SessionId
}

branded_id! {
    /// Identifier of a votable item (a movie, in practice).
    ItemId
}

impl ConnectionId {
    /// Generate a fresh connection id (`conn_` + UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl SessionId {
    /// Generate a random lowercase base-36 id of `len` characters.
    ///
    /// Not cryptographically strong. Uniqueness among live sessions is
    /// enforced by the registry, which retries on collision.
    #[must_use]
    pub fn generate(len: usize) -> Self {
        let mut rng = rand::rng();
        let id = (0..len.max(1))
            .map(|_| {
                let idx = rng.random_range(0..SESSION_ID_ALPHABET.len());
                char::from(SESSION_ID_ALPHABET[idx])
            })
            .collect();
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn connection_ids_are_unique_and_prefixed() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn_"));
    }

    #[test]
    fn session_id_has_requested_length() {
        let id = SessionId::generate(DEFAULT_SESSION_ID_LENGTH);
        assert_eq!(id.len(), 9);
        let id = SessionId::generate(16);
        assert_eq!(id.len(), 16);
    }

    #[test]
    fn session_id_zero_length_is_clamped() {
        let id = SessionId::generate(0);
        assert_eq!(id.len(), 1);
    }

    #[test]
    fn session_id_is_base36() {
        for _ in 0..100 {
            let id = SessionId::generate(12);
            assert!(
                id.chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
            );
        }
    }

    #[test]
    fn session_ids_rarely_collide() {
        let ids: HashSet<SessionId> = (0..1000)
            .map(|_| SessionId::generate(DEFAULT_SESSION_ID_LENGTH))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn serde_is_transparent() {
        let id = ItemId::from("m1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"m1\"");
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_and_deref() {
        let id = SessionId::from("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(&*id, "abc123");
        assert_eq!(String::from(id.clone()), "abc123");
        assert_eq!(id.into_inner(), "abc123");
    }
}

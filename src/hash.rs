//! Content-address primitives. Every address in rowledger — a row's
//! fingerprint, a commit's id — is a SHA-256 digest rendered as 64 lowercase
//! hex characters. Unlike a Git object id, there is no algorithm choice here:
//! the spec fixes SHA-256 for both row and commit hashes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest with hex (de)serialization, shared by
/// [`RowHash`] and [`CommitId`] via the `digest_newtype!` macro below.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest32([u8; 32]);

impl Digest32 {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Digest32(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest32 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(format!("expected a 64-hex digest, got {} chars", s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| e.to_string())?;
        Ok(Digest32(bytes))
    }
}

impl TryFrom<String> for Digest32 {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest32> for String {
    fn from(value: Digest32) -> Self {
        value.to_hex()
    }
}

/// Declares a newtype wrapper around [`Digest32`] with the `Display`/`FromStr`
/// plumbing every content-addressed id in this crate needs, without
/// repeating the boilerplate per id kind.
macro_rules! digest_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Digest32);

        impl $name {
            pub fn of(bytes: &[u8]) -> Self {
                $name(Digest32::of(bytes))
            }

            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name(s.parse()?))
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_hex()
            }
        }
    };
}

digest_newtype!(RowHash, "The content fingerprint of one canonicalized row.");
digest_newtype!(
    CommitId,
    "The content-derived id of a commit: hash of (dataset, parent, manifest, message, author)."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_hash() {
        let a = RowHash::of(b"hello");
        let b = RowHash::of(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_different_hash() {
        assert_ne!(RowHash::of(b"hello"), RowHash::of(b"world"));
    }

    #[test]
    fn hex_round_trips() {
        let h = CommitId::of(b"some manifest bytes");
        let hex = h.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed: CommitId = hex.parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("deadbeef".parse::<RowHash>().is_err());
    }
}

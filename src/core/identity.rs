//! Identity fingerprints scoping generated identifiers per file.

use std::fmt;

/// A short deterministic fingerprint of a file path (first 4 bytes of the
/// blake3 hash, rendered as 8 hex chars).
///
/// Generated identifiers (scoped-style attribute selectors, component
/// registration fields) embed this so independently compiled files never
/// collide. Stable across repeated compilations of the same path; not
/// cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileIdentity([u8; 4]);

impl CompileIdentity {
    /// Derive the identity for a logical file path.
    pub fn from_path(path: &str) -> Self {
        let hash = blake3::hash(path.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&hash.as_bytes()[..4]);
        Self(bytes)
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Attribute marker applied to scoped-style selectors.
    pub fn scope_attr(self) -> String {
        format!("data-s-{self}")
    }
}

impl fmt::Display for CompileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

//! Serialized code-signing requirement

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A captured designated requirement, kept as an opaque byte string.
///
/// The requirement is captured once from the original target bundle and then
/// persisted into the installer state, so that every later verification uses
/// the stored requirement rather than a freshly read one. The daemon may
/// restart between capture and verification, which is why this is a serialized
/// value and not a live handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSignature {
    requirement: Vec<u8>,
}

impl CodeSignature {
    /// Wrap a serialized requirement.
    #[must_use]
    pub fn from_requirement(requirement: Vec<u8>) -> Self {
        Self { requirement }
    }

    /// The raw serialized requirement bytes.
    #[must_use]
    pub fn requirement(&self) -> &[u8] {
        &self.requirement
    }
}

// Stored as base64 so the JSON records stay printable.
impl Serialize for CodeSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(&self.requirement))
    }
}

impl<'de> Deserialize<'de> for CodeSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let requirement = general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Ok(Self { requirement })
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Identifiers of paths and chains

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// Numeric key of a rendered path, unique while the path is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(pub u32);

impl PathId {
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}
impl From<u32> for PathId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
impl Display for PathId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical key under which a chain identifier is allocated.
///
/// The same key always maps to the same chain identifier while the identifier is allocated,
/// which makes re-rendering a path idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainKey(Uuid);

impl ChainKey {
    /// Namespace for [UUIDv5] chain keys derived from names
    ///
    /// [UUIDv5]: https://datatracker.ietf.org/doc/html/rfc9562#section-5.5
    pub const NAMESPACE_UUID: Uuid = Uuid::from_u128(0x3c1f_6d0e_9a52_4b7e_8d41_57f0_a2b6_c913);

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derive a stable key from a chain or path name. This value does not change between runs
    /// as long as `name` does not.
    #[must_use]
    pub fn from_name(name: impl AsRef<str>) -> Self {
        Self(Uuid::new_v5(&Self::NAMESPACE_UUID, name.as_ref().as_bytes()))
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}
impl Display for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::ChainKey;
    use uuid::Uuid;

    #[test]
    fn chain_key_from_name_is_stable() {
        bolero::check!().with_type().for_each(|name: &String| {
            let key = ChainKey::from_name(name);
            assert_eq!(key, ChainKey::from_name(name.as_str()));
            assert_eq!(
                *key.as_uuid(),
                Uuid::new_v5(&ChainKey::NAMESPACE_UUID, name.as_bytes())
            );
        });
    }

    #[test]
    fn distinct_names_distinct_keys() {
        assert_ne!(ChainKey::from_name("chain-a"), ChainKey::from_name("chain-b"));
    }
}

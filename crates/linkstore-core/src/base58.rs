use std::fmt::Display;
use uuid::Uuid;

/// A generated short code body encoded as base58.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShortCodeBase58(String);

impl ShortCodeBase58 {
    /// Creates a new `ShortCodeBase58` by encoding the given bytes as base58.
    pub fn new<T: AsRef<[u8]>>(bytes: T) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    /// Returns the encoded value as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ShortCodeBase58 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCodeBase58").field(&self.0).finish()
    }
}

impl Display for ShortCodeBase58 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for ShortCodeBase58 {
    fn from(val: Uuid) -> Self {
        ShortCodeBase58::new(val.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_uuid_without_ambiguous_characters() {
        let encoded = ShortCodeBase58::from(Uuid::new_v4());
        assert!(!encoded.as_str().is_empty());
        assert!(encoded
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !"0OIl".contains(c)));
    }

    #[test]
    fn same_bytes_same_encoding() {
        assert_eq!(ShortCodeBase58::new([7u8; 8]), ShortCodeBase58::new([7u8; 8]));
    }
}

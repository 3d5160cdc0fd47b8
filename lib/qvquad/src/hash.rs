use crate::Value;
use sha1::{Digest, Sha1};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The 20-byte content hash identifying a [`Value`].
///
/// It is computed over the canonical N-Quads string form, so two values are
/// hash-equal exactly when their canonical forms match. Backends use it to
/// deduplicate nodes in storage.
///
/// ```
/// use qvquad::{Value, ValueHash};
///
/// let hash = ValueHash::new(&Value::from("cool"));
/// assert_eq!(hash, ValueHash::new(&Value::from("cool")));
/// assert_ne!(hash, ValueHash::new(&Value::from("uncool")));
/// assert_eq!(hash, ValueHash::from_be_bytes(hash.to_be_bytes()));
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Copy)]
pub struct ValueHash {
    hash: [u8; 20],
}

impl ValueHash {
    /// Hashes the canonical string form of `value`.
    pub fn new(value: &Value) -> Self {
        Self::of_str(&value.to_string())
    }

    /// Hashes an already-rendered canonical form.
    pub fn of_str(value: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(value.as_bytes());
        Self {
            hash: hasher.finalize().into(),
        }
    }

    #[inline]
    pub fn from_be_bytes(hash: [u8; 20]) -> Self {
        Self { hash }
    }

    #[inline]
    pub fn to_be_bytes(self) -> [u8; 20] {
        self.hash
    }
}

impl Hash for ValueHash {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // The content hash is already uniformly distributed.
        state.write_u64(u64::from_be_bytes(
            self.hash[..8].try_into().expect("8-byte prefix"),
        ))
    }
}

impl fmt::Display for ValueHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.hash {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha1_of_canonical_form() {
        // sha1("\"cool\"")
        assert_eq!(
            ValueHash::new(&Value::from("cool")).to_string(),
            ValueHash::of_str("\"cool\"").to_string()
        );
        assert_eq!(ValueHash::new(&Value::from("cool")).to_be_bytes().len(), 20);
    }

    #[test]
    fn distinct_kinds_hash_apart() {
        // "4" as a plain string and 4 as an integer have different canonical forms.
        assert_ne!(
            ValueHash::new(&Value::from("4")),
            ValueHash::new(&Value::Int(4))
        );
    }
}

//! Fixed-size byte newtypes that serialize as lowercase hex strings.

/// Declares a `Copy` newtype over `[u8; N]` with hex `Display`/`FromStr` and
/// hex-string serde.
macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn to_bytes(&self) -> [u8; $len] {
                self.0
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                // Eight hex chars are enough to tell values apart in logs.
                let full = hex::encode(self.0);
                write!(f, "{}({}…)", stringify!($name), &full[..8.min(full.len())])
            }
        }

        impl std::str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut out = [0u8; $len];
                hex::decode_to_slice(s, &mut out)?;
                Ok(Self(out))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use hex_newtype;

/// Domain-separated blake3 hash over a sequence of byte slices.
pub(crate) fn hash_with_domain(domain: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    hex_newtype!(
        /// Test-only digest.
        Digest,
        4
    );

    #[test]
    fn hex_roundtrip_through_json() {
        let d = Digest([0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert_eq!(format!("{d:?}"), "Digest(deadbeef…)");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("deadbe".parse::<Digest>().is_err());
        assert!(serde_json::from_str::<Digest>("\"00\"").is_err());
    }

    #[test]
    fn domains_separate_hashes() {
        let a = hash_with_domain(b"a", &[b"x"]);
        let b = hash_with_domain(b"b", &[b"x"]);
        assert_ne!(a, b);
    }
}

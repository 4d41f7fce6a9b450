//! Digest computation.
//!
//! The digest construction is fixed by the shipped game clients and must be
//! reproduced bit-exact: a SHA-1 over a canonical byte sequence for the
//! plain family, or an HMAC-SHA1 keyed with the shared secret for the keyed
//! family. The canonical sequence concatenates the secret key, the request
//! path, the payload bytes, the salt, and (when present) the decimal text of
//! the version pair. The keyed family carries the secret as the MAC key
//! instead of prepending it to the message.

use std::fmt;

use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

/// The two hashing strategies legacy clients use, each with its own ordered
/// secret list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// Bare SHA-1 over the canonical sequence, key included in the message.
    Plain,
    /// HMAC-SHA1 with the shared secret as the MAC key.
    Keyed,
}

impl AlgorithmFamily {
    /// Configuration-facing name of the family's key list.
    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmFamily::Plain => "sha1",
            AlgorithmFamily::Keyed => "hmac",
        }
    }
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executable/data version pair sent by the version-bearing handheld
/// clients. Mixed into request-side digest input only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionContext {
    pub exe_version: i32,
    pub data_version: i32,
}

/// Compute the hex digest a client or server stamps on one side of an
/// exchange.
///
/// Deterministic and pure: identical inputs always produce the identical
/// lowercase hex string. `is_upload` is reserved; no captured client
/// exchange pins down its effect, so it does not alter the byte sequence.
pub fn calculate_digest(
    key: &str,
    path: &str,
    payload: &[u8],
    salt: &str,
    version: Option<VersionContext>,
    _is_upload: bool,
    family: AlgorithmFamily,
) -> String {
    match family {
        AlgorithmFamily::Plain => {
            let mut hasher = Sha1::new();
            hasher.update(key.as_bytes());
            hasher.update(path.as_bytes());
            hasher.update(payload);
            hasher.update(salt.as_bytes());
            if let Some(version) = version {
                hasher.update(version.exe_version.to_string().as_bytes());
                hasher.update(version.data_version.to_string().as_bytes());
            }
            hex::encode(hasher.finalize())
        }
        AlgorithmFamily::Keyed => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
                .expect("HMAC-SHA1 accepts keys of any length");
            mac.update(path.as_bytes());
            mac.update(payload);
            mac.update(salt.as_bytes());
            if let Some(version) = version {
                mac.update(version.exe_version.to_string().as_bytes());
                mac.update(version.data_version.to_string().as_bytes());
            }
            hex::encode(mac.finalize().into_bytes())
        }
    }
}

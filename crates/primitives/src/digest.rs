use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest as _;
use thiserror::Error;

const BYTES_LEN: usize = 32;

/// SHA-256 fingerprint of the raw envelope bytes of a message.
///
/// Used as the dedup key in the relay's recency set and as the tiebreaker in
/// the archive's canonical `(receiver_timestamp, digest)` sort key.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize, Default,
)]
pub struct Digest([u8; BYTES_LEN]);

impl Digest {
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(sha2::Sha256::digest(data).into())
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BYTES_LEN] {
        &self.0
    }
}

impl From<[u8; BYTES_LEN]> for Digest {
    fn from(bytes: [u8; BYTES_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = InvalidDigest;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes = <[u8; BYTES_LEN]>::try_from(bytes).map_err(|_| InvalidDigest)?;
        Ok(Self(bytes))
    }
}

#[derive(Clone, Copy, Debug, Error)]
#[error("digest must be exactly {BYTES_LEN} bytes")]
pub struct InvalidDigest;

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest").field(&self.to_string()).finish()
    }
}

impl FromStr for Digest {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; BYTES_LEN];
        match bs58::decode(s).onto(&mut bytes) {
            Ok(len) if len == BYTES_LEN => Ok(Self(bytes)),
            _ => Err(InvalidDigest),
        }
    }
}

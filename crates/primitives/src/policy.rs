use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Origin policy applied to relayed messages.
///
/// Closed set: unrecognized values are rejected when configuration is parsed,
/// never at message-processing time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignaturePolicy {
    /// Accept both signed and unsigned messages.
    #[default]
    AcceptAny,
    /// Drop messages that do not carry an authenticated origin.
    RequireSigned,
    /// Drop messages that carry one.
    RequireUnsigned,
}

impl SignaturePolicy {
    #[must_use]
    pub const fn admits(&self, signed: bool) -> bool {
        match self {
            Self::AcceptAny => true,
            Self::RequireSigned => signed,
            Self::RequireUnsigned => !signed,
        }
    }
}

#[derive(Clone, Debug, Error)]
#[error("unknown signature policy: {0:?}")]
pub struct UnknownPolicy(String);

impl FromStr for SignaturePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept-any" => Ok(Self::AcceptAny),
            "require-signed" => Ok(Self::RequireSigned),
            "require-unsigned" => Ok(Self::RequireUnsigned),
            _ => Err(UnknownPolicy(s.to_owned())),
        }
    }
}

impl fmt::Display for SignaturePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AcceptAny => "accept-any",
            Self::RequireSigned => "require-signed",
            Self::RequireUnsigned => "require-unsigned",
        })
    }
}

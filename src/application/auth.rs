//! Access-token checks for the event API.

use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiAuthError {
    #[error("missing api token")]
    Missing,
    #[error("invalid api token")]
    Invalid,
}

/// Decides whether a presented token grants access.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<(), ApiAuthError>;
}

/// Static set of accepted tokens, held only as SHA-256 digests.
pub struct ConfiguredTokens {
    digests: Vec<Vec<u8>>,
}

impl ConfiguredTokens {
    /// Build from raw tokens. Blank entries are skipped; `None` when nothing remains.
    pub fn from_tokens<I, S>(tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests: Vec<Vec<u8>> = tokens
            .into_iter()
            .filter_map(|token| {
                let token = token.as_ref().trim();
                (!token.is_empty()).then(|| hash_token(token))
            })
            .collect();

        (!digests.is_empty()).then_some(Self { digests })
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl TokenValidator for ConfiguredTokens {
    fn validate(&self, token: &str) -> Result<(), ApiAuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiAuthError::Missing);
        }

        let presented = hash_token(token);
        // Compare against every digest so timing does not reveal which one matched.
        let mut matched = Choice::from(0u8);
        for digest in &self.digests {
            matched |= digest.as_slice().ct_eq(presented.as_slice());
        }

        if bool::from(matched) {
            Ok(())
        } else {
            Err(ApiAuthError::Invalid)
        }
    }
}

/// Strip up to two leading `Bearer ` prefixes from an `Authorization` value.
///
/// Some clients send `Bearer Bearer <token>`; both forms resolve to `<token>`.
pub fn strip_bearer(header: &str) -> &str {
    let once = header.trim().strip_prefix(BEARER_PREFIX).unwrap_or(header.trim());
    once.strip_prefix(BEARER_PREFIX).unwrap_or(once).trim()
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

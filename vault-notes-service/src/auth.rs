//! HMAC authentication for discussion appends.
//!
//! An agent signs the raw request body with its shared secret and sends
//! `X-Agent-Id` plus the lowercase hex digest in `X-Signature`.

use async_trait::async_trait;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AppError, Result};

/// Looks up the shared secret of an agent.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, agent_id: &str) -> Result<Option<String>>;
}

/// Hash function used for every signature in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HmacAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HmacAlgorithm {
    /// Digest length in bytes
    pub fn output_len(self) -> usize {
        match self {
            HmacAlgorithm::Sha1 => 20,
            HmacAlgorithm::Sha256 => 32,
            HmacAlgorithm::Sha384 => 48,
            HmacAlgorithm::Sha512 => 64,
        }
    }

    /// Lowercase hex HMAC of `payload` under `secret`.
    #[cfg(test)]
    pub fn sign(self, secret: &[u8], payload: &[u8]) -> String {
        match self {
            HmacAlgorithm::Sha1 => sign_with::<Hmac<Sha1>>(secret, payload),
            HmacAlgorithm::Sha256 => sign_with::<Hmac<Sha256>>(secret, payload),
            HmacAlgorithm::Sha384 => sign_with::<Hmac<Sha384>>(secret, payload),
            HmacAlgorithm::Sha512 => sign_with::<Hmac<Sha512>>(secret, payload),
        }
    }

    /// Constant-time check of a raw digest.
    fn verify(self, secret: &[u8], payload: &[u8], digest: &[u8]) -> bool {
        match self {
            HmacAlgorithm::Sha1 => verify_with::<Hmac<Sha1>>(secret, payload, digest),
            HmacAlgorithm::Sha256 => verify_with::<Hmac<Sha256>>(secret, payload, digest),
            HmacAlgorithm::Sha384 => verify_with::<Hmac<Sha384>>(secret, payload, digest),
            HmacAlgorithm::Sha512 => verify_with::<Hmac<Sha512>>(secret, payload, digest),
        }
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HmacAlgorithm::Sha1 => "SHA-1",
            HmacAlgorithm::Sha256 => "SHA-256",
            HmacAlgorithm::Sha384 => "SHA-384",
            HmacAlgorithm::Sha512 => "SHA-512",
        };
        f.write_str(name)
    }
}

impl FromStr for HmacAlgorithm {
    type Err = AppError;

    /// Accepts WebCrypto names (`SHA-256`) as well as `sha256` / `SHA_256`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA1" => Ok(HmacAlgorithm::Sha1),
            "SHA256" => Ok(HmacAlgorithm::Sha256),
            "SHA384" => Ok(HmacAlgorithm::Sha384),
            "SHA512" => Ok(HmacAlgorithm::Sha512),
            _ => Err(AppError::Config(format!("unsupported HMAC algorithm: {}", s))),
        }
    }
}

#[cfg(test)]
fn sign_with<M: Mac + KeyInit>(secret: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match <M as Mac>::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_with<M: Mac + KeyInit>(secret: &[u8], payload: &[u8], digest: &[u8]) -> bool {
    let mut mac = match <M as Mac>::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(digest).is_ok()
}

/// Only the exact lowercase hex rendering of a digest is accepted.
fn is_lowercase_hex(s: &str, expected_len: usize) -> bool {
    s.len() == expected_len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Decides whether an inbound reply may be appended.
#[derive(Clone)]
pub struct Authenticator {
    resolver: Arc<dyn SecretResolver>,
    algorithm: HmacAlgorithm,
}

impl Authenticator {
    pub fn new(resolver: Arc<dyn SecretResolver>, algorithm: HmacAlgorithm) -> Self {
        Self {
            resolver,
            algorithm,
        }
    }

    pub fn algorithm(&self) -> HmacAlgorithm {
        self.algorithm
    }

    /// Returns true only if `signature_hex` is the lowercase hex HMAC of
    /// `payload` under the secret registered for `agent_id`. Every other
    /// outcome, including resolver errors, is a plain `false`.
    pub async fn authenticate(
        &self,
        agent_id: Option<&str>,
        signature_hex: Option<&str>,
        payload: &[u8],
    ) -> bool {
        let (agent_id, signature_hex) = match (agent_id, signature_hex) {
            (Some(a), Some(s)) if !a.is_empty() && !s.is_empty() => (a, s),
            _ => return false,
        };

        let secret = match self.resolver.resolve(agent_id).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                log::warn!("[AUTH] Unknown agent '{}'", agent_id);
                return false;
            }
            Err(e) => {
                log::warn!("[AUTH] Secret lookup failed for '{}': {}", agent_id, e);
                return false;
            }
        };

        if !is_lowercase_hex(signature_hex, self.algorithm.output_len() * 2) {
            log::warn!("[AUTH] Malformed signature from '{}'", agent_id);
            return false;
        }
        let digest = match hex::decode(signature_hex) {
            Ok(d) => d,
            Err(_) => return false,
        };

        let ok = self.algorithm.verify(secret.as_bytes(), payload, &digest);
        if !ok {
            log::warn!("[AUTH] Signature mismatch for '{}'", agent_id);
        }
        ok
    }
}

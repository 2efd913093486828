//! One-time code generation and salted hashing.
//!
//! Raw codes only ever exist in memory long enough to hand them to the
//! delivery channel; the store keeps an HMAC-SHA256 keyed by a server-wide
//! pepper over a per-issuance salt, the purpose, the identifier, and the code.

use anyhow::{anyhow, Context, Result};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::{identifier::Identifier, purpose::Purpose};

type HmacSha256 = Hmac<Sha256>;

pub const SALT_LEN: usize = 16;

// Largest multiple of 10 that fits in a byte; bytes at or above it are
// rejected so every digit is equally likely.
const DIGIT_REJECTION_BOUND: u8 = 250;

/// Generate a numeric code of `length` digits from the OS RNG.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub fn generate_code(length: usize) -> Result<String> {
    let mut code = String::with_capacity(length);
    let mut buffer = [0u8; 32];
    while code.len() < length {
        OsRng
            .try_fill_bytes(&mut buffer)
            .context("failed to generate one-time code")?;
        for byte in buffer {
            if byte >= DIGIT_REJECTION_BOUND {
                continue;
            }
            code.push(char::from(b'0' + byte % 10));
            if code.len() == length {
                break;
            }
        }
    }
    Ok(code)
}

/// Create a fresh random salt for one issuance.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub fn generate_salt() -> Result<Vec<u8>> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate code salt")?;
    Ok(salt)
}

/// Fixed-length, digits only.
#[must_use]
pub fn valid_code_format(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Clone)]
pub struct CodeHasher {
    pepper: SecretString,
}

impl CodeHasher {
    #[must_use]
    pub fn new(pepper: SecretString) -> Self {
        Self { pepper }
    }

    /// # Errors
    /// Returns an error if the MAC cannot be keyed.
    pub fn hash(
        &self,
        salt: &[u8],
        identifier: &Identifier,
        purpose: Purpose,
        code: &str,
    ) -> Result<Vec<u8>> {
        let mac = self.mac(salt, identifier, purpose, code)?;
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Constant-time comparison of a submitted code against a stored hash.
    #[must_use]
    pub fn verify(
        &self,
        salt: &[u8],
        identifier: &Identifier,
        purpose: Purpose,
        code: &str,
        expected: &[u8],
    ) -> bool {
        self.mac(salt, identifier, purpose, code)
            .is_ok_and(|mac| mac.verify_slice(expected).is_ok())
    }

    fn mac(
        &self,
        salt: &[u8],
        identifier: &Identifier,
        purpose: Purpose,
        code: &str,
    ) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.pepper.expose_secret().as_bytes())
            .map_err(|err| anyhow!("invalid code pepper: {err}"))?;
        mac.update(salt);
        mac.update(purpose.as_str().as_bytes());
        mac.update(&[0]);
        mac.update(identifier.as_str().as_bytes());
        mac.update(&[0]);
        mac.update(code.as_bytes());
        Ok(mac)
    }
}

impl std::fmt::Debug for CodeHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeHasher")
            .field("pepper", &"***")
            .finish()
    }
}

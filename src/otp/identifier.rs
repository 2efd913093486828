//! Channel addresses (phone numbers and emails) in their canonical form.

use regex::Regex;
use std::fmt;

use super::error::OtpError;

/// Country code applied to Indian mobile numbers written without a `+`.
const DEFAULT_COUNTRY_CODE: &str = "91";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Phone,
    Email,
}

/// A normalized phone number (E.164-like) or lowercase email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    value: String,
    kind: IdentifierKind,
}

impl Identifier {
    /// Normalize and validate a raw identifier.
    ///
    /// # Errors
    /// Returns `OtpError::InvalidIdentifierFormat` when the input is neither a
    /// phone number nor an email address.
    pub fn parse(raw: &str) -> Result<Self, OtpError> {
        let trimmed = raw.trim();
        if trimmed.contains('@') {
            let email = normalize_email(trimmed);
            if valid_email(&email) {
                return Ok(Self {
                    value: email,
                    kind: IdentifierKind::Email,
                });
            }
            return Err(OtpError::InvalidIdentifierFormat);
        }

        match normalize_phone(trimmed) {
            Some(phone) if valid_phone(&phone) => Ok(Self {
                value: phone,
                kind: IdentifierKind::Phone,
            }),
            _ => Err(OtpError::InvalidIdentifierFormat),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    /// Masked form for logs, e.g. `+91******3210` or `u***@example.com`.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self.kind {
            IdentifierKind::Phone => {
                let chars: Vec<char> = self.value.chars().collect();
                let keep_head = if self.value.starts_with('+') { 3 } else { 2 };
                let keep_tail = 4;
                if chars.len() <= keep_head + keep_tail {
                    return "*".repeat(chars.len());
                }
                let head: String = chars[..keep_head].iter().collect();
                let tail: String = chars[chars.len() - keep_tail..].iter().collect();
                format!(
                    "{head}{}{tail}",
                    "*".repeat(chars.len() - keep_head - keep_tail)
                )
            }
            IdentifierKind::Email => match self.value.split_once('@') {
                Some((local, domain)) => {
                    let first = local.chars().next().unwrap_or('*');
                    format!("{first}***@{domain}")
                }
                None => "***".to_string(),
            },
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Normalize an email for lookup/uniqueness checks.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Strip formatting characters and produce `+<country><number>`.
///
/// Without a leading `+` only Indian mobile numbers are accepted: ten digits
/// starting with 6-9, optionally behind a trunk `0` or the `91` country code.
fn normalize_phone(phone: &str) -> Option<String> {
    let has_plus = phone.starts_with('+');
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '+'))
        .collect();

    if has_plus {
        return Some(format!("+{digits}"));
    }

    let national = match digits.len() {
        11 => digits.strip_prefix('0')?,
        12 => digits.strip_prefix(DEFAULT_COUNTRY_CODE)?,
        _ => digits.as_str(),
    };
    (national.len() == 10 && national.starts_with(|c: char| matches!(c, '6'..='9')))
        .then(|| format!("+{DEFAULT_COUNTRY_CODE}{national}"))
}

fn valid_phone(phone_normalized: &str) -> bool {
    Regex::new(r"^\+[1-9][0-9]{7,14}$").is_ok_and(|regex| regex.is_match(phone_normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let identifier = Identifier::parse(" User@Example.COM ");
        assert_eq!(
            identifier.as_ref().map(Identifier::as_str),
            Ok("user@example.com")
        );
        assert_eq!(
            identifier.map(|id| id.kind()),
            Ok(IdentifierKind::Email)
        );
    }

    #[test]
    fn phone_formatting_is_stripped() {
        let identifier = Identifier::parse("+91 98765-43210");
        assert_eq!(
            identifier.as_ref().map(Identifier::as_str),
            Ok("+919876543210")
        );
        assert_eq!(identifier.map(|id| id.kind()), Ok(IdentifierKind::Phone));

        let identifier = Identifier::parse("+1 (415) 555.0100");
        assert_eq!(identifier.map(|id| id.to_string()), Ok("+14155550100".to_string()));
    }

    #[test]
    fn bare_indian_mobile_gets_country_code() {
        let identifier = Identifier::parse("98765 43210");
        assert_eq!(identifier.map(|id| id.to_string()), Ok("+919876543210".to_string()));
    }

    #[test]
    fn indian_numbers_share_one_key() {
        for raw in ["09876543210", "919876543210", "+91 98765 43210", "9876543210"] {
            assert_eq!(
                Identifier::parse(raw).map(|id| id.to_string()),
                Ok("+919876543210".to_string()),
                "{raw} should normalize to the same key"
            );
        }
    }

    #[test]
    fn foreign_numbers_need_a_plus() {
        assert_eq!(
            Identifier::parse("14155550100"),
            Err(OtpError::InvalidIdentifierFormat)
        );
        assert_eq!(
            Identifier::parse("+14155550100").map(|id| id.to_string()),
            Ok("+14155550100".to_string())
        );
    }

    #[test]
    fn identifiers_hash_by_value() {
        let set: std::collections::HashSet<Identifier> = ["98765 43210", "+919876543210"]
            .into_iter()
            .filter_map(|raw| Identifier::parse(raw).ok())
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for raw in ["", "   ", "not-an-email", "missing-domain@", "12345", "+0123456789", "abc@def", "5876543210", "00876543210"] {
            assert_eq!(
                Identifier::parse(raw),
                Err(OtpError::InvalidIdentifierFormat),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn redacted_hides_the_middle() {
        let phone = Identifier::parse("+919876543210").map(|id| id.redacted());
        assert_eq!(phone, Ok("+91******3210".to_string()));

        let email = Identifier::parse("user@example.com").map(|id| id.redacted());
        assert_eq!(email, Ok("u***@example.com".to_string()));
    }
}

//! Webhook sender authentication.
//!
//! Spinnaker's echo service is configured with Basic credentials for the
//! webhook target; every request carries
//! `authorization: Basic base64(username:password)`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use subtle::ConstantTimeEq;

use crate::AuditError;

const BASIC_PREFIX: &str = "Basic ";

/// Expected webhook credentials, loaded once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates the expected credential pair. Returns `None` if either part is
    /// empty: an empty expected value would accept headers like `Basic Og==`.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            None
        } else {
            Some(Self { username, password })
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks an `authorization` header value.
    ///
    /// The decoded payload is split on the first `:`; the password may itself
    /// contain colons. Both halves are compared in constant time.
    ///
    /// # Errors
    ///
    /// [`AuditError::InvalidCredentials`] when the header is empty, lacks the
    /// `Basic ` prefix, is not valid base64/UTF-8, has no `:` separator, or
    /// does not match.
    pub fn verify(&self, authorization: &str) -> Result<(), AuditError> {
        let (username, password) =
            decode_basic(authorization).ok_or(AuditError::InvalidCredentials)?;

        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let password_ok = password.as_bytes().ct_eq(self.password.as_bytes());

        if bool::from(user_ok & password_ok) {
            Ok(())
        } else {
            Err(AuditError::InvalidCredentials)
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn decode_basic(authorization: &str) -> Option<(String, String)> {
    let encoded = authorization.strip_prefix(BASIC_PREFIX)?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

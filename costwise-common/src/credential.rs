use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("api key is empty")]
    Empty,
    #[error("api key contains characters not allowed in a header value")]
    InvalidCharacters,
}

/// Provider API token, scoped to a single request/session.
///
/// Passed explicitly to every provider call. `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, CredentialError> {
        let raw = raw.into();
        let key = raw.trim();
        if key.is_empty() {
            return Err(CredentialError::Empty);
        }
        if key.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(CredentialError::InvalidCharacters);
        }
        Ok(Self(key.to_string()))
    }

    /// Raw token, for building the Authorization header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_trimmed_and_redacted() {
        let key = ApiKey::new("  secret-token\n").unwrap();
        assert_eq!(key.expose(), "secret-token");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
        assert_eq!(key.to_string(), "***");
    }

    #[test]
    fn empty_or_malformed_keys_are_rejected() {
        assert_eq!(ApiKey::new("   "), Err(CredentialError::Empty));
        assert_eq!(
            ApiKey::new("abc def"),
            Err(CredentialError::InvalidCharacters)
        );
    }
}

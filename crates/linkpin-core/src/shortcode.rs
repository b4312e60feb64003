use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;

/// A validated short code identifier for a shortened URL.
///
/// Short codes are 1-64 characters long and contain only ASCII
/// alphanumeric characters, which is the alphabet the codec emits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShortCode(SmolStr);

const MIN_LENGTH: usize = 1;
pub const MAX_LENGTH: usize = 64;

impl ShortCode {
    /// Creates a new `ShortCode` after validating the input.
    pub fn parse(code: impl AsRef<str>) -> Result<Self, CoreError> {
        let code = code.as_ref();
        Self::validate(code)?;
        Ok(Self(SmolStr::new(code)))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (the codec, or rows read back from the mapping store).
    pub fn new_unchecked(code: impl AsRef<str>) -> Self {
        Self(SmolStr::new(code.as_ref()))
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), CoreError> {
        if code.len() < MIN_LENGTH || code.len() > MAX_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                code.len()
            )));
        }

        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only alphanumeric characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCode").field(&self.0).finish()
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for ShortCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShortCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = SmolStr::deserialize(deserializer)?;
        Self::parse(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_codes() {
        assert!(ShortCode::parse("a").is_ok());
        assert!(ShortCode::parse("Abc123xyz").is_ok());
        assert!(ShortCode::parse("z".repeat(MAX_LENGTH)).is_ok());
    }

    #[test]
    fn empty_or_too_long() {
        assert!(ShortCode::parse("").is_err());
        assert!(ShortCode::parse("a".repeat(MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortCode::parse("abc def").is_err());
        assert!(ShortCode::parse("abc/def").is_err());
        assert!(ShortCode::parse("abc-def").is_err());
        assert!(ShortCode::parse("favicon.ico").is_err());
        assert!(ShortCode::parse("ünï").is_err());
    }

    #[test]
    fn display() {
        let code = ShortCode::parse("wz2Xe0").unwrap();
        assert_eq!(code.to_string(), "wz2Xe0");
        assert_eq!(format!("{code:?}"), "ShortCode(\"wz2Xe0\")");
    }

    #[test]
    fn to_url_joins_with_single_slash() {
        let code = ShortCode::parse("abc123").unwrap();
        assert_eq!(code.to_url("https://lp.in"), "https://lp.in/abc123");
        assert_eq!(code.to_url("https://lp.in/"), "https://lp.in/abc123");
    }

    #[test]
    fn deserialize_validates() {
        let code: ShortCode = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(code.as_str(), "abc123");
        assert!(serde_json::from_str::<ShortCode>("\"abc 123\"").is_err());
    }
}

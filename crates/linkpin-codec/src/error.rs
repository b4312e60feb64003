use thiserror::Error;

/// Errors returned by codec construction and decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("alphabet must contain at least {min} unique characters, got {actual}")]
    AlphabetTooShort { min: usize, actual: usize },
    #[error("alphabet must be printable ascii without spaces")]
    InvalidAlphabet,
    #[error("short code is empty")]
    Empty,
    #[error("character {0:?} is not part of the alphabet")]
    InvalidCharacter(char),
    #[error("encoded value does not fit in 64 bits")]
    Overflow,
    #[error("short code does not encode exactly one value")]
    Malformed,
    #[error("short code failed verification")]
    Checksum,
}

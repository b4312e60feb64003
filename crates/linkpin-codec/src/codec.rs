use crate::error::Error;
use crate::shuffle::{as_salt, consistent_shuffle};
use typed_builder::TypedBuilder;

/// Digits, upper and lower case letters.
pub const DEFAULT_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const DEFAULT_SEPARATORS: &[u8] = b"cfhistuCFHISTU";
const SEPARATOR_RATIO: f64 = 3.5;
const GUARD_RATIO: f64 = 12.0;
const MIN_ALPHABET_LENGTH: usize = 16;

/// Configures a [`Codec`] instance.
///
/// The salt is long-lived: changing it breaks every previously issued code.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CodecSettings {
    #[builder(setter(into))]
    pub salt: String,
    /// Codes shorter than this are padded.
    #[builder(default = 0)]
    pub min_length: usize,
    #[builder(default = DEFAULT_ALPHABET.to_string(), setter(into))]
    pub alphabet: String,
}

/// A stateless bijection between `u64` values and short strings.
///
/// Two codecs built from equal settings produce identical codes.
#[derive(Clone)]
pub struct Codec {
    salt: Vec<u32>,
    min_length: usize,
    alphabet: Vec<u8>,
    separators: Vec<u8>,
    guards: Vec<u8>,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the salt is a secret
        f.debug_struct("Codec")
            .field("min_length", &self.min_length)
            .field("alphabet_len", &self.alphabet.len())
            .finish_non_exhaustive()
    }
}

fn ratio_ceil(dividend: usize, divisor: f64) -> usize {
    (dividend as f64 / divisor).ceil() as usize
}

impl Codec {
    pub fn new(settings: CodecSettings) -> Result<Self, Error> {
        if !settings.alphabet.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::InvalidAlphabet);
        }

        let salt: Vec<u32> = settings.salt.chars().map(u32::from).collect();
        let raw = settings.alphabet.as_bytes();

        let mut separators: Vec<u8> = DEFAULT_SEPARATORS
            .iter()
            .copied()
            .filter(|c| raw.contains(c))
            .collect();

        let mut alphabet: Vec<u8> = Vec::with_capacity(raw.len());
        for &c in raw {
            if !alphabet.contains(&c) && !separators.contains(&c) {
                alphabet.push(c);
            }
        }

        let unique = alphabet.len() + separators.len();
        if unique < MIN_ALPHABET_LENGTH {
            return Err(Error::AlphabetTooShort {
                min: MIN_ALPHABET_LENGTH,
                actual: unique,
            });
        }

        consistent_shuffle(&mut separators, &salt);

        let mut min_separators = ratio_ceil(alphabet.len(), SEPARATOR_RATIO);
        if separators.is_empty() || separators.len() < min_separators {
            if min_separators == 1 {
                min_separators = 2;
            }
            if min_separators > separators.len() {
                let split_at = (min_separators - separators.len()).min(alphabet.len());
                separators.extend(alphabet.drain(..split_at));
            } else {
                separators.truncate(min_separators);
            }
        }

        consistent_shuffle(&mut alphabet, &salt);

        let num_guards = ratio_ceil(alphabet.len(), GUARD_RATIO);
        let guards = if alphabet.len() < 3 {
            separators.drain(..num_guards.min(separators.len())).collect()
        } else {
            alphabet.drain(..num_guards).collect()
        };

        Ok(Self {
            salt,
            min_length: settings.min_length,
            alphabet,
            separators,
            guards,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Encodes a value. Deterministic for a given set of settings.
    pub fn encode(&self, value: u64) -> String {
        let values_hash = value % 100;
        let mut alphabet = self.alphabet.clone();
        let lottery = alphabet[(values_hash % alphabet.len() as u64) as usize];

        let key = self.alphabet_key(lottery, &alphabet);
        consistent_shuffle(&mut alphabet, &key);

        let mut encoded = Vec::with_capacity(self.min_length.max(16));
        encoded.push(lottery);
        encoded.extend(hash(value, &alphabet));

        if encoded.len() < self.min_length {
            encoded = self.pad(encoded, alphabet, values_hash);
        }

        // alphabet, separators and guards are all ascii
        encoded.into_iter().map(char::from).collect()
    }

    /// Decodes a code produced by [`Codec::encode`].
    ///
    /// Anything that does not re-encode to the exact same string is rejected,
    /// so a successful decode always identifies exactly one value.
    pub fn decode(&self, code: &str) -> Result<u64, Error> {
        if code.is_empty() {
            return Err(Error::Empty);
        }
        if let Some(c) = code.chars().find(|c| !c.is_ascii()) {
            return Err(Error::InvalidCharacter(c));
        }

        let bytes = code.as_bytes();
        let parts: Vec<&[u8]> = bytes.split(|c| self.guards.contains(c)).collect();
        let body = if (2..=3).contains(&parts.len()) {
            parts[1]
        } else {
            parts[0]
        };

        let Some((&lottery, rest)) = body.split_first() else {
            return Err(Error::Malformed);
        };

        let mut alphabet = self.alphabet.clone();
        let mut values = Vec::with_capacity(1);
        for chunk in rest.split(|c| self.separators.contains(c)) {
            let key = self.alphabet_key(lottery, &alphabet);
            consistent_shuffle(&mut alphabet, &key);
            values.push(unhash(chunk, &alphabet)?);
        }

        let [value] = values[..] else {
            return Err(Error::Malformed);
        };

        if self.encode(value) != code {
            return Err(Error::Checksum);
        }

        Ok(value)
    }

    /// `lottery + salt + alphabet`, truncated to the alphabet length.
    fn alphabet_key(&self, lottery: u8, alphabet: &[u8]) -> Vec<u32> {
        std::iter::once(u32::from(lottery))
            .chain(self.salt.iter().copied())
            .chain(alphabet.iter().map(|&c| u32::from(c)))
            .take(alphabet.len())
            .collect()
    }

    fn pad(&self, mut encoded: Vec<u8>, mut alphabet: Vec<u8>, values_hash: u64) -> Vec<u8> {
        let guard = (values_hash + u64::from(encoded[0])) % self.guards.len() as u64;
        encoded.insert(0, self.guards[guard as usize]);

        if encoded.len() < self.min_length {
            let guard = (values_hash + u64::from(encoded[2])) % self.guards.len() as u64;
            encoded.push(self.guards[guard as usize]);
        }

        let split_at = alphabet.len() / 2;
        while encoded.len() < self.min_length {
            let key = as_salt(&alphabet);
            consistent_shuffle(&mut alphabet, &key);

            let mut padded = Vec::with_capacity(encoded.len() + alphabet.len());
            padded.extend_from_slice(&alphabet[split_at..]);
            padded.extend_from_slice(&encoded);
            padded.extend_from_slice(&alphabet[..split_at]);
            encoded = padded;

            if encoded.len() > self.min_length {
                let from = (encoded.len() - self.min_length) / 2;
                encoded = encoded[from..from + self.min_length].to_vec();
            }
        }

        encoded
    }
}

fn hash(mut value: u64, alphabet: &[u8]) -> Vec<u8> {
    let base = alphabet.len() as u64;
    let mut out = Vec::new();
    loop {
        out.push(alphabet[(value % base) as usize]);
        value /= base;
        if value == 0 {
            break;
        }
    }
    out.reverse();
    out
}

fn unhash(chunk: &[u8], alphabet: &[u8]) -> Result<u64, Error> {
    let base = alphabet.len() as u64;
    chunk.iter().try_fold(0_u64, |acc, &c| {
        let position = alphabet
            .iter()
            .position(|&a| a == c)
            .ok_or(Error::InvalidCharacter(char::from(c)))?;
        acc.checked_mul(base)
            .and_then(|v| v.checked_add(position as u64))
            .ok_or(Error::Overflow)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const HASHIDS_ALPHABET: &str =
        "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

    fn codec(salt: &str, min_length: usize) -> Codec {
        Codec::new(
            CodecSettings::builder()
                .salt(salt)
                .min_length(min_length)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn matches_published_hashids_vectors() {
        let plain = Codec::new(
            CodecSettings::builder()
                .salt("this is my salt")
                .alphabet(HASHIDS_ALPHABET)
                .build(),
        )
        .unwrap();
        assert_eq!(plain.encode(12345), "NkK9");
        assert_eq!(plain.decode("NkK9"), Ok(12345));

        let padded = Codec::new(
            CodecSettings::builder()
                .salt("this is my salt")
                .min_length(8)
                .alphabet(HASHIDS_ALPHABET)
                .build(),
        )
        .unwrap();
        assert_eq!(padded.encode(1), "gB0NV05e");
        assert_eq!(padded.decode("gB0NV05e"), Ok(1));
    }

    #[test]
    fn known_codes_for_default_alphabet() {
        let salted = codec("linkpin-test-salt", 0);
        assert_eq!(salted.encode(0), "WG");
        assert_eq!(salted.encode(1), "wr");
        assert_eq!(salted.encode(62), "Vpv");
        assert_eq!(salted.encode(14_000_001), "wz2Xe0");

        let unsalted = codec("", 0);
        assert_eq!(unsalted.encode(0), "gn");
        assert_eq!(unsalted.encode(1000), "gN2");
    }

    #[test]
    fn min_length_pads() {
        let codec = codec("linkpin-test-salt", 7);
        assert_eq!(codec.encode(0), "9rkWGkO");
        assert_eq!(codec.encode(1), "OBxwrkQ");
        assert_eq!(codec.encode(14_000_001), "xwz2Xe0");

        for n in [0, 1, 99, 12_345, u64::MAX] {
            let code = codec.encode(n);
            assert!(code.len() >= 7, "{code} is shorter than 7");
            assert_eq!(codec.decode(&code), Ok(n));
        }
    }

    #[test]
    fn round_trip() {
        let codec = codec("linkpin-test-salt", 6);
        for n in (0..20_000).chain(14_000_000..14_002_000) {
            assert_eq!(codec.decode(&codec.encode(n)), Ok(n), "value {n}");
        }
        for n in [u64::MAX, u64::MAX - 1, 1 << 40, 62_u64.pow(10)] {
            assert_eq!(codec.decode(&codec.encode(n)), Ok(n), "value {n}");
        }
    }

    #[test]
    fn distinct_values_produce_distinct_codes() {
        let codec = codec("linkpin-test-salt", 0);
        let mut seen = HashSet::new();
        for n in 0..50_000 {
            assert!(seen.insert(codec.encode(n)), "duplicate code for {n}");
        }
    }

    #[test]
    fn codes_use_only_the_alphabet() {
        let codec = codec("linkpin-test-salt", 10);
        for n in [0, 7, 1_000_000, u64::MAX] {
            assert!(codec.encode(n).chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn same_settings_same_codes() {
        let a = codec("shared", 5);
        let b = codec("shared", 5);
        assert_eq!(a.encode(424_242), b.encode(424_242));
    }

    #[test]
    fn salt_changes_codes() {
        let a = codec("first", 0);
        let b = codec("second", 0);
        assert_ne!(a.encode(14_000_001), b.encode(14_000_001));
    }

    #[test]
    fn decode_rejects_malformed_input() {
        let codec = codec("linkpin-test-salt", 0);
        assert_eq!(codec.decode(""), Err(Error::Empty));
        assert!(matches!(codec.decode("ab-c"), Err(Error::InvalidCharacter('-'))));
        assert!(matches!(codec.decode("wé"), Err(Error::InvalidCharacter('é'))));
        assert!(codec.decode("zzzzzzz").is_err());
    }

    #[test]
    fn decode_rejects_tampered_codes() {
        let codec = codec("linkpin-test-salt", 0);
        let code = codec.encode(14_000_001);
        let mut tampered: Vec<char> = code.chars().collect();
        tampered.swap(0, 1);
        let tampered: String = tampered.into_iter().collect();
        assert_ne!(tampered, code);
        assert!(codec.decode(&tampered).is_err());
    }

    #[test]
    fn decode_with_other_salt_fails() {
        let issued = codec("first", 0).encode(14_000_001);
        assert!(codec("second", 0).decode(&issued).is_err());
    }

    #[test]
    fn rejects_short_alphabets() {
        let err = Codec::new(
            CodecSettings::builder()
                .salt("salt")
                .alphabet("abcdefg")
                .build(),
        )
        .unwrap_err();
        assert_eq!(err, Error::AlphabetTooShort { min: 16, actual: 7 });
    }

    #[test]
    fn rejects_alphabets_with_spaces() {
        let err = Codec::new(
            CodecSettings::builder()
                .salt("salt")
                .alphabet("abcdefghijklmnop qrstuvwxyz")
                .build(),
        )
        .unwrap_err();
        assert_eq!(err, Error::InvalidAlphabet);
    }

    #[test]
    fn debug_hides_salt() {
        let codec = codec("super-secret", 4);
        assert!(!format!("{codec:?}").contains("super-secret"));
    }
}

//! # Fingerprint Generator
//!
//! Turns a fully substituted statement into the cache key. The statement is
//! stripped of every whitespace character and lower-cased before hashing, so
//! `SELECT  a FROM t` and `select a\nfrom t` share a key while a change in any
//! literal produces a different one.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use md5::Md5;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Number of fingerprint characters shown in logs and traces
pub const SHORT_LEN: usize = 12;

/// Hash function used to derive fingerprints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha512,
    Sha384,
    Sha256,
    Sha224,
    /// Shortest digest; not collision resistant
    Md5,
}

impl DigestAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha512 => "sha512",
            Self::Sha384 => "sha384",
            Self::Sha256 => "sha256",
            Self::Sha224 => "sha224",
            Self::Md5 => "md5",
        }
    }

    /// Length of the rendered hex digest
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha512 => 128,
            Self::Sha384 => 96,
            Self::Sha256 => 64,
            Self::Sha224 => 56,
            Self::Md5 => 32,
        }
    }

    fn digest_hex(&self, input: &[u8]) -> String {
        match self {
            Self::Sha512 => hex::encode(Sha512::digest(input)),
            Self::Sha384 => hex::encode(Sha384::digest(input)),
            Self::Sha256 => hex::encode(Sha256::digest(input)),
            Self::Sha224 => hex::encode(Sha224::digest(input)),
            Self::Md5 => hex::encode(Md5::digest(input)),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha512" => Ok(Self::Sha512),
            "sha384" => Ok(Self::Sha384),
            "sha256" => Ok(Self::Sha256),
            "sha224" => Ok(Self::Sha224),
            "md5" => Ok(Self::Md5),
            _ => Err(ConfigError::UnsupportedDigest(s.to_string())),
        }
    }
}

/// Canonical lowercase hex digest of a statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..SHORT_LEN).unwrap_or(&self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize and hash statements with a fixed algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fingerprinter {
    algorithm: DigestAlgorithm,
}

impl Fingerprinter {
    pub const fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn fingerprint(&self, statement: &str) -> Fingerprint {
        Fingerprint(self.algorithm.digest_hex(normalize(statement).as_bytes()))
    }
}

/// Drop all whitespace and fold to lower case
pub fn normalize(statement: &str) -> String {
    statement
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Fingerprint with the default algorithm (SHA-512)
pub fn fingerprint(statement: &str) -> Fingerprint {
    Fingerprinter::default().fingerprint(statement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let a = fingerprint("SELECT 6 + 6 AS solution");
        let b = fingerprint("select 6+6\n\tas   SOLUTION");
        assert_eq!(a, b);
    }

    #[test]
    fn test_literal_change_changes_fingerprint() {
        assert_ne!(
            fingerprint("SELECT * FROM t WHERE id = 1"),
            fingerprint("SELECT * FROM t WHERE id = 2")
        );
    }

    #[test]
    fn test_known_sha512_vector() {
        // sha512("abc")
        let expected = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                        2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";
        assert_eq!(fingerprint(" A B C ").as_str(), expected);
    }

    #[test]
    fn test_hex_lengths() {
        for algorithm in [
            DigestAlgorithm::Sha512,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha224,
            DigestAlgorithm::Md5,
        ] {
            let fp = Fingerprinter::new(algorithm).fingerprint("select 1");
            assert_eq!(fp.as_str().len(), algorithm.hex_len());
            assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("SHA-256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!("sha512".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha512);
        assert_eq!("MD5".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Md5);
        assert!(matches!(
            "sha1".parse::<DigestAlgorithm>(),
            Err(ConfigError::UnsupportedDigest(_))
        ));
    }

    #[test]
    fn test_known_md5_vector() {
        // md5("abc")
        let fp = Fingerprinter::new(DigestAlgorithm::Md5).fingerprint("A b C");
        assert_eq!(fp.as_str(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_short_form() {
        let fp = fingerprint("select 1");
        assert_eq!(fp.short().len(), SHORT_LEN);
        assert!(fp.as_str().starts_with(fp.short()));
    }
}

pub mod base32;
mod bits;
pub mod hotp;
pub mod totp;
pub mod uri_helper;

use core::num;
use std::{borrow::Cow, fmt::Display, str::FromStr, time::SystemTimeError};

use base32::DecodeError;

pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u64 = 30;
pub const MIN_DIGITS: u32 = 1;
pub const MAX_DIGITS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("Secret was declared as base32 but could not be decoded")]
    EncodingMismatch(#[from] DecodeError),
    #[error("Invalid period, found {0}. The period must be greater than zero")]
    InvalidPeriod(u64),
    #[error("Invalid digit count, found {0}. Expected a value between 1 and 10")]
    InvalidDigitCount(u32),
    #[error("Unsupported hashing algorithm, found {0}. Expected one of: SHA1, SHA256 or SHA512")]
    UnsupportedAlgorithm(String),
    #[error("Unknown secret encoding, found {0}. Expected one of: none or base32")]
    UnknownEncoding(String),
    #[error("Could not compute a usable HMAC digest")]
    InvalidDigest,
    #[error("The provided URI is not valid, found {0}. Expected: {1}")]
    InvalidUriType(String, String),
    #[error("Could not parse the URI")]
    UriParseError(#[source] url::ParseError),
    #[error("Could not retrieve the secret from the URI")]
    UriMissingSecret,
    #[error("Could not retrieve the counter from the URI")]
    UriMissingHotpCounter,
    #[error("Could not parse an integer. Failed parsing: {1}")]
    IntegerParseError(#[source] num::ParseIntError, String),
    #[error("The system clock is set before the UNIX epoch")]
    SystemTime(#[from] SystemTimeError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpHashAlgorithm {
    #[default]
    SHA1,
    SHA256,
    SHA512,
}

impl Display for OtpHashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SHA1 => write!(f, "SHA1"),
            Self::SHA256 => write!(f, "SHA256"),
            Self::SHA512 => write!(f, "SHA512"),
        }
    }
}

impl FromStr for OtpHashAlgorithm {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_uppercase();

        match normalized.as_str() {
            "SHA1" => Ok(Self::SHA1),
            "SHA256" => Ok(Self::SHA256),
            "SHA512" => Ok(Self::SHA512),
            _ => Err(OtpError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// How a textual secret is stored. Never guessed from the payload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    /// The text is used as-is, its UTF-8 bytes are the key
    #[default]
    None,
    /// The text is RFC4648 base32
    Base32,
}

impl Display for SecretEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Base32 => write!(f, "base32"),
        }
    }
}

impl FromStr for SecretEncoding {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "base32" => Ok(Self::Base32),
            _ => Err(OtpError::UnknownEncoding(s.to_string())),
        }
    }
}

/// A shared secret tagged with its encoding.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    Raw(Vec<u8>),
    Base32(String),
}

impl Secret {
    /// Wraps a textual secret according to the declared encoding
    pub fn new(value: impl Into<String>, encoding: SecretEncoding) -> Self {
        let value = value.into();

        match encoding {
            SecretEncoding::None => Self::Raw(value.into_bytes()),
            SecretEncoding::Base32 => Self::Base32(value),
        }
    }

    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Raw(bytes.into())
    }

    pub fn base32(text: impl Into<String>) -> Self {
        Self::Base32(text.into())
    }

    pub fn encoding(&self) -> SecretEncoding {
        match self {
            Self::Raw(_) => SecretEncoding::None,
            Self::Base32(_) => SecretEncoding::Base32,
        }
    }

    /// Resolves the secret to the key bytes fed to the HMAC.
    ///
    /// Fails with [`OtpError::EncodingMismatch`] when a base32 secret does not decode.
    pub fn to_bytes(&self) -> Result<Cow<'_, [u8]>, OtpError> {
        match self {
            Self::Raw(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Self::Base32(text) => Ok(Cow::Owned(base32::decode(text)?)),
        }
    }

    /// Canonical unpadded uppercase base32, as authenticator apps expect it
    pub fn to_base32(&self) -> Result<String, OtpError> {
        let encoded = base32::encode(&self.to_bytes()?);

        Ok(encoded.trim_end_matches('=').to_string())
    }
}

// Key material never ends up in logs or panic messages
impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(_) => f.debug_tuple("Raw").field(&"<redacted>").finish(),
            Self::Base32(_) => f.debug_tuple("Base32").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OtpCode {
    code: u32,
    digits: u32,
}

impl OtpCode {
    pub fn integer(&self) -> u32 {
        self.code
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }
}

impl Display for OtpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:0padding$}",
            self.code,
            padding = (self.digits as usize)
        )
    }
}

pub trait Otp {
    fn to_uri(&self, user: &str, issuer: Option<&str>) -> Result<String, OtpError>;
    fn from_uri(uri: &str) -> Result<Self, OtpError>
    where
        Self: std::marker::Sized;
}

use hmac::{digest::KeyInit, Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::{
    uri_helper::{self, otp_to_uri, OtpType, OtpUriInput},
    Otp, OtpCode, OtpError, OtpHashAlgorithm, Secret, DEFAULT_DIGITS, MAX_DIGITS, MIN_DIGITS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Hotp {
    pub(crate) secret: Secret,
    pub(crate) algorithm: OtpHashAlgorithm,
    // How many digits to generate
    pub(crate) digits: u32,
    // The internal counter, used to generate the URI
    pub(crate) counter: u64,
}

impl Otp for Hotp {
    fn to_uri(&self, user: &str, issuer: Option<&str>) -> Result<String, OtpError> {
        otp_to_uri(OtpUriInput::Hotp(self), user, issuer)
    }

    fn from_uri(uri: &str) -> Result<Self, OtpError> {
        match uri_helper::otp_from_uri(uri, OtpType::Hotp)? {
            uri_helper::OtpUriResult::Hotp(r) => Ok(r),
            uri_helper::OtpUriResult::Totp(_) => Err(OtpError::InvalidUriType(
                "totp".into(),
                "hotp".into(),
            )),
        }
    }
}

impl Hotp {
    /// Creates the config for the [HMAC-based One-time Password Algorithm](http://en.wikipedia.org/wiki/HMAC-based_One-time_Password_Algorithm)
    /// (HOTP) for the given secret
    ///
    /// Obs.: This method defaults to a 6-digit code.
    pub fn new(secret: Secret, algorithm: OtpHashAlgorithm) -> Self {
        Self {
            secret,
            algorithm,
            digits: DEFAULT_DIGITS,
            counter: 0,
        }
    }

    ///  Sets the number of digits to generate
    pub fn with_digits(&mut self, digits: u32) -> &mut Self {
        self.digits = digits;

        self
    }

    ///  Sets the internal counter
    pub fn with_counter(&mut self, counter: u64) -> &mut Self {
        self.counter = counter;

        self
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Generates a HOTP from the provided counter
    /// truncated to the specified number of digits
    pub fn generate(&self, counter: u64) -> Result<OtpCode, OtpError> {
        hotp(&self.secret.to_bytes()?, counter, self.digits, self.algorithm)
    }

    /// Generates a HOTP from the provided counter
    /// truncated to the specified number of digits
    ///
    /// Also updates the internal counter
    pub fn generate_and_update_counter(&mut self, counter: u64) -> Result<OtpCode, OtpError> {
        self.with_counter(counter);
        self.generate(counter)
    }
}

/// Computes the RFC4226 code for `counter` keyed by the raw `secret` bytes.
///
/// Pure: the same inputs always give the same code.
pub fn hotp(
    secret: &[u8],
    counter: u64,
    digits: u32,
    algorithm: OtpHashAlgorithm,
) -> Result<OtpCode, OtpError> {
    validate_digits(digits)?;

    let digest = calc_digest(secret, algorithm, counter)?;
    let code = truncate(&digest, digits)?;

    Ok(OtpCode { code, digits })
}

pub(crate) fn validate_digits(digits: u32) -> Result<(), OtpError> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(OtpError::InvalidDigitCount(digits));
    }

    Ok(())
}

/// Calculates the HMAC of the big-endian counter, keyed by the secret.
///
/// The digest is 20, 32 or 64 bytes long depending on the algorithm.
pub fn calc_digest(
    secret: &[u8],
    algorithm: OtpHashAlgorithm,
    counter: u64,
) -> Result<Vec<u8>, OtpError> {
    let data = counter.to_be_bytes();

    match algorithm {
        OtpHashAlgorithm::SHA1 => sign::<Hmac<Sha1>>(secret, &data),
        OtpHashAlgorithm::SHA256 => sign::<Hmac<Sha256>>(secret, &data),
        OtpHashAlgorithm::SHA512 => sign::<Hmac<Sha512>>(secret, &data),
    }
}

fn sign<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, OtpError> {
    let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|_| OtpError::InvalidDigest)?;
    mac.update(data);

    Ok(mac.finalize().into_bytes().to_vec())
}

/// Dynamic truncation (RFC4226 section 5.3) reduced to `digits` decimal digits.
pub fn truncate(digest: &[u8], digits: u32) -> Result<u32, OtpError> {
    validate_digits(digits)?;

    // While sometimes this is a hardcoded 19
    // the last byte tells us the offset for any algorithm
    let offset = match digest.last() {
        Some(x) => *x & 0xf,
        None => return Err(OtpError::InvalidDigest),
    } as usize;

    // Gets the 4 bytes that will compose the code
    let code_bytes: [u8; 4] = match digest.get(offset..offset + 4).map(<[u8; 4]>::try_from) {
        Some(Ok(x)) => x,
        _ => return Err(OtpError::InvalidDigest),
    };

    // Dropping the top bit leaves a 31-bit value, so the result fits in a u32
    let code = u64::from(u32::from_be_bytes(code_bytes) & 0x7fff_ffff);
    let truncation_factor = 10u64.pow(digits);

    Ok((code % truncation_factor) as u32)
}

use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;

use crate::{
    hotp::{hotp, validate_digits},
    uri_helper::{self, otp_to_uri, OtpType, OtpUriInput},
    Otp, OtpCode, OtpError, OtpHashAlgorithm, Secret, DEFAULT_DIGITS, DEFAULT_PERIOD,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Totp {
    pub(crate) secret: Secret,
    pub(crate) algorithm: OtpHashAlgorithm,
    pub(crate) period: u64,
    pub(crate) digits: u32,
}

impl Otp for Totp {
    fn to_uri(&self, user: &str, issuer: Option<&str>) -> Result<String, OtpError> {
        otp_to_uri(OtpUriInput::Totp(self), user, issuer)
    }

    fn from_uri(uri: &str) -> Result<Self, OtpError> {
        match uri_helper::otp_from_uri(uri, OtpType::Totp)? {
            uri_helper::OtpUriResult::Totp(r) => Ok(r),
            uri_helper::OtpUriResult::Hotp(_) => Err(OtpError::InvalidUriType(
                "hotp".into(),
                "totp".into(),
            )),
        }
    }
}

impl Totp {
    /// Creates the config for the [Time-based One-time Password Algorithm](http://en.wikipedia.org/wiki/Time-based_One-time_Password_Algorithm)
    /// (TOTP) for the given secret
    ///
    /// Obs.: This method defaults to the SHA1 hash, a 6-digit code and a period of 30 seconds
    pub fn new(secret: Secret) -> Self {
        Self {
            secret,
            algorithm: OtpHashAlgorithm::SHA1,
            period: DEFAULT_PERIOD,
            digits: DEFAULT_DIGITS,
        }
    }

    ///  Sets hashing algorithm
    pub fn with_algorithm(&mut self, algorithm: OtpHashAlgorithm) -> &mut Self {
        self.algorithm = algorithm;

        self
    }

    ///  Sets the period in seconds
    pub fn with_period(&mut self, period: u64) -> &mut Self {
        self.period = period;

        self
    }

    ///  Sets the number of digits to generate
    pub fn with_digits(&mut self, digits: u32) -> &mut Self {
        self.digits = digits;

        self
    }

    /// Generates a TOTP from the provided seconds since the UNIX epoch
    /// truncated to the specified number of digits
    pub fn generate(&self, seconds_since_epoch: u64) -> Result<OtpCode, OtpError> {
        generate(
            &self.secret,
            self.period,
            self.digits,
            self.algorithm,
            Some(seconds_since_epoch),
        )
    }

    /// Generates a TOTP for the current system time
    pub fn generate_now(&self) -> Result<OtpCode, OtpError> {
        generate(&self.secret, self.period, self.digits, self.algorithm, None)
    }

    /// Checks a code against the time step of `seconds_since_epoch`
    /// and `window` steps on either side of it
    pub fn verify(
        &self,
        candidate: &str,
        seconds_since_epoch: u64,
        window: u32,
    ) -> Result<bool, OtpError> {
        verify(
            &self.secret,
            candidate,
            self.period,
            self.digits,
            self.algorithm,
            Some(seconds_since_epoch),
            window,
        )
    }

    /// Validates a code in the given window
    /// Returning the time step offset it was found at or None if the code is invalid
    ///
    /// Obs.: the RFC recommends a window of 1 frame in the future and 1 in the past,
    /// but this function accepts any window you would like
    pub fn verify_window(
        &self,
        candidate: &str,
        seconds_since_epoch: u64,
        window: u32,
    ) -> Result<Option<i64>, OtpError> {
        verify_window(
            &self.secret,
            candidate,
            self.period,
            self.digits,
            self.algorithm,
            Some(seconds_since_epoch),
            window,
        )
    }

    /// Seconds left before the code for `seconds_since_epoch` expires
    pub fn remaining_seconds(&self, seconds_since_epoch: u64) -> Result<u64, OtpError> {
        remaining_seconds(seconds_since_epoch, self.period)
    }
}

/// Index of the time step containing `seconds_since_epoch`
pub fn counter_from_time(seconds_since_epoch: u64, period: u64) -> Result<u64, OtpError> {
    if period == 0 {
        return Err(OtpError::InvalidPeriod(period));
    }

    Ok(seconds_since_epoch / period)
}

pub fn remaining_seconds(seconds_since_epoch: u64, period: u64) -> Result<u64, OtpError> {
    if period == 0 {
        return Err(OtpError::InvalidPeriod(period));
    }

    Ok(period - seconds_since_epoch % period)
}

/// Resolves an optional caller time, falling back to the system clock
fn resolve_time(time: Option<u64>) -> Result<u64, OtpError> {
    match time {
        Some(seconds) => Ok(seconds),
        None => Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs()),
    }
}

/// Generates the code for `time`, or for now when no time is given
pub fn generate(
    secret: &Secret,
    period: u64,
    digits: u32,
    algorithm: OtpHashAlgorithm,
    time: Option<u64>,
) -> Result<OtpCode, OtpError> {
    let key = secret.to_bytes()?;
    let counter = counter_from_time(resolve_time(time)?, period)?;

    hotp(&key, counter, digits, algorithm)
}

/// Checks `candidate` against the codes of the current time step
/// and `window` steps before and after it
pub fn verify(
    secret: &Secret,
    candidate: &str,
    period: u64,
    digits: u32,
    algorithm: OtpHashAlgorithm,
    time: Option<u64>,
    window: u32,
) -> Result<bool, OtpError> {
    verify_window(secret, candidate, period, digits, algorithm, time, window)
        .map(|offset| offset.is_some())
}

/// Like [`verify`], but reports the matching time step offset.
///
/// Negative offsets are in the past. Steps are checked nearest first.
pub fn verify_window(
    secret: &Secret,
    candidate: &str,
    period: u64,
    digits: u32,
    algorithm: OtpHashAlgorithm,
    time: Option<u64>,
    window: u32,
) -> Result<Option<i64>, OtpError> {
    validate_digits(digits)?;

    let key = secret.to_bytes()?;
    let counter = counter_from_time(resolve_time(time)?, period)?;

    let window = i64::from(window);
    let offsets = std::iter::once(0).chain((1..=window).flat_map(|i| [-i, i]));

    for offset in offsets {
        let Some(step) = counter.checked_add_signed(offset) else {
            tracing::trace!(offset, "time step out of range, skipping");
            continue;
        };

        let expected = hotp(&key, step, digits, algorithm)?;
        tracing::trace!(offset, step, "comparing against time step");

        let matches: bool = expected.to_string().as_bytes().ct_eq(candidate.as_bytes()).into();
        if matches {
            tracing::debug!(offset, "code accepted");
            return Ok(Some(offset));
        }
    }

    tracing::debug!(window, "code rejected");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use crate::{
        totp::{counter_from_time, generate, remaining_seconds, verify, verify_window, Totp},
        Otp, OtpError, OtpHashAlgorithm, Secret, SecretEncoding,
    };

    #[fixture]
    #[once]
    pub fn sha1_secret() -> String {
        "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string()
    }

    #[fixture]
    #[once]
    pub fn sha256_secret() -> String {
        "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZA".to_string()
    }

    #[fixture]
    #[once]
    pub fn sha512_secret() -> String {
        "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZDGNA".to_string()
    }

    #[fixture]
    pub fn rfc_secret() -> Secret {
        Secret::new("12345678901234567890", SecretEncoding::None)
    }

    fn epoch(timestamp: &str) -> u64 {
        timestamp.parse::<DateTime<Utc>>().unwrap().timestamp() as u64
    }

    #[rstest]
    #[case(sha1_secret(), "sha1", 59, "94287082")]
    #[case(sha256_secret(), "sha256", 59, "46119246")]
    #[case(sha512_secret(), "sha512", 59, "90693936")]
    #[case(sha1_secret(), "sha1", 1111111109, "07081804")]
    #[case(sha256_secret(), "sha256", 1111111109, "68084774")]
    #[case(sha512_secret(), "sha512", 1111111109, "25091201")]
    #[case(sha1_secret(), "sha1", 1111111111, "14050471")]
    #[case(sha256_secret(), "sha256", 1111111111, "67062674")]
    #[case(sha512_secret(), "sha512", 1111111111, "99943326")]
    #[case(sha1_secret(), "sha1", 1234567890, "89005924")]
    #[case(sha256_secret(), "sha256", 1234567890, "91819424")]
    #[case(sha512_secret(), "sha512", 1234567890, "93441116")]
    #[case(sha1_secret(), "sha1", 2000000000, "69279037")]
    #[case(sha256_secret(), "sha256", 2000000000, "90698825")]
    #[case(sha512_secret(), "sha512", 2000000000, "38618901")]
    #[case(sha1_secret(), "sha1", 20000000000, "65353130")]
    #[case(sha256_secret(), "sha256", 20000000000, "77737706")]
    #[case(sha512_secret(), "sha512", 20000000000, "47863826")]
    #[case(sha1_secret(), "sha1", 20000000000, "353130")]
    #[case(sha256_secret(), "sha256", 20000000000, "737706")]
    #[case(sha512_secret(), "sha512", 20000000000, "863826")]
    fn totp_test(
        #[case] secret: String,
        #[case] hash: OtpHashAlgorithm,
        #[case] timestamp: u64,
        #[case] expected: &str,
    ) {
        let mut totp_base = Totp::new(Secret::base32(secret));
        totp_base
            .with_algorithm(hash)
            .with_digits(expected.len() as u32);

        let generated_otp = totp_base.generate(timestamp).unwrap();
        assert_eq!(expected, generated_otp.to_string());
    }

    #[rstest]
    #[case("1970-01-01T00:00:59Z", 30, 8, "94287082")]
    #[case("2005-03-18T01:58:29Z", 30, 8, "07081804")]
    #[case("2005-03-18T01:58:31Z", 30, 8, "14050471")]
    #[case("2009-02-13T23:31:30Z", 30, 8, "89005924")]
    #[case("2033-05-18T03:33:20Z", 30, 8, "69279037")]
    #[case("2603-10-11T11:33:20Z", 30, 8, "65353130")]
    #[case("1970-01-01T00:00:59Z", 30, 6, "287082")]
    #[case("2005-03-18T01:58:29Z", 30, 6, "081804")]
    #[case("2005-03-18T01:58:29Z", 60, 6, "360094")]
    fn raw_secret_vectors(
        rfc_secret: Secret,
        #[case] timestamp: &str,
        #[case] period: u64,
        #[case] digits: u32,
        #[case] expected: &str,
    ) {
        let time = Some(epoch(timestamp));

        let code = generate(&rfc_secret, period, digits, OtpHashAlgorithm::SHA1, time).unwrap();
        assert_eq!(expected, code.to_string());

        let verified = verify(
            &rfc_secret,
            expected,
            period,
            digits,
            OtpHashAlgorithm::SHA1,
            time,
            0,
        )
        .unwrap();
        assert!(verified);
    }

    #[test]
    fn lowercase_base32_secret() {
        let secret = Secret::new("vmlhl2knm27eftq7", SecretEncoding::Base32);
        let time = Some(epoch("2020-02-05T22:11:40.56915Z"));

        let code = generate(&secret, 30, 6, OtpHashAlgorithm::SHA1, time).unwrap();
        assert_eq!("295485", code.to_string());
        assert!(verify(&secret, "295485", 30, 6, OtpHashAlgorithm::SHA1, time, 0).unwrap());
    }

    #[rstest]
    #[case("2018-12-04T20:24:20+08:00", 30, 51464208)]
    #[case("1970-01-01T00:00:59Z", 30, 1)]
    #[case("2603-10-11T11:33:20Z", 30, 666666666)]
    #[case("2603-10-11T11:33:20Z", 1, 20000000000)]
    fn counter_from_timestamps(
        #[case] timestamp: &str,
        #[case] period: u64,
        #[case] expected: u64,
    ) {
        assert_eq!(expected, counter_from_time(epoch(timestamp), period).unwrap());
    }

    #[rstest]
    fn zero_period_is_rejected(rfc_secret: Secret) {
        assert!(matches!(
            counter_from_time(59, 0),
            Err(OtpError::InvalidPeriod(0))
        ));
        assert!(matches!(
            generate(&rfc_secret, 0, 6, OtpHashAlgorithm::SHA1, Some(59)),
            Err(OtpError::InvalidPeriod(0))
        ));
        assert!(matches!(
            verify(&rfc_secret, "287082", 0, 6, OtpHashAlgorithm::SHA1, Some(59), 1),
            Err(OtpError::InvalidPeriod(0))
        ));
        assert!(matches!(
            verify_window(&rfc_secret, "287082", 0, 6, OtpHashAlgorithm::SHA1, Some(59), 0),
            Err(OtpError::InvalidPeriod(0))
        ));
    }

    #[rstest]
    #[case(0)]
    #[case(11)]
    #[case(20)]
    fn verification_rejects_unsupported_digit_counts(rfc_secret: Secret, #[case] digits: u32) {
        assert!(matches!(
            verify(&rfc_secret, "287082", 30, digits, OtpHashAlgorithm::SHA1, Some(59), 1),
            Err(OtpError::InvalidDigitCount(d)) if d == digits
        ));
        assert!(matches!(
            verify_window(&rfc_secret, "287082", 30, digits, OtpHashAlgorithm::SHA1, Some(59), 0),
            Err(OtpError::InvalidDigitCount(d)) if d == digits
        ));
    }

    #[rstest]
    fn wrong_length_candidate_never_matches(rfc_secret: Secret) {
        assert_eq!(
            None,
            verify_window(&rfc_secret, "2870820", 30, 6, OtpHashAlgorithm::SHA1, Some(59), 1)
                .unwrap()
        );
        assert_eq!(
            None,
            verify_window(&rfc_secret, "", 30, 6, OtpHashAlgorithm::SHA1, Some(59), 1).unwrap()
        );
    }

    #[rstest]
    fn altered_code_is_rejected(rfc_secret: Secret) {
        assert!(!verify(&rfc_secret, "94287083", 30, 8, OtpHashAlgorithm::SHA1, Some(59), 0).unwrap());
        assert!(!verify(&rfc_secret, "04287082", 30, 8, OtpHashAlgorithm::SHA1, Some(59), 0).unwrap());
        assert!(!verify(&rfc_secret, "4287082", 30, 8, OtpHashAlgorithm::SHA1, Some(59), 0).unwrap());
    }

    #[rstest]
    fn window_accepts_adjacent_steps(rfc_secret: Secret) {
        let now = 1111111109;
        let previous = generate(&rfc_secret, 30, 6, OtpHashAlgorithm::SHA1, Some(now - 30))
            .unwrap()
            .to_string();
        let next = generate(&rfc_secret, 30, 6, OtpHashAlgorithm::SHA1, Some(now + 30))
            .unwrap()
            .to_string();

        let check = |code: &str, window| {
            verify_window(&rfc_secret, code, 30, 6, OtpHashAlgorithm::SHA1, Some(now), window)
                .unwrap()
        };

        assert_eq!(None, check(&previous, 0));
        assert_eq!(Some(-1), check(&previous, 1));
        assert_eq!(None, check(&next, 0));
        assert_eq!(Some(1), check(&next, 1));
        assert_eq!(Some(0), check("081804", 2));
    }

    #[rstest]
    fn window_does_not_underflow_at_epoch(rfc_secret: Secret) {
        let code = generate(&rfc_secret, 30, 6, OtpHashAlgorithm::SHA1, Some(0))
            .unwrap()
            .to_string();

        assert_eq!(
            Some(0),
            verify_window(&rfc_secret, &code, 30, 6, OtpHashAlgorithm::SHA1, Some(0), 3).unwrap()
        );
    }

    #[rstest]
    fn defaults_to_current_time(rfc_secret: Secret) {
        let code = generate(&rfc_secret, 30, 6, OtpHashAlgorithm::SHA1, None)
            .unwrap()
            .to_string();

        // A step boundary may pass between the two calls
        assert!(verify(&rfc_secret, &code, 30, 6, OtpHashAlgorithm::SHA1, None, 1).unwrap());
    }

    #[test]
    fn mismatched_encoding_is_reported() {
        let secret = Secret::new("12345678901234567890", SecretEncoding::Base32);

        assert!(matches!(
            generate(&secret, 30, 6, OtpHashAlgorithm::SHA1, Some(59)),
            Err(OtpError::EncodingMismatch(_))
        ));
        assert!(matches!(
            verify(&secret, "287082", 30, 6, OtpHashAlgorithm::SHA1, Some(59), 1),
            Err(OtpError::EncodingMismatch(_))
        ));
    }

    #[rstest]
    #[case(59, 30, 1)]
    #[case(60, 30, 30)]
    #[case(1111111109, 60, 31)]
    fn remaining_time(#[case] time: u64, #[case] period: u64, #[case] expected: u64) {
        assert_eq!(expected, remaining_seconds(time, period).unwrap());

        let mut totp = Totp::new(Secret::raw(*b"12345678901234567890"));
        totp.with_period(period);
        assert_eq!(expected, totp.remaining_seconds(time).unwrap());
    }

    #[test]
    fn builder_verifies_its_own_codes() {
        let mut totp = Totp::new(Secret::base32(
            "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQGEZA",
        ));
        totp.with_algorithm(OtpHashAlgorithm::SHA256).with_digits(8);

        let code = totp.generate(1234567890).unwrap();
        assert_eq!("91819424", code.to_string());
        assert!(totp.verify("91819424", 1234567890, 0).unwrap());
        assert_eq!(Some(-1), totp.verify_window("91819424", 1234567920, 1).unwrap());
        assert_eq!(code.to_string().len(), totp.generate_now().unwrap().to_string().len());
    }

    #[rstest]
    #[case("sha1", 6, 30,
        "otpauth://totp/ACME%20Co:john.doe@email.com?secret=HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ&issuer=ACME+Co&algorithm=SHA1&digits=6&period=30")]
    #[case("sha256", 8, 30,
        "otpauth://totp/ACME%20Co:john.doe@email.com?secret=HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ&issuer=ACME+Co&algorithm=SHA256&digits=8&period=30")]
    #[case("sha512", 6, 10,
        "otpauth://totp/ACME%20Co:john.doe@email.com?secret=HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ&issuer=ACME+Co&algorithm=SHA512&digits=6&period=10")]
    fn to_uri_test(
        #[case] hash: OtpHashAlgorithm,
        #[case] digits: u32,
        #[case] period: u64,
        #[case] expected: &str,
    ) {
        let mut totp_base = Totp::new(Secret::base32("HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ"));
        totp_base
            .with_algorithm(hash)
            .with_period(period)
            .with_digits(digits);

        let generated_uri = totp_base
            .to_uri("john.doe@email.com", Some("ACME Co"))
            .unwrap();

        assert_eq!(expected, generated_uri)
    }

    #[rstest]
    #[case("sha1", 6, 30,
        "otpauth://totp/ACME%20Co:john.doe@email.com?secret=HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ&issuer=ACME%20Co&algorithm=SHA1&digits=6&period=30")]
    #[case("sha256", 8, 30,
        "otpauth://totp/ACME%20Co:john.doe@email.com?secret=HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ&issuer=ACME+Co&algorithm=SHA256&digits=8&period=30")]
    #[case("sha512", 6, 10,
        "otpauth://totp/ACME%20Co:john.doe@email.com?secret=HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ&issuer=ACME%20Co&algorithm=SHA512&digits=6&period=10")]
    fn from_uri_test(
        #[case] hash: OtpHashAlgorithm,
        #[case] digits: u32,
        #[case] period: u64,
        #[case] input_uri: &str,
    ) {
        let mut expected_totp = Totp::new(Secret::base32("HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ"));
        expected_totp
            .with_algorithm(hash)
            .with_period(period)
            .with_digits(digits);

        let totp_base = Totp::from_uri(input_uri).unwrap();

        assert_eq!(expected_totp, totp_base);
        assert_eq!(
            expected_totp.generate(0).unwrap(),
            totp_base.generate(0).unwrap()
        );
    }

    #[test]
    fn from_uri_rejects_hotp() {
        assert!(matches!(
            Totp::from_uri("otpauth://hotp/alice?secret=HXDMVJECJJWSRB3HWIZR4IFUGFTMXBOZ&counter=1"),
            Err(OtpError::InvalidUriType(_, _))
        ));
    }
}

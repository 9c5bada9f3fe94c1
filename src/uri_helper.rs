use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{hotp::Hotp, totp::Totp, OtpError, OtpHashAlgorithm, Secret};

const TOTP_TYPE: &str = "totp";
const HOTP_TYPE: &str = "hotp";

const URI_SECRET_QUERY: &str = "secret";
const URI_ISSUER_QUERY: &str = "issuer";
const URI_HASH_QUERY: &str = "algorithm";
const URI_PERIOD_QUERY: &str = "period";
const URI_COUNTER_QUERY: &str = "counter";
const URI_DIGITS_QUERY: &str = "digits";

/// Everything outside the RFC3986 unreserved set
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `issuer:account` labels sit in a path segment, where `:` and `@` are legal
const LABEL: &AsciiSet = &COMPONENT.remove(b':').remove(b'@');

/// Whole URIs keep their reserved delimiters
const URI: &AsciiSet = &COMPONENT
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

pub enum OtpType {
    Totp,
    Hotp,
}

pub enum OtpUriResult {
    Totp(Totp),
    Hotp(Hotp),
}

#[derive(Clone, Copy)]
pub enum OtpUriInput<'a> {
    Totp(&'a Totp),
    Hotp(&'a Hotp),
}

/// Percent-encodes a whole URI, escaping only characters that have no
/// meaning in one (non-ASCII text, spaces, quotes, ...)
pub fn url_encode(input: &str) -> String {
    utf8_percent_encode(input, URI).to_string()
}

/// Minimal `otpauth://totp/` URI for a base32 secret.
///
/// Digits and algorithm are left to the authenticator's defaults, use
/// [`ProvisioningUri`] to spell them out.
pub fn build_provisioning_uri(label: &str, secret: &str, period: u64, issuer: &str) -> String {
    ProvisioningUri::new(label, secret, period, issuer).build()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningUri<'a> {
    label: &'a str,
    secret: &'a str,
    period: u64,
    issuer: &'a str,
    digits: Option<u32>,
    algorithm: Option<OtpHashAlgorithm>,
}

impl<'a> ProvisioningUri<'a> {
    pub fn new(label: &'a str, secret: &'a str, period: u64, issuer: &'a str) -> Self {
        Self {
            label,
            secret,
            period,
            issuer,
            digits: None,
            algorithm: None,
        }
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = Some(digits);

        self
    }

    pub fn with_algorithm(mut self, algorithm: OtpHashAlgorithm) -> Self {
        self.algorithm = Some(algorithm);

        self
    }

    pub fn build(&self) -> String {
        let mut uri = format!(
            "otpauth://{TOTP_TYPE}/{}?{URI_SECRET_QUERY}={}&{URI_PERIOD_QUERY}={}&{URI_ISSUER_QUERY}={}",
            utf8_percent_encode(self.label, LABEL),
            utf8_percent_encode(self.secret, COMPONENT),
            self.period,
            utf8_percent_encode(self.issuer, COMPONENT),
        );

        if let Some(digits) = self.digits {
            uri.push_str(&format!("&{URI_DIGITS_QUERY}={digits}"));
        }

        if let Some(algorithm) = self.algorithm {
            uri.push_str(&format!("&{URI_HASH_QUERY}={algorithm}"));
        }

        uri
    }
}

pub fn otp_from_uri(uri: &str, otp_type: OtpType) -> Result<OtpUriResult, OtpError> {
    let uri = url::Url::parse(uri).map_err(OtpError::UriParseError)?;

    let otp_type_str = match otp_type {
        OtpType::Totp => TOTP_TYPE,
        OtpType::Hotp => HOTP_TYPE,
    };

    let domain = uri.domain();
    if domain != Some(otp_type_str) {
        return Err(OtpError::InvalidUriType(
            domain.unwrap_or("None").into(),
            otp_type_str.into(),
        ));
    }

    let mut secret = None;
    let mut algorithm = OtpHashAlgorithm::default();
    let mut period = crate::DEFAULT_PERIOD;
    let mut counter = None;
    let mut digits = crate::DEFAULT_DIGITS;

    for (key, value) in uri.query_pairs() {
        match key.as_ref() {
            URI_SECRET_QUERY => secret = Some(value.to_string()).filter(|s| !s.is_empty()),
            URI_HASH_QUERY => algorithm = value.parse()?,
            URI_PERIOD_QUERY => {
                period = value
                    .parse()
                    .map_err(|e| OtpError::IntegerParseError(e, URI_PERIOD_QUERY.into()))?
            }
            URI_DIGITS_QUERY => {
                digits = value
                    .parse()
                    .map_err(|e| OtpError::IntegerParseError(e, URI_DIGITS_QUERY.into()))?
            }
            URI_COUNTER_QUERY => {
                counter = Some(
                    value
                        .parse()
                        .map_err(|e| OtpError::IntegerParseError(e, URI_COUNTER_QUERY.into()))?,
                )
            }
            _ => (),
        }
    }

    let secret = Secret::Base32(secret.ok_or(OtpError::UriMissingSecret)?);

    match otp_type {
        OtpType::Totp => Ok(OtpUriResult::Totp(Totp {
            secret,
            algorithm,
            period,
            digits,
        })),
        OtpType::Hotp => Ok(OtpUriResult::Hotp(Hotp {
            secret,
            algorithm,
            counter: counter.ok_or(OtpError::UriMissingHotpCounter)?,
            digits,
        })),
    }
}

pub fn otp_to_uri(
    input: OtpUriInput,
    user: &str,
    issuer: Option<&str>,
) -> Result<String, OtpError> {
    let (otp_uri_type, secret, algorithm, digits) = match input {
        OtpUriInput::Totp(inner) => (TOTP_TYPE, &inner.secret, inner.algorithm, inner.digits),
        OtpUriInput::Hotp(inner) => (HOTP_TYPE, &inner.secret, inner.algorithm, inner.digits),
    };

    let mut uri =
        url::Url::parse(&format!("otpauth://{otp_uri_type}/")).map_err(OtpError::UriParseError)?;

    let issuer = issuer.filter(|i| !i.is_empty());
    match issuer {
        Some(issuer) => uri.set_path(&format!("{issuer}:{user}")),
        None => uri.set_path(user),
    }

    {
        let mut query_params = uri.query_pairs_mut();

        query_params.append_pair(URI_SECRET_QUERY, &secret.to_base32()?);

        if let Some(issuer) = issuer {
            query_params.append_pair(URI_ISSUER_QUERY, issuer);
        }

        query_params
            .append_pair(URI_HASH_QUERY, &algorithm.to_string())
            .append_pair(URI_DIGITS_QUERY, &digits.to_string());

        match input {
            OtpUriInput::Totp(inner) => {
                query_params.append_pair(URI_PERIOD_QUERY, &inner.period.to_string())
            }
            OtpUriInput::Hotp(inner) => {
                query_params.append_pair(URI_COUNTER_QUERY, &inner.counter.to_string())
            }
        };
    }

    Ok(uri.to_string())
}

//! Access credential payload decoding
//!
//! Extracts expiry metadata from a JWT-shaped token (`header.payload.signature`).
//! The signature is never checked: the result is a scheduling hint, and the
//! server remains the only authority on whether a token is valid.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

/// URL-safe alphabet, padding optional (issuers disagree on whether to strip it).
/// Standard-alphabet input is folded onto it before decoding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from the token payload. Everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Expiration instant, seconds since the Unix epoch
    pub exp: i64,

    /// `"access"` or `"refresh"` on tokens minted by the API
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
}

impl Claims {
    /// Expiration instant in milliseconds since the Unix epoch
    pub fn exp_millis(&self) -> i64 {
        self.exp.saturating_mul(1000)
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("token has no payload segment")]
    MissingSegment,

    #[error("payload is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("payload is not a valid claims object: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Decode the payload segment of `token`.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let payload = token.split('.').nth(1).ok_or(DecodeError::MissingSegment)?;
    if payload.is_empty() {
        return Err(DecodeError::MissingSegment);
    }

    let payload: String = payload
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    let bytes = PAYLOAD_ENGINE.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mint_token;

    #[test]
    fn test_decode_valid_token() {
        let token = mint_token(1_700_000_000);
        let claims = decode(&token).unwrap();
        assert_eq!(claims.exp, 1_700_000_000);
        assert_eq!(claims.token_type.as_deref(), Some("access"));
        assert_eq!(claims.exp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_decode_url_safe_alphabet_and_padding() {
        let json = br#"{"exp":1,"n":">>>???"}"#;
        let unpadded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json);
        let padded = base64::engine::general_purpose::URL_SAFE.encode(json);
        assert!(unpadded.contains('-') && unpadded.contains('_'));

        assert_eq!(decode(&format!("h.{unpadded}.s")).unwrap().exp, 1);
        assert_eq!(decode(&format!("h.{padded}.s")).unwrap().exp, 1);
    }

    #[test]
    fn test_decode_standard_alphabet() {
        let json = br#"{"exp":1,"n":">>>???"}"#;
        let standard = base64::engine::general_purpose::STANDARD.encode(json);
        assert!(standard.contains('+') && standard.contains('/'));

        assert_eq!(decode(&format!("h.{standard}.s")).unwrap().exp, 1);
        assert_eq!(decode(&format!("h.{}.s", standard.trim_end_matches('='))).unwrap().exp, 1);
    }

    #[test]
    fn test_decode_missing_segment() {
        assert!(matches!(decode("no-dots-here"), Err(DecodeError::MissingSegment)));
        assert!(matches!(decode("header..sig"), Err(DecodeError::MissingSegment)));
        assert!(matches!(decode(""), Err(DecodeError::MissingSegment)));
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert!(matches!(decode("h.%%%%.s"), Err(DecodeError::InvalidEncoding(_))));
    }

    #[test]
    fn test_decode_invalid_json() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"not json");
        assert!(matches!(
            decode(&format!("h.{payload}.s")),
            Err(DecodeError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_decode_missing_exp() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(br#"{"user_id":7}"#);
        assert!(matches!(
            decode(&format!("h.{payload}.s")),
            Err(DecodeError::InvalidPayload(_))
        ));
    }
}

//! Wire-format boundary for compact signed data.
//!
//! Contract:
//! - segment splitting, base64url and JSON decoding only
//! - no trust decisions
//! - no identity policy

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CertificateError, DecodeError};

/// Signature algorithm accepted in the header.
pub const ALGORITHM_ES256: &str = "ES256";

/// Protected header of a signed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Signature algorithm (`ES256`).
    pub alg: String,

    /// Key id, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Certificate chain, leaf first, standard base64 DER.
    #[serde(default)]
    pub x5c: Vec<String>,
}

impl JwsHeader {
    /// Decode the `x5c` entries to DER.
    pub fn certificate_chain(&self) -> Result<Vec<Vec<u8>>, CertificateError> {
        self.x5c
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                BASE64.decode(entry).map_err(|e| {
                    CertificateError::malformed(format!("invalid base64 in x5c[{}]: {}", i, e))
                })
            })
            .collect()
    }
}

/// A parsed three-part signed envelope.
///
/// Parsing decodes only the payload; the header is decoded on demand so that
/// bypass environments never touch it.
#[derive(Debug, Clone)]
pub struct SignedEnvelope<'a> {
    header_segment: &'a str,
    payload_segment: &'a str,
    signature_segment: &'a str,
    payload: Value,
}

impl<'a> SignedEnvelope<'a> {
    /// Split `raw` and decode the payload segment.
    pub fn parse(raw: &'a str) -> Result<Self, DecodeError> {
        let parts: Vec<&str> = raw.trim().split('.').collect();
        let [header_segment, payload_segment, signature_segment] = parts[..] else {
            return Err(DecodeError::Structure { parts: parts.len() });
        };

        let payload = decode_json_segment(payload_segment, "payload")?;

        Ok(Self {
            header_segment,
            payload_segment,
            signature_segment,
            payload,
        })
    }

    /// Decoded, unverified payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Take ownership of the payload.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Decode the protected header.
    pub fn header(&self) -> Result<JwsHeader, DecodeError> {
        let bytes = decode_segment(self.header_segment, "header")?;
        serde_json::from_slice(&bytes).map_err(|source| DecodeError::Json {
            segment: "header",
            source,
        })
    }

    /// Bytes covered by the signature: `header "." payload` as transmitted.
    pub fn signing_input(&self) -> Vec<u8> {
        let mut input =
            Vec::with_capacity(self.header_segment.len() + 1 + self.payload_segment.len());
        input.extend_from_slice(self.header_segment.as_bytes());
        input.push(b'.');
        input.extend_from_slice(self.payload_segment.as_bytes());
        input
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> Result<Vec<u8>, DecodeError> {
        decode_segment(self.signature_segment, "signature")
    }
}

/// Base64url-decode a segment. Trailing padding is tolerated.
fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, DecodeError> {
    BASE64_URL
        .decode(segment.trim_end_matches('='))
        .map_err(|source| DecodeError::Base64 {
            segment: name,
            source,
        })
}

fn decode_json_segment(segment: &str, name: &'static str) -> Result<Value, DecodeError> {
    let bytes = decode_segment(segment, name)?;
    serde_json::from_slice(&bytes).map_err(|source| DecodeError::Json {
        segment: name,
        source,
    })
}

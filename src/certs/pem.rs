//! PEM certificate decoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const END: &str = "-----END CERTIFICATE-----";

/// Decode every `CERTIFICATE` block in `content` into DER bytes.
///
/// Text outside the blocks is ignored. Returns an error message for the
/// first block that is unterminated, not valid base64 or not a DER sequence.
pub fn decode_certificates(content: &str) -> Result<Vec<Vec<u8>>, String> {
    let mut certificates = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find(BEGIN) {
        let body = &rest[start + BEGIN.len()..];
        let Some(end) = body.find(END) else {
            return Err(format!("unterminated block after certificate {}", certificates.len()));
        };

        let encoded: String = body[..end].split_whitespace().collect();
        let der = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| format!("certificate {}: {}", certificates.len(), e))?;
        if der.first() != Some(&0x30) {
            return Err(format!(
                "certificate {} is not a DER sequence",
                certificates.len()
            ));
        }

        certificates.push(der);
        rest = &body[end + END.len()..];
    }

    Ok(certificates)
}

/// Encode DER bytes as a PEM `CERTIFICATE` block
pub fn encode_certificate(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::with_capacity(encoded.len() + 64);
    pem.push_str(BEGIN);
    pem.push('\n');
    for chunk in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(END);
    pem.push('\n');
    pem
}

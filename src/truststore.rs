//! Java trust store generation
//!
//! Builds a JKS key store holding the identity provider's host certificate so the
//! Engine's JVM can validate TLS connections to it. Layout follows the JKS v2
//! format: magic, version, entry count, entries, then a SHA-1 integrity digest
//! keyed by the store passphrase.

use base64::{Engine as _, engine::general_purpose};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use thiserror::Error;

/// Java key stores look aliases up in lowercase, so the stored alias is lowercase too.
pub const TRUSTSTORE_NAME: &str = "legend engine";
pub const TRUSTSTORE_PASSPHRASE: &str = "Legend Engine";

const JKS_MAGIC: u32 = 0xFEED_FEED;
const JKS_VERSION: u32 = 2;
const TAG_TRUSTED_CERT: u32 = 2;
const CERT_TYPE_X509: &str = "X.509";
const INTEGRITY_SALT: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;
/// Entry timestamps are pinned so identical certificates give identical stores.
const ENTRY_TIMESTAMP_MS: u64 = 0;

/// Failure to turn a relation-supplied certificate into a trust store.
#[derive(Debug, Error)]
pub enum BuildFailure {
    #[error("decode error")]
    Decode(#[source] base64::DecodeError),
    #[error("serialize error")]
    Serialize(String),
}

impl BuildFailure {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Failure to read back a JKS container.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrustStoreError {
    #[error("not a JKS key store")]
    BadMagic,
    #[error("unsupported JKS version {0}")]
    UnsupportedVersion(u32),
    #[error("key store is truncated")]
    Truncated,
    #[error("unsupported entry tag {0}")]
    UnsupportedEntry(u32),
    #[error("invalid entry text")]
    InvalidText,
    #[error("key store integrity check failed")]
    DigestMismatch,
}

/// One trusted certificate read from a key store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertEntry {
    pub alias: String,
    pub timestamp_ms: u64,
    pub cert_type: String,
    pub certificate: Vec<u8>,
}

/// Decodes `cert_b64` and wraps it in a trust store under the fixed alias and passphrase.
///
/// An empty certificate yields a valid store with no entries.
pub fn build_truststore(cert_b64: &str) -> Result<Vec<u8>, BuildFailure> {
    let certificate = decode_certificate(cert_b64)?;
    encode_truststore(&certificate, TRUSTSTORE_NAME, TRUSTSTORE_PASSPHRASE)
}

/// Decodes a standard base64 certificate into its DER bytes.
pub fn decode_certificate(cert_b64: &str) -> Result<Vec<u8>, BuildFailure> {
    general_purpose::STANDARD
        .decode(cert_b64.trim())
        .map_err(BuildFailure::Decode)
}

/// Serializes a JKS store containing at most one trusted certificate.
///
/// The alias is lowercased before it is written.
pub fn encode_truststore(
    certificate: &[u8],
    alias: &str,
    passphrase: &str,
) -> Result<Vec<u8>, BuildFailure> {
    let mut out = Vec::with_capacity(64 + certificate.len());
    out.extend_from_slice(&JKS_MAGIC.to_be_bytes());
    out.extend_from_slice(&JKS_VERSION.to_be_bytes());

    if certificate.is_empty() {
        out.extend_from_slice(&0u32.to_be_bytes());
    } else {
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&TAG_TRUSTED_CERT.to_be_bytes());
        write_utf(&mut out, &alias.to_lowercase())?;
        out.extend_from_slice(&ENTRY_TIMESTAMP_MS.to_be_bytes());
        write_utf(&mut out, CERT_TYPE_X509)?;
        let cert_len = u32::try_from(certificate.len()).map_err(|_| {
            BuildFailure::Serialize(format!(
                "certificate of {} bytes is too large",
                certificate.len()
            ))
        })?;
        out.extend_from_slice(&cert_len.to_be_bytes());
        out.extend_from_slice(certificate);
    }

    let digest = integrity_digest(passphrase, &out);
    out.extend_from_slice(&digest);
    Ok(out)
}

/// Parses a JKS store and verifies its digest, returning its trusted certificates.
pub fn read_truststore(
    bytes: &[u8],
    passphrase: &str,
) -> Result<Vec<TrustedCertEntry>, TrustStoreError> {
    if bytes.len() < 12 + DIGEST_LEN {
        return Err(TrustStoreError::Truncated);
    }
    let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);

    let mut reader = Reader { buf: body, pos: 0 };
    if reader.u32()? != JKS_MAGIC {
        return Err(TrustStoreError::BadMagic);
    }
    let version = reader.u32()?;
    if version != JKS_VERSION {
        return Err(TrustStoreError::UnsupportedVersion(version));
    }
    if integrity_digest(passphrase, body).as_slice() != digest {
        return Err(TrustStoreError::DigestMismatch);
    }

    let count = reader.u32()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        match reader.u32()? {
            TAG_TRUSTED_CERT => {
                let alias = reader.utf()?;
                let timestamp_ms = reader.u64()?;
                let cert_type = reader.utf()?;
                let len = reader.u32()? as usize;
                let certificate = reader.take(len)?.to_vec();
                entries.push(TrustedCertEntry {
                    alias,
                    timestamp_ms,
                    cert_type,
                    certificate,
                });
            }
            // Private key entries never appear in a trust store built here.
            other => return Err(TrustStoreError::UnsupportedEntry(other)),
        }
    }

    if reader.pos != body.len() {
        return Err(TrustStoreError::Truncated);
    }
    Ok(entries)
}

/// SHA-256 fingerprint of a certificate, hex encoded, for logging.
pub fn certificate_fingerprint(certificate: &[u8]) -> String {
    hex::encode(Sha256::digest(certificate))
}

fn integrity_digest(passphrase: &str, body: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    // Java hashes each UTF-16 code unit as two big-endian bytes.
    for unit in passphrase.encode_utf16() {
        hasher.update(unit.to_be_bytes());
    }
    hasher.update(INTEGRITY_SALT);
    hasher.update(body);
    hasher.finalize().into()
}

/// Java `DataOutput.writeUTF`: u16 length prefix, modified UTF-8 body.
fn write_utf(out: &mut Vec<u8>, value: &str) -> Result<(), BuildFailure> {
    let mut encoded = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => encoded.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                encoded.push(0xC0 | (unit >> 6) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                encoded.push(0xE0 | (unit >> 12) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    let len = u16::try_from(encoded.len()).map_err(|_| {
        BuildFailure::Serialize(format!("text field of {} bytes is too long", encoded.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], TrustStoreError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(TrustStoreError::Truncated)?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, TrustStoreError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, TrustStoreError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64, TrustStoreError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(raw))
    }

    fn utf(&mut self) -> Result<String, TrustStoreError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        let mut units = Vec::with_capacity(len);
        let mut i = 0;
        while i < bytes.len() {
            let b0 = bytes[i] as u16;
            let (unit, width) = match bytes[i] {
                0x00..=0x7F => (b0, 1),
                0xC0..=0xDF if i + 1 < bytes.len() => {
                    (((b0 & 0x1F) << 6) | (bytes[i + 1] as u16 & 0x3F), 2)
                }
                0xE0..=0xEF if i + 2 < bytes.len() => (
                    ((b0 & 0x0F) << 12)
                        | ((bytes[i + 1] as u16 & 0x3F) << 6)
                        | (bytes[i + 2] as u16 & 0x3F),
                    3,
                ),
                _ => return Err(TrustStoreError::InvalidText),
            };
            units.push(unit);
            i += width;
        }
        String::from_utf16(&units).map_err(|_| TrustStoreError::InvalidText)
    }
}

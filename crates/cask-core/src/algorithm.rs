//! Algorithm registry: cipher suites, KDF identifiers, and their wire form.
//!
//! An algorithm id is a single `u32` stored in every auth token:
//!
//! ```text
//! bits 31..16   frame marker 0x4353 ("CS")
//! bits 15..8    cipher suite  (0x01 = AES-256-GCM, 0x02 = XChaCha20-Poly1305)
//! bits  7..0    KDF           (0x00 = none / raw key, 0x01 = PBKDF2-HMAC-SHA256)
//! ```
//!
//! Ids outside the frame, or with an unknown cipher byte, are rejected as
//! invalid; a recognized frame with an unknown KDF byte is reported as
//! unsupported so callers can distinguish garbage from newer-format tokens.

use serde::{Deserialize, Serialize};

use crate::error::{CaskError, CaskResult};
use crate::{KEY_SIZE, TAG_SIZE};

/// Frame marker in the top half of every algorithm id ("CS")
const FRAME: u32 = 0x4353_0000;
const FRAME_MASK: u32 = 0xFFFF_0000;

/// Supported AEAD cipher suites. All use 256-bit keys and 128-bit tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherSuite {
    /// AES-256-GCM; imprint keystream is AES-256-CTR
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// XChaCha20-Poly1305; imprint keystream is XChaCha20
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
}

impl CipherSuite {
    pub const fn key_len(self) -> usize {
        KEY_SIZE
    }

    pub const fn tag_len(self) -> usize {
        TAG_SIZE
    }

    /// AEAD nonce length (the `iv` field of the auth token)
    pub const fn nonce_len(self) -> usize {
        match self {
            CipherSuite::Aes256Gcm => 12,
            CipherSuite::XChaCha20Poly1305 => 24,
        }
    }

    /// IV length of the suite's raw stream cipher (imprint mode)
    pub const fn stream_iv_len(self) -> usize {
        match self {
            CipherSuite::Aes256Gcm => 16,
            CipherSuite::XChaCha20Poly1305 => 24,
        }
    }

    const fn wire_byte(self) -> u32 {
        match self {
            CipherSuite::Aes256Gcm => 0x01,
            CipherSuite::XChaCha20Poly1305 => 0x02,
        }
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CipherSuite::Aes256Gcm => write!(f, "aes-256-gcm"),
            CipherSuite::XChaCha20Poly1305 => write!(f, "xchacha20-poly1305"),
        }
    }
}

/// Passphrase stretching algorithm recorded in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfAlg {
    /// Raw master key, no stretching, no KDF sub-context in the token
    None,
    /// PBKDF2-HMAC-SHA256 with per-token iteration count and salt
    Pbkdf2HmacSha256,
}

impl KdfAlg {
    const fn wire_byte(self) -> u32 {
        match self {
            KdfAlg::None => 0x00,
            KdfAlg::Pbkdf2HmacSha256 => 0x01,
        }
    }
}

/// A fully specified envelope algorithm: cipher suite + KDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Algorithm {
    pub suite: CipherSuite,
    pub kdf: KdfAlg,
}

impl Algorithm {
    pub const fn new(suite: CipherSuite, kdf: KdfAlg) -> Self {
        Self { suite, kdf }
    }

    pub fn to_wire(self) -> u32 {
        FRAME | (self.suite.wire_byte() << 8) | self.kdf.wire_byte()
    }

    /// Parse an algorithm id read from a token header.
    ///
    /// Cheap checks run first: frame marker, then cipher byte, then KDF byte.
    pub fn from_wire(id: u32) -> CaskResult<Self> {
        if id & FRAME_MASK != FRAME {
            return Err(CaskError::InvalidParameter(format!(
                "unrecognized algorithm id {id:#010x}"
            )));
        }

        let suite = match (id >> 8) & 0xFF {
            0x01 => CipherSuite::Aes256Gcm,
            0x02 => CipherSuite::XChaCha20Poly1305,
            other => {
                return Err(CaskError::InvalidParameter(format!(
                    "unknown cipher suite byte {other:#04x}"
                )))
            }
        };

        let kdf = match id & 0xFF {
            0x00 => KdfAlg::None,
            0x01 => KdfAlg::Pbkdf2HmacSha256,
            other => {
                return Err(CaskError::NotSupported(format!(
                    "unknown KDF id {other:#04x}"
                )))
            }
        };

        Ok(Self { suite, kdf })
    }
}

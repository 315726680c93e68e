//! Auth-token wire codec
//!
//! Binary layout (all integers little-endian, no padding):
//!
//! ```text
//! offset  field               width
//! 0       algorithm_id        u32
//! 4       iv_length           u32
//! 8       auth_tag_length     u32
//! 12      message_length      u32
//! 16      kdf_context_length  u32
//! 20      iv                  iv_length bytes
//! ...     auth_tag            auth_tag_length bytes
//! ...     kdf_context         kdf_context_length bytes  (PBKDF2 algorithms only)
//! ```
//!
//! KDF sub-context (PBKDF2 variant), embedded at the end of the token:
//!
//! ```text
//! offset  field            width
//! 0       iteration_count  u32 LE
//! 4       salt_length      u16 LE
//! 6       salt             salt_length bytes
//! ```
//!
//! Decoding borrows from the input buffer, trusts no declared length beyond
//! the bytes actually present, and rejects non-canonical sub-context sizes.
//! Encoding either writes the whole token or, if the buffer is undersized,
//! writes nothing and reports the exact required size.

use cask_core::{Algorithm, CaskError, CaskResult, KdfAlg, PBKDF2_SALT_LEN};

/// Fixed five-field token header size
pub const TOKEN_HEADER_LEN: usize = 20;

/// Fixed part of the PBKDF2 sub-context (iteration count + salt length)
pub const PBKDF2_CONTEXT_HEADER_LEN: usize = 6;

/// PBKDF2 parameters carried inside a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pbkdf2Context<'a> {
    pub iterations: u32,
    pub salt: &'a [u8],
}

impl Pbkdf2Context<'_> {
    pub fn encoded_len(&self) -> usize {
        PBKDF2_CONTEXT_HEADER_LEN + self.salt.len()
    }
}

/// The authentication header framing every sealed or protected message.
///
/// Constructed fresh on encryption; parsed (borrowing from the input buffer)
/// on decryption. Never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthToken<'a> {
    pub algorithm: Algorithm,
    pub iv: &'a [u8],
    pub tag: &'a [u8],
    /// Plaintext length; must equal the ciphertext length at decrypt time
    pub message_length: u32,
    pub kdf: Option<Pbkdf2Context<'a>>,
}

/// Exact encoded size of a freshly produced token for `algorithm`.
///
/// New PBKDF2 tokens always carry a [`PBKDF2_SALT_LEN`]-byte salt, so the
/// size is fully determined by the algorithm; decoding still accepts any
/// salt length a foreign token declares.
pub fn encoded_len_for(algorithm: Algorithm) -> usize {
    let kdf_len = match algorithm.kdf {
        KdfAlg::None => 0,
        KdfAlg::Pbkdf2HmacSha256 => PBKDF2_CONTEXT_HEADER_LEN + PBKDF2_SALT_LEN,
    };
    TOKEN_HEADER_LEN + algorithm.suite.nonce_len() + algorithm.suite.tag_len() + kdf_len
}

impl<'a> AuthToken<'a> {
    /// Exact number of bytes [`encode`](Self::encode) will write.
    pub fn encoded_len(&self) -> usize {
        let kdf_len = self.kdf.as_ref().map_or(0, Pbkdf2Context::encoded_len);
        TOKEN_HEADER_LEN + self.iv.len() + self.tag.len() + kdf_len
    }

    /// Serialize into `out`. Writes nothing unless the buffer fits the whole
    /// token; an undersized buffer reports the exact required size.
    pub fn encode(&self, out: &mut [u8]) -> CaskResult<usize> {
        self.check_shape()?;
        let required = self.encoded_len();
        if out.len() < required {
            return Err(CaskError::BufferTooSmall { required });
        }

        let kdf_len = self.kdf.as_ref().map_or(0, Pbkdf2Context::encoded_len);
        let mut w = Writer::new(out);
        w.u32_le(self.algorithm.to_wire());
        w.u32_le(self.iv.len() as u32);
        w.u32_le(self.tag.len() as u32);
        w.u32_le(self.message_length);
        w.u32_le(kdf_len as u32);
        w.bytes(self.iv);
        w.bytes(self.tag);
        if let Some(kdf) = &self.kdf {
            w.u32_le(kdf.iterations);
            w.u16_le(kdf.salt.len() as u16);
            w.bytes(kdf.salt);
        }
        Ok(w.pos)
    }

    /// Parse a token from the front of `buf`, returning it together with the
    /// number of bytes consumed (the token's self-declared size).
    pub fn decode(buf: &'a [u8]) -> CaskResult<(Self, usize)> {
        let mut r = Reader::new(buf);
        let algorithm_id = r.u32_le()?;
        let iv_length = r.u32_le()? as usize;
        let tag_length = r.u32_le()? as usize;
        let message_length = r.u32_le()?;
        let kdf_length = r.u32_le()? as usize;

        let algorithm = Algorithm::from_wire(algorithm_id)?;
        if iv_length != algorithm.suite.nonce_len() {
            return Err(CaskError::InvalidParameter(format!(
                "token declares {iv_length}-byte IV, algorithm requires {}",
                algorithm.suite.nonce_len()
            )));
        }
        if tag_length != algorithm.suite.tag_len() {
            return Err(CaskError::InvalidParameter(format!(
                "token declares {tag_length}-byte tag, algorithm requires {}",
                algorithm.suite.tag_len()
            )));
        }

        let iv = r.take(iv_length)?;
        let tag = r.take(tag_length)?;

        let kdf = match algorithm.kdf {
            KdfAlg::None => {
                if kdf_length != 0 {
                    return Err(CaskError::InvalidParameter(
                        "token carries a KDF sub-context for a raw-key algorithm".into(),
                    ));
                }
                None
            }
            KdfAlg::Pbkdf2HmacSha256 => {
                let sub = r.take(kdf_length)?;
                Some(decode_pbkdf2_context(sub)?)
            }
        };

        Ok((
            Self {
                algorithm,
                iv,
                tag,
                message_length,
                kdf,
            },
            r.pos,
        ))
    }

    /// Internal consistency between the declared algorithm and the variable
    /// fields; encoding a token that violates these is a caller bug surfaced
    /// as `InvalidParameter`.
    fn check_shape(&self) -> CaskResult<()> {
        if self.iv.len() != self.algorithm.suite.nonce_len()
            || self.tag.len() != self.algorithm.suite.tag_len()
        {
            return Err(CaskError::InvalidParameter(
                "token IV/tag length does not match its algorithm".into(),
            ));
        }
        match (self.algorithm.kdf, &self.kdf) {
            (KdfAlg::None, None) => Ok(()),
            (KdfAlg::Pbkdf2HmacSha256, Some(kdf)) => {
                if kdf.salt.len() > u16::MAX as usize {
                    return Err(CaskError::InvalidParameter("KDF salt exceeds 65535 bytes".into()));
                }
                if kdf.iterations == 0 {
                    return Err(CaskError::InvalidParameter("zero KDF iteration count".into()));
                }
                Ok(())
            }
            _ => Err(CaskError::InvalidParameter(
                "KDF sub-context presence does not match algorithm".into(),
            )),
        }
    }
}

fn decode_pbkdf2_context(sub: &[u8]) -> CaskResult<Pbkdf2Context<'_>> {
    let mut r = Reader::new(sub);
    let iterations = r.u32_le()?;
    let salt_length = r.u16_le()? as usize;
    let salt = r.take(salt_length)?;
    if r.pos != sub.len() {
        return Err(CaskError::InvalidParameter(
            "KDF sub-context length disagrees with its contents".into(),
        ));
    }
    if iterations == 0 {
        return Err(CaskError::InvalidParameter("zero KDF iteration count".into()));
    }
    Ok(Pbkdf2Context { iterations, salt })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> CaskResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| CaskError::InvalidParameter("token truncated".into()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32_le(&mut self) -> CaskResult<u32> {
        let bytes = self.take(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw))
    }

    fn u16_le(&mut self) -> CaskResult<u16> {
        let bytes = self.take(2)?;
        let mut raw = [0u8; 2];
        raw.copy_from_slice(bytes);
        Ok(u16::from_le_bytes(raw))
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    /// Caller has already verified capacity; writes are infallible.
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, src: &[u8]) {
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
    }

    fn u32_le(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn u16_le(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }
}

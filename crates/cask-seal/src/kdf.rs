//! Key derivation chain: raw master key or two-stage passphrase derivation.
//!
//! ```text
//! MasterKey(bytes)   ──────────────────────────────► DerivedKey  (pass-through)
//!
//! Passphrase(bytes)  ──PBKDF2-HMAC-SHA256──► prekey
//!                      (salt, iterations)      │
//!                                              ▼
//!          HKDF-SHA256(prekey, info = u32_be(message_length) || context)
//!                                              │
//!                                              ▼
//!                                          DerivedKey
//! ```
//!
//! Binding the plaintext length and the caller context into the final
//! derivation means two ciphertexts of different declared lengths, or bound
//! to different contexts, never share an encryption key even when the prekey
//! is reused. Every intermediate is wiped when its scope ends, on success and
//! on error alike.

use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use cask_core::{CaskError, CaskResult, CipherSuite, KEY_SIZE};
use cask_engine::CryptoEngine;

/// Output length of the PBKDF2 stretch stage
pub const PREKEY_LEN: usize = 32;

const IMPRINT_KEY_INFO: &[u8] = b"cask-imprint-key";
const IMPRINT_IV_INFO: &[u8] = b"cask-imprint-iv";

/// Where the encryption key comes from.
pub enum KeySource<'a> {
    /// Used directly; length must equal the suite's key size
    MasterKey(&'a [u8]),
    /// Stretched and context-bound before use
    Passphrase(&'a SecretSlice<u8>),
}

impl KeySource<'_> {
    pub fn is_passphrase(&self) -> bool {
        matches!(self, KeySource::Passphrase(_))
    }

    pub(crate) fn check_non_empty(&self) -> CaskResult<()> {
        let empty = match self {
            KeySource::MasterKey(bytes) => bytes.is_empty(),
            KeySource::Passphrase(passphrase) => passphrase.expose_secret().is_empty(),
        };
        if empty {
            return Err(CaskError::InvalidParameter("key source is empty".into()));
        }
        Ok(())
    }
}

/// A ready-to-use 256-bit encryption key.
///
/// Zeroized on drop so key material never outlives the call that derived it.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub(crate) fn zeroed() -> Self {
        Self {
            bytes: [0u8; KEY_SIZE],
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_SIZE] {
        &mut self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Stretch-stage parameters; freshly random on encrypt, read back out of the
/// token's KDF sub-context on decrypt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StretchParams<'a> {
    pub iterations: u32,
    pub salt: &'a [u8],
}

/// Run the derivation chain for one call.
///
/// The dispatcher pairs `source` and `stretch` (master keys never carry
/// stretch parameters, passphrases always do); a mismatch is an internal
/// invariant breach, not caller input, and surfaces as `Fail`.
pub(crate) fn derive_key<E: CryptoEngine>(
    engine: &E,
    suite: CipherSuite,
    source: &KeySource<'_>,
    stretch: Option<StretchParams<'_>>,
    message_length: u32,
    context: &[u8],
) -> CaskResult<DerivedKey> {
    match (source, stretch) {
        (KeySource::MasterKey(bytes), None) => {
            check_master_len(bytes, suite)?;
            let mut key = DerivedKey::zeroed();
            key.as_mut_bytes().copy_from_slice(bytes);
            Ok(key)
        }
        (KeySource::Passphrase(passphrase), Some(params)) => {
            let mut prekey = Zeroizing::new([0u8; PREKEY_LEN]);
            engine.stretch(
                passphrase.expose_secret(),
                params.salt,
                params.iterations,
                &mut *prekey,
            )?;
            bind_prekey(&*prekey, message_length, context)
        }
        _ => Err(CaskError::Fail(
            "key source does not match KDF parameters".into(),
        )),
    }
}

/// Context-bind stage: fold the plaintext length and caller context into the
/// final key.
fn bind_prekey(prekey: &[u8], message_length: u32, context: &[u8]) -> CaskResult<DerivedKey> {
    let length_bytes = message_length.to_be_bytes();
    let hkdf = Hkdf::<Sha256>::new(None, prekey);
    let mut key = DerivedKey::zeroed();
    hkdf.expand_multi_info(&[&length_bytes[..], context], key.as_mut_bytes())
        .map_err(|_| CaskError::Fail("HKDF context binding failed".into()))?;
    Ok(key)
}

/// Keystream key and IV for imprint mode.
///
/// The master key passes through the chain unchanged, so context binding
/// happens here: key and IV are domain-separated HKDF outputs covering the
/// message length and the (mandatory) context. Deterministic on purpose.
pub(crate) fn derive_imprint_material(
    master: &[u8],
    suite: CipherSuite,
    message_length: u32,
    context: &[u8],
) -> CaskResult<(DerivedKey, Zeroizing<Vec<u8>>)> {
    check_master_len(master, suite)?;
    let length_bytes = message_length.to_be_bytes();
    let hkdf = Hkdf::<Sha256>::new(None, master);

    let mut key = DerivedKey::zeroed();
    hkdf.expand_multi_info(
        &[IMPRINT_KEY_INFO, &length_bytes[..], context],
        key.as_mut_bytes(),
    )
    .map_err(|_| CaskError::Fail("HKDF imprint key derivation failed".into()))?;

    let mut iv = Zeroizing::new(vec![0u8; suite.stream_iv_len()]);
    hkdf.expand_multi_info(
        &[IMPRINT_IV_INFO, &length_bytes[..], context],
        iv.as_mut_slice(),
    )
    .map_err(|_| CaskError::Fail("HKDF imprint IV derivation failed".into()))?;

    Ok((key, iv))
}

fn check_master_len(bytes: &[u8], suite: CipherSuite) -> CaskResult<()> {
    if bytes.len() != suite.key_len() {
        return Err(CaskError::InvalidParameter(format!(
            "master key must be exactly {} bytes, got {}",
            suite.key_len(),
            bytes.len()
        )));
    }
    Ok(())
}

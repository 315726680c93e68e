//! cask-engine: the primitive-crypto collaborator of the envelope layer
//!
//! The envelope subsystem never touches cipher primitives directly; it talks
//! to a [`CryptoEngine`]. The trait is the swappable-backend seam: the
//! default [`RustCryptoEngine`] is selected by dependency injection rather
//! than conditional compilation at call sites, so an alternative backend
//! (hardware-accelerated, FIPS-certified, a test double with a fixed RNG)
//! plugs in without touching the envelope code.
//!
//! All AEAD operations are in-place with a detached tag: ciphertext length
//! always equals plaintext length, and the tag travels separately inside the
//! auth token.

mod rustcrypto;

pub use rustcrypto::RustCryptoEngine;

use cask_core::{CaskResult, CipherSuite, TAG_SIZE};

/// Primitive crypto operations the envelope layer composes.
///
/// Implementations are assumed correct and constant-time; the envelope layer
/// performs all length validation before calling in, so length errors
/// surfacing here indicate an internal contract breach and are reported as
/// `CaskError::Fail`.
pub trait CryptoEngine {
    /// AEAD-encrypt `data` in place, returning the detached tag.
    fn aead_seal_in_place(
        &self,
        suite: CipherSuite,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
    ) -> CaskResult<[u8; TAG_SIZE]>;

    /// AEAD-decrypt `data` in place against a detached tag.
    ///
    /// On tag mismatch the buffer contents are unspecified and
    /// `CaskError::DataCorrupt` is returned; callers must not expose the
    /// buffer afterwards.
    fn aead_open_in_place(
        &self,
        suite: CipherSuite,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8],
    ) -> CaskResult<()>;

    /// XOR `data` with the suite's raw keystream (unauthenticated).
    /// Applying the same key/IV twice restores the original bytes.
    fn keystream_xor(
        &self,
        suite: CipherSuite,
        key: &[u8],
        iv: &[u8],
        data: &mut [u8],
    ) -> CaskResult<()>;

    /// PBKDF2-HMAC-SHA256 passphrase stretching into `out`.
    fn stretch(
        &self,
        passphrase: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> CaskResult<()>;

    /// Fill `out` with cryptographically secure random bytes.
    fn fill_random(&self, out: &mut [u8]) -> CaskResult<()>;
}

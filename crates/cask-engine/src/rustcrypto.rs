//! Default `CryptoEngine` backed by the RustCrypto crates.

use aes_gcm::Aes256Gcm;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::XChaCha20;
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use cask_core::{CaskError, CaskResult, CipherSuite, TAG_SIZE};

use crate::CryptoEngine;

type Aes256Ctr64BE = ctr::Ctr64BE<aes::Aes256>;

/// The default engine. Stateless; one instance can serve concurrent calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoEngine;

fn internal(msg: &str) -> CaskError {
    CaskError::Fail(format!("engine: {msg}"))
}

fn check_lens(suite: CipherSuite, key: &[u8], nonce: &[u8]) -> CaskResult<()> {
    if key.len() != suite.key_len() {
        return Err(internal("AEAD key length mismatch"));
    }
    if nonce.len() != suite.nonce_len() {
        return Err(internal("AEAD nonce length mismatch"));
    }
    Ok(())
}

impl CryptoEngine for RustCryptoEngine {
    fn aead_seal_in_place(
        &self,
        suite: CipherSuite,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
    ) -> CaskResult<[u8; TAG_SIZE]> {
        check_lens(suite, key, nonce)?;
        let tag = match suite {
            CipherSuite::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(key)
                    .map_err(|_| internal("AES-GCM key rejected"))?;
                cipher
                    .encrypt_in_place_detached(nonce.into(), aad, data)
                    .map_err(|_| internal("AES-GCM encryption failed"))?
            }
            CipherSuite::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new_from_slice(key)
                    .map_err(|_| internal("XChaCha20-Poly1305 key rejected"))?;
                cipher
                    .encrypt_in_place_detached(nonce.into(), aad, data)
                    .map_err(|_| internal("XChaCha20-Poly1305 encryption failed"))?
            }
        };
        Ok(tag.into())
    }

    fn aead_open_in_place(
        &self,
        suite: CipherSuite,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8],
    ) -> CaskResult<()> {
        check_lens(suite, key, nonce)?;
        if tag.len() != suite.tag_len() {
            return Err(internal("AEAD tag length mismatch"));
        }
        let verified = match suite {
            CipherSuite::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(key)
                    .map_err(|_| internal("AES-GCM key rejected"))?;
                cipher.decrypt_in_place_detached(nonce.into(), aad, data, tag.into())
            }
            CipherSuite::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new_from_slice(key)
                    .map_err(|_| internal("XChaCha20-Poly1305 key rejected"))?;
                cipher.decrypt_in_place_detached(nonce.into(), aad, data, tag.into())
            }
        };
        verified.map_err(|_| CaskError::DataCorrupt("authentication tag mismatch".into()))
    }

    fn keystream_xor(
        &self,
        suite: CipherSuite,
        key: &[u8],
        iv: &[u8],
        data: &mut [u8],
    ) -> CaskResult<()> {
        if key.len() != suite.key_len() || iv.len() != suite.stream_iv_len() {
            return Err(internal("stream key/IV length mismatch"));
        }
        match suite {
            CipherSuite::Aes256Gcm => {
                let mut cipher = Aes256Ctr64BE::new_from_slices(key, iv)
                    .map_err(|_| internal("AES-CTR key/IV rejected"))?;
                cipher.apply_keystream(data);
            }
            CipherSuite::XChaCha20Poly1305 => {
                let mut cipher = XChaCha20::new_from_slices(key, iv)
                    .map_err(|_| internal("XChaCha20 key/IV rejected"))?;
                cipher.apply_keystream(data);
            }
        }
        Ok(())
    }

    fn stretch(
        &self,
        passphrase: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> CaskResult<()> {
        if iterations == 0 {
            return Err(internal("zero PBKDF2 iteration count"));
        }
        pbkdf2_hmac::<Sha256>(passphrase, salt, iterations, out);
        Ok(())
    }

    fn fill_random(&self, out: &mut [u8]) -> CaskResult<()> {
        rand::thread_rng().fill_bytes(out);
        Ok(())
    }
}

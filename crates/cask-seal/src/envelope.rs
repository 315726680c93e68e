//! Protection modes: Seal, TokenProtect, ContextImprint.
//!
//! Every entry point is a pure function of its inputs plus fresh randomness;
//! nothing is retained across calls. The calling convention is two-phase: an
//! undersized (or empty) output buffer costs nothing, writes nothing, and
//! reports the exact capacity to retry with via
//! [`CaskError::BufferTooSmall`]. The `*_to_vec` variants allocate the exact
//! size up front for callers that prefer owned buffers.
//!
//! Mode guarantees:
//!
//! - **Seal**: `token || ciphertext` in one buffer; tamper-evident.
//! - **TokenProtect**: token and ciphertext in separate buffers; ciphertext
//!   length equals plaintext length, so large payloads can live out-of-band
//!   from the small token. Tamper-evident.
//! - **ContextImprint**: deterministic keystream XOR bound to a mandatory
//!   context; output is exactly plaintext-sized, carries no token and **no
//!   authentication** — corruption is not detected, it garbles plaintext.

use zeroize::Zeroize;

use cask_core::{Algorithm, CaskError, CaskResult, KdfAlg, SealConfig, PBKDF2_SALT_LEN};
use cask_engine::{CryptoEngine, RustCryptoEngine};

use crate::kdf::{self, KeySource, StretchParams};
use crate::token::{self, AuthToken, Pbkdf2Context};

/// Longest AEAD nonce across supported suites
const MAX_NONCE_LEN: usize = 24;

/// The mode dispatcher: composes the wire codec, the key derivation chain
/// and the crypto engine.
///
/// The configured suite and KDF settings govern what new tokens use; on
/// decryption the token's own self-declared algorithm is honored, so an
/// `Envelope` opens anything it (or an older configuration) produced.
pub struct Envelope<E: CryptoEngine = RustCryptoEngine> {
    engine: E,
    config: SealConfig,
}

impl Envelope<RustCryptoEngine> {
    pub fn new() -> Self {
        Self::with_config(SealConfig::default())
    }

    pub fn with_config(config: SealConfig) -> Self {
        Self {
            engine: RustCryptoEngine,
            config,
        }
    }
}

impl Default for Envelope<RustCryptoEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CryptoEngine> Envelope<E> {
    /// Swap in a different primitive-crypto backend.
    pub fn with_engine(engine: E, config: SealConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    /// Consume the envelope and hand back its engine (useful for inspecting
    /// instrumented test backends).
    pub fn into_engine(self) -> E {
        self.engine
    }

    fn algorithm_for(&self, source: &KeySource<'_>) -> Algorithm {
        let kdf = if source.is_passphrase() {
            KdfAlg::Pbkdf2HmacSha256
        } else {
            KdfAlg::None
        };
        Algorithm::new(self.config.suite, kdf)
    }

    /// Exact token size `protect` will produce for this key source.
    pub fn token_len(&self, source: &KeySource<'_>) -> usize {
        token::encoded_len_for(self.algorithm_for(source))
    }

    /// Exact combined-buffer size `seal` will produce.
    pub fn sealed_len(&self, source: &KeySource<'_>, message_len: usize) -> usize {
        self.token_len(source) + message_len
    }

    // ── Seal ──────────────────────────────────────────────────────────────

    /// Encrypt `message` into a single self-describing buffer:
    /// `token || ciphertext`.
    pub fn seal(
        &self,
        source: &KeySource<'_>,
        message: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> CaskResult<usize> {
        let algorithm = self.algorithm_for(source);
        let message_length = validate_message(source, message)?;
        let token_len = token::encoded_len_for(algorithm);
        let required = token_len + message.len();
        if out.len() < required {
            return Err(CaskError::BufferTooSmall { required });
        }

        let (token_region, rest) = out.split_at_mut(token_len);
        let ct_region = &mut rest[..message.len()];
        self.encrypt_into(
            source,
            algorithm,
            message,
            message_length,
            context,
            token_region,
            ct_region,
        )?;
        Ok(required)
    }

    /// Decrypt a `seal` buffer, splitting it at the token's self-declared
    /// size. Returns the plaintext length written to `out`.
    pub fn unseal(
        &self,
        source: &KeySource<'_>,
        sealed: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> CaskResult<usize> {
        source.check_non_empty()?;
        let (parsed, token_len) = AuthToken::decode(sealed)?;
        let ciphertext = &sealed[token_len..];
        self.open_with_token(source, &parsed, ciphertext, context, out)
    }

    // ── TokenProtect ──────────────────────────────────────────────────────

    /// Encrypt `message`, returning the token and the (plaintext-sized)
    /// ciphertext through two independent buffers. Returns
    /// `(token_written, ciphertext_written)`.
    pub fn protect(
        &self,
        source: &KeySource<'_>,
        message: &[u8],
        context: &[u8],
        token_out: &mut [u8],
        ct_out: &mut [u8],
    ) -> CaskResult<(usize, usize)> {
        let algorithm = self.algorithm_for(source);
        let message_length = validate_message(source, message)?;
        let token_len = token::encoded_len_for(algorithm);
        if token_out.len() < token_len {
            return Err(CaskError::BufferTooSmall {
                required: token_len,
            });
        }
        if ct_out.len() < message.len() {
            return Err(CaskError::BufferTooSmall {
                required: message.len(),
            });
        }

        self.encrypt_into(
            source,
            algorithm,
            message,
            message_length,
            context,
            &mut token_out[..token_len],
            &mut ct_out[..message.len()],
        )?;
        Ok((token_len, message.len()))
    }

    /// Decrypt a detached `(token, ciphertext)` pair.
    pub fn unprotect(
        &self,
        source: &KeySource<'_>,
        token_buf: &[u8],
        ciphertext: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> CaskResult<usize> {
        source.check_non_empty()?;
        let (parsed, consumed) = AuthToken::decode(token_buf)?;
        if consumed != token_buf.len() {
            return Err(CaskError::InvalidParameter(
                "trailing bytes after auth token".into(),
            ));
        }
        self.open_with_token(source, &parsed, ciphertext, context, out)
    }

    // ── ContextImprint ────────────────────────────────────────────────────

    /// Deterministically encrypt `message` bound to a mandatory non-empty
    /// `context`. Output length equals message length; **no authentication**.
    ///
    /// Only master keys are accepted: the mode emits no token, so there is
    /// nowhere to carry the salt and iteration count the passphrase path
    /// requires for a later decrypt.
    pub fn imprint(
        &self,
        source: &KeySource<'_>,
        message: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> CaskResult<usize> {
        let message_length = validate_message(source, message)?;
        if context.is_empty() {
            return Err(CaskError::InvalidParameter(
                "imprint mode requires a non-empty context".into(),
            ));
        }
        let master = match source {
            KeySource::MasterKey(bytes) => *bytes,
            KeySource::Passphrase(_) => {
                return Err(CaskError::NotSupported(
                    "imprint mode has no token to carry KDF parameters; use a master key".into(),
                ))
            }
        };
        let required = message.len();
        if out.len() < required {
            return Err(CaskError::BufferTooSmall { required });
        }

        tracing::debug!(
            mode = "imprint",
            suite = %self.config.suite,
            message_len = message.len(),
            "applying context-bound keystream"
        );

        let (key, iv) =
            kdf::derive_imprint_material(master, self.config.suite, message_length, context)?;
        let dst = &mut out[..required];
        dst.copy_from_slice(message);
        if let Err(e) = self
            .engine
            .keystream_xor(self.config.suite, key.as_bytes(), &iv, dst)
        {
            dst.zeroize();
            return Err(e);
        }
        Ok(required)
    }

    /// Reverse an `imprint`. The transform is a keystream XOR, so this is the
    /// same operation; corruption in `imprinted` passes through undetected.
    pub fn unimprint(
        &self,
        source: &KeySource<'_>,
        imprinted: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> CaskResult<usize> {
        self.imprint(source, imprinted, context, out)
    }

    // ── Owned-buffer conveniences ─────────────────────────────────────────

    pub fn seal_to_vec(
        &self,
        source: &KeySource<'_>,
        message: &[u8],
        context: &[u8],
    ) -> CaskResult<Vec<u8>> {
        let mut out = vec![0u8; self.sealed_len(source, message.len())];
        let written = self.seal(source, message, context, &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    pub fn unseal_to_vec(
        &self,
        source: &KeySource<'_>,
        sealed: &[u8],
        context: &[u8],
    ) -> CaskResult<Vec<u8>> {
        // The plaintext is strictly shorter than the sealed buffer.
        let mut out = vec![0u8; sealed.len()];
        let written = self.unseal(source, sealed, context, &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    pub fn protect_to_vecs(
        &self,
        source: &KeySource<'_>,
        message: &[u8],
        context: &[u8],
    ) -> CaskResult<(Vec<u8>, Vec<u8>)> {
        let mut token_out = vec![0u8; self.token_len(source)];
        let mut ct_out = vec![0u8; message.len()];
        let (token_written, ct_written) =
            self.protect(source, message, context, &mut token_out, &mut ct_out)?;
        token_out.truncate(token_written);
        ct_out.truncate(ct_written);
        Ok((token_out, ct_out))
    }

    pub fn unprotect_to_vec(
        &self,
        source: &KeySource<'_>,
        token_buf: &[u8],
        ciphertext: &[u8],
        context: &[u8],
    ) -> CaskResult<Vec<u8>> {
        let mut out = vec![0u8; ciphertext.len()];
        let written = self.unprotect(source, token_buf, ciphertext, context, &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    pub fn imprint_to_vec(
        &self,
        source: &KeySource<'_>,
        message: &[u8],
        context: &[u8],
    ) -> CaskResult<Vec<u8>> {
        let mut out = vec![0u8; message.len()];
        let written = self.imprint(source, message, context, &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    pub fn unimprint_to_vec(
        &self,
        source: &KeySource<'_>,
        imprinted: &[u8],
        context: &[u8],
    ) -> CaskResult<Vec<u8>> {
        self.imprint_to_vec(source, imprinted, context)
    }

    // ── Shared internals ──────────────────────────────────────────────────

    /// Derive, encrypt, frame. `token_region` and `ct_region` are exactly
    /// sized by the caller.
    #[allow(clippy::too_many_arguments)]
    fn encrypt_into(
        &self,
        source: &KeySource<'_>,
        algorithm: Algorithm,
        message: &[u8],
        message_length: u32,
        context: &[u8],
        token_region: &mut [u8],
        ct_region: &mut [u8],
    ) -> CaskResult<()> {
        tracing::debug!(
            suite = %algorithm.suite,
            passphrase = source.is_passphrase(),
            message_len = message.len(),
            "sealing message"
        );

        let mut salt = [0u8; PBKDF2_SALT_LEN];
        let is_passphrase = source.is_passphrase();
        if is_passphrase {
            self.engine.fill_random(&mut salt)?;
        }
        let iterations = self.config.pbkdf2_iterations;
        let stretch = is_passphrase.then_some(StretchParams {
            iterations,
            salt: &salt,
        });

        let key = kdf::derive_key(
            &self.engine,
            algorithm.suite,
            source,
            stretch,
            message_length,
            context,
        )?;

        let mut iv_buf = [0u8; MAX_NONCE_LEN];
        let iv = &mut iv_buf[..algorithm.suite.nonce_len()];
        self.engine.fill_random(iv)?;

        ct_region.copy_from_slice(message);
        let tag = match self
            .engine
            .aead_seal_in_place(algorithm.suite, key.as_bytes(), iv, context, ct_region)
        {
            Ok(tag) => tag,
            Err(e) => {
                ct_region.zeroize();
                return Err(e);
            }
        };

        let framed = AuthToken {
            algorithm,
            iv,
            tag: &tag,
            message_length,
            kdf: is_passphrase.then_some(Pbkdf2Context {
                iterations,
                salt: &salt,
            }),
        };
        let written = framed.encode(token_region)?;
        debug_assert_eq!(written, token_region.len());
        Ok(())
    }

    /// Decrypt against a parsed token. Order matters: the cheap
    /// length-consistency and capacity checks run before any key derivation
    /// or AEAD work.
    fn open_with_token(
        &self,
        source: &KeySource<'_>,
        parsed: &AuthToken<'_>,
        ciphertext: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> CaskResult<usize> {
        let declared = parsed.message_length as usize;
        if declared != ciphertext.len() {
            return Err(CaskError::DataCorrupt(format!(
                "token declares {declared}-byte message, ciphertext is {} bytes",
                ciphertext.len()
            )));
        }
        match (parsed.algorithm.kdf, source) {
            (KdfAlg::None, KeySource::MasterKey(_)) => {}
            (KdfAlg::Pbkdf2HmacSha256, KeySource::Passphrase(_)) => {}
            _ => {
                return Err(CaskError::InvalidParameter(
                    "key source does not match the token's KDF algorithm".into(),
                ))
            }
        }
        if out.len() < declared {
            return Err(CaskError::BufferTooSmall { required: declared });
        }

        if let Some(kdf_ctx) = &parsed.kdf {
            if kdf_ctx.iterations < self.config.pbkdf2_warn_below {
                tracing::warn!(
                    iterations = kdf_ctx.iterations,
                    floor = self.config.pbkdf2_warn_below,
                    "token uses a legacy PBKDF2 iteration count"
                );
            }
        }

        let stretch = parsed.kdf.map(|c| StretchParams {
            iterations: c.iterations,
            salt: c.salt,
        });
        let key = kdf::derive_key(
            &self.engine,
            parsed.algorithm.suite,
            source,
            stretch,
            parsed.message_length,
            context,
        )?;

        let dst = &mut out[..declared];
        dst.copy_from_slice(ciphertext);
        if let Err(e) = self.engine.aead_open_in_place(
            parsed.algorithm.suite,
            key.as_bytes(),
            parsed.iv,
            context,
            dst,
            parsed.tag,
        ) {
            // Never expose a partially decrypted buffer.
            dst.zeroize();
            return Err(e);
        }
        Ok(declared)
    }
}

fn validate_message(source: &KeySource<'_>, message: &[u8]) -> CaskResult<u32> {
    source.check_non_empty()?;
    if message.is_empty() {
        return Err(CaskError::InvalidParameter("message is empty".into()));
    }
    u32::try_from(message.len())
        .map_err(|_| CaskError::InvalidParameter("message length exceeds 32 bits".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_core::{CipherSuite, KEY_SIZE};
    use secrecy::SecretSlice;

    fn master() -> [u8; KEY_SIZE] {
        [0x5Au8; KEY_SIZE]
    }

    fn fast_config() -> SealConfig {
        SealConfig {
            pbkdf2_iterations: 1_000,
            ..SealConfig::default()
        }
    }

    #[test]
    fn test_empty_message_rejected_before_any_work() {
        let envelope = Envelope::new();
        let key = master();
        let err = envelope
            .seal(&KeySource::MasterKey(&key), b"", b"", &mut [])
            .unwrap_err();
        assert!(matches!(err, CaskError::InvalidParameter(_)));
    }

    #[test]
    fn test_empty_key_rejected_before_any_work() {
        let envelope = Envelope::new();
        let err = envelope
            .seal(&KeySource::MasterKey(b""), b"msg", b"", &mut [])
            .unwrap_err();
        assert!(matches!(err, CaskError::InvalidParameter(_)));

        let empty = SecretSlice::from(Vec::<u8>::new());
        let err = envelope
            .seal(&KeySource::Passphrase(&empty), b"msg", b"", &mut [])
            .unwrap_err();
        assert!(matches!(err, CaskError::InvalidParameter(_)));
    }

    #[test]
    fn test_imprint_requires_context() {
        let envelope = Envelope::new();
        let key = master();
        let mut out = [0u8; 8];
        let err = envelope
            .imprint(&KeySource::MasterKey(&key), b"12345678", b"", &mut out)
            .unwrap_err();
        assert!(matches!(err, CaskError::InvalidParameter(_)));
    }

    #[test]
    fn test_imprint_rejects_passphrase() {
        let envelope = Envelope::with_config(fast_config());
        let phrase = SecretSlice::from(b"hunter2".to_vec());
        let mut out = [0u8; 8];
        let err = envelope
            .imprint(&KeySource::Passphrase(&phrase), b"12345678", b"ctx", &mut out)
            .unwrap_err();
        assert!(matches!(err, CaskError::NotSupported(_)));
    }

    #[test]
    fn test_seal_output_layout_sizes() {
        let envelope = Envelope::new();
        let key = master();
        let source = KeySource::MasterKey(&key);
        let sealed = envelope.seal_to_vec(&source, b"hello", b"").unwrap();
        // header (20) + XChaCha nonce (24) + tag (16) + message (5)
        assert_eq!(sealed.len(), 20 + 24 + 16 + 5);
        assert_eq!(sealed.len(), envelope.sealed_len(&source, 5));
    }

    #[test]
    fn test_passphrase_token_includes_kdf_context() {
        let envelope = Envelope::with_config(fast_config());
        let phrase = SecretSlice::from(b"passphrase".to_vec());
        let source = KeySource::Passphrase(&phrase);
        let (token_buf, ct) = envelope.protect_to_vecs(&source, b"hello", b"").unwrap();
        assert_eq!(token_buf.len(), 20 + 24 + 16 + 6 + 16);
        assert_eq!(ct.len(), 5, "ciphertext must not expand");

        let (parsed, consumed) = AuthToken::decode(&token_buf).unwrap();
        assert_eq!(consumed, token_buf.len());
        let kdf_ctx = parsed.kdf.expect("passphrase token carries KDF context");
        assert_eq!(kdf_ctx.iterations, 1_000);
        assert_eq!(kdf_ctx.salt.len(), PBKDF2_SALT_LEN);
    }

    #[test]
    fn test_mismatched_key_source_rejected() {
        let envelope = Envelope::with_config(fast_config());
        let key = master();
        let sealed = envelope
            .seal_to_vec(&KeySource::MasterKey(&key), b"hello", b"")
            .unwrap();

        let phrase = SecretSlice::from(b"passphrase".to_vec());
        let mut out = [0u8; 16];
        let err = envelope
            .unseal(&KeySource::Passphrase(&phrase), &sealed, b"", &mut out)
            .unwrap_err();
        assert!(matches!(err, CaskError::InvalidParameter(_)));
    }

    #[test]
    fn test_configured_suite_governs_new_tokens() {
        let envelope = Envelope::with_config(SealConfig {
            suite: CipherSuite::Aes256Gcm,
            ..fast_config()
        });
        let key = master();
        let sealed = envelope
            .seal_to_vec(&KeySource::MasterKey(&key), b"hello", b"")
            .unwrap();
        let (parsed, _) = AuthToken::decode(&sealed).unwrap();
        assert_eq!(parsed.algorithm.suite, CipherSuite::Aes256Gcm);
        assert_eq!(parsed.iv.len(), 12);
    }
}

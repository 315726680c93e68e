//! cask: seal and open encrypted envelopes from the command line
//!
//! Commands:
//!   seal    - encrypt a file (or stdin) into a sealed envelope
//!   open    - decrypt a sealed envelope
//!   inspect - print the auth-token header of a sealed envelope
//!
//! Keys come from a raw 32-byte key file (`--key-file`) or, when absent, an
//! interactive passphrase prompt.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, Subcommand};
use secrecy::SecretSlice;
use zeroize::Zeroize;

use cask_core::{CaskConfig, KdfAlg};
use cask_seal::{AuthToken, Envelope, KeySource};

// ── CLI structure ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cask",
    version,
    about = "CaskCrypt sealed-envelope tool",
    long_about = "cask: encrypt blobs into self-describing, tamper-evident envelopes"
)]
struct Cli {
    /// Path to cask.toml configuration file
    #[arg(long, short = 'c', env = "CASK_CONFIG", default_value = "cask.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal a file into a self-describing encrypted envelope
    Seal {
        /// Input file ("-" for stdin)
        input: PathBuf,
        /// Output file ("-" for stdout)
        #[arg(long, short = 'o', default_value = "-")]
        output: PathBuf,
        /// Raw 32-byte master key file; prompts for a passphrase when absent
        #[arg(long, short = 'k', env = "CASK_KEY_FILE")]
        key_file: Option<PathBuf>,
        /// Associated context bound into the envelope (authenticated, not encrypted)
        #[arg(long, default_value = "")]
        context: String,
        /// Base64-armor the output
        #[arg(long)]
        armor: bool,
    },

    /// Open a sealed envelope
    Open {
        /// Input file ("-" for stdin)
        input: PathBuf,
        /// Output file ("-" for stdout)
        #[arg(long, short = 'o', default_value = "-")]
        output: PathBuf,
        /// Raw 32-byte master key file; prompts for a passphrase when absent
        #[arg(long, short = 'k', env = "CASK_KEY_FILE")]
        key_file: Option<PathBuf>,
        /// Context the envelope was sealed with
        #[arg(long, default_value = "")]
        context: String,
        /// Input is base64-armored
        #[arg(long)]
        armor: bool,
    },

    /// Print the auth-token header of a sealed envelope
    Inspect {
        /// Input file ("-" for stdin)
        input: PathBuf,
        /// Input is base64-armored
        #[arg(long)]
        armor: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

// ── Key handling ──────────────────────────────────────────────────────────────

/// Owned key material; [`KeySource`] borrows from it per call.
enum OwnedKey {
    Master(Vec<u8>),
    Passphrase(SecretSlice<u8>),
}

impl OwnedKey {
    fn as_source(&self) -> KeySource<'_> {
        match self {
            OwnedKey::Master(bytes) => KeySource::MasterKey(bytes),
            OwnedKey::Passphrase(phrase) => KeySource::Passphrase(phrase),
        }
    }
}

impl Drop for OwnedKey {
    fn drop(&mut self) {
        if let OwnedKey::Master(bytes) = self {
            bytes.zeroize();
        }
    }
}

fn load_key(key_file: Option<&Path>, confirm: bool) -> Result<OwnedKey> {
    match key_file {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read key file {}", path.display()))?;
            Ok(OwnedKey::Master(bytes))
        }
        None => {
            let mut phrase =
                rpassword::prompt_password("Passphrase: ").context("read passphrase")?;
            if confirm {
                let mut again = rpassword::prompt_password("Repeat passphrase: ")
                    .context("read passphrase")?;
                let matched = phrase == again;
                again.zeroize();
                if !matched {
                    phrase.zeroize();
                    bail!("passphrases do not match");
                }
            }
            let secret = SecretSlice::from(phrase.as_bytes().to_vec());
            phrase.zeroize();
            Ok(OwnedKey::Passphrase(secret))
        }
    }
}

// ── I/O helpers ───────────────────────────────────────────────────────────────

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("read {}", path.display()))
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if path == Path::new("-") {
        std::io::stdout().write_all(bytes).context("write stdout")
    } else {
        std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
    }
}

fn dearmor(bytes: &[u8], armor: bool) -> Result<Vec<u8>> {
    if armor {
        let text = std::str::from_utf8(bytes).context("armored input is not UTF-8")?;
        BASE64.decode(text.trim()).context("base64 decode")
    } else {
        Ok(bytes.to_vec())
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_seal(
    envelope: &Envelope,
    key: &OwnedKey,
    input: &Path,
    output: &Path,
    context: &str,
    armor: bool,
) -> Result<()> {
    let message = read_input(input)?;
    let sealed = envelope.seal_to_vec(&key.as_source(), &message, context.as_bytes())?;
    if armor {
        let mut text = BASE64.encode(&sealed);
        text.push('\n');
        write_output(output, text.as_bytes())
    } else {
        write_output(output, &sealed)
    }
}

fn cmd_open(
    envelope: &Envelope,
    key: &OwnedKey,
    input: &Path,
    output: &Path,
    context: &str,
    armor: bool,
) -> Result<()> {
    let sealed = dearmor(&read_input(input)?, armor)?;
    let message = envelope.unseal_to_vec(&key.as_source(), &sealed, context.as_bytes())?;
    write_output(output, &message)
}

fn cmd_inspect(input: &Path, armor: bool, json: bool) -> Result<()> {
    let sealed = dearmor(&read_input(input)?, armor)?;
    let (token, token_len) = AuthToken::decode(&sealed)?;
    let ciphertext_len = sealed.len() - token_len;

    let kdf_name = match token.algorithm.kdf {
        KdfAlg::None => "none",
        KdfAlg::Pbkdf2HmacSha256 => "pbkdf2-hmac-sha256",
    };

    if json {
        let mut value = serde_json::json!({
            "algorithm_id": format!("{:#010x}", token.algorithm.to_wire()),
            "suite": token.algorithm.suite.to_string(),
            "kdf": kdf_name,
            "iv_length": token.iv.len(),
            "tag_length": token.tag.len(),
            "message_length": token.message_length,
            "token_length": token_len,
            "ciphertext_length": ciphertext_len,
        });
        if let Some(kdf) = &token.kdf {
            value["pbkdf2_iterations"] = serde_json::json!(kdf.iterations);
            value["salt_length"] = serde_json::json!(kdf.salt.len());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("algorithm id:      {:#010x}", token.algorithm.to_wire());
        println!("cipher suite:      {}", token.algorithm.suite);
        println!("kdf:               {kdf_name}");
        println!("iv length:         {}", token.iv.len());
        println!("tag length:        {}", token.tag.len());
        println!("message length:    {}", token.message_length);
        println!("token length:      {token_len}");
        println!("ciphertext length: {ciphertext_len}");
        if let Some(kdf) = &token.kdf {
            println!("pbkdf2 iterations: {}", kdf.iterations);
            println!("salt length:       {}", kdf.salt.len());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CaskConfig::load(&cli.config)?;
    let envelope = Envelope::with_config(config.seal.clone());

    match cli.command {
        Commands::Seal {
            input,
            output,
            key_file,
            context,
            armor,
        } => {
            let key = load_key(key_file.as_deref(), true)?;
            cmd_seal(&envelope, &key, &input, &output, &context, armor)
        }
        Commands::Open {
            input,
            output,
            key_file,
            context,
            armor,
        } => {
            let key = load_key(key_file.as_deref(), false)?;
            cmd_open(&envelope, &key, &input, &output, &context, armor)
        }
        Commands::Inspect {
            input,
            armor,
            json,
        } => cmd_inspect(&input, armor, json),
    }
}

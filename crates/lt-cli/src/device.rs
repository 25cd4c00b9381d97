//! # Device Subcommands
//!
//! Key generation, proof signing and verification over the canonical
//! request message. Keys and signatures are standard base64, matching the
//! wire format of the `X-Device-Proof` header and the device registry.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use lt_core::{CanonicalMessage, Timestamp};
use lt_crypto::{verify_device_signature, DeviceKeyPair};

/// Device subcommands.
#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// Generate a new Ed25519 device key; prints public key and seed.
    Keygen,

    /// Sign a request and print the device-proof headers.
    Sign {
        /// Base64 32-byte seed from `keygen`.
        #[arg(long)]
        seed: String,
        /// Device id to send as `X-Device-Key`.
        #[arg(long)]
        device_id: String,
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Verify a device proof against a public key.
    Verify {
        /// Base64 public key.
        #[arg(long)]
        public_key: String,
        /// Base64 signature (`X-Device-Proof`).
        #[arg(long)]
        signature: String,
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Print the canonical message for a request.
    Message {
        #[command(flatten)]
        request: RequestArgs,
    },
}

/// The request fields covered by a device proof.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// HTTP method, e.g. POST.
    #[arg(long)]
    pub method: String,
    /// Request path without query, e.g. /rewards/redeem.
    #[arg(long)]
    pub path: String,
    /// Unix seconds; defaults to now.
    #[arg(long)]
    pub timestamp: Option<String>,
    /// Single-use nonce; defaults to a random UUID.
    #[arg(long)]
    pub nonce: Option<String>,
}

impl RequestArgs {
    /// Fill in defaulted fields and build the canonical message.
    fn resolve(&self) -> Result<(String, String, CanonicalMessage)> {
        let timestamp = self
            .timestamp
            .clone()
            .unwrap_or_else(|| Timestamp::now().epoch_secs().to_string());
        let nonce = self
            .nonce
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let message = CanonicalMessage::try_build(&self.method, &self.path, &timestamp, &nonce)
            .context("request fields cannot form a canonical message")?;
        Ok((timestamp, nonce, message))
    }
}

/// Execute a device subcommand, writing its output to `out`.
///
/// Returns the process exit code: 0 on success, 2 when `verify` rejects.
pub fn run_device(command: &DeviceCommand, out: &mut dyn Write) -> Result<u8> {
    match command {
        DeviceCommand::Keygen => cmd_keygen(out),
        DeviceCommand::Sign {
            seed,
            device_id,
            request,
        } => cmd_sign(seed, device_id, request, out),
        DeviceCommand::Verify {
            public_key,
            signature,
            request,
        } => cmd_verify(public_key, signature, request, out),
        DeviceCommand::Message { request } => {
            let (_, _, message) = request.resolve()?;
            writeln!(out, "{}", message.as_str())?;
            Ok(0)
        }
    }
}

fn cmd_keygen(out: &mut dyn Write) -> Result<u8> {
    let key = DeviceKeyPair::generate();
    writeln!(out, "public_key={}", key.public_key().to_base64())?;
    writeln!(out, "seed={}", key.export_seed_base64())?;
    tracing::info!("generated device key");
    Ok(0)
}

fn cmd_sign(seed: &str, device_id: &str, request: &RequestArgs, out: &mut dyn Write) -> Result<u8> {
    let key = DeviceKeyPair::from_seed_base64(seed.trim()).context("invalid device seed")?;
    let (timestamp, nonce, message) = request.resolve()?;
    let proof = key.sign(&message);

    writeln!(out, "X-Device-Key: {device_id}")?;
    writeln!(out, "X-Device-Timestamp: {timestamp}")?;
    writeln!(out, "X-Device-Nonce: {nonce}")?;
    writeln!(out, "X-Device-Proof: {}", proof.to_base64())?;
    Ok(0)
}

fn cmd_verify(
    public_key: &str,
    signature: &str,
    request: &RequestArgs,
    out: &mut dyn Write,
) -> Result<u8> {
    if request.timestamp.is_none() || request.nonce.is_none() {
        anyhow::bail!("verify requires --timestamp and --nonce");
    }
    let (_, _, message) = request.resolve()?;
    if verify_device_signature(public_key.trim(), signature.trim(), &message) {
        writeln!(out, "OK: signature is valid")?;
        Ok(0)
    } else {
        writeln!(out, "FAIL: signature is invalid")?;
        Ok(2)
    }
}

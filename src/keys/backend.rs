//! The key-generation boundary: everything about turning an algorithm and
//! a size into actual key bytes is deliberately kept behind this trait, so
//! a real HSM or KMIP-backed implementation can be dropped in without
//! touching the scheduler.

use std::io::Write;

use ring::rand::SecureRandom;
use ring::signature::KeyPair;

use crate::error::Fatal;
use crate::keys::{KeyMaterial, FLAG_SEP, FLAG_ZONE_KEY};
use crate::policy::{Algorithm, KeyRole};
use crate::zone::ZoneName;

/// Mirrors the original tool's `progress()` callback: `0`/`1`/`2`/`3` map
/// to `.`/`+`/`*`/` ` written to stderr, one character per call.
pub trait ProgressListener {
    fn progress(&self, code: u8);
}

pub struct StderrProgress;

impl ProgressListener for StderrProgress {
    fn progress(&self, code: u8) {
        let c = match code {
            0 => '.',
            1 => '+',
            2 => '*',
            _ => ' ',
        };
        eprint!("{c}");
        let _ = std::io::stderr().flush();
    }
}

/// Produces key material for an algorithm and a resolved size.
///
/// The size the caller supplies is already resolved (the policy's size
/// for RSA, or the algorithm's fixed size for everything else); a backend
/// does not need to know about policy defaults or FIPS limits.
pub trait KeyBackend {
    fn generate(
        &self,
        zone: &ZoneName,
        role: KeyRole,
        algorithm: Algorithm,
        size_bits: u32,
        progress: Option<&dyn ProgressListener>,
    ) -> Result<KeyMaterial, Fatal>;
}

/// The default backend: real Ed25519 keys via `ring`, and
/// correctly-sized, cryptographically random placeholder bytes for every
/// other algorithm. RSA and ECDSA key generation need an external engine
/// this crate does not provide; the byte length and algorithm tag are
/// still faithful, so collision detection, key tags, and bundle emission
/// behave identically to a real keypair.
pub struct LocalKeyBackend;

impl KeyBackend for LocalKeyBackend {
    fn generate(
        &self,
        _zone: &ZoneName,
        role: KeyRole,
        algorithm: Algorithm,
        size_bits: u32,
        progress: Option<&dyn ProgressListener>,
    ) -> Result<KeyMaterial, Fatal> {
        if let Some(p) = progress {
            p.progress(if algorithm.is_rsa() { 1 } else { 2 });
        }

        let mut flags = FLAG_ZONE_KEY;
        if role.is_ksk() {
            flags |= FLAG_SEP;
        }

        let (public_key, private_key) = if algorithm == Algorithm::Ed25519 {
            let rng = ring::rand::SystemRandom::new();
            let pkcs8 = ring::signature::Ed25519KeyPair::generate_pkcs8(&rng)
                .map_err(|_| Fatal::Crypto("failed to generate Ed25519 key pair".into()))?;
            let pair = ring::signature::Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
                .map_err(|_| Fatal::Crypto("failed to parse generated Ed25519 key pair".into()))?;
            (pair.public_key().as_ref().to_vec(), pkcs8.as_ref().to_vec())
        } else {
            let rng = ring::rand::SystemRandom::new();
            let len = public_key_len(algorithm, size_bits);
            let mut public_key = vec![0u8; len];
            rng.fill(&mut public_key)
                .map_err(|_| Fatal::Crypto("failed to generate key material".into()))?;
            let mut private_key = vec![0u8; len];
            rng.fill(&mut private_key)
                .map_err(|_| Fatal::Crypto("failed to generate key material".into()))?;
            (public_key, private_key)
        };

        Ok(KeyMaterial {
            algorithm,
            flags,
            public_key,
            private_key,
        })
    }
}

fn public_key_len(algorithm: Algorithm, size_bits: u32) -> usize {
    match algorithm {
        Algorithm::EcdsaP256Sha256 => 64,
        Algorithm::EcdsaP384Sha384 => 96,
        Algorithm::Ed25519 => 32,
        Algorithm::Ed448 => 57,
        Algorithm::RsaSha1 | Algorithm::RsaSha512 | Algorithm::RsaSha256 | Algorithm::Unsupported(_) => {
            (size_bits as usize).div_ceil(8).max(1)
        }
    }
}

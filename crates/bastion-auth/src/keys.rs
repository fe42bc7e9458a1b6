//! RSA signing key loading, generation and sharing.
//!
//! # Purpose
//! Provide the process-wide keypair used to sign and verify bearer tokens.
//! Keys are loaded from two PEM files or, if that fails for any reason,
//! generated fresh and written back so the next start can reuse them.
//!
//! # Key invariants
//! - The public key always matches the private key in use. It is derived from
//!   the private key. The public file is only compared against it, and a
//!   mismatch is treated like an unreadable pair.
//! - Key sizes stay within 2048..=4096 bits, the range ring can sign with.
//!   Larger keys on disk are rejected at load time, not at first signature.
//! - The private key file is written unencrypted (PKCS#1 PEM) with mode 0600.
//! - Failing to persist a generated pair never fails startup. Tokens then die
//!   with the process, which is logged at error level.
//!
//! # Concurrency model
//! [`SharedKeys`] hands out `Arc<Keypair>` snapshots. Installing a new pair is
//! a single pointer swap under a write lock, so a reader holds either the old or
//! the new pair, never a mix.
//!
//! # Security
//! - Private key material is never logged. `Debug` only shows the key size.
use crate::config::{MAX_RSA_KEY_SIZE, MIN_RSA_KEY_SIZE, SecurityConfig};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::der::pem;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("read key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse key material: {0}")]
    Parse(String),
    #[error("public key does not match private key")]
    Mismatch,
    #[error("generate RSA key: {0}")]
    Generate(String),
    #[error("write key file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An RSA private key, its public half, and the JWT keys built from them.
#[derive(Clone)]
pub struct Keypair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl Keypair {
    /// Generate a new pair with public exponent 65537.
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        if !(MIN_RSA_KEY_SIZE..=MAX_RSA_KEY_SIZE).contains(&bits) {
            return Err(KeyError::Generate(format!(
                "{bits} bits is outside {MIN_RSA_KEY_SIZE}..={MAX_RSA_KEY_SIZE}"
            )));
        }
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|err| KeyError::Generate(err.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Build a pair from a private key, deriving the public half.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, KeyError> {
        let public_key = private_key.to_public_key();
        let bits = public_key.size() * 8;
        if !(MIN_RSA_KEY_SIZE..=MAX_RSA_KEY_SIZE).contains(&bits) {
            return Err(KeyError::Parse(format!(
                "private key has {bits} bits, signing supports {MIN_RSA_KEY_SIZE}..={MAX_RSA_KEY_SIZE}"
            )));
        }
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|err| KeyError::Parse(format!("encode private key: {err}")))?;
        let public_pem = public_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|err| KeyError::Parse(format!("encode public key: {err}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|err| KeyError::Parse(format!("signing key: {err}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|err| KeyError::Parse(format!("verification key: {err}")))?;
        Ok(Self {
            private_key,
            public_key,
            encoding_key,
            decoding_key,
        })
    }

    /// Parse a PEM encoded pair. PKCS#1 and PKCS#8/SPKI encodings are accepted.
    ///
    /// The public half is derived from the private key. `public_pem` must hold
    /// the same key, compared on its DER encoding.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(private_pem))
            .map_err(|err| KeyError::Parse(format!("private key: {err}")))?;
        let keypair = Self::from_private_key(private_key)?;
        if keypair.public_der_matches(public_pem)? {
            Ok(keypair)
        } else {
            Err(KeyError::Mismatch)
        }
    }

    fn public_der_matches(&self, public_pem: &str) -> Result<bool, KeyError> {
        let (label, der) = pem::decode_vec(public_pem.trim().as_bytes())
            .map_err(|err| KeyError::Parse(format!("public key: {err}")))?;
        let expected = match label {
            "RSA PUBLIC KEY" => self.public_key.to_pkcs1_der().map_err(|err| err.to_string()),
            "PUBLIC KEY" => self
                .public_key
                .to_public_key_der()
                .map_err(|err| err.to_string()),
            other => {
                return Err(KeyError::Parse(format!(
                    "public key: unexpected PEM label {other:?}"
                )));
            }
        }
        .map_err(|err| KeyError::Parse(format!("encode public key: {err}")))?;
        Ok(expected.as_bytes() == der.as_slice())
    }

    pub fn bits(&self) -> usize {
        self.public_key.size() * 8
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// PKCS#1 PEM of the public key.
    pub fn public_key_pem(&self) -> Result<String, KeyError> {
        self.public_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|err| KeyError::Parse(format!("encode public key: {err}")))
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Shared handle to the keypair currently used for signing and verification.
#[derive(Clone, Debug)]
pub struct SharedKeys {
    current: Arc<RwLock<Arc<Keypair>>>,
}

impl SharedKeys {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(keypair))),
        }
    }

    /// Snapshot of the current pair. Callers keep using it even if a rotation
    /// happens while they work.
    pub fn current(&self) -> Arc<Keypair> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current pair. Tokens signed by the previous pair stop validating.
    pub fn install(&self, keypair: Keypair) {
        let next = Arc::new(keypair);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }
}

/// Loads the signing keypair from disk, generating and persisting one when needed.
#[derive(Debug, Clone)]
pub struct KeyStore {
    private_path: PathBuf,
    public_path: PathBuf,
    key_size: usize,
}

impl KeyStore {
    pub fn new(
        private_path: impl Into<PathBuf>,
        public_path: impl Into<PathBuf>,
        key_size: usize,
    ) -> Self {
        Self {
            private_path: private_path.into(),
            public_path: public_path.into(),
            key_size,
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.private_key_path.clone(),
            config.public_key_path.clone(),
            config.rsa_key_size,
        )
    }

    /// Read and parse both key files.
    pub fn load(&self) -> Result<Keypair, KeyError> {
        let private_pem = read_pem(&self.private_path)?;
        let public_pem = read_pem(&self.public_path)?;
        Keypair::from_pem(&private_pem, &public_pem)
    }

    /// Load the pair from disk or fall back to a freshly generated one.
    ///
    /// A configured size outside 2048..=4096 bits is clamped into that range
    /// before generating.
    ///
    /// # Errors
    /// - [`KeyError::Generate`] only, when the system RNG fails during
    ///   generation. Load and persistence failures are logged and absorbed.
    pub fn load_or_generate(&self) -> Result<Keypair, KeyError> {
        match self.load() {
            Ok(keypair) => {
                info!(
                    private = %self.private_path.display(),
                    bits = keypair.bits(),
                    "loaded JWT signing keys"
                );
                return Ok(keypair);
            }
            Err(err) => {
                warn!(
                    private = %self.private_path.display(),
                    public = %self.public_path.display(),
                    error = %err,
                    "could not load JWT RSA keys, generating new pair"
                );
            }
        }

        let bits = self.key_size.clamp(MIN_RSA_KEY_SIZE, MAX_RSA_KEY_SIZE);
        if bits != self.key_size {
            warn!(
                configured = self.key_size,
                bits, "RSA key size outside supported range, clamping"
            );
        }
        let keypair = Keypair::generate(bits)?;
        if let Err(err) = self.persist(&keypair) {
            info!(error = %err, "persisting generated JWT keys failed");
            error!("failed to save JWT RSA keys, logins will not persist across restarts");
        }
        Ok(keypair)
    }

    /// Write the pair to the configured paths. The private key file is owner-only.
    pub fn persist(&self, keypair: &Keypair) -> Result<(), KeyError> {
        let private_pem = keypair
            .private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|err| KeyError::Parse(format!("encode private key: {err}")))?;
        let public_pem = keypair.public_key_pem()?;
        write_private(&self.private_path, private_pem.as_bytes()).map_err(|source| {
            KeyError::Persist {
                path: self.private_path.clone(),
                source,
            }
        })?;
        fs::write(&self.public_path, public_pem.as_bytes()).map_err(|source| {
            KeyError::Persist {
                path: self.public_path.clone(),
                source,
            }
        })?;
        Ok(())
    }

    /// Re-run [`KeyStore::load_or_generate`] and install the result.
    pub fn reload(&self, shared: &SharedKeys) -> Result<(), KeyError> {
        let keypair = self.load_or_generate()?;
        shared.install(keypair);
        Ok(())
    }
}

/// Load the keypair from `private_path`/`public_path`, generating a `key_size`
/// bit pair when either file is missing or unusable. `key_size` is clamped to
/// 2048..=4096 bits, so only an RNG failure makes this return an error.
pub fn load_or_generate(
    private_path: &Path,
    public_path: &Path,
    key_size: usize,
) -> Result<Keypair, KeyError> {
    KeyStore::new(private_path, public_path, key_size).load_or_generate()
}

fn read_pem(path: &Path) -> Result<String, KeyError> {
    fs::read_to_string(path).map_err(|source| KeyError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies to newly created files.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

use crate::claims::Claims;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PRIVATE_KEY_PATH: &str = "/etc/bastion/jwt-privkey.pem";
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "/etc/bastion/jwt-pubkey.pem";
pub const DEFAULT_RSA_KEY_SIZE: usize = 4096;
pub const MIN_RSA_KEY_SIZE: usize = 2048;
/// Largest modulus the RS256 signer (ring) will sign with.
pub const MAX_RSA_KEY_SIZE: usize = 4096;
pub const DEFAULT_TOKEN_VALIDITY_SECS: u64 = 7 * 24 * 60 * 60;
pub const MAX_TOKEN_VALIDITY_SECS: u64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_TOKEN_COOKIE: &str = "adminAuthJwt";
pub const DEFAULT_CSRF_HEADER: &str = "X-Csrf-Token";

// Security settings sourced from environment variables and an optional YAML overlay.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub rsa_key_size: usize,
    pub token_validity: Duration,
    pub token_leeway_secs: u64,
    pub token_cookie: String,
    pub csrf_header: String,
    pub require_auth: bool,
    pub default_context: Option<DefaultContext>,
}

/// Identity used for every request when `require_auth` is off.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DefaultContext {
    pub username: String,
}

impl DefaultContext {
    pub fn claims(&self) -> Claims {
        Claims::for_principal(self.username.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecurityConfigOverride {
    private_key_path: Option<PathBuf>,
    public_key_path: Option<PathBuf>,
    rsa_key_size: Option<usize>,
    token_validity_secs: Option<u64>,
    token_leeway_secs: Option<u64>,
    token_cookie: Option<String>,
    csrf_header: Option<String>,
    require_auth: Option<bool>,
    default_context: Option<DefaultContext>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from(DEFAULT_PRIVATE_KEY_PATH),
            public_key_path: PathBuf::from(DEFAULT_PUBLIC_KEY_PATH),
            rsa_key_size: DEFAULT_RSA_KEY_SIZE,
            token_validity: Duration::from_secs(DEFAULT_TOKEN_VALIDITY_SECS),
            token_leeway_secs: 0,
            token_cookie: DEFAULT_TOKEN_COOKIE.to_string(),
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            require_auth: true,
            default_context: None,
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var("BASTION_JWT_PRIVATE_KEY") {
            config.private_key_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("BASTION_JWT_PUBLIC_KEY") {
            config.public_key_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("BASTION_RSA_KEY_SIZE") {
            config.rsa_key_size = value
                .parse()
                .with_context(|| "parse BASTION_RSA_KEY_SIZE")?;
        }
        if let Ok(value) = std::env::var("BASTION_JWT_EXPIRES_AFTER") {
            let secs: u64 = value
                .parse()
                .with_context(|| "parse BASTION_JWT_EXPIRES_AFTER")?;
            config.token_validity = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("BASTION_JWT_LEEWAY") {
            config.token_leeway_secs = value.parse().with_context(|| "parse BASTION_JWT_LEEWAY")?;
        }
        if let Ok(value) = std::env::var("BASTION_REQUIRE_AUTH") {
            config.require_auth = parse_bool(&value).with_context(|| "parse BASTION_REQUIRE_AUTH")?;
        }
        if let Ok(value) = std::env::var("BASTION_DEFAULT_USER") {
            config.default_context = Some(DefaultContext { username: value });
        }
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("BASTION_SECURITY_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read BASTION_SECURITY_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay settings from a YAML document; absent keys keep their value.
    pub fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: SecurityConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse security config yaml")?;
        if let Some(value) = override_cfg.private_key_path {
            self.private_key_path = value;
        }
        if let Some(value) = override_cfg.public_key_path {
            self.public_key_path = value;
        }
        if let Some(value) = override_cfg.rsa_key_size {
            self.rsa_key_size = value;
        }
        if let Some(value) = override_cfg.token_validity_secs {
            self.token_validity = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.token_leeway_secs {
            self.token_leeway_secs = value;
        }
        if let Some(value) = override_cfg.token_cookie {
            self.token_cookie = value;
        }
        if let Some(value) = override_cfg.csrf_header {
            self.csrf_header = value;
        }
        if let Some(value) = override_cfg.require_auth {
            self.require_auth = value;
        }
        if let Some(value) = override_cfg.default_context {
            self.default_context = Some(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rsa_key_size < MIN_RSA_KEY_SIZE {
            bail!(
                "rsa_key_size must be at least {MIN_RSA_KEY_SIZE} bits, got {}",
                self.rsa_key_size
            );
        }
        if self.rsa_key_size > MAX_RSA_KEY_SIZE {
            bail!(
                "rsa_key_size must be at most {MAX_RSA_KEY_SIZE} bits, got {}",
                self.rsa_key_size
            );
        }
        if self.token_validity.is_zero() {
            bail!("token validity must be positive");
        }
        if self.token_validity.as_secs() > MAX_TOKEN_VALIDITY_SECS {
            bail!(
                "token validity must be at most {MAX_TOKEN_VALIDITY_SECS} seconds, got {}",
                self.token_validity.as_secs()
            );
        }
        // Disabling authentication is only allowed with an explicit identity to fall back to.
        if !self.require_auth && self.default_context.is_none() {
            bail!("require_auth is disabled but no default_context is configured");
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

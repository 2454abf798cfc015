use std::sync::Arc;

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::storage::LocalStore;

/// Session flag written by [`DigestGate`].
pub const AUTH_KEY: &str = "album_auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Session,
    Denied,
}

/// Whatever stands in front of the gallery. The gallery itself never checks
/// a password; the host asks the gate before it builds a session and drops
/// the session once the gate reports otherwise.
pub trait AuthGate: Send + Sync {
    fn authenticate(&self, password: &str) -> Result<AuthOutcome>;
    fn is_authenticated(&self) -> bool;
    fn logout(&self) -> Result<()>;
}

/// No gate at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGate;

impl AuthGate for OpenGate {
    fn authenticate(&self, _password: &str) -> Result<AuthOutcome> {
        Ok(AuthOutcome::Session)
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    fn logout(&self) -> Result<()> {
        Ok(())
    }
}

/// Compares the SHA-256 of the entered password against a configured hex
/// digest. Not an access control boundary: anyone holding the album files
/// can read them.
pub struct DigestGate {
    digest: String,
    session: Arc<dyn LocalStore>,
}

impl DigestGate {
    pub fn new(digest: impl Into<String>, session: Arc<dyn LocalStore>) -> Self {
        Self {
            digest: digest.into().trim().to_ascii_lowercase(),
            session,
        }
    }

    pub fn digest_of(password: &str) -> String {
        hex::encode(Sha256::digest(password.as_bytes()))
    }
}

impl AuthGate for DigestGate {
    fn authenticate(&self, password: &str) -> Result<AuthOutcome> {
        if password.is_empty() || Self::digest_of(password) != self.digest {
            warn!("password rejected");
            return Ok(AuthOutcome::Denied);
        }
        self.session.set(AUTH_KEY, "true")?;
        info!("session authenticated");
        Ok(AuthOutcome::Session)
    }

    fn is_authenticated(&self) -> bool {
        match self.session.get(AUTH_KEY) {
            Ok(flag) => flag.as_deref() == Some("true"),
            Err(err) => {
                warn!(?err, "failed to read session flag");
                false
            }
        }
    }

    fn logout(&self) -> Result<()> {
        self.session.remove(AUTH_KEY)
    }
}

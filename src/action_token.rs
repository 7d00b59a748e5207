//! Anti-forgery tokens bound to an action name and a time window.
//!
//! A token is the truncated HMAC-SHA256 of `"<tick>|<action>"`, where the
//! tick advances every half lifetime. Tokens from the current and the
//! previous tick are accepted.

use std::time::Duration;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Hex characters kept from the MAC.
const TOKEN_LEN: usize = 20;

/// Action guarding the add-provider form.
pub const ADD_PROVIDER_ACTION: &str = "add_zl_providers";
/// Action guarding revocation links.
pub const REVOKE_PROVIDER_ACTION: &str = "zl_revoke_provider";
/// Action guarding AJAX calls.
pub const AJAX_ACTION: &str = "ct_new_style_api_call";

#[derive(Debug, Error)]
pub enum ActionTokenError {
    #[error("action token secret is unusable")]
    InvalidSecret,
    #[error("action token lifetime must be at least two seconds")]
    InvalidLifetime,
}

/// Issues and verifies action tokens.
#[derive(Clone)]
pub struct ActionTokens {
    mac: HmacSha256,
    half_lifetime_secs: u64,
}

impl std::fmt::Debug for ActionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTokens")
            .field("half_lifetime_secs", &self.half_lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl ActionTokens {
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, ActionTokenError> {
        let half_lifetime_secs = lifetime.as_secs() / 2;
        if half_lifetime_secs == 0 {
            return Err(ActionTokenError::InvalidLifetime);
        }
        let mac =
            HmacSha256::new_from_slice(secret).map_err(|_| ActionTokenError::InvalidSecret)?;
        Ok(Self {
            mac,
            half_lifetime_secs,
        })
    }

    /// Tokens signed with a random per-process secret.
    pub fn ephemeral(lifetime: Duration) -> Result<Self, ActionTokenError> {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret, lifetime)
    }

    pub fn create(&self, action: &str) -> String {
        self.create_at(action, unix_secs())
    }

    pub fn verify(&self, action: &str, token: &str) -> bool {
        self.verify_at(action, token, unix_secs())
    }

    fn create_at(&self, action: &str, now_secs: u64) -> String {
        self.sign(self.tick(now_secs), action)
    }

    fn verify_at(&self, action: &str, token: &str, now_secs: u64) -> bool {
        if token.len() != TOKEN_LEN {
            return false;
        }
        let tick = self.tick(now_secs);
        [Some(tick), tick.checked_sub(1)]
            .into_iter()
            .flatten()
            .any(|t| bool::from(self.sign(t, action).as_bytes().ct_eq(token.as_bytes())))
    }

    fn tick(&self, now_secs: u64) -> u64 {
        now_secs / self.half_lifetime_secs
    }

    fn sign(&self, tick: u64, action: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{tick}|{action}").as_bytes());
        let mut token = hex::encode(mac.finalize().into_bytes());
        token.truncate(TOKEN_LEN);
        token
    }
}

fn unix_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

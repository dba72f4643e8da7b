//! One-time login codes, held in memory and keyed by email.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::AppError;

pub const OTP_TTL: Duration = Duration::from_secs(10 * 60);
pub const OTP_COOLDOWN: Duration = Duration::from_secs(60);
pub const OTP_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("aguarde {retry_after_secs}s para solicitar um novo código")]
    Cooldown { retry_after_secs: u64 },
    #[error("nenhum código solicitado para este email")]
    NotRequested,
    #[error("código expirado")]
    Expired,
    #[error("código inválido")]
    Invalid { remaining: u32 },
    #[error("tentativas esgotadas, solicite um novo código")]
    TooManyAttempts,
}

impl OtpError {
    pub fn code(&self) -> &'static str {
        match self {
            OtpError::Cooldown { .. } => "OTP/COOLDOWN",
            OtpError::NotRequested => "OTP/NOT_REQUESTED",
            OtpError::Expired => "OTP/EXPIRED",
            OtpError::Invalid { .. } => "OTP/INVALID",
            OtpError::TooManyAttempts => "OTP/TOO_MANY_ATTEMPTS",
        }
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        let app = AppError::new(err.code(), err.to_string());
        match err {
            OtpError::Cooldown { retry_after_secs } => {
                app.with_context("retry_after_secs", retry_after_secs.to_string())
            }
            OtpError::Invalid { remaining } => {
                app.with_context("remaining_attempts", remaining.to_string())
            }
            _ => app,
        }
    }
}

#[derive(Debug)]
struct OtpEntry {
    hash: String,
    sent_at: Instant,
    expires_at: Instant,
    attempts: u32,
}

fn hash_code(email: &str, code: &str) -> String {
    hex::encode(Sha256::digest(format!("{email}:{code}").as_bytes()))
}

fn chave(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug)]
pub struct OtpStore {
    entries: Mutex<HashMap<String, OtpEntry>>,
    ttl: Duration,
    cooldown: Duration,
    max_attempts: u32,
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new(OTP_TTL, OTP_COOLDOWN, OTP_MAX_ATTEMPTS)
    }
}

impl OtpStore {
    pub fn new(ttl: Duration, cooldown: Duration, max_attempts: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            cooldown,
            max_attempts,
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, OtpError> {
        self.issue_at(email, Instant::now())
    }

    /// Generate a six-digit code, replacing any previous one once the cooldown has passed.
    pub fn issue_at(&self, email: &str, now: Instant) -> Result<String, OtpError> {
        let email = chave(email);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expires_at > now);

        if let Some(entry) = entries.get(&email) {
            let elapsed = now.saturating_duration_since(entry.sent_at);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(OtpError::Cooldown {
                    retry_after_secs: remaining.as_secs().max(1),
                });
            }
        }

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        entries.insert(
            email.clone(),
            OtpEntry {
                hash: hash_code(&email, &code),
                sent_at: now,
                expires_at: now + self.ttl,
                attempts: 0,
            },
        );
        Ok(code)
    }

    pub fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        self.verify_at(email, code, Instant::now())
    }

    /// Check a code. A correct code is consumed; each wrong one costs an attempt.
    pub fn verify_at(&self, email: &str, code: &str, now: Instant) -> Result<(), OtpError> {
        let email = chave(email);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(&email).ok_or(OtpError::NotRequested)?;

        if entry.expires_at <= now {
            entries.remove(&email);
            return Err(OtpError::Expired);
        }
        if entry.attempts >= self.max_attempts {
            entries.remove(&email);
            return Err(OtpError::TooManyAttempts);
        }
        if entry.hash == hash_code(&email, code.trim()) {
            entries.remove(&email);
            return Ok(());
        }

        entry.attempts += 1;
        let remaining = self.max_attempts - entry.attempts;
        if remaining == 0 {
            entries.remove(&email);
            return Err(OtpError::TooManyAttempts);
        }
        Err(OtpError::Invalid { remaining })
    }

    /// Drop any pending code for `email`, lifting its cooldown. Returns whether one existed.
    pub fn revoke(&self, email: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&chave(email))
            .is_some()
    }

    pub fn pending(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_single_use() {
        let store = OtpStore::default();
        let code = store.issue("Admin@Imob.com").expect("issue");
        assert_eq!(code.len(), 6);
        assert_eq!(store.verify("admin@imob.com", &code), Ok(()));
        assert_eq!(
            store.verify("admin@imob.com", &code),
            Err(OtpError::NotRequested)
        );
    }

    #[test]
    fn resend_waits_for_cooldown() {
        let store = OtpStore::default();
        let t0 = Instant::now();
        store.issue_at("a@b.com", t0).expect("first");
        assert!(matches!(
            store.issue_at("a@b.com", t0 + Duration::from_secs(10)),
            Err(OtpError::Cooldown { retry_after_secs: 50 })
        ));
        assert!(store.issue_at("a@b.com", t0 + OTP_COOLDOWN).is_ok());
    }

    #[test]
    fn revoked_code_lifts_the_cooldown() {
        let store = OtpStore::default();
        let t0 = Instant::now();
        let code = store.issue_at("a@b.com", t0).expect("first");
        assert!(store.revoke(" A@B.com "));
        assert!(!store.revoke("a@b.com"));
        assert_eq!(store.verify("a@b.com", &code), Err(OtpError::NotRequested));
        assert!(store.issue_at("a@b.com", t0 + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn expired_codes_are_rejected() {
        let store = OtpStore::default();
        let t0 = Instant::now();
        let code = store.issue_at("a@b.com", t0).expect("issue");
        assert_eq!(
            store.verify_at("a@b.com", &code, t0 + OTP_TTL),
            Err(OtpError::Expired)
        );
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn attempts_are_limited() {
        let store = OtpStore::new(OTP_TTL, OTP_COOLDOWN, 3);
        let code = store.issue("a@b.com").expect("issue");
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            store.verify("a@b.com", wrong),
            Err(OtpError::Invalid { remaining: 2 })
        );
        assert_eq!(
            store.verify("a@b.com", wrong),
            Err(OtpError::Invalid { remaining: 1 })
        );
        assert_eq!(store.verify("a@b.com", wrong), Err(OtpError::TooManyAttempts));
        assert_eq!(store.verify("a@b.com", &code), Err(OtpError::NotRequested));
    }

    #[test]
    fn otp_errors_carry_status_codes() {
        let err = AppError::from(OtpError::Cooldown { retry_after_secs: 5 });
        assert_eq!(err.code(), "OTP/COOLDOWN");
        assert_eq!(err.context().get("retry_after_secs").map(String::as_str), Some("5"));
    }
}

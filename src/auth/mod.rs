//! Admin login: an emailed one-time code exchanged for a bearer token.

pub mod otp;
pub mod token;

pub use otp::{OtpError, OtpStore};
pub use token::{Claims, TokenError, TokenSigner};

use crate::validation::validar_email;
use crate::{AppError, AppResult};

#[derive(Debug)]
pub struct AdminAuth {
    allowlist: Vec<String>,
    otp: OtpStore,
    signer: TokenSigner,
}

impl AdminAuth {
    pub fn new(allowlist: impl IntoIterator<Item = String>, otp: OtpStore, signer: TokenSigner) -> Self {
        Self {
            allowlist: allowlist
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            otp,
            signer,
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.allowlist.iter().any(|a| *a == email)
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Issue a code for an allowlisted address. The caller delivers it.
    pub fn solicitar_codigo(&self, email: &str) -> AppResult<String> {
        if !validar_email(email) {
            return Err(AppError::validation(vec!["email inválido".to_string()]));
        }
        if !self.is_admin(email) {
            tracing::warn!(target: "imobiliaria", event = "otp_denied", reason = "not_allowlisted");
            return Err(AppError::new(
                "AUTH/FORBIDDEN",
                "Email não autorizado para acesso administrativo",
            ));
        }
        Ok(self.otp.issue(email)?)
    }

    /// Forget an issued code that could not be delivered.
    pub fn cancelar_codigo(&self, email: &str) {
        if self.otp.revoke(email) {
            tracing::info!(target: "imobiliaria", event = "otp_revoked");
        }
    }

    /// Exchange a valid code for a token.
    pub fn validar_codigo(&self, email: &str, codigo: &str) -> AppResult<(String, Claims)> {
        if !self.is_admin(email) {
            return Err(AppError::new(
                "AUTH/FORBIDDEN",
                "Email não autorizado para acesso administrativo",
            ));
        }
        self.otp.verify(email, codigo)?;
        let issued = self.signer.issue(email)?;
        tracing::info!(target: "imobiliaria", event = "admin_login", exp = issued.1.exp);
        Ok(issued)
    }

    /// Verify a bearer token and confirm its subject is still allowlisted.
    pub fn autenticar(&self, token: &str) -> AppResult<Claims> {
        let claims = self.signer.verify(token)?;
        if !self.is_admin(&claims.sub) {
            return Err(TokenError::Forbidden.into());
        }
        Ok(claims)
    }
}

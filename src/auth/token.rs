//! HS256 bearer tokens for the admin surface.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_TTL_SECS: i64 = 60 * 60;
pub const ROLE_ADMIN: &str = "admin";

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token ausente")]
    Missing,
    #[error("token malformado")]
    Malformed,
    #[error("algoritmo de token não suportado")]
    UnsupportedAlgorithm,
    #[error("assinatura do token inválida")]
    BadSignature,
    #[error("token expirado")]
    Expired,
    #[error("acesso restrito a administradores")]
    Forbidden,
}

impl TokenError {
    pub fn code(self) -> &'static str {
        match self {
            TokenError::Missing => "AUTH/MISSING_TOKEN",
            TokenError::Malformed => "AUTH/MALFORMED_TOKEN",
            TokenError::UnsupportedAlgorithm => "AUTH/UNSUPPORTED_ALGORITHM",
            TokenError::BadSignature => "AUTH/BAD_SIGNATURE",
            TokenError::Expired => "AUTH/TOKEN_EXPIRED",
            TokenError::Forbidden => "AUTH/FORBIDDEN",
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::new(err.code(), err.to_string())
    }
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl_secs: TOKEN_TTL_SECS,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::BadSignature)?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, email: &str) -> Result<(String, Claims), TokenError> {
        self.issue_at(email, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, email: &str, now_secs: i64) -> Result<(String, Claims), TokenError> {
        let claims = Claims {
            sub: email.trim().to_lowercase(),
            role: ROLE_ADMIN.to_string(),
            iat: now_secs,
            exp: now_secs + self.ttl_secs,
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&signing_input)?.finalize().into_bytes());
        Ok((format!("{signing_input}.{signature}"), claims))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now_secs: i64) -> Result<Claims, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let alg: serde_json::Value = decode_json(header)?;
        if alg.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        self.mac(&format!("{header}.{payload}"))?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_json(payload)?;
        if claims.exp <= now_secs {
            return Err(TokenError::Expired);
        }
        if claims.role != ROLE_ADMIN {
            return Err(TokenError::Forbidden);
        }
        Ok(claims)
    }
}

fn token_part(token: &str, index: usize) -> &str {
    token.trim().split('.').nth(index).unwrap_or_default()
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// Read claims without checking the signature. Used client-side to learn the expiry.
pub fn peek_claims(token: &str) -> Option<Claims> {
    decode_json(token_part(token, 1)).ok()
}

/// Expiry (unix seconds) announced by the token, or one hour from `now_secs`.
pub fn expires_at(token: &str, now_secs: i64) -> i64 {
    peek_claims(token)
        .map(|c| c.exp)
        .unwrap_or(now_secs + TOKEN_TTL_SECS)
}

/// Extract the token from an `Authorization: Bearer ...` header value.
pub fn bearer(header: Option<&str>) -> Result<&str, TokenError> {
    let value = header.ok_or(TokenError::Missing)?.trim();
    let (scheme, token) = value.split_once(' ').ok_or(TokenError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(TokenError::Malformed);
    }
    Ok(token.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_800_000_000;

    #[test]
    fn issued_token_verifies() {
        let signer = TokenSigner::new("segredo");
        let (token, claims) = signer.issue_at("Admin@Imob.com", NOW).expect("issue");
        assert_eq!(claims.sub, "admin@imob.com");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
        assert_eq!(signer.verify_at(&token, NOW + 10), Ok(claims));
    }

    #[test]
    fn rejects_expired_and_tampered_tokens() {
        let signer = TokenSigner::new("segredo");
        let (token, _) = signer.issue_at("a@b.com", NOW).expect("issue");
        assert_eq!(
            signer.verify_at(&token, NOW + TOKEN_TTL_SECS),
            Err(TokenError::Expired)
        );
        assert_eq!(
            TokenSigner::new("outro").verify_at(&token, NOW),
            Err(TokenError::BadSignature)
        );
        assert_eq!(signer.verify_at("a.b", NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn expiry_falls_back_to_one_hour() {
        let (token, claims) = TokenSigner::new("k").issue_at("a@b.com", NOW).expect("issue");
        assert_eq!(expires_at(&token, 0), claims.exp);
        assert_eq!(expires_at("lixo", NOW), NOW + TOKEN_TTL_SECS);
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer(Some("bearer  abc ")), Ok("abc"));
        assert_eq!(bearer(None), Err(TokenError::Missing));
        assert_eq!(bearer(Some("Basic abc")), Err(TokenError::Malformed));
    }

    #[test]
    fn token_errors_map_to_auth_codes() {
        let err = AppError::from(TokenError::Expired);
        assert_eq!(err.code(), "AUTH/TOKEN_EXPIRED");
        assert_eq!(AppError::from(TokenError::Forbidden).code(), "AUTH/FORBIDDEN");
    }
}

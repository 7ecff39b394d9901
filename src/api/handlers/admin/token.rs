//! Signed magic and session tokens for staff login.
//!
//! Flow Overview:
//! 1) `issue_magic` signs a short-lived login token under the magic secret.
//! 2) `verify_magic` exchanges it for nothing but the embedded email.
//! 3) `issue_session` signs the longer-lived API credential under the
//!    session secret.
//!
//! Security boundaries:
//! - The two secrets are independent: compromise of one cannot mint the other.
//! - Every verification checks the `typ` discriminator explicitly; signature
//!   validity alone does not prove intended use.
//! - Verification failures are collapsed into one error so callers cannot
//!   learn which check rejected a token.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const TOKEN_ISSUER: &str = "bursary:admin";
pub(crate) const TYPE_MAGIC: &str = "magic";
pub(crate) const TYPE_SESSION: &str = "session";
pub(crate) const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    typ: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    iat: i64,
    exp: i64,
    iss: String,
    jti: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature, expiry or shape failure. Deliberately undifferentiated.
    #[error("Invalid token")]
    Invalid,
    /// Valid signature but the wrong token class for this verifier.
    #[error("Wrong token type")]
    WrongType,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub email: String,
    pub role: String,
}

pub struct AdminTokenSigner {
    magic_encoding: EncodingKey,
    magic_decoding: DecodingKey,
    session_encoding: EncodingKey,
    session_decoding: DecodingKey,
    magic_ttl_seconds: i64,
    session_ttl_seconds: i64,
}

impl AdminTokenSigner {
    #[must_use]
    pub fn new(
        magic_secret: &SecretString,
        session_secret: &SecretString,
        magic_ttl_seconds: i64,
        session_ttl_seconds: i64,
    ) -> Self {
        Self {
            magic_encoding: EncodingKey::from_secret(magic_secret.expose_secret().as_bytes()),
            magic_decoding: DecodingKey::from_secret(magic_secret.expose_secret().as_bytes()),
            session_encoding: EncodingKey::from_secret(session_secret.expose_secret().as_bytes()),
            session_decoding: DecodingKey::from_secret(session_secret.expose_secret().as_bytes()),
            magic_ttl_seconds,
            session_ttl_seconds,
        }
    }

    /// Sign a short-lived magic token embedding the admin email.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_magic(&self, email: &str) -> Result<IssuedToken> {
        sign(
            &self.magic_encoding,
            email,
            TYPE_MAGIC,
            None,
            self.magic_ttl_seconds,
        )
    }

    /// Sign the longer-lived session token granted after magic verification.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_session(&self, email: &str) -> Result<IssuedToken> {
        sign(
            &self.session_encoding,
            email,
            TYPE_SESSION,
            Some(ROLE_ADMIN),
            self.session_ttl_seconds,
        )
    }

    /// Verify a magic token and return the embedded email.
    ///
    /// # Errors
    /// `Invalid` for any signature/expiry failure, `WrongType` when a
    /// session token is replayed against this verifier.
    pub fn verify_magic(&self, token: &str) -> Result<String, TokenError> {
        let claims = verify(&self.magic_decoding, token)?;
        if claims.typ != TYPE_MAGIC {
            return Err(TokenError::WrongType);
        }
        Ok(claims.sub)
    }

    /// Verify a session token and return the authenticated identity.
    ///
    /// # Errors
    /// `Invalid` for any signature/expiry failure, `WrongType` when a magic
    /// token is presented as a session credential.
    pub fn verify_session(&self, token: &str) -> Result<SessionIdentity, TokenError> {
        let claims = verify(&self.session_decoding, token)?;
        if claims.typ != TYPE_SESSION {
            return Err(TokenError::WrongType);
        }
        let role = claims.role.ok_or(TokenError::Invalid)?;
        Ok(SessionIdentity {
            email: claims.sub,
            role,
        })
    }
}

fn sign(
    key: &EncodingKey,
    email: &str,
    typ: &str,
    role: Option<&str>,
    ttl_seconds: i64,
) -> Result<IssuedToken> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(ttl_seconds);
    let claims = Claims {
        sub: email.to_string(),
        typ: typ.to_string(),
        role: role.map(str::to_string),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        iss: TOKEN_ISSUER.to_string(),
        jti: Uuid::new_v4().to_string(),
    };
    let token = encode(&Header::default(), &claims, key).context("failed to sign token")?;
    Ok(IssuedToken { token, expires_at })
}

fn verify(key: &DecodingKey, token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[TOKEN_ISSUER]);
    // No leeway: an expired credential is expired, full stop.
    validation.leeway = 0;
    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|_| TokenError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::{AdminTokenSigner, Claims, TokenError, ROLE_ADMIN, TOKEN_ISSUER, TYPE_SESSION};
    use anyhow::Result;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use secrecy::SecretString;
    use uuid::Uuid;

    fn signer() -> AdminTokenSigner {
        AdminTokenSigner::new(
            &SecretString::from("magic-secret".to_string()),
            &SecretString::from("session-secret".to_string()),
            15 * 60,
            12 * 60 * 60,
        )
    }

    #[test]
    fn magic_token_round_trips() -> Result<()> {
        let signer = signer();
        let issued = signer.issue_magic("staff@org.example")?;
        assert_eq!(signer.verify_magic(&issued.token), Ok("staff@org.example".to_string()));
        Ok(())
    }

    #[test]
    fn session_token_round_trips_with_role() -> Result<()> {
        let signer = signer();
        let issued = signer.issue_session("staff@org.example")?;
        let identity = signer
            .verify_session(&issued.token)
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(identity.email, "staff@org.example");
        assert_eq!(identity.role, ROLE_ADMIN);
        assert!(issued.expires_at > Utc::now());
        Ok(())
    }

    #[test]
    fn tokens_are_rejected_across_verifiers() -> Result<()> {
        let signer = signer();
        let magic = signer.issue_magic("staff@org.example")?;
        let session = signer.issue_session("staff@org.example")?;

        // Distinct secrets make cross-verification fail on signature alone.
        assert!(matches!(
            signer.verify_session(&magic.token),
            Err(TokenError::Invalid)
        ));
        assert_eq!(signer.verify_magic(&session.token), Err(TokenError::Invalid));
        Ok(())
    }

    #[test]
    fn type_discriminator_is_checked_independently_of_signature() -> Result<()> {
        // A token with typ=session signed under the *magic* secret carries a
        // valid signature for the magic verifier; the discriminator alone
        // must reject it.
        let signer = signer();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "staff@org.example".to_string(),
            typ: TYPE_SESSION.to_string(),
            role: Some(ROLE_ADMIN.to_string()),
            iat: now,
            exp: now + 600,
            iss: TOKEN_ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
        };
        let forged = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"magic-secret"),
        )?;
        assert_eq!(signer.verify_magic(&forged), Err(TokenError::WrongType));
        Ok(())
    }

    #[test]
    fn expired_magic_token_is_invalid() -> Result<()> {
        let signer = AdminTokenSigner::new(
            &SecretString::from("magic-secret".to_string()),
            &SecretString::from("session-secret".to_string()),
            -60,
            12 * 60 * 60,
        );
        let issued = signer.issue_magic("staff@org.example")?;
        assert_eq!(signer.verify_magic(&issued.token), Err(TokenError::Invalid));
        Ok(())
    }

    #[test]
    fn garbage_and_wrong_secret_tokens_are_invalid() -> Result<()> {
        let signer = signer();
        assert_eq!(signer.verify_magic("not-a-token"), Err(TokenError::Invalid));

        let other = AdminTokenSigner::new(
            &SecretString::from("other-magic".to_string()),
            &SecretString::from("other-session".to_string()),
            900,
            3600,
        );
        let issued = other.issue_magic("staff@org.example")?;
        assert_eq!(signer.verify_magic(&issued.token), Err(TokenError::Invalid));
        Ok(())
    }
}

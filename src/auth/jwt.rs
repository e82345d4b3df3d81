//! JWT issuing and verification.
//!
//! One HS256 secret per audience, held in a typed registry. Secrets are
//! base64-encoded at construction and the signing key is derived from the
//! decoded bytes. Tokens signed with any other algorithm are rejected.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JwtAudience {
    Sep10,
    Sep24Interactive,
    Sep24MoreInfo,
    Callback,
    Platform,
    Custody,
}

impl JwtAudience {
    pub fn as_str(self) -> &'static str {
        match self {
            JwtAudience::Sep10 => "sep10",
            JwtAudience::Sep24Interactive => "sep24-interactive",
            JwtAudience::Sep24MoreInfo => "sep24-more-info",
            JwtAudience::Callback => "callback",
            JwtAudience::Platform => "platform",
            JwtAudience::Custody => "custody",
        }
    }
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("no secret configured for audience [{0}]")]
    MissingSecret(&'static str),

    #[error("bad token: {0}")]
    BadToken(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiAuthClaims {
    pub jti: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

pub struct JwtService {
    secrets: HashMap<JwtAudience, String>,
}

impl JwtService {
    pub fn new(secrets: impl IntoIterator<Item = (JwtAudience, String)>) -> Self {
        Self {
            secrets: secrets
                .into_iter()
                .map(|(audience, secret)| (audience, BASE64.encode(secret.as_bytes())))
                .collect(),
        }
    }

    fn secret(&self, audience: JwtAudience) -> Result<&str, JwtError> {
        self.secrets
            .get(&audience)
            .map(String::as_str)
            .ok_or(JwtError::MissingSecret(audience.as_str()))
    }

    pub fn encode(
        &self,
        audience: JwtAudience,
        sub: Option<&str>,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = Utc::now().timestamp();
        let claims = ApiAuthClaims {
            jti: Uuid::new_v4().to_string(),
            aud: audience.as_str().to_string(),
            iat: now,
            exp: now + ttl.num_seconds(),
            sub: sub.map(str::to_string),
        };

        let key = EncodingKey::from_base64_secret(self.secret(audience)?)?;
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
    }

    pub fn decode(&self, audience: JwtAudience, token: &str) -> Result<ApiAuthClaims, JwtError> {
        let key = DecodingKey::from_base64_secret(self.secret(audience)?)?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience.as_str()]);
        let data = decode::<ApiAuthClaims>(token, &key, &validation)?;
        Ok(data.claims)
    }
}

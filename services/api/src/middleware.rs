//! Bearer-token session resolver
//!
//! Tokens are issued by the external credential service; this layer only
//! verifies them and turns the claims into a [`Session`] for the handlers.
//! The marketplace re-checks the claimed role against the stored user.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use dispatch::{actor::Session, models::Role};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User roles; exactly one of `customer` or `driver` is expected
    pub roles: Vec<String>,
    /// Issued at time
    #[serde(default)]
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    #[serde(default)]
    pub token_type: Option<TokenType>,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

impl Claims {
    /// Marketplace role named in the claims
    pub fn role(&self) -> Option<Role> {
        let mut roles = self.roles.iter().filter_map(|r| r.parse::<Role>().ok());
        match (roles.next(), roles.next()) {
            (Some(role), None) => Some(role),
            _ => None,
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Verification key: PEM for asymmetric algorithms, the shared secret
    /// for HMAC ones
    pub public_key: String,
    pub algorithm: Algorithm,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PUBLIC_KEY`: PEM text, or a path to a PEM file (required)
    /// - `JWT_ALGORITHM`: signing algorithm (default: RS256)
    pub fn from_env() -> Result<Self, String> {
        let public_key = env::var("JWT_PUBLIC_KEY")
            .map_err(|_| "JWT_PUBLIC_KEY environment variable not set".to_string())?;

        // If the public key looks like a file path, read from file (try CWD, then crate root)
        let public_key = if public_key.starts_with("-----BEGIN") {
            public_key
        } else {
            std::fs::read_to_string(&public_key)
                .or_else(|_| {
                    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
                    path.push(&public_key);
                    std::fs::read_to_string(path)
                })
                .map_err(|e| format!("Failed to read public key file: {}", e))?
                .trim()
                .to_string()
        };

        let algorithm = match env::var("JWT_ALGORITHM") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| format!("JWT_ALGORITHM is not a supported algorithm: {raw:?}"))?,
            Err(_) => Algorithm::RS256,
        };

        Ok(JwtConfig {
            public_key,
            algorithm,
        })
    }
}

/// Token verifier built once at startup
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &JwtConfig) -> Result<Self, String> {
        let pem = config.public_key.as_bytes();
        let key = match config.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(DecodingKey::from_secret(pem)),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
        }
        .map_err(|e| format!("Failed to create decoding key: {}", e))?;

        let mut validation = Validation::new(config.algorithm);
        validation.validate_exp = true;

        Ok(Self { key, validation })
    }

    /// Verify `token` and resolve the session it carries
    pub fn verify(&self, token: &str) -> Result<Session, ApiError> {
        let token_data =
            jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
                debug!("Failed to validate token: {}", e);
                ApiError::Unauthorized
            })?;
        let claims = token_data.claims;

        if claims.token_type == Some(TokenType::Refresh) {
            debug!(user_id = %claims.sub, "refresh token presented as access token");
            return Err(ApiError::Unauthorized);
        }

        let role = claims.role().ok_or_else(|| {
            error!(user_id = %claims.sub, roles = ?claims.roles, "token carries no usable marketplace role");
            ApiError::Unauthorized
        })?;

        Ok(Session {
            user_id: claims.sub,
            role,
        })
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;
    let session = state.jwt.verify(bearer.token())?;

    // Handlers pick the session up with `Extension<Session>`
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

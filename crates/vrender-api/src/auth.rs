//! Firebase ID token authentication plus the app-attestation header check
//! required on mutating endpoints (§6).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Google JWKS URL for Firebase Auth.
const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase token issuer prefix.
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// JWKS cache TTL.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Decoded Firebase ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: Option<i64>,
}

impl FirebaseClaims {
    pub fn uid(&self) -> &str {
        &self.sub
    }
}

/// Authenticated user extracted from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl From<FirebaseClaims> for AuthUser {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

/// Cached JWKS keys, refreshed at most once per [`JWKS_CACHE_TTL`].
pub struct JwksCache {
    http: Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Instant>,
    project_id: String,
}

impl JwksCache {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let project_id = std::env::var("FIREBASE_PROJECT_ID").or_else(|_| std::env::var("GCP_PROJECT_ID"))?;

        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        let cache = Self {
            http,
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(Instant::now() - JWKS_CACHE_TTL),
            project_id,
        };

        cache.refresh_keys().await?;
        Ok(cache)
    }

    async fn refresh_keys(&self) -> Result<(), Box<dyn std::error::Error>> {
        debug!("refreshing JWKS keys");

        let response = self.http.get(GOOGLE_JWKS_URL).send().await?;
        let jwks: JwksResponse = response.json().await?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)?;
            keys.insert(jwk.kid, key);
        }

        let key_count = keys.len();
        *self.keys.write().await = keys;
        *self.last_refresh.write().await = Instant::now();

        debug!(key_count, "refreshed JWKS keys");
        Ok(())
    }

    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let needs_refresh = {
            let last = self.last_refresh.read().await;
            last.elapsed() > JWKS_CACHE_TTL
        };

        if needs_refresh {
            if let Err(e) = self.refresh_keys().await {
                warn!(error = %e, "failed to refresh JWKS keys");
            }
        }

        self.keys.read().await.get(kid).cloned()
    }

    pub async fn verify_token(&self, token: &str) -> Result<FirebaseClaims, ApiError> {
        let header = decode_header(token).map_err(|e| ApiError::unauthorized(format!("invalid token header: {e}")))?;

        let kid = header.kid.ok_or_else(|| ApiError::unauthorized("token missing key id"))?;

        let key = self.get_key(&kid).await.ok_or_else(|| ApiError::unauthorized("unknown key id"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{FIREBASE_ISSUER_PREFIX}{}", self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let token_data =
            decode::<FirebaseClaims>(token, &key, &validation).map_err(|e| ApiError::unauthorized(format!("token validation failed: {e}")))?;

        Ok(token_data.claims)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("invalid Authorization header format"))?;

        let claims = state.jwks.verify_token(token).await?;
        Ok(AuthUser::from(claims))
    }
}

/// App-attestation token presence, required on every mutating endpoint (§6).
/// Unlike [`AuthUser`] this extractor never rejects by itself — callers decide
/// what to do with `Missing` per-route, since the SSE endpoint tolerates an
/// absent header (logging it) while `POST /render` and `POST /generate-clip`
/// must reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAttestation {
    Present,
    Missing,
}

impl AppAttestation {
    pub fn require(self) -> Result<(), ApiError> {
        match self {
            AppAttestation::Present => Ok(()),
            AppAttestation::Missing => Err(ApiError::unauthorized_code(
                "missing app-attestation token",
                "APP_CHECK_INVALID",
            )),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AppAttestation
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let present = parts
            .headers
            .get("X-Firebase-AppCheck")
            .and_then(|v| v.to_str().ok())
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        if present {
            Ok(AppAttestation::Present)
        } else {
            warn!("request missing app-attestation token");
            Ok(AppAttestation::Missing)
        }
    }
}

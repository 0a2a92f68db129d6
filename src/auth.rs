use std::sync::Arc;

use anyhow::{anyhow, Result};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use base64ct::{Base64UrlUnpadded, Encoding};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHashString, PasswordHasher, PasswordVerifier, SaltString};
use rand::RngCore;

use crate::bail_runner;
use crate::error::RunnerResult;
use crate::state::AppState;

/// API keys allowed to call the endpoint, stored as argon2 PHC strings.
#[derive(Clone, Debug, Default)]
pub struct ApiKeys {
    hashes: Arc<Vec<PasswordHashString>>,
}

impl ApiKeys {
    pub fn from_hashes<S: AsRef<str>>(hashes: &[S]) -> Result<Self> {
        let hashes = hashes
            .iter()
            .map(|hash| {
                PasswordHashString::new(hash.as_ref().trim())
                    .map_err(|e| anyhow!("Invalid API key hash: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            hashes: Arc::new(hashes),
        })
    }

    /// Without keys every request is let through, which is only allowed in local debug mode.
    pub fn is_open(&self) -> bool {
        self.hashes.is_empty()
    }

    #[tracing::instrument(level = "trace", skip_all)]
    pub fn verify(&self, key: &str) -> bool {
        let argon = Argon2::default();
        self.hashes.iter().any(|hash| {
            argon
                .verify_password(key.as_bytes(), &hash.password_hash())
                .is_ok()
        })
    }
}

/// A freshly generated API key together with the hash to put into the configuration.
pub struct GeneratedKey {
    pub key: String,
    pub hash: String,
}

pub fn generate_api_key() -> Result<GeneratedKey> {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    let key = Base64UrlUnpadded::encode_string(&key);

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(key.as_bytes(), &salt)
        .map_err(|e| anyhow!(e))?
        .to_string();

    Ok(GeneratedKey { key, hash })
}

pub(crate) async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> RunnerResult<Response> {
    if state.api_keys.is_open() {
        return Ok(next.run(request).await);
    }

    let key = match bearer {
        Some(TypedHeader(Authorization(bearer))) => bearer.token().to_string(),
        None => bail_runner!(StatusCode::UNAUTHORIZED, "Missing authorization header"),
    };

    // argon2 verification is CPU bound
    let keys = state.api_keys.clone();
    let valid = tokio::task::spawn_blocking(move || keys.verify(&key)).await?;
    if valid {
        Ok(next.run(request).await)
    } else {
        bail_runner!(StatusCode::UNAUTHORIZED, "Invalid API key")
    }
}

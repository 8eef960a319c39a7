//! Cookie parsing with signature verification.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{CookieJar, Key, SignedCookieJar};
use sha2::{Digest, Sha512};

use crate::http::response::ApiError;

/// Derive the cookie signing key from the configured secret.
///
/// The secret is stretched with SHA-512 so any length yields a full key.
pub fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Cookies of the current request.
#[derive(Clone)]
pub struct Cookies {
    raw: CookieJar,
    signed: SignedCookieJar,
}

impl Cookies {
    pub fn from_headers(headers: &HeaderMap, key: Key) -> Self {
        Self {
            raw: CookieJar::from_headers(headers),
            signed: SignedCookieJar::from_headers(headers, key),
        }
    }

    /// Value as sent by the client, signature included if any.
    pub fn get(&self, name: &str) -> Option<String> {
        self.raw.get(name).map(|c| c.value().to_string())
    }

    /// Value of a signed cookie; `None` if missing or the signature fails.
    pub fn verified(&self, name: &str) -> Option<String> {
        self.signed.get(name).map(|c| c.value().to_string())
    }

    /// Jar for building signed `Set-Cookie` responses with the same key.
    pub fn signed_jar(&self) -> SignedCookieJar {
        self.signed.clone()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Cookies {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Cookies>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("cookie parser stage is not installed".into()))
    }
}

/// Pipeline stage: parse cookies and verify signed ones.
pub async fn cookie_middleware(
    State(key): State<Key>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookies = Cookies::from_headers(request.headers(), key);
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

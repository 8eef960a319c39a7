//! Session endpoints backed by the signed `token` cookie.

use axum::{routing::get, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::{json, Value};

use crate::http::cookies::Cookies;

pub const TOKEN_COOKIE: &str = "token";

pub fn router() -> Router {
    Router::new()
        .route("/session", get(session))
        .route("/logout", get(logout))
}

/// Whether the request carries a token cookie with a valid signature.
async fn session(cookies: Cookies) -> Json<Value> {
    Json(json!({ "authenticated": cookies.verified(TOKEN_COOKIE).is_some() }))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    (jar, Json(json!({ "msg": "user logged out!" })))
}

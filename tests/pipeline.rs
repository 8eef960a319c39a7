//! End-to-end behavior of the assembled router, driven without a socket.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use mongodb::bson::doc;
use serde_json::json;
use tower::ServiceExt;

use storefront_api::http::cookies::signing_key;
use storefront_api::{AppContext, HttpServer};

mod common;
use common::{body_json, get, json_request, MemoryStore};

fn app(store: &Arc<MemoryStore>, public: &Path) -> Router {
    let config = Arc::new(common::test_config(public));
    HttpServer::new(AppContext::new(config, store.clone()))
        .unwrap()
        .into_router()
}

fn fixture() -> (Arc<MemoryStore>, tempfile::TempDir) {
    (MemoryStore::new(), tempfile::tempdir().unwrap())
}

#[tokio::test]
async fn unknown_paths_are_not_found_for_any_method() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    for (method, uri) in [
        ("GET", "/api/v1/unknown-path"),
        ("POST", "/api/v1/unknown-path"),
        ("DELETE", "/api/v1/productsX"),
        ("PUT", "/api/v1/orders"),
        ("GET", "/api/v2/products"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body_json(response).await, json!({"msg": "Route does not exist"}));
    }
}

#[tokio::test]
async fn sixty_first_request_from_one_client_is_limited() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let request = |ip: &str| {
        Request::builder()
            .uri("/api/v1/products")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    for i in 0..60 {
        let response = app.clone().oneshot(request("203.0.113.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
    }

    let response = app.clone().oneshot(request("203.0.113.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(
        body_json(response).await,
        json!({"msg": "Too many requests, please try again later."})
    );

    let response = app.oneshot(request("203.0.113.10")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_json_never_reaches_the_store() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .oneshot(json_request("POST", "/api/v1/products", r#"{"name":"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"msg": "Malformed JSON in request body"}));
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_json_is_rejected() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let big = format!(r#"{{"name":"{}"}}"#, "x".repeat(200 * 1024));
    let response = app
        .oneshot(json_request("POST", "/api/v1/products", &big))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bodies_are_sanitized_before_storage() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/products",
            r#"{"name":"<script>alert(1)</script>","$where":"sleep(1000)","specs":{"a.b":1,"color":"red"}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let stored = store.documents("products");
    assert_eq!(stored.len(), 1);
    let mut stored = stored[0].clone();
    stored.remove("_id");
    assert_eq!(
        stored,
        doc! {
            "name": "&lt;script&gt;alert(1)&lt;/script&gt;",
            "specs": {"color": "red"},
        }
    );
}

#[tokio::test]
async fn form_fields_are_sanitized_before_storage() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let boundary = "storefront-form-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"name\"\r\n\r\n\
         <script>x</script>\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"$where\"\r\n\r\n\
         sleep(1)\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"role.admin\"\r\n\r\n\
         true\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/products")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let stored = store.documents("products");
    assert_eq!(stored.len(), 1);
    let mut stored = stored[0].clone();
    stored.remove("_id");
    assert_eq!(stored, doc! { "name": "&lt;script&gt;x&lt;/script&gt;" });
}

#[tokio::test]
async fn trailing_slash_reaches_the_collection_root() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/products/", r#"{"name":"lamp"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(get("/api/v1/products/?name=lamp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["products"][0]["name"], "lamp");
}

#[tokio::test]
async fn query_operators_are_stripped_before_filtering() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    for name in ["lamp", "desk"] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/products",
                &json!({ "name": name }).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(get("/api/v1/products?name%5B%24ne%5D=x"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["count"], 2);

    let response = app
        .oneshot(get("/api/v1/products?name=lamp&%24where=1"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["products"][0]["name"], "lamp");
}

#[tokio::test]
async fn collection_crud_round_trip() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/orders", r#"{"total":42,"status":"pending"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["order"]["_id"].as_str().unwrap().to_string();
    let path = format!("/api/v1/orders/{id}");

    let response = app
        .clone()
        .oneshot(json_request("PATCH", &path, r#"{"status":"paid"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["order"]["status"], "paid");

    let response = app.clone().oneshot(get(&path)).await.unwrap();
    assert_eq!(
        body_json(response).await["order"],
        json!({"_id": id, "total": 42, "status": "paid"})
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"msg": "Success! Item removed."}));

    let response = app.clone().oneshot(get(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({ "msg": format!("No item found with id : {id}") })
    );

    let response = app.oneshot(get("/api/v1/orders/not-an-id")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_passwords_are_never_returned() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/users",
            r#"{"name":"Ada","email":"ada@example.com","password":"secret"}"#,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password").is_none());

    let response = app.oneshot(get("/api/v1/users")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
    assert!(body["users"][0].get("password").is_none());
}

/// `token=<signed value>` as the server would set it.
fn signed_token(secret: &str, value: &'static str) -> String {
    let jar = SignedCookieJar::new(signing_key(secret)).add(Cookie::new("token", value));
    let response = (jar, ()).into_response();
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

fn session_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/api/v1/auth/session");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn signed_cookies_are_verified() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let valid = signed_token("test-secret", "user-1");
    let response = app.clone().oneshot(session_request(Some(&valid))).await.unwrap();
    assert_eq!(body_json(response).await, json!({"authenticated": true}));

    let tampered = format!("{}x", &valid[..valid.len() - 1]);
    let response = app.clone().oneshot(session_request(Some(&tampered))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"authenticated": false}));

    let foreign = signed_token("another-secret", "user-1");
    let response = app.clone().oneshot(session_request(Some(&foreign))).await.unwrap();
    assert_eq!(body_json(response).await, json!({"authenticated": false}));

    let response = app.oneshot(session_request(None)).await.unwrap();
    assert_eq!(body_json(response).await, json!({"authenticated": false}));
}

#[tokio::test]
async fn logout_expires_the_token_cookie() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/logout")
                .header(header::COOKIE, signed_token("test-secret", "user-1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn responses_carry_security_headers_and_request_id() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app.oneshot(get("/api/v1/unknown-path")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["x-xss-protection"], "0");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));
    assert!(!headers.contains_key("x-powered-by"));
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/products")
                .header(header::ORIGIN, "https://shop.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
    assert!(methods.contains("PATCH"));
}

#[tokio::test]
async fn static_files_bypass_routing() {
    let (store, public) = fixture();
    std::fs::write(public.path().join("index.html"), "<h1>storefront</h1>").unwrap();
    let app = app(&store, public.path());

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes, "<h1>storefront</h1>");

    let response = app.oneshot(get("/api/v1/products")).await.unwrap();
    assert_eq!(body_json(response).await, json!({"products": [], "count": 0}));
}

fn upload_request(file_name: &str, content_type: &str, data: &str) -> Request<Body> {
    let boundary = "storefront-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n\
         {data}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/v1/products/uploadImage")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn product_images_are_stored_under_public_uploads() {
    let (store, public) = fixture();
    let app = app(&store, public.path());

    let response = app
        .clone()
        .oneshot(upload_request("lamp.png", "image/png", "PNGDATA"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let image = body["image"].as_str().unwrap().to_string();
    assert!(image.starts_with("/uploads/"));
    assert!(image.ends_with("-lamp.png"));

    let stored = public.path().join(image.trim_start_matches('/'));
    assert_eq!(std::fs::read_to_string(stored).unwrap(), "PNGDATA");

    let response = app.clone().oneshot(get(&image)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(upload_request("notes.txt", "text/plain", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"msg": "Please Upload Image"}));
}

use upload_progress::middleware::add_security_headers;
use upload_progress::server::build_page_router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower::util::ServiceExt;

#[tokio::test]
async fn test_add_security_headers() {
    let app = Router::new()
        .route("/", get(|| async { "hello" }))
        .layer(from_fn(add_security_headers));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");

    let csp = headers.get("content-security-policy").unwrap().to_str().unwrap();
    assert!(csp.contains("connect-src 'self'"));
    assert!(csp.contains("script-src 'self'"));
}

#[tokio::test]
async fn test_index_page() {
    let response = build_page_router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("content-security-policy").is_some());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/app.js"));
}

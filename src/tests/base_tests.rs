use super::{authed, signed_up, status_of, test_context};
use crate::services::contact_store;
use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

#[actix_rt::test]
async fn health_reports_the_database() {
    let ctx = test_context().await;
    let app = test_app!(ctx);

    let request = test::TestRequest::get().uri("/api/health").to_request();
    let response: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(response, json!({ "status": "ok", "database": "up" }));
}

#[actix_rt::test]
async fn contact_messages_are_validated_and_stored() {
    let ctx = test_context().await;
    let app = test_app!(ctx);

    let request = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(&json!({ "name": "Pat", "email": "pat@x.com", "message": "x".repeat(501) }))
        .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::BAD_REQUEST);

    let request = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(&json!({ "name": "Pat", "email": "Pat@X.com", "message": "Do you support cricket?" }))
        .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::OK);

    let stored = contact_store::list(ctx.state.db.pool()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].email, "pat@x.com");
}

#[actix_rt::test]
async fn contact_listing_is_admin_only() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    let alice = signed_up(&ctx, "alice@x.com").await;

    let request = authed(test::TestRequest::get().uri("/admin/contact-messages"), &alice.tokens).to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn internal_lookup_needs_the_service_key() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    signed_up(&ctx, "alice@x.com").await;

    let request = test::TestRequest::get().uri("/internal/users/alice@x.com").to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::UNAUTHORIZED);

    let request = test::TestRequest::get()
        .uri("/internal/users/alice@x.com")
        .insert_header(("X-Local-Service-Key", "local_key"))
        .to_request();
    let user: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(user["email"], "alice@x.com");
}

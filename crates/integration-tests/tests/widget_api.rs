//! Widget settings, config reads, analytics and the click beacon.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use chat_launcher_integration_tests::{
    APP_URL, CLIENT_IP, SCRIPT_TAGS_PATH, TestContext, TestOptions, body_json, location,
    session_token, session_token_signed_with, tenant,
};

fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", CLIENT_IP);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn settings() -> Value {
    json!({ "phone_number": "+1 555-0100", "initial_message": "Hi there" })
}

#[tokio::test]
async fn test_configure_with_session_saves_and_provisions_once() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;

    Mock::given(method("GET"))
        .and(path(SCRIPT_TAGS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "script_tags": [] })))
        .mount(&ctx.shopify)
        .await;
    Mock::given(method("POST"))
        .and(path(SCRIPT_TAGS_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "script_tag": {
                "id": 11,
                "src": format!("{APP_URL}/whatsapp-widget.js?shop=t1.example"),
                "event": "onload"
            }
        })))
        .expect(1)
        .mount(&ctx.shopify)
        .await;

    let token = session_token("t1.example", 60);
    let response = ctx
        .send(post_json("/api/configure-whatsapp", Some(&token), &settings()))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "success": true, "message": "Configuration saved successfully" })
    );

    let response = ctx.send(get("/api/config", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let config = body_json(response).await;
    assert_eq!(config["phone_number"], "+1 555-0100");
    assert_eq!(config["initial_message"], "Hi there");
    assert!(config["updated_at"].is_string());
}

#[tokio::test]
async fn test_configure_survives_provisioning_failure() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;

    Mock::given(method("GET"))
        .and(path(SCRIPT_TAGS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&ctx.shopify)
        .await;

    let token = session_token("t1.example", 60);
    let response = ctx
        .send(post_json("/api/configure-whatsapp", Some(&token), &settings()))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        ctx.store()
            .get_widget_config(&tenant("t1.example"))
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_configure_identity_rules() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;

    // No token, no shop.
    let response = ctx
        .send(post_json("/api/configure-whatsapp", None, &settings()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Body shop that is not installed.
    let mut body = settings();
    body["shop"] = json!("t2.example");
    let response = ctx
        .send(post_json("/api/configure-whatsapp", None, &body))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Body shop naming an installed tenant is not an identity outside dev mode.
    let mut body = settings();
    body["shop"] = json!("t1.example");
    let response = ctx
        .send(post_json("/api/configure-whatsapp", None, &body))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Neither is a token signed with the wrong secret plus a body shop.
    let forged = session_token_signed_with("t2.example", 60, "not-the-secret");
    let response = ctx
        .send(post_json("/api/configure-whatsapp", Some(&forged), &body))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    for shop in ["t1.example", "t2.example"] {
        assert!(
            ctx.store()
                .get_widget_config(&tenant(shop))
                .await
                .unwrap()
                .is_none()
        );
    }

    // Valid token for a tenant that is not installed.
    let token = session_token("t3.example", 60);
    let response = ctx
        .send(post_json("/api/configure-whatsapp", Some(&token), &settings()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_configure_validation() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;
    let token = session_token("t1.example", 60);

    let response = ctx
        .send(post_json(
            "/api/configure-whatsapp",
            Some(&token),
            &json!({ "phone_number": "+1 555-0100" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Missing required fields");

    let response = ctx
        .send(post_json(
            "/api/configure-whatsapp",
            Some(&token),
            &json!({ "phone_number": "12a45", "initial_message": "Hi" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["detail"],
        "Invalid phone number format"
    );
}

#[tokio::test]
async fn test_configure_form_redirects_to_dashboard() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;

    let request = Request::builder()
        .method("POST")
        .uri("/configure-whatsapp")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "shop=t1.example&phone_number=%2B15550100&initial_message=Hello",
        ))
        .unwrap();
    let response = ctx.send(request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard?shop=t1.example&success=1");

    let config = ctx
        .store()
        .get_widget_config(&tenant("t1.example"))
        .await
        .unwrap()
        .expect("saved");
    assert_eq!(config.contact_address.as_str(), "+15550100");
    assert_eq!(config.greeting_text, "Hello");
}

#[tokio::test]
async fn test_configure_form_requires_installation() {
    let ctx = TestContext::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/configure-whatsapp")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("shop=t1.example&phone_number=15550100&initial_message=Hi"))
        .unwrap();
    let response = ctx.send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_config_without_settings_is_empty_object() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;

    let token = session_token("t1.example", 60);
    let response = ctx.send(get("/api/config", Some(&token))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn test_config_rejects_expired_or_missing_token() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;

    let expired = session_token("t1.example", -120);
    let response = ctx.send(get("/api/config", Some(&expired))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // `?shop=` is only honoured with dev tokens enabled.
    let response = ctx.send(get("/api/config?shop=t1.example", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dev_mode_accepts_dev_token_and_shop_query() {
    let ctx = TestContext::with_options(TestOptions {
        allow_dev_tokens: true,
        ..TestOptions::default()
    })
    .await;
    ctx.install("t1.example").await;

    let response = ctx
        .send(get("/api/config", Some("dev-token-t1.example")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.send(get("/api/config?shop=t1.example", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.send(get("/api/config?shop=t2.example", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dev_mode_accepts_body_shop_for_installed_tenant() {
    let ctx = TestContext::with_options(TestOptions {
        allow_dev_tokens: true,
        ..TestOptions::default()
    })
    .await;
    ctx.install("t1.example").await;

    let mut body = settings();
    body["shop"] = json!("t1.example");
    let response = ctx
        .send(post_json("/api/configure-whatsapp", None, &body))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let saved = ctx
        .store()
        .get_widget_config(&tenant("t1.example"))
        .await
        .unwrap()
        .expect("settings saved");
    assert_eq!(saved.greeting_text, "Hi there");

    body["shop"] = json!("t2.example");
    let response = ctx
        .send(post_json("/api/configure-whatsapp", None, &body))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_config_fallback() {
    let ctx = TestContext::new().await;

    let response = ctx.send(get("/api/config-fallback", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .send(get("/api/config-fallback?shop=t1.example", None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    ctx.install("t1.example").await;
    let response = ctx
        .send(get("/api/config-fallback?shop=t1.example", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn test_widget_clicks_feed_analytics() {
    let ctx = TestContext::new().await;
    ctx.install("t1.example").await;
    let token = session_token("t1.example", 60);

    let response = ctx.send(get("/api/analytics", Some(&token))).await;
    assert_eq!(
        body_json(response).await,
        json!({ "widget_clicks": 0, "first_click": null, "last_click": null })
    );

    for _ in 0..3 {
        let response = ctx
            .send(post_json("/api/widget-click", None, &json!({ "shop": "t1.example" })))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));
    }

    let response = ctx.send(get("/api/analytics", Some(&token))).await;
    let analytics = body_json(response).await;
    assert_eq!(analytics["widget_clicks"], 3);
    assert!(analytics["first_click"].is_string());
    assert!(analytics["last_click"].is_string());
}

#[tokio::test]
async fn test_widget_click_soft_failures() {
    let ctx = TestContext::new().await;

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/widget-click")
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::from("not json"))
        .unwrap();
    let response = ctx.send(malformed).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": false }));

    let response = ctx
        .send(post_json("/api/widget-click", None, &json!({ "shop": "bad shop" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": false }));
}

#[tokio::test]
async fn test_widget_click_for_uninstalled_shop_is_not_counted() {
    let ctx = TestContext::new().await;

    for shop in ["junk-1.example", "junk-2.example"] {
        let response = ctx
            .send(post_json("/api/widget-click", None, &json!({ "shop": shop })))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": false }));

        let counter = ctx.store().get_usage_counter(&tenant(shop)).await.unwrap();
        assert_eq!(counter.click_count, 0);
    }

    // Nothing was written for the unknown shops.
    let document = std::fs::read_to_string(&ctx.store_path).unwrap_or_default();
    if !document.is_empty() {
        let document: Value = serde_json::from_str(&document).unwrap();
        let analytics = document["analytics"].as_object().cloned().unwrap_or_default();
        assert!(analytics.is_empty(), "unexpected analytics: {analytics:?}");
    }
}

//! HTTP behaviour of the router, driven in-process.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use variant_sync::api::{AppState, create_router};
use variant_sync::config::{Config, TokenConfig};
use variant_sync::db::Database;
use variant_sync::draft::VariantDraft;
use variant_sync::models::{Asset, Product, ProductStatus};

const TOKEN: &str = "test-token";

fn app() -> (Router, std::sync::Arc<AppState>) {
    let mut config = Config::default();
    config.tokens.push(TokenConfig {
        name: "tests".into(),
        token_hash: TOKEN.into(),
    });
    let db = Database::open_in_memory().unwrap();
    let state = AppState::new(db, config);
    (create_router(state.clone()), state)
}

fn draft(category_id: Option<String>) -> VariantDraft {
    let product = Product {
        id: None,
        slug: None,
        name: "Wrap Dress".into(),
        description: "Midi wrap dress".into(),
        price: Decimal::new(5900, 2),
        discount_price: Decimal::new(4900, 2),
        category_id,
        sku: "WD-100".into(),
        status: ProductStatus::Draft,
        tags: Vec::new(),
        assets: vec![Asset::image("https://cdn.example.com/dress.jpg")],
    };
    VariantDraft::new(product).add_variant().0
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_needs_no_token() {
    let (app, _) = app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_rejects_missing_and_wrong_tokens() {
    let (app, _) = app();
    let request = Request::builder()
        .uri("/api/v1/palette")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/palette")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn palette_and_classification() {
    let (app, _) = app();

    let (status, palette) = send(app.clone(), Method::GET, "/api/v1/palette", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(palette[0]["name"], "Red");
    assert_eq!(palette[0]["hex"], "FF0000");

    let (status, matched) = send(
        app.clone(),
        Method::GET,
        "/api/v1/colors/classify?hex=%23FF00FF",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matched["name"], "Custom");
    assert_eq!(matched["hex"], "FF00FF");

    let (status, _) = send(app, Method::GET, "/api/v1/colors/classify?hex=zzz", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validate_reports_field_errors() {
    let (app, _) = app();
    let body = serde_json::to_value(draft(None)).unwrap();

    let (status, result) = send(app, Method::POST, "/api/v1/products/validate", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "invalid");
    assert_eq!(result["errors"]["category_id"], "Category is required");
}

#[tokio::test]
async fn sync_refuses_invalid_drafts() {
    let (app, _) = app();
    let body = serde_json::to_value(draft(None)).unwrap();

    let (status, result) = send(app, Method::POST, "/api/v1/products/sync", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(result["fields"]["category_id"].is_string());
}

#[tokio::test]
async fn sync_persists_and_returns_settled_draft() {
    let (app, state) = app();
    let category = state.db.add_category("Dresses").unwrap();
    let body = serde_json::to_value(draft(Some(category.id))).unwrap();

    let (status, result) = send(app.clone(), Method::POST, "/api/v1/products/sync", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["report"]["result"], "success");

    let product_id = result["draft"]["product"]["id"].as_str().unwrap().to_string();
    assert_eq!(result["draft"]["variants"][0]["lifecycle"], "persisted");

    let (status, snapshot) = send(
        app.clone(),
        Method::GET,
        &format!("/api/v1/products/{}", product_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["variants"][0]["sizes"].as_array().unwrap().len(), 6);

    let (status, categories) = send(app, Method::GET, "/api/v1/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories[0]["name"], "Dresses");
}

#[tokio::test]
async fn sync_with_unknown_product_is_bad_gateway() {
    let (app, state) = app();
    let category = state.db.add_category("Dresses").unwrap();
    let mut body = serde_json::to_value(draft(Some(category.id))).unwrap();
    body["product"]["id"] = Value::String("ghost".into());

    let (status, result) = send(app, Method::POST, "/api/v1/products/sync", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(result["report"]["result"], "fatal");
}

#[tokio::test]
async fn missing_product_is_not_found() {
    let (app, _) = app();
    let (status, _) = send(app, Method::GET, "/api/v1/products/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

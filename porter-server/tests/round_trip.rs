//! Export from one server, import into another, all through the HTTP API.

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use porter_server::catalog::CatalogStore;
use porter_server::{Config, ServerState};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use shared::models::{
    AttributeOptions, Product, ProductAttribute, ProductType, TAXONOMY_CATEGORY,
};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "porter-test-boundary";

async fn server() -> (ServerState, Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    config.import_batch_size = 2;
    let state = ServerState::initialize(&config).await.unwrap();
    let app = porter_server::api::router(state.clone());
    (state, app, dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn multipart_setup(package: &[u8], update_existing: bool) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"import_file\"; filename=\"package.zip\"\r\nContent-Type: application/zip\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(package);
    body.extend_from_slice(
        format!(
            "\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"update_existing\"\r\n\r\n{}\r\n--{BOUNDARY}--\r\n",
            if update_existing { "1" } else { "0" }
        )
        .as_bytes(),
    );
    Request::builder()
        .method("POST")
        .uri("/api/import/setup")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Variable tee with two sizes sharing one image, plus a simple mug
async fn seed_source(state: &ServerState, dir: &TempDir) -> Vec<i64> {
    let catalog = state.catalog.as_ref();

    let src = dir.path().join("tee.jpg");
    std::fs::write(&src, b"jpeg bytes").unwrap();
    let image = catalog.sideload_attachment(&src, "tee.jpg", None).await.unwrap();
    let shirts = catalog.insert_term(TAXONOMY_CATEGORY, "Shirts", "shirts").await.unwrap();

    let mut tee = Product::new(ProductType::Variable);
    tee.name = "Tee".into();
    tee.sku = "TEE".into();
    tee.image_id = Some(image.id);
    tee.category_ids = vec![shirts.id];
    tee.attributes = vec![ProductAttribute {
        id: 0,
        name: "Size".into(),
        options: AttributeOptions::Values(vec!["S".into(), "M".into()]),
        position: 0,
        visible: true,
        variation: true,
    }];
    tee.meta.insert("_gtin".into(), json!("0123456789"));
    tee.meta.insert("_internal".into(), json!("not exported"));
    catalog.save_product(&mut tee).await.unwrap();

    for (size, price) in [("S", 1000), ("M", 1200)] {
        let mut v = Product::new_variation(tee.id);
        v.sku = format!("TEE-{size}");
        v.regular_price = Some(Decimal::new(price, 2));
        v.image_id = Some(image.id);
        v.variation_attributes.insert("size".into(), size.into());
        catalog.save_product(&mut v).await.unwrap();
    }

    let mut mug = Product::new(ProductType::Simple);
    mug.name = "Mug".into();
    mug.sku = "MUG".into();
    mug.regular_price = Some(Decimal::new(850, 2));
    catalog.save_product(&mut mug).await.unwrap();

    vec![tee.id, mug.id]
}

async fn export_package(app: &Router, ids: &[i64]) -> Vec<u8> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "product_ids": ids }).to_string()))
        .unwrap();
    let (status, headers, bytes) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"product-porter-"));
    assert_eq!(headers[header::CONTENT_LENGTH], bytes.len().to_string().as_str());
    bytes
}

/// Run setup then every batch; returns all log lines
async fn import_package(app: &Router, package: &[u8], update_existing: bool) -> Vec<String> {
    let (status, _, bytes) = send(app, multipart_setup(package, update_existing)).await;
    assert_eq!(status, StatusCode::OK);
    let setup: Value = serde_json::from_slice(&bytes).unwrap();
    let import_id = setup["data"]["import_id"].as_str().unwrap().to_string();
    assert_eq!(setup["data"]["total_products"], 2);
    assert_eq!(setup["data"]["batch_size"], 2);

    let mut logs = Vec::new();
    let mut batch = 1;
    loop {
        let (status, body) = send_json(
            app,
            "POST",
            "/api/import/batch",
            json!({ "import_id": import_id, "batch": batch }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        for line in body["data"]["logs"].as_array().unwrap() {
            logs.push(line.as_str().unwrap().to_string());
        }
        if body["data"]["completed"] == true {
            break;
        }
        batch += 1;
        assert!(batch < 10, "import never completed");
    }

    let (status, body) =
        send_json(app, "POST", "/api/import/cleanup", json!({ "import_id": import_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    logs
}

#[tokio::test]
async fn test_export_then_import_round_trip() {
    let (source, source_app, source_dir) = server().await;
    let ids = seed_source(&source, &source_dir).await;

    let (status, _) = send_json(
        &source_app,
        "PUT",
        "/api/settings",
        json!({ "custom_meta_keys": "_gtin", "custom_taxonomies": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let package = export_package(&source_app, &ids).await;

    let (target, target_app, target_dir) = server().await;
    let logs = import_package(&target_app, &package, false).await;
    assert_eq!(
        logs,
        vec![
            "SUCCESS: Created \"Tee\" (SKU: TEE)".to_string(),
            "SUCCESS: Created \"Mug\" (SKU: MUG)".to_string(),
        ]
    );

    let catalog = target.catalog.as_ref();
    let tee_id = catalog.find_product_id_by_sku("TEE").await.unwrap().unwrap();
    let tee = catalog.find_product(tee_id).await.unwrap().unwrap();
    assert_eq!(tee.product_type, ProductType::Variable);
    assert_eq!(tee.meta.get("_gtin"), Some(&json!("0123456789")));
    assert!(!tee.meta.contains_key("_internal"));

    let categories = catalog.object_terms(tee_id, TAXONOMY_CATEGORY).await.unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].slug, "shirts");

    let children = catalog.children(tee_id).await.unwrap();
    let mut skus: Vec<_> = children.iter().map(|c| c.sku.clone()).collect();
    skus.sort();
    assert_eq!(skus, vec!["TEE-M", "TEE-S"]);

    // parent and both variations share one uploaded file
    let image_id = tee.image_id.unwrap();
    assert!(children.iter().all(|c| c.image_id == Some(image_id)));
    let uploads: Vec<_> = std::fs::read_dir(target_dir.path().join("uploads"))
        .unwrap()
        .collect();
    assert_eq!(uploads.len(), 1);

    // working directories are gone after cleanup
    let leftovers: Vec<_> = std::fs::read_dir(target_dir.path().join("imports"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());

    // importing again without updates only skips
    let logs = import_package(&target_app, &package, false).await;
    assert!(logs.iter().all(|line| line.starts_with("SKIPPED: ")));
    assert_eq!(catalog.children(tee_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_error_responses() {
    let (_state, app, _dir) = server().await;

    let (status, body) = send_json(&app, "POST", "/api/export", json!({ "product_ids": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 7101);

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/import/batch",
        json!({ "import_id": "000000000000", "batch": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 7006);

    // an out-of-range batch number is clamped rather than rejected
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/import/batch",
        json!({ "import_id": "000000000000", "batch": -3 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 7006);

    let (status, _, bytes) = send(&app, multipart_setup(b"not a zip", false)).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 7002);

    let (status, body) = send_json(&app, "POST", "/api/import/cleanup", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);

    let (status, body) = send_json(&app, "GET", "/api/health", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

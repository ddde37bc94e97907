mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use dividend_ml::ml::{self, LinearRegression, ModelStore};
use dividend_ml::models::ModelMetadata;
use dividend_ml::services::LoadedModel;
use dividend_ml::{api, AppState};
use helpers::*;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    db: TestDatabase,
    _dir: TempDir,
}

impl TestApp {
    async fn new(pool: PgPool) -> Self {
        let (dir, store) = temp_store();
        Self::with_store(pool, dir, store).await
    }

    async fn with_store(pool: PgPool, dir: TempDir, store: ModelStore) -> Self {
        let state = Arc::new(AppState::new(pool.clone(), store));
        Self {
            router: api::router(state.clone()),
            state,
            db: TestDatabase::from_pool(pool).await,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap()).await
    }
}

fn predict_body(i: usize) -> Value {
    let r = linear_record("ABC", i);
    json!({
        "open": r.open,
        "high": r.high,
        "low": r.low,
        "volume": r.volume as f64,
        "dividends": r.dividends,
        "earnings": r.earnings,
    })
}

// ============================================================================
// Health & model state
// ============================================================================

#[sqlx::test]
async fn test_health_untrained(pool: PgPool) {
    let app = TestApp::new(pool).await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["state"], "untrained");
    assert_eq!(body["model_info"]["trained"], false);
    assert!(body["last_trained"].is_null());
}

#[sqlx::test]
async fn test_health_reports_unreachable_database(pool: PgPool) {
    let app = TestApp::new(pool.clone()).await;
    pool.close().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "unreachable");
    assert_eq!(body["state"], "untrained");
}

#[sqlx::test]
async fn test_predict_before_training_is_rejected(pool: PgPool) {
    let app = TestApp::new(pool).await;

    let (status, body) = app.post("/predict", predict_body(0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Model not trained yet.");

    let (status, body) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Model not trained yet.");
}

#[sqlx::test]
async fn test_train_without_data(pool: PgPool) {
    let app = TestApp::new(pool).await;

    let (status, body) = app.post("/train", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No data to train on.");
    assert!(!app.state.training.store().model_path().exists());
}

#[sqlx::test]
async fn test_train_then_predict(pool: PgPool) {
    let app = TestApp::new(pool).await;
    seed_linear_rows(&app.db, "ABC", 12).await;

    let (status, body) = app.get("/train").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "trained");
    assert_eq!(body["rows"], 12);
    assert_eq!(body["rows_used"], 12);
    assert_eq!(body["features"], 6);
    assert!(body["mse"].as_f64().unwrap() < 1e-8);
    assert!((body["r2"].as_f64().unwrap() - 1.0).abs() < 1e-8);

    let (status, body) = app.post("/predict", predict_body(5)).await;
    assert_eq!(status, StatusCode::OK);
    let expected = linear_record("ABC", 5).close;
    assert!((body["predicted_close"].as_f64().unwrap() - expected).abs() < 1e-6);

    let (_, health) = app.get("/health").await;
    assert_eq!(health["state"], "trained");
    assert_eq!(health["model_info"]["model_type"], "LinearRegression");
    assert_eq!(health["model_info"]["features_count"], 6);
    assert_eq!(health["model_info"]["rows_used"], 12);
    assert!(health["last_trained"].is_string());

    let store = app.state.training.store();
    assert!(store.model_path().exists());
    assert!(store.load_metadata().await.unwrap().unwrap().trained);
}

#[sqlx::test]
async fn test_retrain_replaces_model(pool: PgPool) {
    let app = TestApp::new(pool).await;
    seed_linear_rows(&app.db, "ABC", 6).await;

    let (status, first) = app.post("/train", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["rows"], 6);

    seed_linear_rows(&app.db, "XYZ", 4).await;
    let (status, second) = app.post("/train", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["rows"], 10);

    let info = app.state.training.model_info().await;
    assert_eq!(info.rows_used, Some(10));
}

#[sqlx::test]
async fn test_overflowing_prediction_is_rejected(pool: PgPool) {
    let app = TestApp::new(pool).await;
    let features = ml::feature_names();
    app.state
        .training
        .handle()
        .replace(LoadedModel {
            model: LinearRegression {
                model_type: "LinearRegression".to_string(),
                feature_names: features.clone(),
                coefficients: vec![1e300; 6],
                intercept: 0.0,
            },
            metadata: ModelMetadata::trained(&features, 1, 0.0, 1.0),
        })
        .await;

    let body = json!({
        "open": 1e10,
        "high": 1e10,
        "low": 1e10,
        "volume": 1e308,
        "dividends": 0.0,
        "earnings": 1.0,
    });
    let (status, body) = app.post("/predict", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("not a finite number"));
}

// ============================================================================
// Metrics
// ============================================================================

#[sqlx::test]
async fn test_metrics_need_two_rows(pool: PgPool) {
    let app = TestApp::new(pool).await;
    seed_linear_rows(&app.db, "ABC", 1).await;

    let (status, _) = app.post("/train", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Not enough data to compute metrics.");
}

#[sqlx::test]
async fn test_metrics_on_current_table(pool: PgPool) {
    let app = TestApp::new(pool).await;
    seed_linear_rows(&app.db, "ABC", 8).await;
    app.post("/train", json!({})).await;

    let (status, body) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let mse = body["mse"].as_f64().unwrap();
    let r2 = body["r2"].as_f64().unwrap();
    assert!(mse.is_finite() && mse >= 0.0);
    assert!(r2 <= 1.0 + 1e-12);
    assert!(body["interpretation"].as_str().unwrap().contains("overfitting"));
}

// ============================================================================
// Startup recovery
// ============================================================================

#[sqlx::test]
async fn test_persisted_model_is_loaded(pool: PgPool) {
    let (dir, store) = temp_store();
    let first = TestApp::with_store(pool.clone(), dir, store.clone()).await;
    seed_linear_rows(&first.db, "ABC", 8).await;
    first.post("/train", json!({})).await;

    // A fresh process over the same artifact paths
    let second_state = Arc::new(AppState::new(pool, store));
    assert!(second_state.training.load_persisted().await.unwrap());

    let router = api::router(second_state);
    let response = router
        .oneshot(
            Request::post("/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(predict_body(2).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test]
async fn test_missing_artifact_stays_untrained(pool: PgPool) {
    let app = TestApp::new(pool).await;
    assert!(!app.state.training.load_persisted().await.unwrap());
    let (_, body) = app.get("/health").await;
    assert_eq!(body["state"], "untrained");
}

// ============================================================================
// Registry
// ============================================================================

#[sqlx::test]
async fn test_registry_round_trip(pool: PgPool) {
    let app = TestApp::new(pool).await;

    let (status, body) = app
        .post("/companies/add", json!({ "ticker": "abc", "name": "Test Co" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "message": "Added ABC" }));

    let (_, body) = app.get("/companies/list").await;
    assert_eq!(body["companies"], json!([{ "ticker": "ABC", "name": "Test Co" }]));

    let (status, body) = app.delete("/delete_company/ABC").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = app.get("/companies").await;
    assert_eq!(body["companies"], json!([]));

    let (status, body) = app.delete("/companies/ABC").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Ticker ABC not found.");
}

#[sqlx::test]
async fn test_registry_duplicate_returns_conflict(pool: PgPool) {
    let app = TestApp::new(pool).await;

    // Older clients send company_name
    let (status, _) = app
        .post("/companies", json!({ "ticker": "ABC", "company_name": "Test Co" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/companies/add", json!({ "ticker": "ABC", "name": "Again" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "duplicate");
    assert_eq!(body["message"], "Ticker ABC already exists.");
}

#[sqlx::test]
async fn test_malformed_body_is_client_error(pool: PgPool) {
    let app = TestApp::new(pool).await;

    let (status, _) = app.post("/predict", json!({ "open": "ten" })).await;
    assert!(status.is_client_error());

    let (status, _) = app.post("/companies/add", json!({ "ticker": "ABC" })).await;
    assert!(status.is_client_error());
}

// ============================================================================
// Data
// ============================================================================

#[sqlx::test]
async fn test_data_returns_latest_ten_newest_first(pool: PgPool) {
    let app = TestApp::new(pool).await;
    seed_linear_rows(&app.db, "ABC", 14).await;

    for uri in ["/data", "/fundamental/data"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK);

        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0]["date"], quarter_start(13).to_string());
        assert_eq!(rows[0]["ticker"], "ABC");
        assert_eq!(rows[0]["earnings"], 1.0);
    }
}

#![allow(dead_code)]

use argon2::{Algorithm, Argon2, Params, Version};
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use backend::auth::{hash_password_with, TokenService};
use backend::bootstrap::{seed, SeedConfig};
use backend::db::Store;
use backend::memory::MemoryStore;
use backend::model::{NewUser, Role};
use backend::rest::{create_router, AppState};
use backend::scorer::AnomalyScorer;
use backend::training::{train, TrainingConfig};
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

pub const DEVICE_ID: &str = "DEV-001";
pub const DEVICE_KEY: &str = "secret-api-key";
pub const PASSWORD: &str = "correct horse";

/// Low-cost Argon2 so tests do not spend seconds hashing.
pub fn cheap_hash(password: &str) -> backend::errors::Result<String> {
    let params = Params::new(8, 1, 1, None).unwrap();
    hash_password_with(&Argon2::new(Algorithm::Argon2id, Version::V0x13, params), password)
}

/// Scorer trained once with the default synthetic data.
pub fn trained_scorer() -> AnomalyScorer {
    static SCORER: OnceLock<AnomalyScorer> = OnceLock::new();
    SCORER
        .get_or_init(|| AnomalyScorer::new(train(&TrainingConfig::default()).unwrap().forest))
        .clone()
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

/// Store seeded with the admin, a technician, a viewer and DEV-001.
pub async fn app_with(scorer: AnomalyScorer) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    seed(
        &*store,
        &SeedConfig {
            admin_username: "admin".to_string(),
            admin_password: PASSWORD.to_string(),
            device_id: DEVICE_ID.to_string(),
            device_name: "Ventilator-X1".to_string(),
            device_key: DEVICE_KEY.to_string(),
        },
        cheap_hash,
    )
    .await
    .unwrap();

    for (username, role) in [("tech", Role::Technician), ("viewer", Role::Viewer)] {
        store
            .insert_user_if_absent(NewUser {
                username: username.to_string(),
                password_hash: cheap_hash(PASSWORD).unwrap(),
                role,
            })
            .await
            .unwrap();
    }

    let state = AppState {
        store: store.clone(),
        scorer: Arc::new(scorer),
        tokens: Arc::new(TokenService::new(
            b"integration-secret",
            chrono::Duration::minutes(30),
        )),
        decoy_hash: cheap_hash("decoy").unwrap().into(),
    };

    TestApp {
        store,
        router: create_router(state),
    }
}

pub async fn app() -> TestApp {
    app_with(trained_scorer()).await
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        let body = format!("username={}&password={}", username, password.replace(' ', "+"));
        self.post_raw("/token", "application/x-www-form-urlencoded", body).await
    }

    pub async fn token(&self, username: &str) -> String {
        let response = self.login(username, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        json["access_token"].as_str().unwrap().to_string()
    }

    pub async fn post_reading(&self, payload: serde_json::Value) -> Response<Body> {
        self.post_raw("/device-data", "application/json", payload.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, content_type: &str, body: String) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn healthy_payload() -> serde_json::Value {
    serde_json::json!({
        "device_id": DEVICE_ID,
        "api_key": DEVICE_KEY,
        "motor_current": 2.5,
        "motor_rpm": 3000,
        "vibration_level": 0.05,
        "device_temperature": 37.0,
        "battery_voltage": 12.0,
        "error_count": 0
    })
}

pub fn degraded_payload() -> serde_json::Value {
    let mut payload = healthy_payload();
    payload["device_temperature"] = 55.0.into();
    payload["vibration_level"] = 0.3.into();
    payload["error_count"] = 3.into();
    payload
}

use crate::auth::{verify_login, AuthUser, TokenService};
use crate::db::Store;
use crate::errors::Error;
use crate::ingest::ingest;
use crate::metrics::{self, LOGINS_TOTAL, LOGIN_FAILURES_TOTAL};
use crate::model::{
    Alert, AuditEntry, DeviceDataIn, IngestResponse, LoginForm, Role, SensorReading, TokenResponse,
};
use crate::scorer::AnomalyScorer;
use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        FromRequest, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const MAX_ALERTS: i64 = 50;
pub const MAX_AUDIT_ENTRIES: i64 = 100;

/// Shared, read-only handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub scorer: Arc<AnomalyScorer>,
    pub tokens: Arc<TokenService>,
    /// PHC hash verified when the username is unknown, so failed logins
    /// take the same time whether or not the user exists.
    pub decoy_hash: Arc<str>,
}

/// `Json` whose rejections are rendered as `{"detail": ...}`.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(Error))]
struct JsonBody<T>(T);

/// `Form` whose rejections are rendered as `{"detail": ...}`.
#[derive(FromRequest)]
#[from_request(via(Form), rejection(Error))]
struct FormBody<T>(T);

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<FormRejection> for Error {
    fn from(rejection: FormRejection) -> Self {
        Error::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/token", post(login))
        .route("/device-data", post(receive_device_data))
        .route("/alerts", get(get_alerts))
        .route("/device-status/:device_id", get(get_device_status))
        .route("/audit-logs", get(get_audit_logs))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn login(
    State(state): State<AppState>,
    FormBody(form): FormBody<LoginForm>,
) -> Result<Json<TokenResponse>, Error> {
    let user = state.store.find_user(&form.username).await?;

    let (user, verified) = {
        let password = form.password;
        let decoy = state.decoy_hash.clone();
        tokio::task::spawn_blocking(move || {
            let verified = verify_login(user.as_ref(), &password, &decoy);
            (user, verified)
        })
        .await
        .map_err(|e| Error::PasswordHash(e.to_string()))?
    };
    let verified = verified?;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            LOGIN_FAILURES_TOTAL.inc();
            warn!("Failed login for user {}", form.username);
            return Err(Error::Authentication("Incorrect username or password".to_string()));
        }
    };

    let access_token = state.tokens.issue(&user.username, user.role)?;
    state
        .store
        .append_audit(user.id, "LOGIN", &format!("User {} logged in", user.username))
        .await?;
    LOGINS_TOTAL.inc();
    info!("User {} logged in as {}", user.username, user.role);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

async fn receive_device_data(
    State(state): State<AppState>,
    JsonBody(data): JsonBody<DeviceDataIn>,
) -> Result<Json<IngestResponse>, Error> {
    let recorded = ingest(state.store.as_ref(), &state.scorer, data).await?;
    Ok(Json(IngestResponse {
        status: "success".to_string(),
        is_anomaly: recorded.reading.is_anomaly,
        anomaly_score: recorded.reading.anomaly_score,
    }))
}

async fn get_alerts(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Alert>>, Error> {
    user.require(Role::Technician)?;
    Ok(Json(state.store.recent_alerts(MAX_ALERTS).await?))
}

async fn get_device_status(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    _user: AuthUser,
) -> Result<Json<SensorReading>, Error> {
    state
        .store
        .latest_reading(&device_id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound("No data found for this device".to_string()))
}

async fn get_audit_logs(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<AuditEntry>>, Error> {
    user.require(Role::Admin)?;
    Ok(Json(state.store.recent_audit(MAX_AUDIT_ENTRIES).await?))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "model_loaded": state.scorer.is_loaded() }))
}

async fn metrics_handler() -> Result<String, Error> {
    metrics::gather_metrics().map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::Authorization { .. } => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Rejected { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("API error: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({ "detail": detail }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

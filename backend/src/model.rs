use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names of the six measurements fed to the anomaly model, in vector order.
pub const FEATURE_NAMES: [&str; 6] = [
    "motor_current",
    "motor_rpm",
    "vibration_level",
    "device_temperature",
    "battery_voltage",
    "error_count",
];

pub const DEVICE_STATUS_ACTIVE: &str = "active";

/// User role, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Technician,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Technician => "technician",
            Role::Admin => "admin",
        }
    }

    /// True when this role grants at least the access of `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "technician" => Ok(Role::Technician),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Device {
    pub id: String,
    pub name: String,
    /// SHA-256 hex digest of the device's shared secret.
    pub key_hash: String,
    pub status: String,
}

impl Device {
    pub fn is_active(&self) -> bool {
        self.status == DEVICE_STATUS_ACTIVE
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// One persisted, scored reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub device_id: String,
    pub motor_current: f64,
    pub motor_rpm: f64,
    pub vibration_level: f64,
    pub device_temperature: f64,
    pub battery_voltage: f64,
    pub error_count: i32,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: i64,
    pub device_id: String,
    pub message: String,
    pub severity: String,
    pub is_resolved: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// The six measurements scored by the anomaly model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorFeatures {
    pub motor_current: f64,
    pub motor_rpm: f64,
    pub vibration_level: f64,
    pub device_temperature: f64,
    pub battery_voltage: f64,
    pub error_count: i32,
}

impl SensorFeatures {
    /// Feature vector in `FEATURE_NAMES` order.
    pub fn to_vector(&self) -> [f64; 6] {
        [
            self.motor_current,
            self.motor_rpm,
            self.vibration_level,
            self.device_temperature,
            self.battery_voltage,
            f64::from(self.error_count),
        ]
    }
}

/// Body of `POST /device-data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDataIn {
    pub device_id: String,
    pub api_key: String,
    #[serde(flatten)]
    pub features: SensorFeatures,
}

#[derive(Debug, Clone)]
pub struct NewReading {
    pub device_id: String,
    pub features: SensorFeatures,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub device_id: String,
    pub message: String,
    pub severity: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub id: String,
    pub name: String,
    pub key_hash: String,
}

/// Reading and optional alert written by one ingestion.
#[derive(Debug, Clone)]
pub struct RecordedReading {
    pub reading: SensorReading,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

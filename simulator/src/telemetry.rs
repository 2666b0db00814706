use serde::{Deserialize, Serialize};

/// Payload posted to the backend's `/device-data` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub device_id: String,
    pub api_key: String,
    pub motor_current: f64,
    pub motor_rpm: f64,
    pub vibration_level: f64,
    pub device_temperature: f64,
    pub battery_voltage: f64,
    pub error_count: i32,
}

/// Backend reply to an accepted reading.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestReply {
    pub status: String,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
}

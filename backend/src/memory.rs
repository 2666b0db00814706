use crate::db::Store;
use crate::errors::{Error, Result};
use crate::model::{
    Alert, AuditEntry, Device, NewAlert, NewDevice, NewReading, NewUser, RecordedReading,
    SensorReading, User, DEVICE_STATUS_ACTIVE,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    devices: Vec<Device>,
    users: Vec<User>,
    readings: Vec<SensorReading>,
    alerts: Vec<Alert>,
    audit: Vec<AuditEntry>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process `Store` with the same ordering and referential rules as the
/// Postgres schema. Ids increase monotonically across all tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reading_count(&self) -> usize {
        self.tables.read().await.readings.len()
    }

    pub async fn alert_count(&self) -> usize {
        self.tables.read().await.alerts.len()
    }

    pub async fn set_device_status(&self, device_id: &str, status: &str) {
        let mut tables = self.tables.write().await;
        if let Some(device) = tables.devices.iter_mut().find(|d| d.id == device_id) {
            device.status = status.to_string();
        }
    }
}

/// Newest first: timestamp descending, id descending on ties.
fn newest_first<T: Clone>(
    rows: &[T],
    key: impl Fn(&T) -> (chrono::DateTime<Utc>, i64),
    limit: i64,
) -> Vec<T> {
    let mut rows = rows.to_vec();
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
    rows.truncate(usize::try_from(limit).unwrap_or(0));
    rows
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_device(&self, device_id: &str) -> Result<Option<Device>> {
        let tables = self.tables.read().await;
        Ok(tables.devices.iter().find(|d| d.id == device_id).cloned())
    }

    async fn record_reading(
        &self,
        reading: NewReading,
        alert: Option<NewAlert>,
    ) -> Result<RecordedReading> {
        let mut tables = self.tables.write().await;

        let known = |id: &str| tables.devices.iter().any(|d| d.id == id);
        if !known(&reading.device_id) || alert.as_ref().is_some_and(|a| !known(&a.device_id)) {
            return Err(Error::NotFound(format!(
                "Device {} is not registered",
                reading.device_id
            )));
        }

        let timestamp = Utc::now();
        let features = reading.features;
        let stored = SensorReading {
            id: tables.next_id(),
            device_id: reading.device_id,
            motor_current: features.motor_current,
            motor_rpm: features.motor_rpm,
            vibration_level: features.vibration_level,
            device_temperature: features.device_temperature,
            battery_voltage: features.battery_voltage,
            error_count: features.error_count,
            anomaly_score: reading.anomaly_score,
            is_anomaly: reading.is_anomaly,
            timestamp,
        };
        tables.readings.push(stored.clone());

        let alert = alert.map(|alert| {
            let stored = Alert {
                id: tables.next_id(),
                device_id: alert.device_id,
                message: alert.message,
                severity: alert.severity,
                is_resolved: false,
                timestamp,
            };
            tables.alerts.push(stored.clone());
            stored
        });

        Ok(RecordedReading {
            reading: stored,
            alert,
        })
    }

    async fn latest_reading(&self, device_id: &str) -> Result<Option<SensorReading>> {
        let tables = self.tables.read().await;
        Ok(tables
            .readings
            .iter()
            .filter(|r| r.device_id == device_id)
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.alerts, |a| (a.timestamp, a.id), limit))
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn append_audit(&self, user_id: i64, action: &str, details: &str) -> Result<AuditEntry> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(Error::NotFound(format!("User {} does not exist", user_id)));
        }

        let entry = AuditEntry {
            id: tables.next_id(),
            user_id,
            action: action.to_string(),
            details: details.to_string(),
            timestamp: Utc::now(),
        };
        tables.audit.push(entry.clone());
        Ok(entry)
    }

    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.audit, |e| (e.timestamp, e.id), limit))
    }

    async fn insert_user_if_absent(&self, user: NewUser) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Ok(false);
        }

        let id = tables.next_id();
        tables.users.push(User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
        });
        Ok(true)
    }

    async fn insert_device_if_absent(&self, device: NewDevice) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.devices.iter().any(|d| d.id == device.id) {
            return Ok(false);
        }

        tables.devices.push(Device {
            id: device.id,
            name: device.name,
            key_hash: device.key_hash,
            status: DEVICE_STATUS_ACTIVE.to_string(),
        });
        Ok(true)
    }
}

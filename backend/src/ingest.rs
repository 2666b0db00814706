use crate::auth::verify_device_key;
use crate::db::Store;
use crate::errors::{Error, Result};
use crate::metrics::{
    ANOMALIES_TOTAL, DEVICE_AUTH_FAILURES_TOTAL, INGEST_LATENCY_SECONDS, READINGS_TOTAL,
};
use crate::model::{DeviceDataIn, NewAlert, NewReading, RecordedReading};
use crate::scorer::AnomalyScorer;
use crate::validate::validate;
use std::time::Instant;
use tracing::{debug, warn};

pub const ALERT_SEVERITY: &str = "High";

pub fn alert_message(score: f64) -> String {
    format!("Anomaly detected! Score: {:.4}", score)
}

/// Authenticates the device, scores the reading and persists it together
/// with an alert when the model flags it.
pub async fn ingest(
    store: &dyn Store,
    scorer: &AnomalyScorer,
    data: DeviceDataIn,
) -> Result<RecordedReading> {
    let start = Instant::now();

    let device = store.find_device(&data.device_id).await?;
    let device = match device {
        Some(device) if device.is_active() && verify_device_key(&device, &data.api_key) => device,
        _ => {
            DEVICE_AUTH_FAILURES_TOTAL.inc();
            warn!("Rejected reading for device {}: bad device id or key", data.device_id);
            return Err(Error::Authentication("Invalid Device ID or API Key".to_string()));
        }
    };

    validate(&data.features)?;

    let score = scorer.score(&data.features);
    let alert = score.is_anomaly.then(|| NewAlert {
        device_id: device.id.clone(),
        message: alert_message(score.score),
        severity: ALERT_SEVERITY.to_string(),
    });

    let recorded = store
        .record_reading(
            NewReading {
                device_id: device.id,
                features: data.features,
                anomaly_score: score.score,
                is_anomaly: score.is_anomaly,
            },
            alert,
        )
        .await?;

    READINGS_TOTAL.inc();
    INGEST_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());

    if recorded.alert.is_some() {
        ANOMALIES_TOTAL.inc();
        warn!(
            "Anomaly on device {}: score {:.4} (reading {})",
            recorded.reading.device_id, score.score, recorded.reading.id
        );
    } else {
        debug!(
            "Reading {} from {} scored {:.4}",
            recorded.reading.id, recorded.reading.device_id, score.score
        );
    }

    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_device_key;
    use crate::memory::MemoryStore;
    use crate::model::{NewDevice, SensorFeatures};
    use crate::training::{train, TrainingConfig};

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_device_if_absent(NewDevice {
                id: "DEV-001".to_string(),
                name: "Ventilator-X1".to_string(),
                key_hash: hash_device_key("secret-api-key"),
            })
            .await
            .unwrap();
        store
    }

    fn trained_scorer() -> AnomalyScorer {
        AnomalyScorer::new(train(&TrainingConfig::default()).unwrap().forest)
    }

    fn payload(device_id: &str, api_key: &str) -> DeviceDataIn {
        DeviceDataIn {
            device_id: device_id.to_string(),
            api_key: api_key.to_string(),
            features: SensorFeatures {
                motor_current: 2.5,
                motor_rpm: 3000.0,
                vibration_level: 0.05,
                device_temperature: 37.0,
                battery_voltage: 12.0,
                error_count: 0,
            },
        }
    }

    fn degraded(mut data: DeviceDataIn) -> DeviceDataIn {
        data.features.device_temperature = 55.0;
        data.features.vibration_level = 0.3;
        data.features.error_count = 3;
        data
    }

    #[test]
    fn test_alert_message_format() {
        assert_eq!(alert_message(-0.123456), "Anomaly detected! Score: -0.1235");
    }

    #[tokio::test]
    async fn test_normal_reading_persists_without_alert() {
        let store = store().await;
        let recorded = ingest(&store, &trained_scorer(), payload("DEV-001", "secret-api-key"))
            .await
            .unwrap();

        assert!(!recorded.reading.is_anomaly);
        assert!(recorded.alert.is_none());
        assert_eq!(store.reading_count().await, 1);
        assert_eq!(store.alert_count().await, 0);
    }

    #[tokio::test]
    async fn test_anomalous_reading_raises_one_alert() {
        let store = store().await;
        let data = degraded(payload("DEV-001", "secret-api-key"));
        let recorded = ingest(&store, &trained_scorer(), data).await.unwrap();

        assert!(recorded.reading.is_anomaly);
        assert!(recorded.reading.anomaly_score < 0.0);
        let alert = recorded.alert.unwrap();
        assert_eq!(alert.severity, ALERT_SEVERITY);
        assert_eq!(alert.message, alert_message(recorded.reading.anomaly_score));
        assert_eq!(store.reading_count().await, 1);
        assert_eq!(store.alert_count().await, 1);
    }

    #[tokio::test]
    async fn test_bad_credentials_persist_nothing() {
        let store = store().await;
        let scorer = trained_scorer();

        for data in [
            payload("DEV-404", "secret-api-key"),
            payload("DEV-001", "wrong-key"),
            degraded(payload("DEV-001", "")),
        ] {
            let result = ingest(&store, &scorer, data).await;
            assert!(matches!(result, Err(Error::Authentication(_))));
        }

        assert_eq!(store.reading_count().await, 0);
        assert_eq!(store.alert_count().await, 0);
    }

    #[tokio::test]
    async fn test_inactive_device_is_refused() {
        let store = store().await;
        store.set_device_status("DEV-001", "retired").await;

        let result = ingest(&store, &trained_scorer(), payload("DEV-001", "secret-api-key")).await;
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(store.reading_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_reading_is_rejected_after_auth() {
        let store = store().await;
        let mut data = payload("DEV-001", "secret-api-key");
        data.features.error_count = -2;

        let result = ingest(&store, &trained_scorer(), data).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(store.reading_count().await, 0);
    }

    #[tokio::test]
    async fn test_without_model_nothing_is_anomalous() {
        let store = store().await;
        let data = degraded(payload("DEV-001", "secret-api-key"));
        let recorded = ingest(&store, &AnomalyScorer::disabled(), data).await.unwrap();

        assert!(!recorded.reading.is_anomaly);
        assert_eq!(recorded.reading.anomaly_score, 0.0);
        assert_eq!(store.alert_count().await, 0);
    }
}

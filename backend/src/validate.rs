use crate::errors::{Error, Result};
use crate::model::SensorFeatures;

/// Validates the measurements of an incoming reading
pub fn validate(features: &SensorFeatures) -> Result<()> {
    let measurements = [
        ("motor_current", features.motor_current),
        ("motor_rpm", features.motor_rpm),
        ("vibration_level", features.vibration_level),
        ("device_temperature", features.device_temperature),
        ("battery_voltage", features.battery_voltage),
    ];

    for (name, value) in measurements {
        if !value.is_finite() {
            return Err(Error::Validation(format!("{} must be a finite number", name)));
        }
    }

    if features.error_count < 0 {
        return Err(Error::Validation(format!(
            "error_count {} cannot be negative",
            features.error_count
        )));
    }

    Ok(())
}

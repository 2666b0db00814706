//! Reading generator with a built-in wear-out schedule.
//!
//! Cycles `1..=DEGRADATION_START` are healthy. Afterwards temperature,
//! vibration and motor current drift upward linearly with the cycle number,
//! and from `ERRORS_START` on the device reports 1-3 errors per reading.

use rand::Rng;
use rand_distr::StandardNormal;

pub const DEGRADATION_START: u64 = 20;
pub const ERRORS_START: u64 = 30;

/// Measurements for one cycle, before they are attached to a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub motor_current: f64,
    pub motor_rpm: f64,
    pub vibration_level: f64,
    pub device_temperature: f64,
    pub battery_voltage: f64,
    pub error_count: i32,
}

fn gauss(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + std_dev * z
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Drift applied at `cycle`; zero until degradation starts.
pub fn degradation_factor(cycle: u64) -> f64 {
    cycle.saturating_sub(DEGRADATION_START) as f64 * 0.1
}

/// Generates the reading for `cycle` (1-based).
pub fn generate_reading(rng: &mut impl Rng, cycle: u64) -> Reading {
    let mut motor_current = gauss(rng, 2.5, 0.1);
    let motor_rpm = gauss(rng, 3000.0, 50.0);
    let mut vibration_level = gauss(rng, 0.05, 0.005);
    let mut device_temperature = gauss(rng, 37.0, 0.2);
    let battery_voltage = gauss(rng, 12.0, 0.05);

    let factor = degradation_factor(cycle);
    device_temperature += factor;
    vibration_level += factor * 0.01;
    motor_current += factor * 0.05;

    let error_count = if cycle > ERRORS_START {
        rng.gen_range(1..=3)
    } else {
        0
    };

    Reading {
        motor_current: round_to(motor_current, 3),
        motor_rpm: round_to(motor_rpm, 2),
        vibration_level: round_to(vibration_level, 4),
        device_temperature: round_to(device_temperature, 2),
        battery_voltage: round_to(battery_voltage, 2),
        error_count,
    }
}

pub mod degradation;
pub mod telemetry;

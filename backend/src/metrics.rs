use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "backend_readings_total",
        "Total sensor readings persisted"
    ))
    .unwrap();
    pub static ref ANOMALIES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "backend_anomalies_total",
        "Total readings flagged as anomalous"
    ))
    .unwrap();
    pub static ref DEVICE_AUTH_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "backend_device_auth_failures_total",
        "Total readings rejected for an unknown device or wrong key"
    ))
    .unwrap();
    pub static ref LOGINS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "backend_logins_total",
        "Total successful user logins"
    ))
    .unwrap();
    pub static ref LOGIN_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "backend_login_failures_total",
        "Total rejected user logins"
    ))
    .unwrap();
    pub static ref INGEST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "backend_ingest_latency_seconds",
            "Time taken to authenticate, score and persist one reading"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

/// Registers every collector with `REGISTRY`. Safe to call more than once.
pub fn init_metrics() -> prometheus::Result<()> {
    register(READINGS_TOTAL.clone())?;
    register(ANOMALIES_TOTAL.clone())?;
    register(DEVICE_AUTH_FAILURES_TOTAL.clone())?;
    register(LOGINS_TOTAL.clone())?;
    register(LOGIN_FAILURES_TOTAL.clone())?;
    register(INGEST_LATENCY_SECONDS.clone())?;
    Ok(())
}

fn register(collector: impl Collector + 'static) -> prometheus::Result<()> {
    match REGISTRY.register(Box::new(collector)) {
        Err(prometheus::Error::AlreadyReg) => Ok(()),
        result => result,
    }
}

pub fn gather_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

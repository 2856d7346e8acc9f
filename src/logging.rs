use crate::echonet::Measurement;
use crate::error::BrouteError;
use crate::orchestrator::MeasurementSink;
use async_trait::async_trait;
use log::{info, log_enabled, Level};

/// Log target of the measurement lines, so they can be filtered apart
/// from diagnostics (`RUST_LOG=power_usage=info`).
pub const POWER_USAGE_TARGET: &str = "power_usage";

/// Initializes the logger with the `env_logger` crate. Defaults to `info`
/// when `RUST_LOG` is not set.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// One line for all measurements of a response.
pub fn format_measurements(measurements: &[Measurement]) -> String {
    measurements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Logs measurements on the [`POWER_USAGE_TARGET`] target.
pub fn log_measurements(measurements: &[Measurement]) {
    if log_enabled!(target: POWER_USAGE_TARGET, Level::Info) {
        info!(target: POWER_USAGE_TARGET, "{}", format_measurements(measurements));
    }
}

/// Sink that writes every response to the log.
#[derive(Debug, Default)]
pub struct PowerUsageLog {
    recorded: u64,
}

impl PowerUsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses logged so far.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }
}

#[async_trait]
impl MeasurementSink for PowerUsageLog {
    async fn record(&mut self, measurements: &[Measurement]) -> Result<(), BrouteError> {
        log_measurements(measurements);
        self.recorded += 1;
        Ok(())
    }
}

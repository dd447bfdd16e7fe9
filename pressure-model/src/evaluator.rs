use crate::ModelConfig;
use common_types::{Metrics, OperatingMode};
use serde::{Deserialize, Serialize};

/// Direct mode response time stops growing this far above the base latency
pub const DIRECT_MAX_EXTRA_LATENCY_MS: f64 = 4_000f64;
/// Extra direct mode latency per unit of overload
pub const DIRECT_LATENCY_PER_OVERLOAD_MS: f64 = 50f64;
/// Direct mode pressure reads 100% at 40% of capacity
pub const DIRECT_PRESSURE_SCALE: f64 = 250f64;
/// Extra queued mode latency per capacity worth of backlog
pub const QUEUED_LATENCY_PER_BACKLOG_MS: f64 = 200f64;
/// Queued mode pressure never leaves the safe band
pub const QUEUED_PRESSURE_CEILING: f64 = 80f64;

/// Evaluate one panel with the default capacity and base latency
pub fn evaluate(users: u64, mode: OperatingMode) -> Metrics {
    evaluate_with(users, mode, &ModelConfig::default())
}

/// Closed-form performance of the simulated server under `users` concurrent users.
///
/// Pure: no state is read besides the arguments, so identical inputs always produce
/// bit-identical [Metrics].
pub fn evaluate_with(users: u64, mode: OperatingMode, config: &ModelConfig) -> Metrics {
    match mode {
        OperatingMode::Direct => direct(users, config),
        OperatingMode::Queued => queued(users, config),
    }
}

fn direct(users: u64, config: &ModelConfig) -> Metrics {
    let capacity = config.capacity() as f64;
    let base = config.base_response_time_ms as f64;
    let (overload_factor, success_rate) = if users == 0 {
        (0f64, 1f64)
    } else {
        let users = users as f64;
        (users / capacity, (capacity / users).min(1f64))
    };
    let extra = ((overload_factor - 1f64) * DIRECT_LATENCY_PER_OVERLOAD_MS)
        .min(DIRECT_MAX_EXTRA_LATENCY_MS);
    Metrics {
        avg_response_time_ms: (base + extra).max(base),
        success_rate,
        queue_size: 0,
        server_pressure_percent: (overload_factor * DIRECT_PRESSURE_SCALE)
            .min(100f64)
            .round() as u8,
    }
}

fn queued(users: u64, config: &ModelConfig) -> Metrics {
    let capacity = config.capacity();
    let base = config.base_response_time_ms as f64;
    let excess_queue = users.saturating_sub(capacity);
    let in_flight = users.min(capacity);
    let extra = (excess_queue as f64 / capacity as f64) * QUEUED_LATENCY_PER_BACKLOG_MS;
    Metrics {
        avg_response_time_ms: (base + extra).max(base),
        success_rate: 1f64,
        queue_size: excess_queue,
        server_pressure_percent: ((in_flight as f64 / capacity as f64) * QUEUED_PRESSURE_CEILING)
            .round() as u8,
    }
}

/// A simulator panel's evaluator. The mode is chosen at construction and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluator {
    mode: OperatingMode,
    config: ModelConfig,
}

impl Evaluator {
    pub fn new(mode: OperatingMode, config: ModelConfig) -> Self {
        Evaluator { mode, config }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[inline]
    pub fn evaluate(&self, users: u64) -> Metrics {
        evaluate_with(users, self.mode, &self.config)
    }
}

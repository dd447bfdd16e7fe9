use common_types::Metrics;
use serde::{Deserialize, Serialize};

const HUNDRED_MILLION: f64 = 100_000_000f64;
const TEN_THOUSAND: f64 = 10_000f64;

/// Human readable user count, in the units the lab front-end shows:
/// hundred-millions (亿), ten-thousands (万) or plain people (人).
pub fn format_users(count: f64) -> String {
    if count >= HUNDRED_MILLION {
        format!("{} 亿人", to_fixed(count / HUNDRED_MILLION, 2))
    } else if count >= TEN_THOUSAND {
        format!("{} 万人", to_fixed(count / TEN_THOUSAND, 1))
    } else {
        format!("{} 人", to_fixed(count, 0))
    }
}

/// Render `value` with `digits` decimals. Ties round away from zero, where `{:.N}` would
/// round them to even.
pub fn to_fixed(value: f64, digits: usize) -> String {
    let scale = 10f64.powi(digits as i32);
    format!("{:.*}", digits, (value * scale).round() / scale)
}

/// Color band of the pressure progress bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PressureBand {
    Normal,
    Warning,
    Danger,
}

impl From<u8> for PressureBand {
    fn from(pressure: u8) -> Self {
        match pressure {
            p if p > 90 => PressureBand::Danger,
            p if p > 70 => PressureBand::Warning,
            _ => PressureBand::Normal,
        }
    }
}

/// [Metrics] rendered the way a panel displays them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDisplay {
    pub avg_response_time: String,
    pub success_rate: String,
    pub queue_size: String,
    pub server_pressure: String,
    pub pressure_band: PressureBand,
}

impl From<&Metrics> for MetricsDisplay {
    fn from(metrics: &Metrics) -> Self {
        MetricsDisplay {
            avg_response_time: format!("{} ms", to_fixed(metrics.avg_response_time_ms, 0)),
            success_rate: format!("{} %", to_fixed(metrics.success_rate * 100f64, 1)),
            queue_size: format_users(metrics.queue_size as f64),
            server_pressure: format!("{}%", metrics.server_pressure_percent),
            pressure_band: metrics.server_pressure_percent.into(),
        }
    }
}

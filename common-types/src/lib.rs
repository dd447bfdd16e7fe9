//! Define common types uses by various components of the pressure lab

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Dispatch policy of a simulator panel. A panel is created for one mode and keeps it for its
/// whole lifetime.
///
/// ### Direct
/// No buffering. Every request is attempted immediately against the server, demand over the
/// server capacity is rejected outright.
///
/// ### Queued
/// Unbounded buffering. Demand over capacity waits in a queue and is eventually served, trading
/// latency for availability.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum OperatingMode {
    Direct,
    Queued,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 2] = [OperatingMode::Direct, OperatingMode::Queued];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Direct => "direct",
            OperatingMode::Queued => "queued",
        }
    }

    /// Panel title shown by the lab front-end
    pub fn title(&self) -> &'static str {
        match self {
            OperatingMode::Direct => "普通模式",
            OperatingMode::Queued => "队列模式",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            m if m.eq_ignore_ascii_case("direct") => Ok(OperatingMode::Direct),
            m if m.eq_ignore_ascii_case("queued") => Ok(OperatingMode::Queued),
            _ => Err(UnknownMode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMode;

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown operating mode, expected one of: direct, queued")
    }
}

/// Performance of the simulated server for one `(users, mode)` pair. Recomputed on every
/// evaluation, never accumulated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub avg_response_time_ms: f64,
    /// fraction of requests served, in `[0, 1]`
    pub success_rate: f64,
    pub queue_size: u64,
    /// dimensionless danger indicator in `[0, 100]`, not a utilization measure
    pub server_pressure_percent: u8,
}

/// How the front-end should tint the pulses spawned in one tick
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PulseTint {
    Success,
    Failure,
    Queued,
}

impl PulseTint {
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseTint::Success => "success",
            PulseTint::Failure => "failure",
            PulseTint::Queued => "queued",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PulseBatch {
    pub count: u32,
    pub tint: PulseTint,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_serde_is_camel_case() {
        assert_eq!(
            serde_json::to_string(&OperatingMode::Queued).unwrap(),
            r#""queued""#
        );
        let mode: OperatingMode = serde_json::from_str(r#""direct""#).unwrap();
        assert_eq!(mode, OperatingMode::Direct);
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("Direct".parse::<OperatingMode>(), Ok(OperatingMode::Direct));
        assert_eq!(" queued".parse::<OperatingMode>(), Ok(OperatingMode::Queued));
        assert_eq!("buffered".parse::<OperatingMode>(), Err(UnknownMode));
    }

    #[test]
    fn metrics_field_names() {
        let metrics = Metrics {
            avg_response_time_ms: 50f64,
            success_rate: 1f64,
            queue_size: 0,
            server_pressure_percent: 25,
        };
        let value = serde_json::to_value(metrics).unwrap();
        assert_eq!(value["avgResponseTimeMs"], 50f64);
        assert_eq!(value["serverPressurePercent"], 25);
        assert_eq!(value["queueSize"], 0);
    }
}

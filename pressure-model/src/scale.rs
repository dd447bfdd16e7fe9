use crate::GenericError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

pub const MIN_CONTROL: u32 = 1;
pub const MAX_CONTROL: u32 = 100;
pub const MIN_USERS: u64 = 100;
pub const MAX_USERS: u64 = 100_000_000;

// exp(ln(x)) overshoots x by a few ulps, which ceil would turn into x+1
const SNAP_TOLERANCE: f64 = 1e-12;

/// Map a slider position in `[1, 100]` to concurrent users in `[100, 100_000_000]`, so that
/// linear slider motion sweeps the load logarithmically.
///
/// `users = ceil(exp(ln(100) + step * (control - 1)))` with
/// `step = (ln(100_000_000) - ln(100)) / 99`. Results within a relative `1e-12` of an integer
/// are snapped to it before `ceil`; this only affects the exact decade points (1, 34, 67, 100).
///
/// The position must be in range, use [ControlPosition] to validate untrusted input.
pub fn scale_to_users(control: f64) -> u64 {
    debug_assert!(
        (MIN_CONTROL as f64..=MAX_CONTROL as f64).contains(&control),
        "control position {} out of range",
        control
    );
    let min_log = (MIN_USERS as f64).ln();
    let max_log = (MAX_USERS as f64).ln();
    let step = (max_log - min_log) / (MAX_CONTROL - MIN_CONTROL) as f64;
    let users = (min_log + step * (control - MIN_CONTROL as f64)).exp();
    let nearest = users.round();
    if (users - nearest).abs() <= nearest * SNAP_TOLERANCE {
        nearest as u64
    } else {
        users.ceil() as u64
    }
}

/// A slider position known to be inside `[1, 100]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ControlPosition(f64);

impl ControlPosition {
    pub const MIN: ControlPosition = ControlPosition(MIN_CONTROL as f64);
    pub const MAX: ControlPosition = ControlPosition(MAX_CONTROL as f64);

    pub fn new(value: f64) -> Result<Self, GenericError> {
        Self::try_from(value)
    }

    /// Clamp into range instead of failing. Used for schedule outputs, which are validated when
    /// the schedule is deserialized.
    pub fn saturating(value: u32) -> Self {
        ControlPosition(value.clamp(MIN_CONTROL, MAX_CONTROL) as f64)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn users(&self) -> u64 {
        scale_to_users(self.0)
    }
}

impl TryFrom<f64> for ControlPosition {
    type Error = GenericError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && (MIN_CONTROL as f64..=MAX_CONTROL as f64).contains(&value) {
            Ok(ControlPosition(value))
        } else {
            debug!("rejecting control position: {}", value);
            Err(GenericError::new(
                &format!(
                    "control position {} out of range [{}, {}]",
                    value, MIN_CONTROL, MAX_CONTROL
                ),
                400,
            ))
        }
    }
}

impl From<ControlPosition> for f64 {
    fn from(position: ControlPosition) -> Self {
        position.0
    }
}

impl Default for ControlPosition {
    fn default() -> Self {
        ControlPosition::MIN
    }
}

impl Display for ControlPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

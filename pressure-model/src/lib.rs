mod control_spec;
mod display;
mod evaluator;
mod pulse;
mod scale;

pub use control_spec::{ArraySpec, ControlSpecEnum, ConstantRate, Linear, Step, Steps};
pub use display::{format_users, to_fixed, MetricsDisplay, PressureBand};
pub use evaluator::{evaluate, evaluate_with, Evaluator};
pub use pulse::{sample_pulses, MAX_PULSES_PER_TICK, USERS_PER_PULSE};
pub use scale::{scale_to_users, ControlPosition, MAX_CONTROL, MAX_USERS, MIN_CONTROL, MIN_USERS};

use anyhow::Error as AnyError;
use common_types::{Metrics, OperatingMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU64;
use std::str::FromStr;

pub const SERVER_CAPACITY: u64 = common_env::DEFAULT_SERVER_CAPACITY;
pub const BASE_RESPONSE_TIME_MS: u32 = common_env::DEFAULT_BASE_RESPONSE_TIME_MS;

const DEFAULT_CAPACITY: NonZeroU64 = match NonZeroU64::new(SERVER_CAPACITY) {
    Some(capacity) => capacity,
    None => panic!("server capacity can not be 0"),
};

/// Fixed characteristics of the simulated server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub server_capacity: NonZeroU64,
    pub base_response_time_ms: u32,
}

impl ModelConfig {
    pub fn new(server_capacity: NonZeroU64, base_response_time_ms: u32) -> Self {
        ModelConfig {
            server_capacity,
            base_response_time_ms,
        }
    }

    /// Read overrides from the environment, see [common_env::server_capacity]
    pub fn from_env() -> Self {
        let server_capacity =
            NonZeroU64::new(common_env::server_capacity()).unwrap_or(DEFAULT_CAPACITY);
        ModelConfig {
            server_capacity,
            base_response_time_ms: common_env::base_response_time_ms(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.server_capacity.get()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            server_capacity: DEFAULT_CAPACITY,
            base_response_time_ms: BASE_RESPONSE_TIME_MS,
        }
    }
}

/// Describe a lab session: a slider schedule sampled by one panel per mode
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LabRequest {
    pub name: Option<String>,
    /// number of control ticks the session runs for
    pub duration: u32,
    pub control: ControlSpecEnum,
    #[serde(default = "default_modes")]
    pub modes: Vec<OperatingMode>,
}

pub fn default_modes() -> Vec<OperatingMode> {
    OperatingMode::ALL.to_vec()
}

/// Manual slider movement for a running session
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct ControlOverride {
    pub position: ControlPosition,
}

/// One panel of a side-by-side comparison
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PanelEvaluation {
    pub mode: OperatingMode,
    pub title: String,
    pub metrics: Metrics,
    pub display: MetricsDisplay,
}

impl PanelEvaluation {
    pub fn new(users: u64, mode: OperatingMode, config: &ModelConfig) -> Self {
        let metrics = evaluate_with(users, mode, config);
        PanelEvaluation {
            mode,
            title: mode.title().to_string(),
            display: MetricsDisplay::from(&metrics),
            metrics,
        }
    }
}

/// Both dispatch policies evaluated for the same load
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub control: Option<ControlPosition>,
    pub concurrent_users: u64,
    pub users_label: String,
    pub panels: Vec<PanelEvaluation>,
}

impl Comparison {
    pub fn new(control: Option<ControlPosition>, users: u64, config: &ModelConfig) -> Self {
        Comparison {
            control,
            concurrent_users: users,
            users_label: format_users(users as f64),
            panels: OperatingMode::ALL
                .iter()
                .map(|mode| PanelEvaluation::new(users, *mode, config))
                .collect(),
        }
    }

    pub fn panel(&self, mode: OperatingMode) -> Option<&PanelEvaluation> {
        self.panels.iter().find(|p| p.mode == mode)
    }
}

/// Load to evaluate, either as a slider position or as a raw user count
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(untagged)]
pub enum EvaluateQueryParams {
    Control { control: ControlPosition },
    Users { users: u64 },
}

impl EvaluateQueryParams {
    pub fn to_comparison(self, config: &ModelConfig) -> Comparison {
        match self {
            EvaluateQueryParams::Control { control } => {
                Comparison::new(Some(control), control.users(), config)
            }
            EvaluateQueryParams::Users { users } => Comparison::new(None, users, config),
        }
    }
}

impl TryFrom<HashMap<String, String>> for EvaluateQueryParams {
    type Error = GenericError;

    fn try_from(mut value: HashMap<String, String>) -> Result<Self, Self::Error> {
        let control = value.remove("control");
        let users = value.remove("users");
        let params = match (control, users) {
            (Some(control), None) => {
                let control = f64::from_str(control.trim()).map_err(|e| {
                    GenericError::new(&format!("Invalid control {}, {}", &control, e), 400)
                })?;
                EvaluateQueryParams::Control {
                    control: ControlPosition::new(control)?,
                }
            }
            (None, Some(users)) => {
                let users = u64::from_str(users.trim()).map_err(|e| {
                    GenericError::new(&format!("Invalid users {}, {}", &users, e), 400)
                })?;
                EvaluateQueryParams::Users { users }
            }
            (Some(_), Some(_)) => {
                return Err(GenericError::new(
                    "Only one of control or users can be specified",
                    400,
                ))
            }
            (None, None) => {
                return Err(GenericError::new(
                    "One of control or users is required",
                    400,
                ))
            }
        };
        //after removing params, map should be empty
        if value.is_empty() {
            Ok(params)
        } else {
            Err(GenericError::new("Invalid or too many query params", 400))
        }
    }
}

/// Which job statuses to return: one job, or a page of all jobs ordered by job id
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StatusQuery {
    Job { job_id: String },
    Page { offset: usize, limit: usize },
}

impl StatusQuery {
    pub const DEFAULT_LIMIT: usize = 20;
}

impl Display for StatusQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StatusQuery::Job { job_id } => write!(f, "job_id={}", job_id),
            StatusQuery::Page { offset, limit } => write!(f, "offset={}&limit={}", offset, limit),
        }
    }
}

fn take_param<T>(params: &mut HashMap<String, String>, key: &str, default: T) -> Result<T, GenericError>
where
    T: FromStr,
    T::Err: Display,
{
    match params.remove(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| GenericError::bad_request(&format!("Invalid {} {}, {}", key, raw, e))),
    }
}

impl TryFrom<HashMap<String, String>> for StatusQuery {
    type Error = GenericError;

    fn try_from(mut params: HashMap<String, String>) -> Result<Self, Self::Error> {
        let query = match params.remove("job_id") {
            Some(job_id) => StatusQuery::Job { job_id },
            None => {
                let offset = take_param(&mut params, "offset", 0)?;
                let limit = take_param(&mut params, "limit", Self::DEFAULT_LIMIT)?;
                if limit == 0 {
                    return Err(GenericError::bad_request("limit should be at least 1"));
                }
                StatusQuery::Page { offset, limit }
            }
        };
        match params.keys().next() {
            None => Ok(query),
            Some(unknown) => Err(GenericError::bad_request(&format!(
                "Unexpected query param: {}",
                unknown
            ))),
        }
    }
}

/// Successful reply keyed by job id
#[derive(Debug, Serialize, Deserialize)]
pub struct GenericResponse<T: Serialize> {
    #[serde(flatten)]
    pub data: HashMap<String, T>,
}

impl<T: Serialize> Default for GenericResponse<T> {
    fn default() -> Self {
        GenericResponse {
            data: HashMap::new(),
        }
    }
}

/// Error body of every failed request. `error_code` doubles as the HTTP status.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenericError {
    pub error_code: u16,
    pub message: String,
    #[serde(flatten)]
    pub data: HashMap<String, String>,
}

impl GenericError {
    pub fn new(msg: &str, code: u16) -> Self {
        GenericError {
            error_code: code,
            message: msg.to_string(),
            data: HashMap::new(),
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(msg, 400)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(msg, 404)
    }
}

macro_rules! from_error {
    ($t:ty, $code:literal) => {
        impl From<$t> for GenericError {
            fn from(e: $t) -> Self {
                GenericError::new(&e.to_string(), $code)
            }
        }
    };
}

from_error!(AnyError, 500);
from_error!(serde_json::Error, 400);

impl Display for GenericError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_code, self.message)
    }
}

impl StdError for GenericError {}

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use common_types::{Metrics, OperatingMode, PulseBatch};
use futures_core::Stream;
use lazy_static::lazy_static;
use log::{debug, info, trace};
use pressure_model::{
    format_users, ControlPosition, ControlSpecEnum, GenericError, LabRequest, MetricsDisplay,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify, RwLock};
use tokio::time::Instant;

pub use crate::control_scheme::ControlScheme;

mod control_scheme;
mod panel;
pub mod standalone;

lazy_static! {
    pub(crate) static ref JOB_STATUS: RwLock<BTreeMap<String, JobStatus>> =
        RwLock::new(BTreeMap::new());
    pub(crate) static ref LAB_SNAPSHOTS: RwLock<HashMap<String, LabSnapshot>> =
        RwLock::new(HashMap::new());
    pub(crate) static ref LAB_SESSIONS: RwLock<HashMap<String, Arc<SessionHandle>>> =
        RwLock::new(HashMap::new());
    static ref FINISHED_AT: RwLock<HashMap<String, Instant>> = RwLock::new(HashMap::new());
}

/// Spawn the task that forgets finished jobs once their retention period is over
pub async fn init() {
    let retention = Duration::from_secs(common_env::job_retention_secs());
    let period = Duration::from_secs(common_env::cleanup_interval_secs());
    info!(
        "finished jobs are kept for {:?}, checked every {:?}",
        retention, period
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            cleanup_finished_jobs(retention).await;
        }
    });
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    InProgress,
    Stopped,
    Completed,
    Error(ErrorCode),
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Stopped | JobStatus::Completed | JobStatus::Error(_)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidDuration,
    NoPanel,
    MetricsRegistrationFailed,
}

/// Handles of a running session that outlive the request which started it
pub(crate) struct SessionHandle {
    control: watch::Sender<ControlPosition>,
    stop: Notify,
}

/// Latest readings of one panel
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PanelSnapshot {
    pub mode: OperatingMode,
    pub title: String,
    pub control: ControlPosition,
    pub concurrent_users: u64,
    pub users_label: String,
    pub metrics: Option<Metrics>,
    pub display: Option<MetricsDisplay>,
    pub evaluations: u64,
    pub last_pulse: Option<PulseBatch>,
    pub pulses_spawned: u64,
}

impl PanelSnapshot {
    fn new(mode: OperatingMode, control: ControlPosition) -> Self {
        let users = control.users();
        PanelSnapshot {
            mode,
            title: mode.title().to_string(),
            control,
            concurrent_users: users,
            users_label: format_users(users as f64),
            metrics: None,
            display: None,
            evaluations: 0,
            last_pulse: None,
            pulses_spawned: 0,
        }
    }

    pub(crate) fn evaluated(&mut self, control: ControlPosition, users: u64, metrics: Metrics) {
        self.control = control;
        self.concurrent_users = users;
        self.users_label = format_users(users as f64);
        self.display = Some(MetricsDisplay::from(&metrics));
        self.metrics = Some(metrics);
        self.evaluations += 1;
    }

    pub(crate) fn pulsed(&mut self, batch: PulseBatch) {
        self.pulses_spawned += batch.count as u64;
        self.last_pulse = Some(batch);
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabSnapshot {
    pub job_id: String,
    pub panels: Vec<PanelSnapshot>,
}

impl LabSnapshot {
    pub(crate) fn new(job_id: &str, modes: &[OperatingMode], control: ControlPosition) -> Self {
        LabSnapshot {
            job_id: job_id.to_string(),
            panels: modes
                .iter()
                .map(|mode| PanelSnapshot::new(*mode, control))
                .collect(),
        }
    }

    pub fn panel(&self, mode: OperatingMode) -> Option<&PanelSnapshot> {
        self.panels.iter().find(|p| p.mode == mode)
    }
}

/// Reject requests that can never produce a useful session
pub fn pre_check(request: &LabRequest) -> Result<(), ErrorCode> {
    if request.duration == 0 {
        return Err(ErrorCode::InvalidDuration);
    }
    if request.modes.is_empty() {
        return Err(ErrorCode::NoPanel);
    }
    Ok(())
}

/// Produce the slider position for each control tick of a session
#[must_use = "streams do nothing unless polled"]
pub struct ControlGenerator {
    // number of control ticks to generate
    duration: u32,
    // ticks generated so far, initially 0
    current_count: u32,
    scheme: Box<dyn ControlScheme + Send>,
}

impl ControlGenerator {
    pub fn new(duration: u32, scheme: Box<dyn ControlScheme + Send>) -> Self {
        ControlGenerator {
            duration,
            current_count: 0,
            scheme,
        }
    }
}

impl From<ControlSpecEnum> for Box<dyn ControlScheme + Send> {
    fn from(spec: ControlSpecEnum) -> Self {
        match spec {
            ControlSpecEnum::ConstantRate(spec) => Box::new(spec),
            ControlSpecEnum::Linear(spec) => Box::new(spec),
            ControlSpecEnum::ArraySpec(spec) => Box::new(spec),
            ControlSpecEnum::Steps(spec) => Box::new(spec),
        }
    }
}

impl From<LabRequest> for ControlGenerator {
    fn from(request: LabRequest) -> Self {
        ControlGenerator::new(request.duration, request.control.into())
    }
}

impl Stream for ControlGenerator {
    type Item = ControlPosition;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.current_count >= self.duration {
            trace!("finished generating control positions");
            Poll::Ready(None)
        } else {
            let current_count = self.current_count;
            let position = self.scheme.next(current_count);
            self.current_count += 1;
            Poll::Ready(Some(ControlPosition::saturating(position)))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.duration.saturating_sub(self.current_count) as usize;
        (remaining, Some(remaining))
    }
}

/// Record a new job as [JobStatus::Starting]. A status the job already has, like a stop that
/// arrived first, is kept.
pub async fn mark_starting(job_id: &str) {
    JOB_STATUS
        .write()
        .await
        .entry(job_id.to_string())
        .or_insert(JobStatus::Starting);
}

pub(crate) async fn mark_finished(job_id: &str) {
    FINISHED_AT
        .write()
        .await
        .insert(job_id.to_string(), Instant::now());
}

/// Remove jobs that finished at least `retention` ago, along with their snapshots.
/// Returns the number of jobs removed.
pub async fn cleanup_finished_jobs(retention: Duration) -> usize {
    let expired = {
        FINISHED_AT
            .read()
            .await
            .iter()
            .filter(|(_, finished_at)| finished_at.elapsed() >= retention)
            .map(|(job_id, _)| job_id.clone())
            .collect::<Vec<_>>()
    };
    if expired.is_empty() {
        return 0;
    }
    {
        let mut status = JOB_STATUS.write().await;
        let mut snapshots = LAB_SNAPSHOTS.write().await;
        let mut finished = FINISHED_AT.write().await;
        for job_id in expired.iter() {
            finished.remove(job_id);
            // the id was reused by a session that is still running
            if status.get(job_id).map_or(false, |s| !s.is_finished()) {
                continue;
            }
            status.remove(job_id);
            snapshots.remove(job_id);
        }
    }
    debug!("[cleanup] - removed finished jobs: {:?}", &expired);
    expired.len()
}

pub async fn get_status_by_job_id(job_id: &str) -> HashMap<String, JobStatus> {
    let mut status = HashMap::with_capacity(1);
    if let Some(job_status) = JOB_STATUS.read().await.get(job_id) {
        status.insert(job_id.to_string(), *job_status);
    }
    status
}

pub async fn get_status_all() -> BTreeMap<String, JobStatus> {
    JOB_STATUS.read().await.clone()
}

/// Stop a running session. Returns the status the job had before the call, `None` if the job
/// is unknown.
pub async fn stop_request_by_job_id(job_id: &str) -> Option<JobStatus> {
    let previous = {
        let mut write_guard = JOB_STATUS.write().await;
        let previous = write_guard.get(job_id).copied();
        if matches!(
            previous,
            Some(JobStatus::Starting) | Some(JobStatus::InProgress)
        ) {
            write_guard.insert(job_id.to_string(), JobStatus::Stopped);
        }
        previous
    };
    if let Some(session) = LAB_SESSIONS.read().await.get(job_id) {
        debug!("[stop] - [{}] - notifying session", job_id);
        session.stop.notify_one();
    }
    previous
}

/// Move the slider of a running session. The position holds until the session's schedule
/// moves to a different position.
pub async fn set_control(
    job_id: &str,
    position: ControlPosition,
) -> Result<ControlPosition, GenericError> {
    let sessions = LAB_SESSIONS.read().await;
    let session = sessions
        .get(job_id)
        .ok_or_else(|| GenericError::not_found(&format!("No running job found: {}", job_id)))?;
    debug!("[set_control] - [{}] - position: {}", job_id, position);
    Ok(session.control.send_replace(position))
}

pub async fn snapshot_by_job_id(job_id: &str) -> Option<LabSnapshot> {
    LAB_SNAPSHOTS.read().await.get(job_id).cloned()
}

pub(crate) async fn update_panel<F>(job_id: &str, mode: OperatingMode, update: F)
where
    F: FnOnce(&mut PanelSnapshot),
{
    let mut write_guard = LAB_SNAPSHOTS.write().await;
    if let Some(panel) = write_guard
        .get_mut(job_id)
        .and_then(|snapshot| snapshot.panels.iter_mut().find(|p| p.mode == mode))
    {
        update(panel);
    }
}

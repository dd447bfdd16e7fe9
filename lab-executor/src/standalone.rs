use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use pressure_metrics::MetricsFactory;
use pressure_model::{LabRequest, ModelConfig};
use tokio::sync::{watch, Notify};
use tokio_stream::StreamExt;

use crate::panel::PanelTimers;
use crate::{
    mark_finished, mark_starting, pre_check, ControlGenerator, ErrorCode, JobStatus, LabSnapshot,
    SessionHandle, JOB_STATUS, LAB_SESSIONS, LAB_SNAPSHOTS,
};

/// Run a lab session to completion. One panel per requested mode samples the shared slider
/// until the schedule runs out or the session is stopped.
pub async fn handle_request(
    job_id: String,
    request: LabRequest,
    metrics_factory: &'static MetricsFactory,
) {
    debug!(
        "[handle_request] - [{}] - handling request: {:?}",
        &job_id, &request
    );
    mark_starting(&job_id).await;
    if let Err(code) = pre_check(&request) {
        error!("[handle_request] - [{}] - invalid request: {:?}", &job_id, code);
        set_status(&job_id, JobStatus::Error(code)).await;
        return;
    }
    let session_metrics = match metrics_factory.metrics(&job_id).await {
        Ok(m) => m,
        Err(e) => {
            error!(
                "[handle_request] - [{}] - failed to register metrics: {}",
                &job_id, e
            );
            set_status(&job_id, JobStatus::Error(ErrorCode::MetricsRegistrationFailed)).await;
            return;
        }
    };

    let mut modes = request.modes.clone();
    modes.sort();
    modes.dedup();
    let config = ModelConfig::from_env();

    let generator: ControlGenerator = request.into();
    let stream = generator.throttle(Duration::from_millis(common_env::control_interval_ms()));
    tokio::pin!(stream);
    // pre_check guarantees at least one tick
    let Some(first) = stream.next().await else {
        set_status(&job_id, JobStatus::Completed).await;
        return;
    };

    let (control_tx, control_rx) = watch::channel(first);
    let session = Arc::new(SessionHandle {
        control: control_tx,
        stop: Notify::new(),
    });
    LAB_SESSIONS
        .write()
        .await
        .insert(job_id.clone(), session.clone());
    LAB_SNAPSHOTS
        .write()
        .await
        .insert(job_id.clone(), LabSnapshot::new(&job_id, &modes, first));

    let timers = modes
        .iter()
        .map(|mode| {
            PanelTimers::spawn(
                &job_id,
                *mode,
                config,
                control_rx.clone(),
                session_metrics.clone(),
            )
        })
        .collect::<Vec<_>>();

    let stopped_early = {
        let mut write_guard = JOB_STATUS.write().await;
        if matches!(write_guard.get(&job_id), Some(JobStatus::Stopped)) {
            true
        } else {
            write_guard.insert(job_id.clone(), JobStatus::InProgress);
            false
        }
    };

    if !stopped_early {
        // manual overrides hold until the schedule itself moves
        let mut scheduled = first;
        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(position) => {
                        if position != scheduled {
                            debug!("[handle_request] - [{}] - position: {}", &job_id, position);
                            scheduled = position;
                            session.control.send_replace(position);
                        }
                    }
                    None => break,
                },
                _ = session.stop.notified() => {
                    info!("[handle_request] - stopping job {}", &job_id);
                    break;
                }
            }
        }
    }

    drop(timers);
    LAB_SESSIONS.write().await.remove(&job_id);
    metrics_factory.remove_metrics(&job_id).await;
    {
        let mut write_guard = JOB_STATUS.write().await;
        if !matches!(write_guard.get(&job_id), Some(JobStatus::Stopped)) {
            write_guard.insert(job_id.clone(), JobStatus::Completed);
        }
    }
    mark_finished(&job_id).await;
    info!("[handle_request] - [{}] - session finished", &job_id);
}

async fn set_status(job_id: &str, status: JobStatus) {
    JOB_STATUS
        .write()
        .await
        .insert(job_id.to_string(), status);
    if status.is_finished() {
        mark_finished(job_id).await;
    }
}

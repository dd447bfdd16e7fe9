use std::collections::HashMap;

use lab_executor::{
    get_status_all, get_status_by_job_id, mark_starting, pre_check, snapshot_by_job_id,
    stop_request_by_job_id, ErrorCode, JobStatus, LabSnapshot,
};
use lazy_static::lazy_static;
use log::{debug, error};
use pressure_metrics::MetricsFactory;
use pressure_model::{
    Comparison, ControlOverride, ControlPosition, EvaluateQueryParams, GenericError,
    GenericResponse, LabRequest, ModelConfig, StatusQuery,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

lazy_static! {
    static ref ENDS_WITH_UUID: Regex =
        Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("valid uuid pattern");
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub job_id: String,
    pub position: ControlPosition,
    pub concurrent_users: u64,
    pub previous: ControlPosition,
}

/// Validate and spawn a lab session, returns immediately with the job id
pub async fn handle_request(
    mut request: LabRequest,
    metrics: &'static MetricsFactory,
) -> Result<LabResponse, GenericError> {
    pre_check(&request).map_err(|code| {
        let msg = match code {
            ErrorCode::InvalidDuration => "duration should be at least 1",
            ErrorCode::NoPanel => "at least one mode is required",
            ErrorCode::MetricsRegistrationFailed => "failed to register metrics",
        };
        GenericError::bad_request(msg)
    })?;
    let job_id = job_id(&request.name);
    request.name = Some(job_id.clone());
    // a stop sent right after this reply has to find the job
    mark_starting(&job_id).await;
    tokio::spawn(lab_executor::standalone::handle_request(
        job_id.clone(),
        request,
        metrics,
    ));
    Ok(LabResponse {
        job_id,
        status: JobStatus::Starting,
    })
}

/// Evaluate both modes once for the queried load
pub fn evaluate(params: EvaluateQueryParams) -> Comparison {
    params.to_comparison(&ModelConfig::from_env())
}

pub async fn set_control(job_id: String, body: &[u8]) -> Result<ControlResponse, GenericError> {
    let ControlOverride { position } = serde_json::from_slice(body)?;
    let previous = lab_executor::set_control(&job_id, position).await?;
    Ok(ControlResponse {
        job_id,
        position,
        concurrent_users: position.users(),
        previous,
    })
}

pub async fn snapshot(job_id: String) -> Result<LabSnapshot, GenericError> {
    snapshot_by_job_id(&job_id)
        .await
        .ok_or_else(|| GenericError::not_found(&format!("No session found: {}", job_id)))
}

pub async fn handle_history_all(
    params: StatusQuery,
) -> Result<GenericResponse<JobStatus>, GenericError> {
    let data = match params {
        StatusQuery::Job { job_id } => get_status_by_job_id(&job_id).await,
        StatusQuery::Page { offset, limit } => get_status_all()
            .await
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect::<HashMap<_, _>>(),
    };
    Ok(GenericResponse { data })
}

pub async fn stop(job_id: String) -> Result<GenericResponse<String>, GenericError> {
    let msg = match stop_request_by_job_id(&job_id).await {
        Some(JobStatus::Starting) | Some(JobStatus::InProgress) => "Job stopped",
        Some(JobStatus::Stopped) => "Job already stopped",
        Some(JobStatus::Completed) => "Job already completed",
        Some(JobStatus::Error(code)) => {
            error!("[stop] - [{}] - job failed: {:?}", &job_id, code);
            "Job failed"
        }
        None => "Job Not Found",
    };
    debug!("[stop] - [{}] - {}", &job_id, msg);
    let mut response = GenericResponse::default();
    response.data.insert(job_id, msg.to_string());
    Ok(response)
}

fn job_id(request_name: &Option<String>) -> String {
    request_name
        .as_ref()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map_or_else(
            || Uuid::new_v4().to_string(),
            |n| {
                if ENDS_WITH_UUID.is_match(n) {
                    n.to_string()
                } else {
                    format!("{}-{}", n, Uuid::new_v4())
                }
            },
        )
}

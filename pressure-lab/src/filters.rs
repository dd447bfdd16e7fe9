use crate::{filters_common, lab};
use log::trace;
use pressure_metrics::METRICS_FACTORY;
use pressure_model::{EvaluateQueryParams, LabRequest, StatusQuery};
use std::collections::HashMap;
use std::convert::{Infallible, TryFrom};
use warp::hyper::body::Bytes;
use warp::{reply, Filter, Reply};

pub fn get_routes() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let prometheus_metric = filters_common::prometheus_metric();
    let evaluate = evaluate();
    let lab_req = lab_req();
    let control_req = control_req();
    let stop_req = stop_req();
    let history = history();
    let snapshot = snapshot();
    prometheus_metric
        .or(evaluate)
        .or(lab_req)
        .or(control_req)
        .or(stop_req)
        .or(history)
        .or(snapshot)
}

pub fn evaluate() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!("evaluate"))
        .and(warp::query::<HashMap<String, String>>())
        .map(|params: HashMap<String, String>| {
            let result = EvaluateQueryParams::try_from(params).map(|params| {
                trace!("req: evaluate: {:?}", &params);
                lab::evaluate(params)
            });
            filters_common::result_to_reply_with_status(result)
        })
}

pub fn lab_req() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path("lab").and(warp::path::end()))
        .and(warp::body::content_length_limit(1024 * 64))
        .and(warp::body::json())
        .and_then(|request: LabRequest| async move { execute(request).await })
}

pub fn control_req() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path!("lab" / "control" / String))
        .and(warp::body::content_length_limit(1024))
        .and(warp::body::bytes())
        .and_then(|job_id: String, body: Bytes| async move {
            let resp = lab::set_control(job_id, &body).await;
            trace!("resp: control: {:?}", &resp);
            Ok::<_, Infallible>(filters_common::result_to_reply_with_status(resp))
        })
}

pub fn stop_req() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!("lab" / "stop" / String))
        .and_then(|job_id: String| async move { stop(job_id).await })
}

pub fn history() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!("lab" / "status"))
        .and(warp::query::<HashMap<String, String>>())
        .and_then(|pager_option: HashMap<String, String>| async move {
            let option = StatusQuery::try_from(pager_option);
            let result: Result<reply::WithStatus<reply::Json>, Infallible> = match option {
                Ok(option) => {
                    trace!("req: all_job: {:?}", &option);
                    let status = lab::handle_history_all(option).await;
                    trace!("resp: all_job: {:?}", &status);
                    Ok(filters_common::result_to_reply_with_status(status))
                }
                Err(e) => Ok(filters_common::generic_error_to_reply_with_status(e)),
            };
            result
        })
}

pub fn snapshot() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!("lab" / "snapshot" / String))
        .and_then(|job_id: String| async move {
            let resp = lab::snapshot(job_id).await;
            Ok::<_, Infallible>(filters_common::result_to_reply_with_status(resp))
        })
}

async fn stop(job_id: String) -> Result<impl Reply, Infallible> {
    let resp = lab::stop(job_id).await;
    trace!("resp: stop: {:?}", &resp);
    Ok(filters_common::result_to_reply_with_status(resp))
}

pub async fn execute(request: LabRequest) -> Result<impl Reply, Infallible> {
    trace!("req: execute: {:?}", &request);
    let response = lab::handle_request(request, &METRICS_FACTORY).await;
    trace!("resp: execute: {:?}", &response);
    Ok(filters_common::result_to_reply_with_status(response))
}

#[cfg(test)]
mod standalone_mode_tests {
    use crate::filters_common::test_common::*;
    use more_asserts::assert_gt;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_evaluate() {
        setup();
        let (tx, port) = start_server();

        let (status, body) = get(port, "evaluate?control=50").await;
        assert_eq!(status, 200);
        assert_eq!(body["concurrentUsers"], 93_261);
        assert_eq!(body["usersLabel"], "9.3 万人");
        let panels = body["panels"].as_array().unwrap();
        assert_eq!(panels.len(), 2);
        for panel in panels {
            assert_eq!(panel["metrics"]["successRate"], 1.0);
        }

        let (status, body) = get(port, "evaluate?users=100000000").await;
        assert_eq!(status, 200);
        assert_eq!(body["control"], serde_json::Value::Null);
        assert_eq!(body["panels"][0]["mode"], "direct");
        assert_eq!(body["panels"][0]["metrics"]["successRate"], 0.5);
        assert_eq!(body["panels"][1]["metrics"]["queueSize"], 50_000_000);
        assert_eq!(body["panels"][1]["display"]["serverPressure"], "80%");

        for path in [
            "evaluate?control=0",
            "evaluate?control=101",
            "evaluate?control=abc",
            "evaluate?control=5&users=10",
            "evaluate",
            "evaluate?users=10&extra=1",
        ] {
            let (status, body) = get(port, path).await;
            assert_eq!(status, 400, "{}", path);
            assert_eq!(body["error_code"], 400);
        }
        let _ = tx.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lab_session() {
        setup();
        let (tx, port) = start_server();

        let (status, body) = post(
            port,
            "lab",
            json!({
                "name": "filters-lab-session",
                "duration": 30,
                "control": {"ConstantRate": {"position": 100}}
            }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "Starting");
        let job_id = body["jobId"].as_str().unwrap().to_string();
        assert!(job_id.starts_with("filters-lab-session-"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        let (status, body) = get(port, &format!("lab/snapshot/{}", job_id)).await;
        assert_eq!(status, 200);
        let panels = body["panels"].as_array().unwrap();
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[0]["concurrentUsers"], 100_000_000);
        assert_gt!(panels[0]["evaluations"].as_u64().unwrap(), 0);

        let (status, body) = post(
            port,
            &format!("lab/control/{}", job_id),
            json!({"position": 50}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["concurrentUsers"], 93_261);
        assert_eq!(body["previous"], 100.0);

        let (status, _) = post(
            port,
            &format!("lab/control/{}", job_id),
            json!({"position": 120}),
        )
        .await;
        assert_eq!(status, 400);

        let (status, body) = get(port, &format!("lab/status?job_id={}", job_id)).await;
        assert_eq!(status, 200);
        assert_eq!(body[&job_id], "InProgress");

        let (status, body) = get(port, &format!("lab/stop/{}", job_id)).await;
        assert_eq!(status, 200);
        assert_eq!(body[&job_id], "Job stopped");

        tokio::time::sleep(Duration::from_millis(200)).await;
        let (_, body) = get(port, &format!("lab/stop/{}", job_id)).await;
        assert_eq!(body[&job_id], "Job already stopped");
        let (status, _) = post(
            port,
            &format!("lab/control/{}", job_id),
            json!({"position": 50}),
        )
        .await;
        assert_eq!(status, 404);

        let (status, body) = get(port, "lab/status?offset=0&limit=100").await;
        assert_eq!(status, 200);
        assert_eq!(body[&job_id], "Stopped");
        let _ = tx.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_requests() {
        setup();
        let (tx, port) = start_server();

        let (status, _) = post(
            port,
            "lab",
            json!({"duration": 0, "control": {"ConstantRate": {"position": 10}}}),
        )
        .await;
        assert_eq!(status, 400);

        let (status, _) = get(port, "lab/snapshot/unknown-session").await;
        assert_eq!(status, 404);

        let (status, _) = get(port, "lab/status?limit=0").await;
        assert_eq!(status, 400);
        let _ = tx.send(());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prometheus_metric() {
        setup();
        let (tx, port) = start_server();
        let response = send_request("GET", String::new(), port, "metrics")
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let _ = tx.send(());
    }
}

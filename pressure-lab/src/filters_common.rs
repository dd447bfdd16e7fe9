use log::error;
use pressure_metrics::METRICS_FACTORY;
use pressure_model::GenericError;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use warp::http::header::CONTENT_TYPE;
use warp::http::StatusCode;
use warp::{reply, Filter, Reply};

pub fn prometheus_metric(
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path("metrics"))
        .and(warp::path::end())
        .map(|| {
            let encoder = TextEncoder::new();
            let metrics = METRICS_FACTORY.registry().gather();
            let mut resp_buffer = vec![];
            match encoder.encode(&metrics, &mut resp_buffer) {
                Ok(_) => reply::with_header(
                    resp_buffer,
                    CONTENT_TYPE,
                    encoder.format_type().to_string(),
                )
                .into_response(),
                Err(e) => {
                    error!("failed to export metrics: {}", e);
                    reply::with_status(
                        "Error exporting metrics",
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                    .into_response()
                }
            }
        })
}

pub fn result_to_reply_with_status<T: Serialize>(
    result: Result<T, GenericError>,
) -> reply::WithStatus<reply::Json> {
    match result {
        Ok(resp) => reply::with_status(reply::json(&resp), StatusCode::OK),
        Err(err) => generic_error_to_reply_with_status(err),
    }
}

pub fn generic_error_to_reply_with_status(err: GenericError) -> reply::WithStatus<reply::Json> {
    let status_code =
        StatusCode::from_u16(err.error_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    reply::with_status(reply::json(&err), status_code)
}

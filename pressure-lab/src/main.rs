use log::info;
use pressure_model::ModelConfig;

mod filters;
mod filters_common;
mod lab;

#[tokio::main]
async fn main() {
    //init logging
    tracing_subscriber::fmt::init();

    let config = ModelConfig::from_env();
    info!(
        "server capacity: {}, base response time: {}ms",
        config.capacity(),
        config.base_response_time_ms
    );

    lab_executor::init().await;

    let port = common_env::http_port();
    let routes = filters::get_routes();
    info!("staring server on port {}...", port);
    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}

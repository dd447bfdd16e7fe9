#[cfg(test)]
mod tests {
    use common_types::{OperatingMode, PulseTint};
    use env_logger::Env;
    use lab_executor::{get_status_by_job_id, snapshot_by_job_id, JobStatus};
    use log::info;
    use pressure_model::{
        evaluate, sample_pulses, scale_to_users, Comparison, ControlPosition, LabRequest,
        MetricsDisplay, ModelConfig, PressureBand,
    };
    use rstest::rstest;
    use serde_json::Value;
    use std::fs::File;
    use std::path::PathBuf;
    use std::sync::Once;
    use std::time::Duration;
    use tokio::time::sleep;

    pub static LAB_PATH: &str = "/lab";
    pub static SNAPSHOT_PATH: &str = "/lab/snapshot";

    static ONCE: Once = Once::new();
    fn init_logger() {
        ONCE.call_once(|| {
            let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
                .format_timestamp_millis()
                .try_init();
        });
    }

    pub fn address() -> &'static str {
        "http://localhost:3030"
    }

    pub fn resource_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/resources")
    }

    fn read_scenario(path: &str) -> Value {
        let path = resource_dir().join(path);
        serde_json::from_reader::<_, Value>(File::open(path).unwrap()).unwrap()
    }

    fn users_expectation(scenario: &Value) -> Vec<u64> {
        scenario
            .get("expectation")
            .and_then(|v| v.get("users"))
            .and_then(|v| v.as_array())
            .unwrap()
            .iter()
            .map(|v| v.as_u64().unwrap())
            .collect::<Vec<_>>()
    }

    #[test]
    fn mid_slider_both_modes_healthy() {
        init_logger();
        let comparison = Comparison::new(
            Some(ControlPosition::new(50f64).unwrap()),
            scale_to_users(50f64),
            &ModelConfig::default(),
        );
        assert_eq!(comparison.concurrent_users, 93_261);
        for panel in comparison.panels.iter() {
            assert_eq!(panel.metrics.success_rate, 1f64);
            assert_eq!(panel.metrics.avg_response_time_ms, 50f64);
            assert_eq!(panel.metrics.queue_size, 0);
        }
    }

    #[rstest]
    #[case(1f64, 100)]
    #[case(34f64, 10_000)]
    #[case(67f64, 1_000_000)]
    #[case(100f64, 100_000_000)]
    fn decade_points(#[case] control: f64, #[case] users: u64) {
        assert_eq!(scale_to_users(control), users);
    }

    #[test]
    fn slider_sweep_is_monotonic() {
        let users = (1..=100)
            .map(|control| scale_to_users(control as f64))
            .collect::<Vec<_>>();
        assert!(users.windows(2).all(|w| w[0] <= w[1]));
        let first_overloaded = users
            .iter()
            .position(|u| *u > pressure_model::SERVER_CAPACITY)
            .unwrap();
        // slider positions start at 1
        assert_eq!(first_overloaded + 1, 96);
    }

    #[rstest]
    #[case(OperatingMode::Direct, 0.5, 100, 0, PressureBand::Danger)]
    #[case(OperatingMode::Queued, 1.0, 80, 50_000_000, PressureBand::Warning)]
    fn max_load(
        #[case] mode: OperatingMode,
        #[case] success_rate: f64,
        #[case] pressure: u8,
        #[case] queue: u64,
        #[case] band: PressureBand,
    ) {
        let metrics = evaluate(100_000_000, mode);
        assert_eq!(metrics.success_rate, success_rate);
        assert_eq!(metrics.server_pressure_percent, pressure);
        assert_eq!(metrics.queue_size, queue);
        assert_eq!(MetricsDisplay::from(&metrics).pressure_band, band);
    }

    #[test]
    fn queued_never_drops_requests() {
        for control in 1..=100 {
            let users = scale_to_users(control as f64);
            let queued = evaluate(users, OperatingMode::Queued);
            assert_eq!(queued.success_rate, 1f64);
            assert!(queued.server_pressure_percent <= 80);
            let direct = evaluate(users, OperatingMode::Direct);
            assert!(direct.success_rate <= queued.success_rate);
            let batch = sample_pulses(users, OperatingMode::Queued, &ModelConfig::default());
            assert_eq!(batch.tint, PulseTint::Queued);
        }
    }

    #[rstest]
    #[case("lab-array-sweep.json")]
    #[case("lab-linear-sweep.json")]
    #[case("lab-steps.json")]
    #[tokio::test(start_paused = true)]
    async fn test_lab_scenarios(#[case] path: &str) {
        init_logger();
        let scenario = read_scenario(path);
        let request =
            serde_json::from_value::<LabRequest>(scenario.get("request").unwrap().clone())
                .unwrap();
        let expected_users = users_expectation(&scenario);
        assert_eq!(expected_users.len(), request.duration as usize);
        let modes = request.modes.clone();

        let job_id = format!("scenario-{}", path);
        let handle = tokio::spawn(lab_executor::standalone::handle_request(
            job_id.clone(),
            request,
            &pressure_metrics::METRICS_FACTORY,
        ));

        sleep(Duration::from_millis(500)).await;
        for (tick, users) in expected_users.iter().enumerate() {
            info!("[{}] - tick {} - expecting {} users", &job_id, tick, users);
            let snapshot = snapshot_by_job_id(&job_id).await.unwrap();
            for mode in modes.iter() {
                let panel = snapshot.panel(*mode).unwrap();
                assert_eq!(panel.concurrent_users, *users, "tick {}", tick);
                assert_eq!(panel.metrics.unwrap(), evaluate(*users, *mode));
            }
            sleep(Duration::from_secs(1)).await;
        }
        handle.await.unwrap();
        assert_eq!(
            get_status_by_job_id(&job_id).await.get(&job_id),
            Some(&JobStatus::Completed)
        );
    }

    #[rstest]
    #[case("lab-array-sweep.json")]
    #[case("lab-steps.json")]
    #[tokio::test]
    #[ignore]
    async fn test_lab_scenarios_against_server(#[case] path: &str) {
        init_logger();
        let scenario = read_scenario(path);
        let expected_users = users_expectation(&scenario);
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}{}", address(), LAB_PATH))
            .json(scenario.get("request").unwrap())
            .send()
            .await
            .unwrap()
            .json::<Value>()
            .await
            .unwrap();
        info!("lab resp: {}", &resp);
        let job_id = resp.get("jobId").and_then(|v| v.as_str()).unwrap();

        sleep(Duration::from_millis(500)).await;
        for users in expected_users {
            let snapshot = client
                .get(format!("{}{}/{}", address(), SNAPSHOT_PATH, job_id))
                .send()
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap();
            let panels = snapshot.get("panels").and_then(|v| v.as_array()).unwrap();
            for panel in panels {
                assert_eq!(panel["concurrentUsers"].as_u64(), Some(users));
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

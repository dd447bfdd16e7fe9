use std::sync::Arc;
use std::time::Duration;

use common_types::OperatingMode;
use log::trace;
use pressure_metrics::SessionMetrics;
use pressure_model::{sample_pulses, ControlPosition, Evaluator, ModelConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::update_panel;

/// Periodic tasks driving one panel. Both are aborted when dropped.
pub(crate) struct PanelTimers {
    metrics: JoinHandle<()>,
    pulses: JoinHandle<()>,
}

impl PanelTimers {
    pub(crate) fn spawn(
        job_id: &str,
        mode: OperatingMode,
        config: ModelConfig,
        control: watch::Receiver<ControlPosition>,
        session_metrics: Arc<SessionMetrics>,
    ) -> Self {
        let metrics = tokio::spawn(metrics_timer(
            job_id.to_string(),
            Evaluator::new(mode, config),
            control.clone(),
            session_metrics.clone(),
            Duration::from_millis(common_env::metrics_interval_ms()),
        ));
        let pulses = tokio::spawn(pulse_timer(
            job_id.to_string(),
            mode,
            config,
            control,
            session_metrics,
            Duration::from_millis(common_env::pulse_interval_ms()),
        ));
        PanelTimers { metrics, pulses }
    }
}

impl Drop for PanelTimers {
    fn drop(&mut self) {
        self.metrics.abort();
        self.pulses.abort();
    }
}

async fn metrics_timer(
    job_id: String,
    evaluator: Evaluator,
    control: watch::Receiver<ControlPosition>,
    session_metrics: Arc<SessionMetrics>,
    period: Duration,
) {
    let mode = evaluator.mode();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let position = *control.borrow();
        let users = position.users();
        let metrics = evaluator.evaluate(users);
        trace!(
            "[metrics_timer] - [{}] - [{}] - users: {}, metrics: {:?}",
            &job_id,
            mode,
            users,
            &metrics
        );
        session_metrics.control_position(position.value());
        session_metrics.evaluation(mode, users, &metrics);
        update_panel(&job_id, mode, |panel| {
            panel.evaluated(position, users, metrics)
        })
        .await;
    }
}

async fn pulse_timer(
    job_id: String,
    mode: OperatingMode,
    config: ModelConfig,
    control: watch::Receiver<ControlPosition>,
    session_metrics: Arc<SessionMetrics>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let users = control.borrow().users();
        let batch = sample_pulses(users, mode, &config);
        session_metrics.pulses(mode, &batch);
        update_panel(&job_id, mode, |panel| panel.pulsed(batch)).await;
    }
}

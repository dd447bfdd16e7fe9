use common_types::{Metrics, OperatingMode, PulseBatch};
use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::process_collector::ProcessCollector;
use prometheus::{Gauge, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

lazy_static! {
    pub static ref METRICS_FACTORY: MetricsFactory = MetricsFactory::default();
}

#[macro_export]
macro_rules! log_error {
    ($result:expr) => {
        if let Err(e) = $result {
            log::error!("{}", e.to_string());
        }
    };
}

const MODE_LABEL: &str = "mode";
const TINT_LABEL: &str = "tint";

pub struct MetricsFactory {
    registry: Registry,
    metrics: RwLock<HashMap<String, Arc<SessionMetrics>>>,
}

impl Default for MetricsFactory {
    fn default() -> Self {
        let registry = Registry::default();
        let pc = ProcessCollector::for_self();
        let _ = registry.register(Box::new(pc));
        Self {
            registry,
            metrics: RwLock::default(),
        }
    }
}

impl MetricsFactory {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Metrics of a lab session, created and registered on first use
    pub async fn metrics(&self, job_id: &str) -> prometheus::Result<Arc<SessionMetrics>> {
        {
            if let Some(m) = self.metrics.read().await.get(job_id) {
                return Ok(m.clone());
            }
        }

        let mut write_guard = self.metrics.write().await;
        //retry again to check if another thread already created metrics
        if let Some(m) = write_guard.get(job_id) {
            return Ok(m.clone());
        }

        let opts = |name: &str, help: &str| Opts::new(name, help).const_label("job_id", job_id);

        let control_position = Gauge::with_opts(opts(
            "lab_control_position",
            "current slider position of the session",
        ))?;
        let concurrent_users = GaugeVec::new(
            opts("lab_concurrent_users", "simulated concurrent users"),
            &[MODE_LABEL],
        )?;
        let avg_response_time = GaugeVec::new(
            opts(
                "lab_avg_response_time_ms",
                "modelled average response time in milliseconds",
            ),
            &[MODE_LABEL],
        )?;
        let success_rate = GaugeVec::new(
            opts("lab_success_rate", "fraction of requests served"),
            &[MODE_LABEL],
        )?;
        let queue_size = GaugeVec::new(
            opts("lab_queue_size", "requests waiting in the queue"),
            &[MODE_LABEL],
        )?;
        let server_pressure = IntGaugeVec::new(
            opts("lab_server_pressure_percent", "server pressure indicator"),
            &[MODE_LABEL],
        )?;
        let evaluation_count = IntCounterVec::new(
            opts("lab_evaluation_count", "number of metrics evaluations"),
            &[MODE_LABEL],
        )?;
        let pulse_count = IntCounterVec::new(
            opts("lab_pulse_count", "request pulses spawned per tint"),
            &[MODE_LABEL, TINT_LABEL],
        )?;

        let metrics = SessionMetrics {
            control_position,
            concurrent_users,
            avg_response_time,
            success_rate,
            queue_size,
            server_pressure,
            evaluation_count,
            pulse_count,
        };
        for (index, collector) in metrics.collectors().into_iter().enumerate() {
            if let Err(e) = self.registry.register(collector) {
                // roll back the collectors registered so far
                for registered in metrics.collectors().into_iter().take(index) {
                    log_error!(self.registry.unregister(registered));
                }
                return Err(e);
            }
        }
        let metrics = Arc::new(metrics);
        write_guard.insert(String::from(job_id), metrics.clone());
        Ok(metrics)
    }

    pub async fn remove_metrics(&self, job_id: &str) {
        let metrics = { self.metrics.write().await.remove(job_id) };
        if let Some(m) = metrics {
            for collector in m.collectors() {
                let result = self.registry.unregister(collector);
                log_error!(result);
            }
        }
    }
}

pub struct SessionMetrics {
    control_position: Gauge,
    concurrent_users: GaugeVec,
    avg_response_time: GaugeVec,
    success_rate: GaugeVec,
    queue_size: GaugeVec,
    server_pressure: IntGaugeVec,
    evaluation_count: IntCounterVec,
    pulse_count: IntCounterVec,
}

impl SessionMetrics {
    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.control_position.clone()),
            Box::new(self.concurrent_users.clone()),
            Box::new(self.avg_response_time.clone()),
            Box::new(self.success_rate.clone()),
            Box::new(self.queue_size.clone()),
            Box::new(self.server_pressure.clone()),
            Box::new(self.evaluation_count.clone()),
            Box::new(self.pulse_count.clone()),
        ]
    }

    pub fn control_position(&self, position: f64) {
        self.control_position.set(position);
    }

    pub fn evaluation(&self, mode: OperatingMode, users: u64, metrics: &Metrics) {
        let mode = [mode.as_str()];
        self.concurrent_users
            .with_label_values(&mode)
            .set(users as f64);
        self.avg_response_time
            .with_label_values(&mode)
            .set(metrics.avg_response_time_ms);
        self.success_rate
            .with_label_values(&mode)
            .set(metrics.success_rate);
        self.queue_size
            .with_label_values(&mode)
            .set(metrics.queue_size as f64);
        self.server_pressure
            .with_label_values(&mode)
            .set(metrics.server_pressure_percent as i64);
        self.evaluation_count.with_label_values(&mode).inc();
    }

    pub fn pulses(&self, mode: OperatingMode, batch: &PulseBatch) {
        self.pulse_count
            .with_label_values(&[mode.as_str(), batch.tint.as_str()])
            .inc_by(batch.count as u64);
    }
}

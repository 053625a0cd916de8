use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::error::{AppError, Result};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for expense settlement.
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_expense_created(&self, category: &str) {
        counter!("settlement_expenses_total", "category" => category.to_string()).increment(1);
    }

    pub fn record_settle_up(&self, currency: &str) {
        counter!("settlement_settle_ups_total", "currency" => currency.to_string()).increment(1);
    }

    pub fn record_shares_settled(&self, count: u64) {
        counter!("settlement_shares_settled_total").increment(count);
    }

    pub fn record_rejection(&self, operation: &str, reason: &str) {
        counter!("settlement_rejections_total", "operation" => operation.to_string(), "reason" => reason.to_string()).increment(1);
    }

    pub fn record_aggregation(&self, record_count: u64, pair_count: u64) {
        histogram!("settlement_aggregation_record_count").record(record_count as f64);
        histogram!("settlement_aggregation_pair_count").record(pair_count as f64);
    }

    pub fn record_plan(&self, pair_count: u64, transfer_count: u64) {
        histogram!("settlement_plan_pair_count").record(pair_count as f64);
        histogram!("settlement_plan_transfer_count").record(transfer_count as f64);
    }

    pub fn record_planning_latency(&self, duration_ms: f64) {
        histogram!("settlement_plan_duration_ms").record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder and returns its handle.
///
/// Safe to call more than once; later calls return the first handle.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let _guard = INIT_LOCK
        .lock()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("metrics init lock poisoned")))?;
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to install Prometheus recorder: {}", e)))?;
    describe_metrics();

    METRICS.get_or_init(Metrics::new);
    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("settlement_expenses_total", Unit::Count, "Total number of expenses recorded");
    describe_counter!("settlement_settle_ups_total", Unit::Count, "Total number of settle-up payments recorded");
    describe_counter!("settlement_shares_settled_total", Unit::Count, "Total number of expense shares marked settled");
    describe_counter!("settlement_rejections_total", Unit::Count, "Operations rejected by a business rule");

    describe_histogram!("settlement_aggregation_record_count", Unit::Count, "Records reduced per aggregation");
    describe_histogram!("settlement_aggregation_pair_count", Unit::Count, "Net balance pairs per aggregation");
    describe_histogram!("settlement_plan_pair_count", Unit::Count, "Net balance pairs fed into the planner");
    describe_histogram!("settlement_plan_transfer_count", Unit::Count, "Transfers per settlement plan");
    describe_histogram!("settlement_plan_duration_ms", Unit::Milliseconds, "Settlement planning latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

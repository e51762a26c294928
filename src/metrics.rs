//! Metrics helpers for the receiver pipeline.

// std
#[cfg(feature = "prometheus")]
use std::sync::OnceLock;
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smallvec::SmallVec;
// self
use crate::_prelude::*;

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_RECEIVED_TOTAL: &str = "shared_signals_received_total";
const METRIC_DISPATCHED_TOTAL: &str = "shared_signals_dispatched_total";
const METRIC_VERIFICATION_FAILURES_TOTAL: &str = "shared_signals_verification_failures_total";
const METRIC_JWKS_FETCH_TOTAL: &str = "shared_signals_jwks_fetch_total";
const METRIC_JWKS_FETCH_DURATION: &str = "shared_signals_jwks_fetch_duration_seconds";
const METRIC_JWKS_CACHE_TOTAL: &str = "shared_signals_jwks_cache_total";
const METRIC_HTTP_RETRIES_TOTAL: &str = "shared_signals_http_retries_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record the final outcome of one receiver request (`accepted`, `rejected`, `disabled`).
pub fn record_received(outcome: &'static str) {
	metrics::counter!(METRIC_RECEIVED_TOTAL, labels([("outcome", outcome.into())]).iter())
		.increment(1);
}

/// Record a dispatch result for a recognised event type.
pub fn record_dispatched(event_type: &'static str, status: u16) {
	let outcome = if (200..300).contains(&status) { "success" } else { "failure" };

	metrics::counter!(
		METRIC_DISPATCHED_TOTAL,
		labels([("event_type", event_type.into()), ("outcome", outcome.into())]).iter()
	)
	.increment(1);
}

/// Record a verification rejection by its public error code.
pub fn record_verification_failure(code: &'static str) {
	metrics::counter!(METRIC_VERIFICATION_FAILURES_TOTAL, labels([("code", code.into())]).iter())
		.increment(1);
}

/// Record a JWKS fetch attempt (`success` or `error`) and its latency.
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
	metrics::counter!(METRIC_JWKS_FETCH_TOTAL, labels([("status", status.into())]).iter())
		.increment(1);
	metrics::histogram!(METRIC_JWKS_FETCH_DURATION).record(duration.as_secs_f64());
}

/// Record a JWKS cache lookup.
pub fn record_jwks_cache(hit: bool) {
	let result = if hit { "hit" } else { "miss" };

	metrics::counter!(METRIC_JWKS_CACHE_TOTAL, labels([("result", result.into())]).iter())
		.increment(1);
}

/// Record an HTTP retry caused by `reason` (`status` or `transport`).
pub fn record_http_retry(reason: &'static str) {
	metrics::counter!(METRIC_HTTP_RETRIES_TOTAL, labels([("reason", reason.into())]).iter())
		.increment(1);
}

fn labels<const N: usize>(pairs: [(&'static str, metrics::SharedString); N]) -> LabelSet {
	pairs.into_iter().map(|(key, value)| Label::new(key, value)).collect()
}

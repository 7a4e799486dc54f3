//! # Prometheus Metrics
//!
//! Operational counters for the authenticator service, scraped at
//! `GET /metrics`.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers. Nothing here
//! is labelled with codes, secrets or request bodies.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the service.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers and the logger task.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Provisioning requests, labelled `outcome` = `ok` | error kind.
    pub provisioning_total: IntCounterVec,
    /// Codes handed out by `/generate-2fa`.
    pub codes_generated_total: IntCounter,
    /// Verifications, labelled `result` = `accepted` | `rejected`.
    pub verifications_total: IntCounterVec,
    /// Periodic logger runs, labelled `outcome` = `code` | `not_provisioned` | `error`.
    pub logger_runs_total: IntCounterVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("keyward".into()), None)
            .expect("failed to create prometheus registry");

        let provisioning_total = IntCounterVec::new(
            Opts::new("provisioning_total", "Secret provisioning attempts by outcome"),
            &["outcome"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(provisioning_total.clone()))
            .expect("metric registration");

        let codes_generated_total =
            IntCounter::new("codes_generated_total", "Codes returned by the generate endpoint")
                .expect("metric creation");
        registry
            .register(Box::new(codes_generated_total.clone()))
            .expect("metric registration");

        let verifications_total = IntCounterVec::new(
            Opts::new("verifications_total", "Code verifications by result"),
            &["result"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(verifications_total.clone()))
            .expect("metric registration");

        let logger_runs_total = IntCounterVec::new(
            Opts::new("logger_runs_total", "Periodic code logger runs by outcome"),
            &["outcome"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(logger_runs_total.clone()))
            .expect("metric registration");

        Self {
            registry,
            provisioning_total,
            codes_generated_total,
            verifications_total,
            logger_runs_total,
        }
    }

    pub fn record_verification(&self, valid: bool) {
        let result = if valid { "accepted" } else { "rejected" };
        self.verifications_total.with_label_values(&[result]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = NodeMetrics::new();
        metrics.codes_generated_total.inc();
        metrics.record_verification(true);
        metrics.record_verification(false);
        metrics.record_verification(false);

        let text = metrics.encode().unwrap();
        assert!(text.contains("keyward_codes_generated_total 1"));
        assert!(text.contains("keyward_verifications_total{result=\"accepted\"} 1"));
        assert!(text.contains("keyward_verifications_total{result=\"rejected\"} 2"));
    }

    #[test]
    fn registries_are_independent() {
        let a = NodeMetrics::new();
        let b = NodeMetrics::new();
        a.codes_generated_total.inc();
        assert_eq!(b.codes_generated_total.get(), 0);
    }
}

//! Prometheus metrics for the Maskinporten operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports:
//! - `maskinporten_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `maskinporten_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `maskinporten_reconcile_actions_total` (counter): applied actions labeled by action and resource kind.
//! - `maskinporten_token_fetches_total` (counter): access token exchanges labeled by outcome.
//! - `maskinporten_registered_clients` (gauge): API clients held by the registry.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "maskinportenclient"
    pub controller: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Error kind as reported by `Error::kind`
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ActionLabels {
    /// "Upsert" or "Delete"
    pub action: String,
    /// "ApiClient" or "Secret"
    pub resource: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TokenFetchLabels {
    /// "success", "rejected", or "failure"
    pub outcome: String,
}

pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static RECONCILE_ACTIONS_TOTAL: Lazy<Family<ActionLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static TOKEN_FETCHES_TOTAL: Lazy<Family<TokenFetchLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static REGISTERED_CLIENTS: Lazy<Gauge<i64, AtomicI64>> = Lazy::new(Gauge::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "maskinporten_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "maskinporten_reconcile_errors_total",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "maskinporten_reconcile_actions_total",
        "Reconciliation actions applied to API clients and secrets",
        RECONCILE_ACTIONS_TOTAL.clone(),
    );
    registry.register(
        "maskinporten_token_fetches_total",
        "Access token exchanges against the Maskinporten token endpoint",
        TOKEN_FETCHES_TOTAL.clone(),
    );
    registry.register(
        "maskinporten_registered_clients",
        "Number of API clients held by the registry",
        REGISTERED_CLIENTS.clone(),
    );

    registry
});

pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    let labels = ReconcileLabels {
        controller: controller.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

pub fn inc_reconcile_error(controller: &str, kind: &str) {
    let labels = ErrorLabels {
        controller: controller.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_reconcile_action(action: &str, resource: &str) {
    let labels = ActionLabels {
        action: action.to_string(),
        resource: resource.to_string(),
    };
    RECONCILE_ACTIONS_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_token_fetch(outcome: &str) {
    let labels = TokenFetchLabels {
        outcome: outcome.to_string(),
    };
    TOKEN_FETCHES_TOTAL.get_or_create(&labels).inc();
}

pub fn set_registered_clients(count: usize) {
    REGISTERED_CLIENTS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

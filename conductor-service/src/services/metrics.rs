//! Domain counters, exported through the shared Prometheus recorder.

pub const AUTH_EVENTS_TOTAL: &str = "conductor_auth_events_total";
pub const SIDE_EFFECTS_TOTAL: &str = "conductor_side_effects_total";

/// Count an authentication or token event, e.g. `("login", "failure")`.
pub fn record_auth_event(event: &'static str, outcome: &'static str) {
    metrics::counter!(AUTH_EVENTS_TOTAL, "event" => event, "outcome" => outcome).increment(1);
}

pub fn record_side_effect(effect: &'static str, outcome: &'static str) {
    metrics::counter!(SIDE_EFFECTS_TOTAL, "effect" => effect, "outcome" => outcome).increment(1);
}

/// Map a result to the `outcome` label.
pub fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "failure"
    }
}

//! Session and accept loop metrics.
//!
//! Emitted through the `metrics` facade; without an installed recorder
//! every call is a no-op.
//!
//! # Metrics
//! - `sessiond_sessions_accepted_total` (counter)
//! - `sessiond_sessions_active` (gauge)
//! - `sessiond_accept_errors_total` (counter, label `action` = retry | stop)

pub fn session_opened() {
    metrics::counter!("sessiond_sessions_accepted_total").increment(1);
    metrics::gauge!("sessiond_sessions_active").increment(1.0);
}

pub fn session_closed() {
    metrics::gauge!("sessiond_sessions_active").decrement(1.0);
}

pub fn accept_error(action: &'static str) {
    metrics::counter!("sessiond_accept_errors_total", "action" => action).increment(1);
}

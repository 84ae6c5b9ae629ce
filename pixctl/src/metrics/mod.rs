//! Domain metrics registered in the default Prometheus registry.
//!
//! HTTP request metrics come from `axum-prometheus`; the counters here are merged into the same
//! `/internal/metrics` output.

mod credits;

pub use credits::{record_credit_debit, record_credit_purchase, record_debit_rejection, record_webhook_outcome};

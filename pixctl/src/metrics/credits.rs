//! Credit ledger and fulfillment metrics for Prometheus.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

/// Credits taken for paid operations, by transformation kind
static CREDITS_DEBITED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("pixctl_credits_debited_total", "Total credits debited for paid operations", &["operation"])
        .expect("Failed to register pixctl_credits_debited_total metric")
});

/// Debits refused by the ledger, by reason code
static DEBIT_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("pixctl_credit_debit_rejections_total", "Total rejected credit debits", &["reason"])
        .expect("Failed to register pixctl_credit_debit_rejections_total metric")
});

/// Credits granted by fulfilled purchases
static CREDITS_PURCHASED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("pixctl_credits_purchased_total", "Total credits granted by purchases")
        .expect("Failed to register pixctl_credits_purchased_total metric")
});

/// Payment webhook deliveries, by outcome
static WEBHOOK_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("pixctl_payment_webhooks_total", "Total payment webhook deliveries", &["outcome"])
        .expect("Failed to register pixctl_payment_webhooks_total metric")
});

/// Record a successful debit for `operation`
pub fn record_credit_debit(operation: &str, amount: i64) {
    CREDITS_DEBITED.with_label_values(&[operation]).inc_by(amount.max(0) as u64);
}

/// Record a debit the ledger refused
pub fn record_debit_rejection(reason: &str) {
    DEBIT_REJECTIONS.with_label_values(&[reason]).inc();
}

/// Record credits granted by a fulfilled order
pub fn record_credit_purchase(amount: i64) {
    CREDITS_PURCHASED.inc_by(amount.max(0) as u64);
}

/// Record the outcome of a webhook delivery (`fulfilled`, `duplicate`, `ignored` or an error code)
pub fn record_webhook_outcome(outcome: &str) {
    WEBHOOK_OUTCOMES.with_label_values(&[outcome]).inc();
}

//! Engine metric counters.
//!
//! Thin wrappers over the `metrics` facade; the exporter is installed by the
//! observability crate at startup. Without a recorder these are no-ops.

use metrics::counter;

pub(crate) fn record_negotiation_created() {
    counter!("swapvault_negotiations_created_total").increment(1);
}

pub(crate) fn record_negotiation_accepted() {
    counter!("swapvault_negotiations_accepted_total").increment(1);
}

pub(crate) fn record_negotiation_rejected() {
    counter!("swapvault_negotiations_rejected_total").increment(1);
}

pub(crate) fn record_trade_completed() {
    counter!("swapvault_trades_completed_total").increment(1);
}

pub(crate) fn record_trade_cancelled() {
    counter!("swapvault_trades_cancelled_total").increment(1);
}

pub(crate) fn record_trade_expired() {
    counter!("swapvault_trades_expired_total").increment(1);
}

pub(crate) fn record_hold_conflict() {
    counter!("swapvault_hold_conflicts_total").increment(1);
}

pub(crate) fn record_stale_hold_released() {
    counter!("swapvault_stale_holds_released_total").increment(1);
}

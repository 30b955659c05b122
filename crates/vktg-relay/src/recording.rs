// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; nothing is collected unless the embedding
//! process installs a recorder.

use metrics::describe_counter;

/// Register all relay metric descriptions.
pub fn register_metrics() {
    describe_counter!("vktg_updates_total", "Classified long-poll updates");
    describe_counter!("vktg_forwarded_total", "Messages forwarded to the destination");
    describe_counter!("vktg_outbound_total", "Operator messages relayed to VK");
    describe_counter!(
        "vktg_poll_backoff_total",
        "Poll loop backoffs by error class"
    );
}

pub fn record_update(kind: &'static str) {
    metrics::counter!("vktg_updates_total", "kind" => kind).increment(1);
}

pub fn record_forwarded(kind: &str) {
    metrics::counter!("vktg_forwarded_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_outbound() {
    metrics::counter!("vktg_outbound_total").increment(1);
}

pub fn record_backoff(class: &str) {
    metrics::counter!("vktg_poll_backoff_total", "class" => class.to_string()).increment(1);
}

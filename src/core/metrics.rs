// src/core/metrics.rs

//! Prometheus metrics for the coordinator and the KV server, registered
//! once globally via `lazy_static`, the same pattern the teacher uses in
//! its own `core::metrics` module. Non-goals in spec.md scope out
//! durability and consensus, not ambient observability, so both processes
//! still carry a small counter/gauge set even though nothing in this
//! distillation serves them over HTTP.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Gauge, register_counter, register_counter_vec, register_gauge};

lazy_static! {
    // --- Coordinator metrics ---
    pub static ref HEARTBEATS_RECEIVED_TOTAL: CounterVec = register_counter_vec!(
        "ringstore_heartbeats_received_total",
        "Heartbeats received by the coordinator, labeled by server id.",
        &["server_id"]
    )
    .unwrap();
    pub static ref RECOVERIES_STARTED_TOTAL: Counter = register_counter!(
        "ringstore_recoveries_started_total",
        "Total number of recovery state machines started by the coordinator."
    )
    .unwrap();
    pub static ref RECOVERIES_COMPLETED_TOTAL: Counter = register_counter!(
        "ringstore_recoveries_completed_total",
        "Total number of recoveries that reached the ONLINE switch successfully."
    )
    .unwrap();
    pub static ref RECOVERIES_ABORTED_TOTAL: Counter = register_counter!(
        "ringstore_recoveries_aborted_total",
        "Total number of recoveries aborted after an UPDATE_*_FAILED reply."
    )
    .unwrap();
    pub static ref SERVERS_ONLINE: Gauge = register_gauge!(
        "ringstore_servers_online",
        "Number of servers the coordinator currently considers ONLINE."
    )
    .unwrap();

    // --- KV server metrics ---
    pub static ref CLIENT_OPS_TOTAL: CounterVec = register_counter_vec!(
        "ringstore_client_ops_total",
        "Client operations served, labeled by op kind and status.",
        &["op", "status"]
    )
    .unwrap();
    pub static ref FORWARDED_PUT_FAILURES_TOTAL: Counter = register_counter!(
        "ringstore_forwarded_put_failures_total",
        "PUTs whose synchronous forward to the replica partner did not succeed."
    )
    .unwrap();
}

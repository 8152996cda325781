// src/core/coordinator/detector.rs

//! The failure detector's clock. The detector itself — comparing each
//! server's `last_heartbeat` against the timeout — runs inline in the
//! event loop, since it only reads and writes the server table; this task's
//! only job is to wake that loop up on a regular cadence.

use super::Event;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

pub async fn run_ticker(period: Duration, events: mpsc::Sender<Event>) {
    let mut interval = time::interval(period);
    loop {
        interval.tick().await;
        if events.send(Event::Tick).await.is_err() {
            return;
        }
    }
}

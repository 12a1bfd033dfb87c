use std::{future::Future, time::Duration};

use {anyhow::Result, tracing::info};

use crate::master::Master;

/// Drive `master` until `shutdown` resolves, then run its exit path.
///
/// Each iteration drains queued events and readable frames and runs the
/// scheduler tick. An idle iteration sleeps one tick interval unless the
/// master runs in low-latency mode.
pub async fn run(mut master: Master, shutdown: impl Future<Output = ()>) -> Result<()> {
    let tick = master.tick_interval();
    let low_latency = master.low_latency();
    tokio::pin!(shutdown);
    info!(tick_ms = tick.as_millis() as u64, low_latency, "master loop running");

    loop {
        let handled = master.poll().await;
        let pause = if handled > 0 || low_latency {
            Duration::ZERO
        } else {
            tick
        };
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            () = tokio::time::sleep(pause) => {},
        }
    }

    master.on_exit().await
}

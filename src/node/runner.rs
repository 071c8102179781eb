//! Async driver for [`Node::tick`]

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

use crate::board::Board;
use crate::radio::Radio;
use crate::serial::ByteSource;
use super::{Node, NodeStats};

/// Ticks `node` every configured tick period until `shutdown` turns true
///
/// The millisecond clock starts at zero when the loop starts and wraps
/// after roughly 49 days, which every timer in the node tolerates. Returns
/// the final counters.
pub async fn run<R, B, S>(
    node: &mut Node<R, B>,
    serial: &mut S,
    mut shutdown: watch::Receiver<bool>,
) -> NodeStats
where
    R: Radio,
    B: Board,
    S: ByteSource + ?Sized,
{
    let started = Instant::now();
    let mut ticker = interval(node.config().tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(tick_ms = node.config().tick_period.as_millis() as u64, "node loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now_ms = started.elapsed().as_millis() as u32;
                node.tick(now_ms, serial);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    let stats = node.stats();
    info!(
        sent = stats.frames_sent,
        relayed = stats.relayed,
        queue_drops = stats.queue_drops,
        "node loop stopped"
    );
    stats
}

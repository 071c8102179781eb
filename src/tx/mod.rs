//! Outbound path: bounded queue and backoff scheduler

pub mod queue;
pub mod scheduler;

pub use self::queue::{TxItem, TxQueue, TX_QUEUE_CAPACITY};
pub use self::scheduler::{Backoff, TxOutcome, TxScheduler};

//! Randomized-backoff admission of queued frames onto the radio
//!
//! The scheduler holds a single deadline. It is armed with a random backoff
//! when a frame is waiting, and re-armed after every send attempt whether
//! or not it succeeded. A failed send keeps the frame at the head of the
//! queue for the next attempt.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::core::{NodeConfig, QueueError};
use crate::radio::Radio;
use crate::util::{duration_to_ms, time_reached};
use super::queue::TxQueue;

/// Uniform random delay in `[min, max]` milliseconds
#[derive(Debug, Clone)]
pub struct Backoff {
    min_ms: u32,
    max_ms: u32,
    rng: StdRng,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration, seed: u64) -> Self {
        Backoff {
            min_ms: duration_to_ms(min),
            max_ms: duration_to_ms(max),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draws the next delay; a degenerate range always yields `min`
    pub fn next_ms(&mut self) -> u32 {
        if self.max_ms <= self.min_ms {
            return self.min_ms;
        }
        self.rng.gen_range(self.min_ms..=self.max_ms)
    }
}

/// What one scheduler pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Nothing queued; deadline cleared
    Idle,
    /// A frame is waiting and the deadline was just set
    Armed,
    /// Deadline not reached yet
    Waiting,
    /// Deadline reached but the radio is busy
    RadioBusy,
    /// Head frame transmitted and removed
    Sent { sequence: u16 },
    /// Head frame kept after a failed transmission
    Failed { code: u8 },
}

/// Transmit queue plus its send deadline
#[derive(Debug, Clone)]
pub struct TxScheduler {
    queue: TxQueue,
    next_send_at: Option<u32>,
    backoff: Backoff,
}

impl TxScheduler {
    pub fn new(backoff: Backoff) -> Self {
        TxScheduler {
            queue: TxQueue::new(),
            next_send_at: None,
            backoff,
        }
    }

    /// Creates a scheduler with the configured backoff range
    pub fn from_config(config: &NodeConfig, seed: u64) -> Self {
        Self::new(Backoff::new(config.backoff_min, config.backoff_max, seed))
    }

    pub fn queue(&self) -> &TxQueue {
        &self.queue
    }

    /// Deadline of the next send attempt, if armed
    pub fn next_send_at(&self) -> Option<u32> {
        self.next_send_at
    }

    pub fn push(&mut self, frame: &[u8]) -> Result<(), QueueError> {
        self.queue.push(frame)
    }

    /// Runs one scheduling step against `radio`
    pub fn run_once<R: Radio + ?Sized>(&mut self, now_ms: u32, radio: &mut R) -> TxOutcome {
        let (sequence, sent) = match self.queue.front() {
            None => {
                self.next_send_at = None;
                return TxOutcome::Idle;
            }
            Some(item) => {
                let deadline = match self.next_send_at {
                    None => {
                        self.next_send_at = Some(now_ms.wrapping_add(self.backoff.next_ms()));
                        return TxOutcome::Armed;
                    }
                    Some(deadline) => deadline,
                };
                if !time_reached(now_ms, deadline) {
                    return TxOutcome::Waiting;
                }
                if !radio.is_idle() {
                    return TxOutcome::RadioBusy;
                }
                (item.sequence(), radio.send_frame(item.as_bytes()))
            }
        };

        let outcome = if sent {
            info!(tag = "TXOK", seq = sequence, "frame sent");
            self.queue.pop();
            TxOutcome::Sent { sequence }
        } else {
            let code = radio.last_error_code();
            warn!(tag = "TXFAIL", code, seq = sequence, "frame send failed");
            TxOutcome::Failed { code }
        };

        let _ = radio.start_receive();
        self.next_send_at = Some(now_ms.wrapping_add(self.backoff.next_ms()));
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::SimRadio;

    fn scheduler() -> TxScheduler {
        TxScheduler::new(Backoff::new(
            Duration::from_millis(50),
            Duration::from_millis(300),
            7,
        ))
    }

    fn frame(seq: u16) -> [u8; 12] {
        let mut frame = [0u8; 12];
        frame[5..7].copy_from_slice(&seq.to_le_bytes());
        frame
    }

    #[test]
    fn test_degenerate_backoff() {
        let mut backoff = Backoff::new(Duration::from_millis(80), Duration::from_millis(20), 1);
        assert_eq!(backoff.next_ms(), 80);
        let mut backoff = Backoff::new(Duration::from_millis(80), Duration::from_millis(80), 1);
        assert_eq!(backoff.next_ms(), 80);
    }

    #[test]
    fn test_idle_clears_deadline() {
        let mut sched = scheduler();
        let mut radio = SimRadio::new();
        assert_eq!(sched.run_once(0, &mut radio), TxOutcome::Idle);
        assert_eq!(sched.next_send_at(), None);
    }

    #[test]
    fn test_arm_then_send() {
        let mut sched = scheduler();
        let mut radio = SimRadio::new();
        sched.push(&frame(11)).unwrap();

        assert_eq!(sched.run_once(1000, &mut radio), TxOutcome::Armed);
        let deadline = sched.next_send_at().unwrap();
        let wait = deadline.wrapping_sub(1000);
        assert!((50..=300).contains(&wait));

        if wait > 50 {
            assert_eq!(sched.run_once(1049, &mut radio), TxOutcome::Waiting);
        }
        assert_eq!(sched.run_once(deadline, &mut radio), TxOutcome::Sent { sequence: 11 });
        assert_eq!(radio.sent.len(), 1);
        assert_eq!(radio.rx_armed, 1);
        assert!(sched.queue().is_empty());

        // Re-armed after the attempt, cleared on the next empty pass
        assert!(sched.next_send_at().is_some());
        assert_eq!(sched.run_once(deadline + 1, &mut radio), TxOutcome::Idle);
        assert_eq!(sched.next_send_at(), None);
    }

    #[test]
    fn test_busy_radio_keeps_deadline() {
        let mut sched = scheduler();
        let mut radio = SimRadio::new();
        sched.push(&frame(1)).unwrap();
        sched.run_once(0, &mut radio);
        let deadline = sched.next_send_at().unwrap();

        radio.busy = true;
        assert_eq!(sched.run_once(deadline, &mut radio), TxOutcome::RadioBusy);
        assert_eq!(sched.next_send_at(), Some(deadline));
        assert!(radio.sent.is_empty());

        radio.busy = false;
        assert_eq!(sched.run_once(deadline + 5, &mut radio), TxOutcome::Sent { sequence: 1 });
    }

    #[test]
    fn test_failed_send_keeps_head() {
        let mut sched = scheduler();
        let mut radio = SimRadio::new();
        radio.fail_sends = 1;
        sched.push(&frame(3)).unwrap();
        sched.run_once(0, &mut radio);
        let deadline = sched.next_send_at().unwrap();

        assert_eq!(
            sched.run_once(deadline, &mut radio),
            TxOutcome::Failed { code: crate::radio::CODE_TX_ERROR }
        );
        assert_eq!(sched.queue().len(), 1);
        assert_eq!(radio.rx_armed, 1);

        let retry_at = sched.next_send_at().unwrap();
        assert!(retry_at.wrapping_sub(deadline) >= 50);
        assert_eq!(sched.run_once(retry_at, &mut radio), TxOutcome::Sent { sequence: 3 });
    }

    #[test]
    fn test_deadline_across_clock_wrap() {
        let mut sched = scheduler();
        let mut radio = SimRadio::new();
        sched.push(&frame(5)).unwrap();
        let start = u32::MAX - 20;
        sched.run_once(start, &mut radio);
        let deadline = sched.next_send_at().unwrap();
        assert!(deadline < start);

        assert_eq!(sched.run_once(u32::MAX, &mut radio), TxOutcome::Waiting);
        assert_eq!(sched.run_once(deadline, &mut radio), TxOutcome::Sent { sequence: 5 });
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_backoff_within_bounds(min in 0u64..500, span in 0u64..500, seed in any::<u64>()) {
                let max = min + span;
                let mut backoff = Backoff::new(Duration::from_millis(min), Duration::from_millis(max), seed);
                for _ in 0..32 {
                    let delay = backoff.next_ms() as u64;
                    prop_assert!(delay >= min && delay <= max);
                }
            }
        }
    }
}

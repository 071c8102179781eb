//! Node orchestration
//!
//! [`Node`] owns every piece of node state and advances it one step per
//! [`Node::tick`]. The tick is single-threaded and never blocks except
//! inside the radio's own send call.

pub mod runner;
pub mod status;

pub use self::runner::run;
pub use self::status::{last_uart_age_s, StatusInputs, StatusReportBuilder, AGE_UNKNOWN};

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::core::{DecodeError, Error, FrameType, NodeConfig, QueueError, RadioInitError, Result};
use crate::mesh::{DropReason, MeshRelay, RelayDecision};
use crate::protocol::frame::{peek_header, FrameCodec, MAX_FRAME_LEN, PING_FRAME_LEN};
use crate::radio::Radio;
use crate::serial::{parse_frequency_list, ByteSource, FrequencySet, UartLineCollector};
use crate::tx::{TxOutcome, TxScheduler};
use crate::util::{duration_to_ms, elapsed_ms};

/// LED pulse length for a received ping
const RX_LED_PULSE_MS: u16 = 100;

/// One byte past the largest frame so oversize packets are seen as such
const RX_BUF_LEN: usize = MAX_FRAME_LEN + 1;

/// Counters describing what the node has done since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub frames_sent: u32,
    pub send_failures: u32,
    /// Frames dropped because the transmit queue was full
    pub queue_drops: u32,
    pub reports_queued: u32,
    pub pings_queued: u32,
    pub relayed: u32,
    pub duplicates: u32,
    pub pings_received: u32,
    pub reports_received: u32,
    /// Inbound frames rejected as malformed, foreign or corrupted
    pub rx_rejects: u32,
    pub lines: u32,
    pub overruns: u32,
    pub battery_logs: u32,
    pub heartbeats: u32,
}

/// Periodic timers started on the first tick
#[derive(Debug, Clone, Copy)]
struct Timebase {
    last_batt_log_ms: u32,
    last_heartbeat_ms: u32,
    last_ping_ms: u32,
}

/// One mesh node: serial input, status reporting, relay and transmit path
pub struct Node<R, B> {
    config: NodeConfig,
    codec: FrameCodec,
    radio: R,
    board: B,
    scheduler: TxScheduler,
    relay: MeshRelay,
    collector: UartLineCollector,
    status: StatusReportBuilder,
    frequencies: FrequencySet,
    scanner_ok: bool,
    parsed_generation: u32,
    ping_sequence: u16,
    timebase: Option<Timebase>,
    selftest: Option<bool>,
    stats: NodeStats,
}

/// Backoff seed mixing boot id, battery level and clock noise
fn entropy_seed(boot_id: u8, battery_mv: u16) -> u64 {
    let noise = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(u32::from(boot_id) ^ (u32::from(battery_mv) << 8) ^ noise)
}

impl<R: Radio, B: Board> Node<R, B> {
    /// Creates a node whose backoff is seeded from board entropy
    pub fn new(config: NodeConfig, radio: R, mut board: B) -> Result<Self> {
        let seed = entropy_seed(board.boot_id(), board.battery_millivolts());
        Self::with_seed(config, radio, board, seed)
    }

    /// Creates a node with a fixed backoff seed
    pub fn with_seed(config: NodeConfig, radio: R, board: B, seed: u64) -> Result<Self> {
        config.validate()?;

        let codec = FrameCodec::from_config(&config, board.boot_id());
        Ok(Node {
            codec,
            scheduler: TxScheduler::from_config(&config, seed),
            relay: MeshRelay::new(&config),
            collector: UartLineCollector::new(),
            status: StatusReportBuilder::new(&config),
            frequencies: FrequencySet::new(),
            scanner_ok: false,
            parsed_generation: 0,
            ping_sequence: 0,
            timebase: None,
            selftest: None,
            stats: NodeStats::default(),
            config,
            radio,
            board,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn scheduler(&self) -> &TxScheduler {
        &self.scheduler
    }

    /// Frequencies from the most recent scan line
    pub fn frequencies(&self) -> &[u16] {
        &self.frequencies
    }

    /// Outcome of the frame self-test, if [`Node::start`] ran it
    pub fn selftest_passed(&self) -> Option<bool> {
        self.selftest
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            lines: self.collector.lines_received(),
            overruns: self.collector.overruns(),
            ..self.stats
        }
    }

    /// Brings up the radio and runs the optional frame self-test
    ///
    /// A radio failure is returned but leaves the node usable: ticks keep
    /// collecting lines and queueing reports until [`Node::reinit_radio`]
    /// succeeds.
    pub fn start(&mut self) -> std::result::Result<(), RadioInitError> {
        info!(
            node = self.config.node_id.raw(),
            boot_id = self.board.boot_id(),
            gateway = self.config.is_gateway,
            "node starting"
        );
        if self.config.frame_selftest {
            self.selftest = Some(self.frame_selftest().is_ok());
        }
        self.reinit_radio()
    }

    /// Re-runs radio bring-up
    pub fn reinit_radio(&mut self) -> std::result::Result<(), RadioInitError> {
        self.radio.init()
    }

    /// Encodes a ping and decodes it back with this node's codec
    pub fn frame_selftest(&self) -> std::result::Result<(), DecodeError> {
        let frame = self.codec.encode_ping(1);
        debug!(header = ?&frame[..8], crc = ?&frame[PING_FRAME_LEN - 2..], "self-test frame");
        match self.codec.decode_ping(&frame) {
            Ok(_) => {
                info!("frame self-test ok");
                Ok(())
            }
            Err(e) => {
                warn!(code = e.code(), "frame self-test failed: {}", e);
                Err(e)
            }
        }
    }

    /// Advances the node by one step at time `now_ms`
    pub fn tick<S: ByteSource + ?Sized>(&mut self, now_ms: u32, serial: &mut S) {
        if self.timebase.is_none() {
            self.timebase = Some(Timebase {
                last_batt_log_ms: now_ms,
                last_heartbeat_ms: now_ms,
                last_ping_ms: now_ms,
            });
            self.status.reset_timebase(now_ms);
        }

        if let Err(e) = self.collector.poll(serial, now_ms) {
            warn!(transient = e.is_transient(), "serial read failed: {}", e);
        }
        self.process_latest_line(now_ms);
        self.evaluate_report(now_ms, false);

        self.maybe_queue_ping(now_ms);
        self.run_scheduler(now_ms);
        self.receive(now_ms);
        self.periodic_logs(now_ms);
    }

    fn process_latest_line(&mut self, now_ms: u32) {
        let line = match self.collector.last_line() {
            Some(line) if line.generation != self.parsed_generation => line,
            _ => return,
        };
        self.parsed_generation = line.generation;
        self.frequencies = parse_frequency_list(&line.text);
        self.scanner_ok = !self.frequencies.is_empty();

        if self.scanner_ok {
            info!(tag = "PFREQ", count = self.frequencies.len(), "frequencies parsed");
        } else {
            warn!(tag = "PBAD", "no frequencies in scan line");
        }
        self.evaluate_report(now_ms, true);
    }

    fn evaluate_report(&mut self, now_ms: u32, force: bool) {
        let battery_mv = self.board.battery_millivolts();
        let inputs = StatusInputs {
            last_line_ms: self.collector.last_line().map(|line| line.timestamp_ms),
            frequencies: &self.frequencies,
            scanner_ok: self.scanner_ok,
            battery_mv,
        };

        match self
            .status
            .evaluate(now_ms, force, &inputs, &self.codec, &mut self.scheduler)
        {
            Ok(Some(_)) => self.stats.reports_queued += 1,
            Ok(None) => {}
            Err(e) => self.record_queue_error(e),
        }
    }

    fn record_queue_error(&mut self, err: Error) {
        match err {
            Error::Queue(QueueError::Full) => self.stats.queue_drops += 1,
            e => warn!("failed to queue frame: {}", e),
        }
    }

    fn maybe_queue_ping(&mut self, now_ms: u32) {
        let interval_ms = match self.config.ping_interval {
            Some(interval) => duration_to_ms(interval),
            None => return,
        };
        let timebase = match self.timebase.as_mut() {
            Some(timebase) => timebase,
            None => return,
        };
        if elapsed_ms(now_ms, timebase.last_ping_ms) < interval_ms {
            return;
        }
        timebase.last_ping_ms = now_ms;

        let frame = self.codec.encode_ping(self.ping_sequence);
        match self.scheduler.push(&frame) {
            Ok(()) => {
                self.ping_sequence = self.ping_sequence.wrapping_add(1);
                self.stats.pings_queued += 1;
            }
            Err(e) => self.record_queue_error(e.into()),
        }
    }

    fn run_scheduler(&mut self, now_ms: u32) {
        match self.scheduler.run_once(now_ms, &mut self.radio) {
            TxOutcome::Sent { .. } => self.stats.frames_sent += 1,
            TxOutcome::Failed { .. } => self.stats.send_failures += 1,
            _ => {}
        }
    }

    fn receive(&mut self, now_ms: u32) {
        let mut buf = [0u8; RX_BUF_LEN];
        let len = self.radio.read_frame(&mut buf);
        if len == 0 {
            return;
        }
        let frame = &mut buf[..len];

        match self.relay.evaluate(frame, now_ms) {
            RelayDecision::Forward => match self.scheduler.push(frame) {
                Ok(()) => {
                    self.stats.relayed += 1;
                    if let Some(header) = peek_header(frame) {
                        info!(
                            tag = "FWD",
                            src = header.source.raw(),
                            seq = header.sequence,
                            ttl = header.ttl,
                            hops = header.hops,
                            "frame relayed"
                        );
                    }
                }
                Err(e) => self.record_queue_error(e.into()),
            },
            RelayDecision::Local => self.handle_local(frame),
            RelayDecision::Drop(DropReason::Duplicate) => self.stats.duplicates += 1,
            RelayDecision::Drop(reason) => self.handle_drop(reason, frame),
        }
    }

    fn handle_drop(&mut self, reason: DropReason, frame: &[u8]) {
        let err = match reason {
            DropReason::BadLength => DecodeError::WrongLength(frame.len()),
            DropReason::ForeignNetwork => DecodeError::WrongNetwork(frame[0]),
            DropReason::BadCrc => DecodeError::CrcMismatch,
            other => {
                debug!(reason = ?other, "frame not relayed");
                return;
            }
        };
        self.stats.rx_rejects += 1;
        warn!(tag = "RXBAD", code = err.code(), "frame rejected: {}", err);
    }

    fn handle_local(&mut self, frame: &[u8]) {
        let kind = peek_header(frame).and_then(|header| header.kind());
        let result = match kind {
            Some(FrameType::Ping) => self.codec.decode_ping(frame).map(|ping| {
                self.stats.pings_received += 1;
                info!(
                    tag = "RXOK",
                    seq = ping.sequence,
                    src = ping.source.raw(),
                    rssi = self.radio.last_rssi(),
                    snr = self.radio.last_snr(),
                    "ping received"
                );
                self.board.led_pulse(RX_LED_PULSE_MS);
            }),
            Some(FrameType::Report) => self.codec.decode_report(frame).map(|report| {
                self.stats.reports_received += 1;
                info!(
                    tag = "RXOK",
                    seq = report.header.sequence,
                    src = report.header.source.raw(),
                    hops = report.header.hops,
                    flags = report.status.bits(),
                    age_s = report.last_uart_age_s,
                    freqs = ?report.frequencies.as_slice(),
                    rssi = self.radio.last_rssi(),
                    "report received"
                );
            }),
            None => Err(DecodeError::WrongType(frame[4])),
        };

        if let Err(e) = result {
            self.stats.rx_rejects += 1;
            warn!(tag = "RXBAD", code = e.code(), "frame rejected: {}", e);
        }
    }

    fn periodic_logs(&mut self, now_ms: u32) {
        let batt_period = duration_to_ms(self.config.batt_log_period);
        let heartbeat_period = self.config.heartbeat_period.map(duration_to_ms);
        let timebase = match self.timebase.as_mut() {
            Some(timebase) => timebase,
            None => return,
        };

        let batt_due = elapsed_ms(now_ms, timebase.last_batt_log_ms) >= batt_period;
        if batt_due {
            timebase.last_batt_log_ms = now_ms;
        }
        let heartbeat_due = match heartbeat_period {
            Some(period) if elapsed_ms(now_ms, timebase.last_heartbeat_ms) >= period => {
                timebase.last_heartbeat_ms = now_ms;
                true
            }
            _ => false,
        };

        if batt_due {
            self.stats.battery_logs += 1;
            info!(tag = "BATT", mv = self.board.battery_millivolts(), "battery level");
        }
        if heartbeat_due {
            self.stats.heartbeats += 1;
            info!(tag = "ALIVE", node = self.config.node_id.raw(), "heartbeat");
        }
    }
}

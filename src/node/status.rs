//! Status flags and report emission

use tracing::info;

use crate::core::{NodeConfig, NodeId, Result, StatusFlags};
use crate::protocol::frame::{FrameCodec, MAX_FRAME_LEN};
use crate::tx::TxScheduler;
use crate::util::{duration_to_ms, elapsed_ms};

/// Age reported when no line has been received or the age does not fit
pub const AGE_UNKNOWN: u16 = 0xFFFF;

/// Whole seconds since the last serial line, saturating to [`AGE_UNKNOWN`]
pub fn last_uart_age_s(now_ms: u32, last_line_ms: Option<u32>) -> u16 {
    match last_line_ms {
        None => AGE_UNKNOWN,
        Some(ts) => {
            let age_s = elapsed_ms(now_ms, ts) / 1000;
            u16::try_from(age_s).unwrap_or(AGE_UNKNOWN)
        }
    }
}

/// Inputs sampled by the node for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs<'a> {
    /// Completion time of the last serial line, if any
    pub last_line_ms: Option<u32>,
    /// Frequencies from the latest parse
    pub frequencies: &'a [u16],
    /// Latest parse produced at least one frequency
    pub scanner_ok: bool,
    pub battery_mv: u16,
}

/// Decides when to report and builds the report frame
#[derive(Debug, Clone)]
pub struct StatusReportBuilder {
    link_fresh_ms: u32,
    low_battery_mv: u16,
    report_period_ms: u32,
    destination: NodeId,
    sequence: u16,
    last_flags: Option<StatusFlags>,
    last_report_ms: u32,
}

impl StatusReportBuilder {
    pub fn new(config: &NodeConfig) -> Self {
        StatusReportBuilder {
            link_fresh_ms: duration_to_ms(config.link_fresh),
            low_battery_mv: config.low_battery_mv,
            report_period_ms: duration_to_ms(config.report_period),
            destination: NodeId::SCANNER,
            sequence: 0,
            last_flags: None,
            last_report_ms: 0,
        }
    }

    /// Sequence number the next report will carry
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn last_flags(&self) -> Option<StatusFlags> {
        self.last_flags
    }

    /// Starts the periodic interval at `now_ms`
    pub fn reset_timebase(&mut self, now_ms: u32) {
        self.last_report_ms = now_ms;
    }

    /// Derives the status byte; every bit is recomputed from scratch
    pub fn derive_flags(&self, age_s: u16, inputs: &StatusInputs<'_>) -> StatusFlags {
        let has_line = inputs.last_line_ms.is_some();
        let mut flags = StatusFlags::empty();
        flags.set(
            StatusFlags::LINK_FRESH,
            has_line && age_s != AGE_UNKNOWN && u32::from(age_s) * 1000 <= self.link_fresh_ms,
        );
        flags.set(StatusFlags::SCANNER_OK, inputs.scanner_ok);
        flags.set(StatusFlags::LINK_VALID, has_line);
        flags.set(StatusFlags::LOW_BATTERY, inputs.battery_mv < self.low_battery_mv);
        flags
    }

    /// Builds and queues a report when forced, when the flags changed or
    /// when the report period has elapsed
    ///
    /// Returns the queued frame length, or `None` if no report was due.
    /// Sequence, last flags and last report time only advance once the frame
    /// is in the queue.
    pub fn evaluate(
        &mut self,
        now_ms: u32,
        force: bool,
        inputs: &StatusInputs<'_>,
        codec: &FrameCodec,
        scheduler: &mut TxScheduler,
    ) -> Result<Option<usize>> {
        let age_s = last_uart_age_s(now_ms, inputs.last_line_ms);
        let flags = self.derive_flags(age_s, inputs);

        let flags_changed = self.last_flags != Some(flags);
        let periodic_due = elapsed_ms(now_ms, self.last_report_ms) >= self.report_period_ms;
        if !force && !flags_changed && !periodic_due {
            return Ok(None);
        }

        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = codec.encode_report(
            self.sequence,
            self.destination,
            inputs.frequencies,
            flags,
            age_s,
            &mut buf,
        )?;
        scheduler.push(&buf[..len])?;

        info!(tag = "RPT", len, seq = self.sequence, flags = flags.bits(), "status report queued");
        self.sequence = self.sequence.wrapping_add(1);
        self.last_report_ms = now_ms;
        self.last_flags = Some(flags);
        Ok(Some(len))
    }
}

//! Peripheral synchronization state

use crate::types::{ConnectionHandle, NodeId, SubeventId, SyncHandle};

/// Synchronization state assigned to this peripheral by the gateway
#[derive(Debug, Clone, Default)]
pub struct TimeSyncHandle {
    /// Assigned network identity
    pub node_id: Option<NodeId>,
    /// Assigned subevent index to listen to
    pub subevent: Option<SubeventId>,
    /// Nominal train interval in local ticks, after systematic correction
    pub nominal_interval_ticks: u32,
    /// Current periodic-train synchronization, if any
    pub sync: Option<SyncHandle>,
    /// Current GATT link, if any
    pub link: Option<ConnectionHandle>,
}

/// Turns periodic-train timing observations into bounded clock corrections
///
/// Each complete subevent report yields a signed tick error against the
/// nominal interval. Errors inside the jitter envelope are applied and
/// remembered; errors outside it (a missed train, out-of-order delivery)
/// are replaced by the last accepted error, so one outlier cannot drag the
/// offset.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    /// Tick count at the last accepted report
    last_report_tick: u32,
    /// Acceptable per-interval error envelope in ticks
    tick_error_max: i32,
    /// Last accepted tick error
    last_accepted_error: i32,
}

impl DriftTracker {
    /// Create a tracker baselined at the given tick count
    #[must_use]
    pub fn new(now: u32, tick_error_max: i32) -> Self {
        Self {
            last_report_tick: now,
            tick_error_max,
            last_accepted_error: 0,
        }
    }

    /// The jitter envelope this tracker accepts
    #[must_use]
    pub fn tick_error_max(&self) -> i32 {
        self.tick_error_max
    }

    /// The last error that passed the envelope check
    #[must_use]
    pub fn last_accepted_error(&self) -> i32 {
        self.last_accepted_error
    }

    /// Record one complete report and return the tick error to apply
    ///
    /// The elapsed time is taken as an absolute value to tolerate timer
    /// wrap and out-of-order delivery. Outliers return the previously
    /// accepted error unchanged (hold-last-good).
    #[allow(clippy::cast_possible_wrap)]
    pub fn observe(&mut self, now: u32, nominal_interval_ticks: u32) -> i32 {
        let elapsed = (now.wrapping_sub(self.last_report_tick) as i32).unsigned_abs();
        let tick_error = elapsed.wrapping_sub(nominal_interval_ticks) as i32;

        let applied = if tick_error.saturating_abs() > self.tick_error_max {
            self.last_accepted_error
        } else {
            self.last_accepted_error = tick_error;
            tick_error
        };

        self.last_report_tick = now;
        applied
    }
}

/// Jitter envelope for a nominal interval: ±20 ppm, rounded to nearest
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(crate) fn tick_error_envelope(nominal_interval_ticks: u32) -> i32 {
    ((20 * u64::from(nominal_interval_ticks) + 500_000) / 1_000_000) as i32
}

/// Systematic oscillator-bias correction: −36 ppm
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn apply_systematic_correction(interval_ticks: u32) -> u32 {
    interval_ticks - (36 * u64::from(interval_ticks) / 1_000_000) as u32
}

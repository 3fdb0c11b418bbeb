//! Tick sources and the virtual clock
//!
//! The local timer is a free-running 32-bit tick counter that wraps; the
//! virtual clock adds a signed offset to it to approximate the gateway's
//! wall-clock value. The offset and every multi-step computation deriving
//! it are guarded by one mutex, because the offset is written by the
//! peripheral event handlers and read concurrently by the telemetry path
//! through [`VirtualClock::virtual_time`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Source of the platform's local free-running tick counter
pub trait TickSource: Send + Sync {
    /// Current tick count, monotonic modulo 32-bit wraparound
    fn tick_count(&self) -> u32;

    /// Tick frequency in Hz
    fn tick_rate_hz(&self) -> u32;
}

/// Tick source backed by the process monotonic clock
///
/// Suitable for hosts; embedded integrations provide their own
/// [`TickSource`] wrapping the hardware timer.
pub struct FreeRunningClock {
    epoch: Instant,
    rate_hz: u32,
}

impl FreeRunningClock {
    /// Create a clock ticking at the given rate
    #[must_use]
    pub fn new(rate_hz: u32) -> Self {
        Self {
            epoch: Instant::now(),
            rate_hz,
        }
    }
}

impl TickSource for FreeRunningClock {
    #[allow(clippy::cast_possible_truncation)]
    fn tick_count(&self) -> u32 {
        let elapsed = self.epoch.elapsed();
        (elapsed.as_micros() * u128::from(self.rate_hz) / 1_000_000) as u32
    }

    fn tick_rate_hz(&self) -> u32 {
        self.rate_hz
    }
}

/// Continuously corrected clock exposed to the telemetry consumer
///
/// `virtual_time() = local_tick_count() + offset`, with the offset adjusted
/// by the clock handoff and by every accepted periodic-train observation.
pub struct VirtualClock {
    source: Arc<dyn TickSource>,
    offset: Mutex<i32>,
}

impl VirtualClock {
    /// Create a virtual clock over the given tick source
    #[must_use]
    pub fn new(source: Arc<dyn TickSource>) -> Self {
        Self {
            source,
            offset: Mutex::new(0),
        }
    }

    /// Current corrected tick count
    pub fn virtual_time(&self) -> u32 {
        let offset = self.lock_offset();
        self.source.tick_count().wrapping_add_signed(*offset)
    }

    /// Raw local tick count, uncorrected
    pub fn tick_count(&self) -> u32 {
        self.source.tick_count()
    }

    /// Current signed offset in ticks
    pub fn offset(&self) -> i32 {
        *self.lock_offset()
    }

    /// Initialize the offset from a received wall-clock value
    ///
    /// Reads the local tick count and computes `offset = wall_clock - now`
    /// in one guarded step.
    pub fn set_from_wall_clock(&self, wall_clock: u32) {
        let mut offset = self.lock_offset();
        #[allow(clippy::cast_possible_wrap)]
        {
            *offset = wall_clock.wrapping_sub(self.source.tick_count()) as i32;
        }
    }

    /// Add a one-shot correction to the offset
    pub fn apply_correction(&self, delta: i32) {
        let mut offset = self.lock_offset();
        *offset = offset.wrapping_add(delta);
    }

    /// Subtract an observed tick error from the offset
    pub fn adjust(&self, tick_error: i32) {
        let mut offset = self.lock_offset();
        *offset = offset.wrapping_sub(tick_error);
    }

    /// Convert a millisecond interval into local ticks
    #[allow(clippy::cast_possible_truncation)]
    pub fn ms_to_ticks(&self, ms: u32) -> u32 {
        (u64::from(ms) * u64::from(self.source.tick_rate_hz()) / 1000) as u32
    }

    fn lock_offset(&self) -> std::sync::MutexGuard<'_, i32> {
        self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle to a [`VirtualClock`]
pub type SharedClock = Arc<VirtualClock>;

/// Create a shared virtual clock over the given tick source
#[must_use]
pub fn shared_clock(source: Arc<dyn TickSource>) -> SharedClock {
    Arc::new(VirtualClock::new(source))
}

/// Tick source advanced manually, for tests and simulations
pub struct ManualClock {
    ticks: AtomicU32,
    rate_hz: u32,
}

impl ManualClock {
    /// Create a manual clock starting at tick zero
    #[must_use]
    pub fn new(rate_hz: u32) -> Self {
        Self {
            ticks: AtomicU32::new(0),
            rate_hz,
        }
    }

    /// Set the tick count
    pub fn set(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::Release);
    }

    /// Advance the tick count, wrapping at 32 bits
    pub fn advance(&self, ticks: u32) {
        self.ticks.fetch_add(ticks, Ordering::AcqRel);
    }
}

impl TickSource for ManualClock {
    fn tick_count(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    fn tick_rate_hz(&self) -> u32 {
        self.rate_hz
    }
}

//! Time sources

use embassy_time::{Duration, Instant};

/// Platform clock
///
/// `uptime` is monotonic and drives the task queue. The wall clock may jump
/// when it is synchronised by a client, so decisions that depend on it must
/// tolerate a wall clock that is wrong right after boot.
pub trait Clock {
    /// Monotonic time since boot
    fn uptime(&self) -> Instant;

    /// Wall-clock seconds since the Unix epoch
    fn unixtime(&self) -> u32;

    /// Wall-clock seconds shifted into the local time zone
    fn local_unixtime(&self) -> u32;
}

/// Hand-driven clock for tests and replay
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    uptime: Instant,
    unixtime: u32,
    utc_offset_secs: i32,
}

impl ManualClock {
    /// Clock at boot with the wall clock reading `unixtime`.
    pub const fn new(unixtime: u32) -> Self {
        Self {
            uptime: Instant::from_ticks(0),
            unixtime,
            utc_offset_secs: 0,
        }
    }

    pub const fn with_utc_offset(mut self, utc_offset_secs: i32) -> Self {
        self.utc_offset_secs = utc_offset_secs;
        self
    }

    /// Move both uptime and wall clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.uptime += by;
        self.unixtime = self.unixtime.saturating_add(by.as_secs() as u32);
    }

    /// Jump the wall clock without touching uptime, as a time sync does.
    pub fn set_unixtime(&mut self, unixtime: u32) {
        self.unixtime = unixtime;
    }
}

impl Clock for ManualClock {
    fn uptime(&self) -> Instant {
        self.uptime
    }

    fn unixtime(&self) -> u32 {
        self.unixtime
    }

    fn local_unixtime(&self) -> u32 {
        (self.unixtime as i64 + self.utc_offset_secs as i64).clamp(0, u32::MAX as i64) as u32
    }
}

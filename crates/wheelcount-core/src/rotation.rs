//! Session rotation
//!
//! The [`RotationScheduler`] owns the collector's live session. Turns are
//! added to it as they arrive; once the session window has passed it is
//! appended to the log and re-anchored at the current time ("rotation").
//!
//! Rotation has to happen even when the wheel is idle, otherwise a quiet
//! session would never reach storage. A one-shot timer is therefore kept
//! armed for the end of the live session. The deadline comes from the
//! session's own origin, not from polling the wall clock, so a run of idle
//! windows rotates on the window boundaries instead of drifting.
//!
//! The timer is kept armed continuously: every time it fires it rotates if
//! needed and returns the delay to its successor. Turn events only arm it if
//! it is not armed already, so at most one timer is ever pending.

use embassy_time::Duration;
use log::{debug, error, info};

use crate::error::{StorageError, TurnError};
use crate::radio::{ManufData, Radio};
use crate::session::Session;
use crate::storage::{AppendOnlyLog, Appended, append_session};

/// Storage location of the session log
pub const DEFAULT_LOCATION: &str = "/turndata";

/// Count added for each falling edge of the wheel sensor
pub const TURN_INCREMENT: u16 = 1;

pub type Location = heapless::String<16>;

/// One physical turn counter: where it stores sessions and its live session
#[derive(Debug, Clone)]
pub struct Collector {
    location: Location,
    session: Session,
}

impl Collector {
    /// Create a collector whose first session starts at `now`.
    ///
    /// Locations longer than 16 bytes are truncated.
    pub fn new(location: &str, id: u32, bucket_width: u32, now: u32) -> Self {
        let mut loc = Location::new();
        for c in location.chars() {
            if loc.push(c).is_err() {
                break;
            }
        }

        info!("Init data session time:{}", now);
        Self {
            location: loc,
            session: Session::new(now, id, bucket_width),
        }
    }

    pub fn location(&self) -> &str {
        self.location.as_str()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Snapshot printed by `turndata info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationInfo {
    pub timer_armed: bool,
    /// Wall-clock time the timer is due
    pub next_timer: u32,
    /// Wall-clock time the timer was armed
    pub armed_at: u32,
    pub expired: bool,
    pub last_error: Option<TurnError>,
    /// Turns dropped since boot
    pub dropped: u32,
}

/// Owner of the live session and the rotation timer
#[derive(Debug)]
pub struct RotationScheduler {
    collector: Collector,
    manuf_data: ManufData,
    timer_armed: bool,
    armed_at: u32,
    next_timer: u32,
    last_error: Option<TurnError>,
    dropped: u32,
    debug_level: u8,
}

impl RotationScheduler {
    pub fn new(collector: Collector, debug_level: u8) -> Self {
        Self {
            collector,
            manuf_data: ManufData::default(),
            timer_armed: false,
            armed_at: 0,
            next_timer: 0,
            last_error: None,
            dropped: 0,
            debug_level,
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn session(&self) -> &Session {
        &self.collector.session
    }

    /// Summary currently advertised by the radio
    pub fn manuf_data(&self) -> &ManufData {
        &self.manuf_data
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn last_error(&self) -> Option<TurnError> {
        self.last_error
    }

    /// A counted edge: rotate if the session has expired, then add `value`
    /// to the bucket covering `time`.
    ///
    /// A turn no bucket covers (the wall clock went backwards) is dropped and
    /// recorded as [`TurnError::NotAdded`]. Returns the delay of a timer to
    /// arm, if none is armed yet.
    pub fn on_edge_event<L, R>(
        &mut self,
        log: &mut L,
        radio: &mut R,
        time: u32,
        value: u16,
    ) -> Result<Option<Duration>, StorageError>
    where
        L: AppendOnlyLog + ?Sized,
        R: Radio + ?Sized,
    {
        self.rotate_if_expired(log, radio, time)?;

        if self.collector.session.add_value(time, value) {
            if self.debug_level >= 2 {
                debug!("Wheel turn (time:{})", time);
            }
        } else {
            let err = TurnError::NotAdded { time };
            error!("Turn data not added: {}", err);
            self.last_error = Some(err);
            self.dropped = self.dropped.wrapping_add(1);
        }

        Ok(self.arm_if_idle(time))
    }

    /// An edge of the uncounted polarity: rotation check and timer arming
    /// only.
    pub fn on_idle_edge<L, R>(&mut self, log: &mut L, radio: &mut R, time: u32) -> Result<Option<Duration>, StorageError>
    where
        L: AppendOnlyLog + ?Sized,
        R: Radio + ?Sized,
    {
        self.rotate_if_expired(log, radio, time)?;
        Ok(self.arm_if_idle(time))
    }

    fn arm_if_idle(&mut self, now: u32) -> Option<Duration> {
        if self.timer_armed {
            None
        } else {
            Some(self.arm_timer(now))
        }
    }

    /// Arm the timer for the end of the live session.
    ///
    /// The delay is at least one second so an already-passed deadline cannot
    /// turn into a busy loop.
    pub fn arm_timer(&mut self, now: u32) -> Duration {
        let deadline = self.collector.session.end_time() as i64;
        let delay = (deadline - now as i64).max(1);

        self.armed_at = now;
        self.next_timer = now.saturating_add(delay as u32);
        self.timer_armed = true;

        if self.debug_level >= 1 {
            debug!("Turn timer set to {}({}s)", self.next_timer, delay);
        }

        Duration::from_secs(delay as u64)
    }

    /// The rotation timer fired: rotate if due and return the delay to the
    /// next timer.
    ///
    /// The wall clock may have moved since the timer was armed, so expiry is
    /// checked again rather than assumed.
    pub fn on_timer_fire<L, R>(&mut self, log: &mut L, radio: &mut R, now: u32) -> Result<Duration, StorageError>
    where
        L: AppendOnlyLog + ?Sized,
        R: Radio + ?Sized,
    {
        self.timer_armed = false;
        if self.debug_level >= 1 {
            debug!("Turn timer fired at {}", now);
        }

        self.rotate_if_expired(log, radio, now)?;
        Ok(self.arm_timer(now))
    }

    /// Rotate when the live session has expired at `now`. Returns whether a
    /// rotation happened.
    pub fn rotate_if_expired<L, R>(&mut self, log: &mut L, radio: &mut R, now: u32) -> Result<bool, StorageError>
    where
        L: AppendOnlyLog + ?Sized,
        R: Radio + ?Sized,
    {
        if !self.collector.session.is_expired(now) {
            return Ok(false);
        }
        self.rotate(log, radio, now)?;
        Ok(true)
    }

    /// Persist the live session, start a new one at `now` and advertise the
    /// end of the persisted window.
    fn rotate<L, R>(&mut self, log: &mut L, radio: &mut R, now: u32) -> Result<(), StorageError>
    where
        L: AppendOnlyLog + ?Sized,
        R: Radio + ?Sized,
    {
        let persisted = self.collector.session;

        if append_session(log, self.collector.location(), &persisted)? == Appended::AfterErase {
            info!("Session history lost to make room");
        }

        self.collector.session.reinit(now);
        if self.debug_level >= 1 {
            debug!("Init data session time:{}", now);
        }

        self.manuf_data.last_session_unixtime = persisted.end_of_current_bucket(now);
        self.manuf_data.refresh(radio);

        info!(
            "Session {} rotated ({} turns), next window starts at {}",
            persisted.origin,
            persisted.total(),
            now
        );
        Ok(())
    }

    /// Erase the session log. The live session is kept.
    pub fn clear<L: AppendOnlyLog + ?Sized>(&mut self, log: &mut L) {
        log.erase();
        info!("Session file {} cleared", self.collector.location());
    }

    /// Append [`Session::debug_pattern`] and advertise `now` as the last
    /// session time.
    pub fn write_debug_record<L, R>(&mut self, log: &mut L, radio: &mut R, now: u32) -> Result<(), StorageError>
    where
        L: AppendOnlyLog + ?Sized,
        R: Radio + ?Sized,
    {
        self.manuf_data.last_session_unixtime = now;
        self.manuf_data.refresh(radio);
        append_session(log, self.collector.location(), &Session::debug_pattern())?;
        info!("Debug data written");
        Ok(())
    }

    pub fn info(&self, now: u32) -> RotationInfo {
        RotationInfo {
            timer_armed: self.timer_armed,
            next_timer: self.next_timer,
            armed_at: self.armed_at,
            expired: self.collector.session.is_expired(now),
            last_error: self.last_error,
            dropped: self.dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{BUCKET_COUNT, RECORD_SIZE};
    use crate::storage::{MemoryLog, for_each_record, record_count};
    use crate::testing::RecordingRadio;
    use alloc::vec::Vec;
    use core::ops::ControlFlow;

    const WIDTH: u32 = 900;
    const ORIGIN: u32 = 1000;
    const END: u32 = ORIGIN + 16 * WIDTH;

    fn scheduler() -> RotationScheduler {
        RotationScheduler::new(Collector::new(DEFAULT_LOCATION, 5, WIDTH, ORIGIN), 2)
    }

    fn stored(log: &MemoryLog) -> Vec<Session> {
        let mut out = Vec::new();
        for_each_record(log, |s| {
            out.push(s);
            ControlFlow::Continue(())
        });
        out
    }

    #[test]
    fn first_edge_arms_timer_for_session_end() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 8);
        let mut radio = RecordingRadio::default();

        let arm = rot.on_edge_event(&mut log, &mut radio, 1000, TURN_INCREMENT).unwrap();

        assert_eq!(arm, Some(Duration::from_secs((END - 1000) as u64)));
        assert!(rot.timer_armed());
        assert_eq!(rot.session().buckets[0], 1);

        let again = rot.on_edge_event(&mut log, &mut radio, 1001, TURN_INCREMENT).unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn edge_after_expiry_rotates_once() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 8);
        let mut radio = RecordingRadio::default();
        radio.init("peppeX");

        rot.on_edge_event(&mut log, &mut radio, 1000, 1).unwrap();
        rot.on_edge_event(&mut log, &mut radio, 1899, 1).unwrap();
        rot.on_edge_event(&mut log, &mut radio, 1900, 1).unwrap();
        let before = *rot.session();

        rot.on_edge_event(&mut log, &mut radio, END, 1).unwrap();

        let records = stored(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], before);
        assert_eq!(records[0].buckets[0], 2);
        assert_eq!(records[0].buckets[1], 1);

        let live = rot.session();
        assert_eq!(live.origin, END);
        assert_eq!(live.buckets[0], 1);
        assert_eq!(live.buckets[1..], [0; BUCKET_COUNT - 1]);
        assert_eq!(rot.last_error(), None);
    }

    #[test]
    fn rotation_advertises_end_of_persisted_window() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 8);
        let mut radio = RecordingRadio::default();
        radio.init("peppeX");

        rot.on_idle_edge(&mut log, &mut radio, END + 30).unwrap();

        assert_eq!(rot.manuf_data().last_session_unixtime, END);
        assert_eq!(radio.manuf_data, Some(END.to_le_bytes()));
    }

    #[test]
    fn idle_edge_does_not_count() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 8);
        let mut radio = RecordingRadio::default();

        let arm = rot.on_idle_edge(&mut log, &mut radio, 1200).unwrap();

        assert!(arm.is_some());
        assert_eq!(rot.session().total(), 0);
    }

    #[test]
    fn turn_before_origin_is_dropped_and_recorded() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 8);
        let mut radio = RecordingRadio::default();

        rot.on_edge_event(&mut log, &mut radio, ORIGIN - 10, 1).unwrap();

        assert_eq!(rot.last_error(), Some(TurnError::NotAdded { time: ORIGIN - 10 }));
        assert_eq!(rot.last_error().map(|e| e.code()), Some(1001));
        assert_eq!(rot.info(ORIGIN).dropped, 1);
        assert_eq!(rot.session().total(), 0);
        assert_eq!(record_count(&log), 0);
    }

    #[test]
    fn timer_rotates_idle_session_on_boundary() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 8);
        let mut radio = RecordingRadio::default();
        rot.arm_timer(ORIGIN);

        let next = rot.on_timer_fire(&mut log, &mut radio, END).unwrap();

        assert_eq!(record_count(&log), 1);
        assert_eq!(rot.session().origin, END);
        assert_eq!(next, Duration::from_secs((16 * WIDTH) as u64));
        assert!(rot.timer_armed());
        assert_eq!(rot.info(END).next_timer, END + 16 * WIDTH);
    }

    #[test]
    fn early_timer_rearms_without_rotating() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 8);
        let mut radio = RecordingRadio::default();

        let next = rot.on_timer_fire(&mut log, &mut radio, END - 100).unwrap();

        assert_eq!(record_count(&log), 0);
        assert_eq!(next, Duration::from_secs(100));
    }

    #[test]
    fn past_deadline_clamps_to_one_second() {
        let mut rot = scheduler();
        assert_eq!(rot.arm_timer(END + 5_000), Duration::from_secs(1));
        assert_eq!(rot.info(END + 5_000).next_timer, END + 5_001);
    }

    #[test]
    fn full_log_is_erased_and_rotation_continues() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 2);
        let mut radio = RecordingRadio::default();

        let mut now = END;
        for _ in 0..3 {
            rot.on_timer_fire(&mut log, &mut radio, now).unwrap();
            now += 16 * WIDTH;
        }

        assert_eq!(record_count(&log), 1);
        assert_eq!(rot.session().origin, END + 2 * 16 * WIDTH);
    }

    #[test]
    fn record_that_never_fits_is_fatal() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE / 2);
        let mut radio = RecordingRadio::default();

        let result = rot.on_timer_fire(&mut log, &mut radio, END);

        assert_eq!(result, Err(StorageError::RecordTooLarge { size: RECORD_SIZE }));
        assert_eq!(rot.session().origin, ORIGIN);
    }

    #[test]
    fn debug_record_and_clear() {
        let mut rot = scheduler();
        let mut log = MemoryLog::new(RECORD_SIZE * 4);
        let mut radio = RecordingRadio::default();
        radio.init("peppeX");

        rot.write_debug_record(&mut log, &mut radio, 4242).unwrap();

        assert_eq!(stored(&log), [Session::debug_pattern()]);
        assert_eq!(radio.manuf_data, Some(4242u32.to_le_bytes()));

        rot.clear(&mut log);
        assert_eq!(record_count(&log), 0);
    }

    #[test]
    fn long_location_is_truncated() {
        let collector = Collector::new("/a/very/long/location/name", 0, WIDTH, 0);
        assert_eq!(collector.location().len(), 16);
    }
}

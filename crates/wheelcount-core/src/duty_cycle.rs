//! Radio duty cycle
//!
//! The radio is the main power draw, so it is switched off overnight: from
//! local midnight until the configured enable time it sleeps, unless a client
//! is around. Decisions are re-evaluated on a timer, at most an hour apart.
//!
//! Right after a reset the wall clock may not have been synchronised yet, so
//! a "night" decision cannot be trusted. The boot grace flag keeps the radio
//! on until a client has connected at least once since boot; a client
//! connection is what brings the clock back in sync.

use embassy_time::{Duration, Instant};
use log::{debug, info};

use crate::clock::Clock;
use crate::config::{ONE_DAY, ONE_HOUR};
use crate::radio::{HostName, ManufData, Radio};
use crate::runtime::Repeat;

/// Poll interval while a client is around or the system is settling
pub const SHORT_POLL_SECS: u32 = 60;

/// Uptime before which the radio is never switched off
pub const BOOT_SETTLE: Duration = Duration::from_secs(60);

pub const MIN_POLL_SECS: u32 = 5;
pub const MAX_POLL_SECS: u32 = ONE_HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPhase {
    RadioOff,
    RadioOn,
}

/// Which rule produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// A client is connected or was at the previous tick
    Client,
    /// Uptime is still under [`BOOT_SETTLE`]
    BootSettling,
    /// Past the enable time, on until midnight
    Daytime,
    /// Between midnight and the enable time
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub enable: bool,
    /// Seconds to the next decision, before clamping
    pub delay_secs: u32,
    pub reason: Reason,
}

/// Decide radio on/off from the current observations.
pub fn decide(
    client_seen: bool,
    uptime: Duration,
    local_time: u32,
    enable_boundary: u32,
    boot_grace_active: bool,
) -> Decision {
    let since_midnight = local_time % ONE_DAY;

    if client_seen {
        Decision {
            enable: true,
            delay_secs: SHORT_POLL_SECS,
            reason: Reason::Client,
        }
    } else if uptime < BOOT_SETTLE {
        Decision {
            enable: true,
            delay_secs: SHORT_POLL_SECS,
            reason: Reason::BootSettling,
        }
    } else if since_midnight >= enable_boundary {
        Decision {
            enable: true,
            delay_secs: ONE_DAY - since_midnight,
            reason: Reason::Daytime,
        }
    } else {
        Decision {
            enable: boot_grace_active,
            delay_secs: enable_boundary - since_midnight,
            reason: Reason::Night,
        }
    }
}

/// Day-periodic radio on/off state machine
#[derive(Debug, Clone)]
pub struct DutyCycle {
    phase: RadioPhase,
    last_client_seen: bool,
    boot_grace_active: bool,
    next_poll_at: Instant,
    enable_boundary: u32,
    host_name: HostName,
}

impl DutyCycle {
    /// `enable_boundary` is in seconds after local midnight.
    pub fn new(enable_boundary: u32, host_name: HostName) -> Self {
        Self {
            phase: RadioPhase::RadioOn,
            last_client_seen: false,
            boot_grace_active: true,
            next_poll_at: Instant::from_ticks(0),
            enable_boundary,
            host_name,
        }
    }

    pub fn phase(&self) -> RadioPhase {
        self.phase
    }

    pub fn boot_grace_active(&self) -> bool {
        self.boot_grace_active
    }

    pub fn last_client_seen(&self) -> bool {
        self.last_client_seen
    }

    pub fn next_poll_at(&self) -> Instant {
        self.next_poll_at
    }

    /// Bring the radio up at boot; the machine starts in [`RadioPhase::RadioOn`].
    pub fn start<R>(&mut self, radio: &mut R, manuf_data: &ManufData)
    where
        R: Radio + ?Sized,
    {
        self.phase = RadioPhase::RadioOn;
        if !radio.is_init() {
            radio.init(&self.host_name);
            manuf_data.refresh(radio);
        }
        info!("Radio up as {}", self.host_name);
    }

    /// Evaluate the schedule once and return when to do it again.
    ///
    /// Always returns [`Repeat::After`]: the duty cycle runs for the life of
    /// the process.
    pub fn tick<C, R>(&mut self, clock: &C, radio: &mut R, manuf_data: &ManufData) -> Repeat
    where
        C: Clock + ?Sized,
        R: Radio + ?Sized,
    {
        let now = clock.uptime();
        let client_now = radio.has_client();

        let decision = decide(
            self.last_client_seen || client_now,
            Duration::from_ticks(now.as_ticks()),
            clock.local_unixtime(),
            self.enable_boundary,
            self.boot_grace_active,
        );
        debug!("Radio schedule: {:?}", decision);

        self.last_client_seen = client_now;
        if client_now && self.boot_grace_active {
            self.boot_grace_active = false;
            info!("Client seen since boot, radio may sleep on schedule");
        }

        self.apply(decision.enable, radio, manuf_data);

        let delay = Duration::from_secs(decision.delay_secs.clamp(MIN_POLL_SECS, MAX_POLL_SECS) as u64);
        self.next_poll_at = now + delay;
        Repeat::After(delay)
    }

    /// Switch the radio only on a phase change.
    fn apply<R>(&mut self, enable: bool, radio: &mut R, manuf_data: &ManufData)
    where
        R: Radio + ?Sized,
    {
        match (enable, self.phase) {
            (true, RadioPhase::RadioOff) => {
                radio.init(&self.host_name);
                manuf_data.refresh(radio);
                self.phase = RadioPhase::RadioOn;
                info!("Radio enabled");
            }
            (false, RadioPhase::RadioOn) => {
                radio.term();
                self.phase = RadioPhase::RadioOff;
                info!("Radio disabled until {}s after midnight", self.enable_boundary);
            }
            _ => {}
        }
    }
}

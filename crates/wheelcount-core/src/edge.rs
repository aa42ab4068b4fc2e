//! Interrupt-to-task handoff for wheel sensor edges
//!
//! Storage writes and radio calls are not interrupt safe, so the sensor
//! interrupt only captures the edge and pushes it into a static channel. The
//! task queue drains the channel and does the session work.

use core::cell::Cell;

use critical_section::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Edges buffered between two task-queue ticks
pub const EDGE_CHANNEL_CAPACITY: usize = 8;

/// Sensor pin level after the edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// One captured sensor edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Wall-clock seconds when the edge was seen
    pub time: u32,
    pub level: Level,
}

impl EdgeEvent {
    /// The sensor is polled on the falling edge: one turn per low level.
    pub fn is_turn(&self) -> bool {
        self.level == Level::Low
    }
}

/// Static edge queue shared by the interrupt and the task queue
///
/// ```rust,ignore
/// static EDGES: EdgeQueue = EdgeQueue::new();
///
/// // in the GPIO interrupt
/// EDGES.try_push(EdgeEvent { time: rtc_seconds(), level: Level::Low });
/// ```
pub struct EdgeQueue {
    channel: Channel<CriticalSectionRawMutex, EdgeEvent, EDGE_CHANNEL_CAPACITY>,
    overflow: Mutex<Cell<u32>>,
}

impl Default for EdgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            overflow: Mutex::new(Cell::new(0)),
        }
    }

    /// Interrupt side. Never blocks; a full queue drops the edge and counts it.
    pub fn try_push(&self, event: EdgeEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                critical_section::with(|cs| {
                    let overflow = self.overflow.borrow(cs);
                    overflow.set(overflow.get().wrapping_add(1));
                });
                false
            }
        }
    }

    /// Task side
    pub fn try_pop(&self) -> Option<EdgeEvent> {
        self.channel.try_receive().ok()
    }

    /// Edges dropped because the queue was full
    pub fn overflowed(&self) -> u32 {
        critical_section::with(|cs| self.overflow.borrow(cs).get())
    }
}

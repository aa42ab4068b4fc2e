//! Hardware-independent core library for wheelcount
//!
//! This crate contains the platform-agnostic logic of the wheel-rotation
//! counter: the 16-bucket session accumulator, the rotation scheduler that
//! flushes sessions to the append-only log, the cooperative log scan used by
//! the `turndata disp` command, and the radio duty-cycle state machine.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests). Every
//! platform collaborator (flash log, radio, clock, serial terminal) is reached
//! through a trait.

#![no_std]

extern crate alloc;

pub mod app;
pub mod clock;
pub mod command;
pub mod config;
pub mod duty_cycle;
pub mod edge;
pub mod error;
pub mod radio;
pub mod rotation;
pub mod runtime;
pub mod scan;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;

pub use app::Wheelcount;
pub use config::Config;
pub use error::{CommandError, ConfigError, StorageError, TurnError};
pub use session::{BUCKET_COUNT, Session};

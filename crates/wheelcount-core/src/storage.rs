//! Append-only session log
//!
//! Sessions are persisted to a sequential, fixed-record log. The log is never
//! rewritten in place: when it runs out of space the whole log is erased and
//! the write is retried once. Losing history this way is the accepted policy.

use core::ops::ControlFlow;

use alloc::vec::Vec;
use log::{info, warn};

use crate::error::StorageError;
use crate::session::{RECORD_SIZE, Session};

/// Platform append-only storage
///
/// A write is framed by [`begin_write`](Self::begin_write) and
/// [`end_write`](Self::end_write). Storage order is chronological order.
pub trait AppendOnlyLog {
    /// Reserve `size` bytes for the next write. Returns false when the
    /// remaining capacity is too small.
    fn begin_write(&mut self, size: usize) -> bool;

    /// Append bytes to the write started by `begin_write`.
    fn write(&mut self, data: &[u8]);

    /// Commit the current write.
    fn end_write(&mut self);

    /// Drop every stored record. Not recoverable.
    fn erase(&mut self);

    /// Visit each contiguous stored block in storage order. A block may hold
    /// several records back to back. Return `ControlFlow::Break` to stop.
    fn for_each(&self, f: &mut dyn FnMut(&[u8]) -> ControlFlow<()>);
}

/// How a record made it into the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// Written into free space
    Written,
    /// The log was full, erased, then written
    AfterErase,
}

/// Append one session record to `log`, erasing the log if it is full.
///
/// A second refusal after the erase means the record can never fit and is
/// reported as [`StorageError::RecordTooLarge`]; nothing is written in that
/// case.
pub fn append_session<L>(log: &mut L, location: &str, session: &Session) -> Result<Appended, StorageError>
where
    L: AppendOnlyLog + ?Sized,
{
    let bytes = session.to_bytes();
    let mut outcome = Appended::Written;

    if !log.begin_write(RECORD_SIZE) {
        log.erase();
        warn!("Session file {} erased", location);
        if !log.begin_write(RECORD_SIZE) {
            return Err(StorageError::RecordTooLarge { size: RECORD_SIZE });
        }
        outcome = Appended::AfterErase;
    }

    log.write(&bytes);
    log.end_write();
    info!("Session file {} written", location);

    Ok(outcome)
}

/// Visit every complete session record in storage order.
///
/// Trailing bytes that do not form a whole record are ignored.
pub fn for_each_record<L, F>(log: &L, mut f: F)
where
    L: AppendOnlyLog + ?Sized,
    F: FnMut(Session) -> ControlFlow<()>,
{
    log.for_each(&mut |block: &[u8]| {
        for chunk in block.chunks_exact(RECORD_SIZE) {
            let mut record = [0u8; RECORD_SIZE];
            record.copy_from_slice(chunk);
            f(Session::from_bytes(&record))?;
        }
        ControlFlow::Continue(())
    });
}

/// Number of complete records currently stored.
pub fn record_count<L: AppendOnlyLog + ?Sized>(log: &L) -> usize {
    let mut count = 0;
    for_each_record(log, |_| {
        count += 1;
        ControlFlow::Continue(())
    });
    count
}

/// RAM-backed [`AppendOnlyLog`] for the simulator and tests
///
/// Consecutive writes are packed into blocks of at most `block_size` bytes,
/// the way a flash sector holds several records. A write that was begun but
/// never ended is discarded, as after a power loss.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    capacity: usize,
    block_size: usize,
    used: usize,
    blocks: Vec<Vec<u8>>,
    pending: Option<Vec<u8>>,
}

impl MemoryLog {
    /// Create an empty log holding at most `capacity` bytes in one block.
    pub fn new(capacity: usize) -> Self {
        Self::with_block_size(capacity, capacity)
    }

    /// Create an empty log whose blocks hold at most `block_size` bytes.
    pub fn with_block_size(capacity: usize, block_size: usize) -> Self {
        Self {
            capacity,
            block_size: block_size.max(1),
            used: 0,
            blocks: Vec::new(),
            pending: None,
        }
    }

    /// Bytes committed so far
    pub fn used(&self) -> usize {
        self.used
    }

    /// Number of stored blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl AppendOnlyLog for MemoryLog {
    fn begin_write(&mut self, size: usize) -> bool {
        if self.used + size > self.capacity {
            return false;
        }
        self.pending = Some(Vec::with_capacity(size));
        true
    }

    fn write(&mut self, data: &[u8]) {
        if let Some(pending) = self.pending.as_mut() {
            pending.extend_from_slice(data);
        }
    }

    fn end_write(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        self.used += pending.len();
        match self.blocks.last_mut() {
            Some(last) if last.len() + pending.len() <= self.block_size => {
                last.extend_from_slice(&pending);
            }
            _ => self.blocks.push(pending),
        }
    }

    fn erase(&mut self) {
        self.blocks.clear();
        self.pending = None;
        self.used = 0;
    }

    fn for_each(&self, f: &mut dyn FnMut(&[u8]) -> ControlFlow<()>) {
        for block in &self.blocks {
            if f(block).is_break() {
                return;
            }
        }
    }
}

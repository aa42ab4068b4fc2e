//! Time-bucketed turn session
//!
//! A session is a fixed window of [`BUCKET_COUNT`] buckets, each
//! `bucket_width` seconds wide, anchored at `origin`. Turns are added to the
//! bucket covering their timestamp. Once the window has passed the session is
//! flushed to the log and re-anchored.
//!
//! Persisted record format (little-endian, 44 bytes):
//! - origin: 4 bytes (u32)
//! - id: 4 bytes (u32)
//! - bucket_width: 4 bytes (u32)
//! - buckets: 32 bytes (16 × u16)

use core::fmt::Display;

/// Number of buckets in a session
pub const BUCKET_COUNT: usize = 16;

/// Size of one persisted session record in bytes
pub const RECORD_SIZE: usize = 12 + BUCKET_COUNT * 2;

/// Default bucket width: 15 minutes
pub const DEFAULT_BUCKET_WIDTH: u32 = 15 * 60;

/// One 16-bucket accumulation window
///
/// Counters wrap on overflow, the same as the 16-bit counters the record
/// format stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Start of bucket 0 (seconds since epoch)
    pub origin: u32,
    /// Identifier of the collector that produced this session
    pub id: u32,
    /// Seconds per bucket
    pub bucket_width: u32,
    /// Turn counters, one per bucket
    pub buckets: [u16; BUCKET_COUNT],
}

impl Session {
    /// Create a zeroed session anchored at `origin`.
    pub const fn new(origin: u32, id: u32, bucket_width: u32) -> Self {
        Self {
            origin,
            id,
            bucket_width,
            buckets: [0; BUCKET_COUNT],
        }
    }

    /// Fixed pattern written by `turndata writedbg`.
    ///
    /// Origin 1, id `0xaabbccdd`, 1 second buckets and bucket `i` holding `i`,
    /// so a reader can spot byte-order or offset mistakes at a glance.
    pub fn debug_pattern() -> Self {
        let mut session = Self::new(1, 0xaabb_ccdd, 1);
        for (i, bucket) in session.buckets.iter_mut().enumerate() {
            *bucket = i as u16;
        }
        session
    }

    fn bucket_start(&self, index: usize) -> u64 {
        self.origin as u64 + index as u64 * self.bucket_width as u64
    }

    fn span_end(&self) -> u64 {
        self.bucket_start(BUCKET_COUNT)
    }

    /// End of the session window (`origin + 16 × width`).
    pub fn end_time(&self) -> u32 {
        self.span_end().min(u32::MAX as u64) as u32
    }

    /// Index of the bucket covering `time`, if the session covers it at all.
    pub fn bucket_index_for(&self, time: u32) -> Option<usize> {
        let time = time as u64;
        (0..BUCKET_COUNT).find(|&i| time >= self.bucket_start(i) && time < self.bucket_start(i + 1))
    }

    /// Add `value` to the bucket covering `time`.
    ///
    /// Returns false when no bucket covers `time`; the session is untouched.
    pub fn add_value(&mut self, time: u32, value: u16) -> bool {
        match self.bucket_index_for(time) {
            Some(index) => {
                self.buckets[index] = self.buckets[index].wrapping_add(value);
                true
            }
            None => false,
        }
    }

    /// Whether the window has fully elapsed at `now`.
    pub fn is_expired(&self, now: u32) -> bool {
        now as u64 >= self.span_end()
    }

    /// Re-anchor the session at `time` with all buckets cleared.
    pub fn reinit(&mut self, time: u32) {
        self.origin = time;
        self.buckets = [0; BUCKET_COUNT];
    }

    /// End boundary of the bucket containing `now`, or the session end when
    /// `now` lies outside the window.
    pub fn end_of_current_bucket(&self, now: u32) -> u32 {
        match self.bucket_index_for(now) {
            Some(index) => self.bucket_start(index + 1).min(u32::MAX as u64) as u32,
            None => self.end_time(),
        }
    }

    /// Sum of all buckets.
    pub fn total(&self) -> u32 {
        self.buckets.iter().map(|&v| v as u32).sum()
    }

    /// Converts the session to its persisted record.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];

        bytes[0..4].copy_from_slice(&self.origin.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.id.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.bucket_width.to_le_bytes());

        for (i, &value) in self.buckets.iter().enumerate() {
            let offset = 12 + i * 2;
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }

        bytes
    }

    /// Creates a session from a persisted record.
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let word = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        let mut buckets = [0u16; BUCKET_COUNT];
        for (i, bucket) in buckets.iter_mut().enumerate() {
            let offset = 12 + i * 2;
            *bucket = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        }

        Self {
            origin: word(0),
            id: word(4),
            bucket_width: word(8),
            buckets,
        }
    }
}

/// Line format read back by the upload client: `id:<id> t:<origin> p:<width>`
/// followed by the sixteen bucket values.
impl Display for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "id:{} t:{} p:{}", self.id, self.origin, self.bucket_width)?;
        for value in &self.buckets {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

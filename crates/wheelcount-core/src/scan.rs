//! Cooperative, record-at-a-time scan of the session log
//!
//! The log can hold hundreds of sessions and printing them all in one go
//! would hold the task queue for too long. A scan instead advances one
//! qualifying record per tick and asks to be run again, letting timers and
//! turn events interleave.
//!
//! The cursor is a plain value (index of the next qualifying record plus the
//! filter), so no iterator state lives in the log and a new scan always
//! starts from record zero. Each step re-walks the log from the start, which
//! keeps memory use flat regardless of log size. Records appended between
//! steps show up at the end of the scan; an erase between steps ends it early.

use core::fmt::Write;
use core::ops::ControlFlow;

use embassy_time::Duration;

use crate::command::Terminal;
use crate::runtime::Repeat;
use crate::session::Session;
use crate::storage::{AppendOnlyLog, for_each_record};

/// How long to wait for the terminal before trying again
pub const TERMINAL_RETRY: Duration = Duration::from_millis(100);

/// Position of a scan: the next qualifying record and the filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursor {
    /// Number of qualifying records already returned
    pub index: u32,
    /// Records with `origin < min_time` are skipped
    pub min_time: u32,
}

impl ScanCursor {
    pub const fn new(min_time: u32) -> Self {
        Self { index: 0, min_time }
    }
}

/// Advance `cursor` by one qualifying record.
///
/// Returns the record and the advanced cursor, or `None` and the unchanged
/// cursor when the log holds no further qualifying record.
pub fn scan_step<L>(log: &L, cursor: ScanCursor) -> (Option<Session>, ScanCursor)
where
    L: AppendOnlyLog + ?Sized,
{
    let mut qualifying = 0u32;
    let mut found = None;

    for_each_record(log, |session| {
        if session.origin < cursor.min_time {
            return ControlFlow::Continue(());
        }
        if qualifying == cursor.index {
            found = Some(session);
            return ControlFlow::Break(());
        }
        qualifying += 1;
        ControlFlow::Continue(())
    });

    match found {
        Some(session) => (
            Some(session),
            ScanCursor {
                index: cursor.index + 1,
                ..cursor
            },
        ),
        None => (None, cursor),
    }
}

/// Totals reported when a scan finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Qualifying records
    pub records: u32,
    /// Sum of every bucket of every qualifying record
    pub turns: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProgress {
    Record(Session),
    Finished(ScanSummary),
}

/// Scan driver behind `turndata disp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogScan {
    cursor: ScanCursor,
    turns: u32,
}

impl LogScan {
    pub const fn new(min_time: u32) -> Self {
        Self {
            cursor: ScanCursor::new(min_time),
            turns: 0,
        }
    }

    pub fn cursor(&self) -> ScanCursor {
        self.cursor
    }

    /// Take one step without printing anything.
    pub fn step<L>(&mut self, log: &L) -> ScanProgress
    where
        L: AppendOnlyLog + ?Sized,
    {
        let (record, cursor) = scan_step(log, self.cursor);
        self.cursor = cursor;

        match record {
            Some(session) => {
                self.turns = self.turns.wrapping_add(session.total());
                ScanProgress::Record(session)
            }
            None => ScanProgress::Finished(ScanSummary {
                records: self.cursor.index,
                turns: self.turns,
            }),
        }
    }

    /// One scheduler tick: print the next record, or the summary.
    ///
    /// Waits for the terminal when it is not ready. Returns
    /// [`Repeat::Now`] while records remain.
    pub fn tick<L, T>(&mut self, log: &L, terminal: &mut T) -> Repeat
    where
        L: AppendOnlyLog + ?Sized,
        T: Terminal + ?Sized,
    {
        if !terminal.is_ready() {
            return Repeat::After(TERMINAL_RETRY);
        }

        if self.cursor.index == 0 {
            let _ = writeln!(terminal, "Data sessions:");
        }

        match self.step(log) {
            ScanProgress::Record(session) => {
                let _ = writeln!(terminal, "{}", session);
                Repeat::Now
            }
            ScanProgress::Finished(summary) => {
                if summary.records == 0 {
                    let _ = writeln!(terminal, "No data sessions");
                }
                let _ = writeln!(terminal, "Total readings:{}", summary.records);
                let _ = writeln!(terminal, "Total turns:{}", summary.turns);
                Repeat::Done
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RECORD_SIZE;
    use crate::storage::{MemoryLog, append_session};
    use crate::testing::BufferTerminal;

    fn log_with(origins: &[u32]) -> MemoryLog {
        let mut log = MemoryLog::with_block_size(RECORD_SIZE * 32, RECORD_SIZE * 2);
        for &origin in origins {
            let mut session = Session::new(origin, 1, 900);
            session.buckets[0] = 2;
            append_session(&mut log, "/turndata", &session).unwrap();
        }
        log
    }

    fn drain(scan: &mut LogScan, log: &MemoryLog, terminal: &mut BufferTerminal) -> u32 {
        let mut ticks = 0;
        loop {
            ticks += 1;
            if scan.tick(log, terminal) == Repeat::Done {
                return ticks;
            }
        }
    }

    #[test]
    fn step_returns_one_record_at_a_time() {
        let log = log_with(&[100, 200, 300]);
        let cursor = ScanCursor::new(0);

        let (first, cursor) = scan_step(&log, cursor);
        assert_eq!(first.map(|s| s.origin), Some(100));
        let (second, cursor) = scan_step(&log, cursor);
        assert_eq!(second.map(|s| s.origin), Some(200));
        let (third, cursor) = scan_step(&log, cursor);
        assert_eq!(third.map(|s| s.origin), Some(300));

        let (end, after) = scan_step(&log, cursor);
        assert_eq!(end, None);
        assert_eq!(after, cursor);
    }

    #[test]
    fn step_skips_records_before_min_time() {
        let log = log_with(&[100, 200, 300, 400]);
        let cursor = ScanCursor::new(250);

        let (first, cursor) = scan_step(&log, cursor);
        assert_eq!(first.map(|s| s.origin), Some(300));
        let (second, cursor) = scan_step(&log, cursor);
        assert_eq!(second.map(|s| s.origin), Some(400));
        assert_eq!(scan_step(&log, cursor).0, None);
    }

    #[test]
    fn new_scan_starts_from_record_zero() {
        let log = log_with(&[100, 200]);
        let mut scan = LogScan::new(0);
        assert!(matches!(scan.step(&log), ScanProgress::Record(s) if s.origin == 100));

        let mut restarted = LogScan::new(0);
        assert!(matches!(restarted.step(&log), ScanProgress::Record(s) if s.origin == 100));
    }

    #[test]
    fn disp_zero_prints_all_in_order() {
        let log = log_with(&[100, 200, 300]);
        let mut terminal = BufferTerminal::default();
        let mut scan = LogScan::new(0);

        let ticks = drain(&mut scan, &log, &mut terminal);

        assert_eq!(ticks, 4);
        let lines = terminal.lines();
        assert_eq!(lines[0], "Data sessions:");
        assert!(lines[1].starts_with("id:1 t:100 "));
        assert!(lines[2].starts_with("id:1 t:200 "));
        assert!(lines[3].starts_with("id:1 t:300 "));
        assert_eq!(lines[4], "Total readings:3");
        assert_eq!(lines[5], "Total turns:6");
    }

    #[test]
    fn disp_past_every_origin_reports_zero() {
        let log = log_with(&[100, 200, 300]);
        let mut terminal = BufferTerminal::default();
        let mut scan = LogScan::new(301);

        drain(&mut scan, &log, &mut terminal);

        assert_eq!(
            terminal.lines(),
            ["Data sessions:", "No data sessions", "Total readings:0", "Total turns:0"]
        );
    }

    #[test]
    fn summary_counts_turns() {
        let log = log_with(&[100, 200]);
        let mut scan = LogScan::new(0);
        scan.step(&log);
        scan.step(&log);
        assert_eq!(
            scan.step(&log),
            ScanProgress::Finished(ScanSummary { records: 2, turns: 4 })
        );
    }

    #[test]
    fn scan_waits_for_terminal() {
        let log = log_with(&[100]);
        let mut terminal = BufferTerminal {
            ready: false,
            ..BufferTerminal::default()
        };
        let mut scan = LogScan::new(0);

        assert_eq!(scan.tick(&log, &mut terminal), Repeat::After(TERMINAL_RETRY));
        assert!(terminal.out.is_empty());
        assert_eq!(scan.cursor().index, 0);
    }
}

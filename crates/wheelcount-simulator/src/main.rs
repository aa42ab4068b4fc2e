//! Desktop simulator for the wheelcount turn counter.
//!
//! Runs wheelcount-core against a RAM log, a logging radio and the host
//! clock. A background thread spins a mock wheel, and lines typed on stdin
//! are run as terminal commands.
//!
//! # Commands
//!
//! | Input                  | Action                               |
//! |------------------------|--------------------------------------|
//! | `turndata <sub> ...`   | Core command group (`disp`, `info`…) |
//! | `client on` / `off`    | Pretend a radio client connected     |
//! | `quit`                 | Exit                                 |
//!
//! Set `RUST_LOG=debug` to see timer and turn traces.

use std::io::{BufRead, Write as _};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{error, info};

use wheelcount_core::clock::Clock;
use wheelcount_core::command::Terminal;
use wheelcount_core::edge::{EdgeEvent, EdgeQueue, Level};
use wheelcount_core::radio::Radio;
use wheelcount_core::rotation::DEFAULT_LOCATION;
use wheelcount_core::session::RECORD_SIZE;
use wheelcount_core::storage::MemoryLog;
use wheelcount_core::{Config, Wheelcount};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Bucket width used by the simulator so rotations happen within minutes.
const SIM_BUCKET_WIDTH_SECS: u32 = 5;

/// Local time zone offset applied to the host wall clock.
const UTC_OFFSET_SECS: i32 = 0;

/// Flash layout of the session log: eight 4 KiB sectors.
const LOG_SECTORS: usize = 8;
const LOG_SECTOR_SIZE: usize = 4096;

/// Longest the main loop sleeps before checking stdin again.
const MAX_IDLE: Duration = Duration::from_millis(50);

/// Time between mock wheel turns while spinning.
const TURN_PERIOD: Duration = Duration::from_millis(700);

/// Turns per spinning burst, followed by an idle pause.
const TURNS_PER_BURST: u32 = 20;
const IDLE_PAUSE: Duration = Duration::from_secs(30);

static EDGES: EdgeQueue = EdgeQueue::new();

// ---------------------------------------------------------------------------
// Host collaborators
// ---------------------------------------------------------------------------

/// Host clock: monotonic uptime plus system wall time.
struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    fn new() -> Self {
        Self { boot: Instant::now() }
    }
}

fn wall_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

impl Clock for SystemClock {
    fn uptime(&self) -> embassy_time::Instant {
        embassy_time::Instant::from_micros(self.boot.elapsed().as_micros() as u64)
    }

    fn unixtime(&self) -> u32 {
        wall_secs()
    }

    fn local_unixtime(&self) -> u32 {
        (wall_secs() as i64 + UTC_OFFSET_SECS as i64) as u32
    }
}

/// Radio that logs every call instead of advertising.
#[derive(Default)]
struct LoggingRadio {
    up: bool,
    client: bool,
}

impl Radio for LoggingRadio {
    fn is_init(&self) -> bool {
        self.up
    }

    fn init(&mut self, host_name: &str) {
        info!("radio: advertising as {}", host_name);
        self.up = true;
    }

    fn term(&mut self) {
        info!("radio: off");
        self.up = false;
        self.client = false;
    }

    fn has_client(&self) -> bool {
        self.up && self.client
    }

    fn set_adv_manuf_data(&mut self, data: &[u8]) {
        info!("radio: manufacturer data {:02x?}", data);
    }
}

struct StdoutTerminal;

impl core::fmt::Write for StdoutTerminal {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let mut out = std::io::stdout().lock();
        out.write_all(s.as_bytes()).map_err(|_| core::fmt::Error)?;
        out.flush().map_err(|_| core::fmt::Error)
    }
}

impl Terminal for StdoutTerminal {
    fn is_ready(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Background threads
// ---------------------------------------------------------------------------

/// Spins the mock wheel in bursts, pushing both edges of every turn.
fn spawn_mock_wheel() {
    std::thread::spawn(|| {
        loop {
            for _ in 0..TURNS_PER_BURST {
                EDGES.try_push(EdgeEvent {
                    time: wall_secs(),
                    level: Level::Low,
                });
                std::thread::sleep(TURN_PERIOD / 2);
                EDGES.try_push(EdgeEvent {
                    time: wall_secs(),
                    level: Level::High,
                });
                std::thread::sleep(TURN_PERIOD / 2);
            }
            std::thread::sleep(IDLE_PAUSE);
        }
    });
}

/// Forwards stdin lines to the main loop.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting wheelcount simulator");

    let config = Config {
        bucket_width_secs: SIM_BUCKET_WIDTH_SECS,
        debug_level: 1,
        ..Config::default()
    };

    let log = MemoryLog::with_block_size(LOG_SECTORS * LOG_SECTOR_SIZE, LOG_SECTOR_SIZE);
    info!(
        "Session log: {} sectors, room for {} records",
        LOG_SECTORS,
        LOG_SECTORS * LOG_SECTOR_SIZE / RECORD_SIZE
    );

    let mut app = match Wheelcount::new(
        config,
        DEFAULT_LOCATION,
        log,
        LoggingRadio::default(),
        SystemClock::new(),
        StdoutTerminal,
        &EDGES,
    ) {
        Ok(app) => app,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    app.boot();

    spawn_mock_wheel();
    let commands = spawn_stdin_reader();
    info!("Type `turndata disp`, `turndata info`, `client on` or `quit`");

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    'running: loop {
        // --- Terminal input -------------------------------------------------
        loop {
            match commands.try_recv() {
                Ok(line) => {
                    let line = line.trim();
                    match line {
                        "" => {}
                        "quit" => break 'running,
                        "client on" => app.radio_mut().client = true,
                        "client off" => app.radio_mut().client = false,
                        _ => {
                            if let Err(e) = app.execute_line(line) {
                                error!("Fatal storage error: {}", e);
                                std::process::exit(1);
                            }
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'running,
            }
        }

        // --- Core tasks -----------------------------------------------------
        if let Err(e) = app.poll() {
            error!("Fatal storage error: {}", e);
            std::process::exit(1);
        }

        // --- Pacing ---------------------------------------------------------
        let now = app.clock().uptime();
        let idle = app
            .next_due()
            .map(|due| Duration::from_micros(due.saturating_duration_since(now).as_micros()))
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE);
        std::thread::sleep(idle);
    }

    info!("Simulator exiting");
}

//! Application context
//!
//! [`Wheelcount`] owns every collaborator and the task queue. The platform
//! creates it once, calls [`Wheelcount::boot`], then calls
//! [`Wheelcount::poll`] whenever an edge arrived or the next task is due.

use core::fmt::Write;

use embassy_time::Instant;
use log::{info, warn};

use crate::clock::Clock;
use crate::command::{Terminal, TurnDataCommand};
use crate::config::Config;
use crate::duty_cycle::DutyCycle;
use crate::edge::EdgeQueue;
use crate::error::{CommandError, ConfigError, StorageError};
use crate::radio::{Radio, host_name};
use crate::rotation::{Collector, RotationScheduler, TURN_INCREMENT};
use crate::runtime::{Repeat, Task, TaskQueue};
use crate::scan::{LogScan, TERMINAL_RETRY};
use crate::storage::AppendOnlyLog;

pub struct Wheelcount<L, R, C, T>
where
    L: AppendOnlyLog,
    R: Radio,
    C: Clock,
    T: Terminal,
{
    config: Config,
    log: L,
    radio: R,
    clock: C,
    terminal: T,
    edges: &'static EdgeQueue,
    edges_dropped: u32,
    rotation: RotationScheduler,
    duty_cycle: DutyCycle,
    queue: TaskQueue<Task>,
}

impl<L, R, C, T> Wheelcount<L, R, C, T>
where
    L: AppendOnlyLog,
    R: Radio,
    C: Clock,
    T: Terminal,
{
    /// Build the context. The first session starts at the clock's current
    /// wall time.
    ///
    /// The config is validated first: a zero bucket width would expire every
    /// session immediately and rotate on every timer tick.
    pub fn new(
        config: Config,
        location: &str,
        log: L,
        radio: R,
        clock: C,
        terminal: T,
        edges: &'static EdgeQueue,
    ) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        config.log_summary();

        let collector = Collector::new(location, config.collector_id, config.bucket_width_secs, clock.unixtime());
        let rotation = RotationScheduler::new(collector, config.debug_level);
        let duty_cycle = DutyCycle::new(config.radio_enable_time, host_name(config.module_suffix));

        Ok(Self {
            config,
            log,
            radio,
            clock,
            terminal,
            edges,
            edges_dropped: 0,
            rotation,
            duty_cycle,
            queue: TaskQueue::new(),
        })
    }

    /// Bring the radio up and queue the recurring tasks.
    pub fn boot(&mut self) {
        self.duty_cycle.start(&mut self.radio, self.rotation.manuf_data());
        self.queue.push(Task::DutyCycle);

        let delay = self.rotation.arm_timer(self.clock.unixtime());
        self.queue.push_after(self.clock.uptime(), delay, Task::RotationTimer);

        info!("Wheelcount booted, {} tasks queued", self.queue.len());
    }

    /// Handle pending edges and run every task that is due.
    ///
    /// Edges are drained again before each task, so a long scan never holds
    /// back turn counting. Only a storage misconfiguration is returned.
    pub fn poll(&mut self) -> Result<(), StorageError> {
        loop {
            self.drain_edges()?;

            let Some(mut task) = self.queue.pop_due(self.clock.uptime()) else {
                return Ok(());
            };
            let repeat = self.run(&mut task)?;
            self.queue.reschedule(self.clock.uptime(), repeat, task);
        }
    }

    fn drain_edges(&mut self) -> Result<(), StorageError> {
        while let Some(edge) = self.edges.try_pop() {
            let arm = if edge.is_turn() {
                self.rotation
                    .on_edge_event(&mut self.log, &mut self.radio, edge.time, TURN_INCREMENT)?
            } else {
                self.rotation.on_idle_edge(&mut self.log, &mut self.radio, edge.time)?
            };

            if let Some(delay) = arm {
                self.queue.push_after(self.clock.uptime(), delay, Task::RotationTimer);
            }
        }

        let dropped = self.edges.overflowed();
        if dropped != self.edges_dropped {
            warn!("Edge queue overflowed, {} edges lost", dropped.wrapping_sub(self.edges_dropped));
            self.edges_dropped = dropped;
        }
        Ok(())
    }

    fn run(&mut self, task: &mut Task) -> Result<Repeat, StorageError> {
        match task {
            Task::RotationTimer => {
                let delay = self
                    .rotation
                    .on_timer_fire(&mut self.log, &mut self.radio, self.clock.unixtime())?;
                Ok(Repeat::After(delay))
            }
            Task::DutyCycle => Ok(self
                .duty_cycle
                .tick(&self.clock, &mut self.radio, self.rotation.manuf_data())),
            Task::Scan(scan) => Ok(scan.tick(&self.log, &mut self.terminal)),
            Task::Active => Ok(self.print_active()),
            Task::Info => Ok(self.print_info()),
        }
    }

    fn print_active(&mut self) -> Repeat {
        if !self.terminal.is_ready() {
            return Repeat::After(TERMINAL_RETRY);
        }

        let _ = writeln!(self.terminal, "{}", self.rotation.session());
        Repeat::Done
    }

    fn print_info(&mut self) -> Repeat {
        if !self.terminal.is_ready() {
            return Repeat::After(TERMINAL_RETRY);
        }

        let info = self.rotation.info(self.clock.unixtime());
        let t = &mut self.terminal;
        let _ = writeln!(t, "Next timer is set:{} (Unixtime:{})", info.timer_armed as u8, info.next_timer);
        let _ = writeln!(t, "Set at Unixtime:{}", info.armed_at);
        let _ = writeln!(t, "Session expired:{}", info.expired as u8);
        let _ = writeln!(t, "Last error:{}", info.last_error.map_or(0, |e| e.code()));
        let _ = writeln!(t, "Dropped turns:{}", info.dropped);
        Repeat::Done
    }

    /// Parse and run one terminal line. Parse errors are reported on the
    /// terminal and returned.
    pub fn execute_line(&mut self, line: &str) -> Result<Result<(), CommandError>, StorageError> {
        match TurnDataCommand::parse(line) {
            Ok(command) => {
                self.execute(command)?;
                Ok(Ok(()))
            }
            Err(err) => {
                let _ = writeln!(self.terminal, "{}", err);
                Ok(Err(err))
            }
        }
    }

    /// Run one `turndata` command.
    ///
    /// `disp`, `active` and `info` only queue work; call [`Self::poll`] to
    /// produce their output.
    pub fn execute(&mut self, command: TurnDataCommand) -> Result<(), StorageError> {
        let now = self.clock.unixtime();

        match command {
            TurnDataCommand::Disp { min_time } => {
                if self.queue.iter().any(|task| matches!(task, Task::Scan(_))) {
                    let _ = writeln!(self.terminal, "Scan already running");
                } else {
                    self.queue.push(Task::Scan(LogScan::new(min_time)));
                }
            }
            TurnDataCommand::Active => self.queue.push(Task::Active),
            TurnDataCommand::Clear => {
                self.rotation.clear(&mut self.log);
                let _ = writeln!(self.terminal, "cleared");
            }
            TurnDataCommand::DebugTrigger => {
                if let Some(delay) =
                    self.rotation
                        .on_edge_event(&mut self.log, &mut self.radio, now, TURN_INCREMENT)?
                {
                    self.queue.push_after(self.clock.uptime(), delay, Task::RotationTimer);
                }
                let _ = writeln!(self.terminal, "Data trigger");
            }
            TurnDataCommand::WriteDbg => {
                self.rotation.write_debug_record(&mut self.log, &mut self.radio, now)?;
                let _ = writeln!(self.terminal, "Debug Data written");
            }
            TurnDataCommand::Info => self.queue.push(Task::Info),
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    pub fn rotation(&self) -> &RotationScheduler {
        &self.rotation
    }

    pub fn duty_cycle(&self) -> &DutyCycle {
        &self.duty_cycle
    }

    pub fn queue(&self) -> &TaskQueue<Task> {
        &self.queue
    }

    /// Earliest deadline among delayed tasks; the platform may sleep until
    /// then unless an edge arrives.
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.next_due()
    }
}

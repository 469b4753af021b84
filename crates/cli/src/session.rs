//! A running system plus its output and the queue of pending input ops.
//!
//! Shared by `simulate` (fake clock) and `run` (wall clock). Periodic work
//! is registered on a [`Scheduler`] over the session.

use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;

use parkgate_control::{JsonStreamSink, ParkingSystem, Scheduler};
use parkgate_core::{Config, Millis, ParkgateError, ParkgateResult, TimingConfig};
use parkgate_hal::{Platform, SimPlatform};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::script::{Action, Op};

pub type BoxedSink = JsonStreamSink<Box<dyn Write + Send>>;

pub struct Session {
    system: ParkingSystem<SimPlatform>,
    sink: Option<BoxedSink>,
    /// Sorted by time; equal times keep insertion order.
    pending: Vec<(Millis, Op)>,
    events_seen: usize,
    io_error: Option<io::Error>,
}

impl Session {
    pub fn new(system: ParkingSystem<SimPlatform>, sink: Option<BoxedSink>) -> Self {
        Self {
            system,
            sink,
            pending: Vec::new(),
            events_seen: 0,
            io_error: None,
        }
    }

    /// Queues ops for their due time.
    pub fn schedule(&mut self, ops: impl IntoIterator<Item = (Millis, Op)>) {
        self.pending.extend(ops);
        self.pending.sort_by_key(|(at, _)| *at);
    }

    /// Applies every queued op due at or before `now`. A failing op is
    /// logged and does not stop the rest of the batch; the first failure is
    /// returned once all of them have run.
    pub fn apply_due(&mut self, now: Millis) -> ParkgateResult<()> {
        let due = self.pending.partition_point(|(at, _)| *at <= now);
        let ops: Vec<Op> = self.pending.drain(..due).map(|(_, op)| op).collect();
        let mut first_err = None;
        for op in ops {
            if let Err(e) = self.apply(op, now) {
                tracing::warn!(?op, error = %e, "op failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn apply(&mut self, op: Op, now: Millis) -> ParkgateResult<()> {
        tracing::debug!(?op, now, "applying op");
        match op {
            Op::Drive(ch, level) => self.system.platform_mut().drive(ch, level),
            Op::Float(ch) => self.system.platform_mut().release(ch),
            Op::Reset => {
                if !self.system.reset(now) {
                    tracing::warn!("reset ignored: controller not in FAULT");
                }
            }
            Op::EmergencyStop => self.system.emergency_stop(now),
            Op::ReleaseSlot(slot) => {
                self.system.release_slot(slot, now)?;
            }
            Op::ReleaseAll => {
                self.system.release_all(now);
            }
        }
        self.forward_events();
        Ok(())
    }

    /// Main control task: one system tick, then hand its events to the sink.
    pub fn control_tick(&mut self, now: Millis) {
        self.system.tick(now);
        self.forward_events();
    }

    /// Periodic status: an NDJSON row when sinking, otherwise the boxed
    /// report on stderr.
    pub fn report_status(&mut self, now: Millis) {
        let status = self.system.status(now);
        match self.sink.as_mut() {
            Some(sink) => {
                if let Err(e) = sink.write_status(now, &status).and_then(|_| sink.flush()) {
                    self.io_error.get_or_insert(e);
                }
            }
            None => eprint!("{}", status.render()),
        }
    }

    pub fn system(&self) -> &ParkingSystem<SimPlatform> {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut ParkingSystem<SimPlatform> {
        &mut self.system
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    /// Surfaces the first sink failure since the last call.
    pub fn take_error(&mut self) -> ParkgateResult<()> {
        match self.io_error.take() {
            Some(e) => Err(ParkgateError::Io(e)),
            None => Ok(()),
        }
    }

    /// Flushes the sink; returns the system and how many rows were written.
    pub fn finish(self) -> ParkgateResult<(ParkingSystem<SimPlatform>, usize)> {
        if let Some(e) = self.io_error {
            return Err(e.into());
        }
        let rows = match self.sink {
            Some(sink) => sink.finish()?,
            None => 0,
        };
        Ok((self.system, rows))
    }

    fn forward_events(&mut self) {
        let events = self.system.drain_events();
        match self.sink.as_mut() {
            Some(sink) => match sink.write_events(events) {
                Ok(n) => self.events_seen += n,
                Err(e) => {
                    self.io_error.get_or_insert(e);
                }
            },
            None => self.events_seen += events.count(),
        }
    }
}

/// Control tick, status report and heartbeat, first due one period after
/// `now`.
pub fn scheduler(timing: &TimingConfig, now: Millis) -> Scheduler<Session> {
    let mut sched = Scheduler::new();
    sched.every("control", timing.tick_ms, now, |s: &mut Session, now| s.control_tick(now));
    sched.every("status", timing.status_interval_ms, now, |s: &mut Session, now| {
        s.report_status(now)
    });
    sched.every("heartbeat", timing.heartbeat_interval_ms, now, |s: &mut Session, now| {
        s.system().heartbeat(now)
    });
    sched
}

/// Steps a fake clock from 0 to `until` in tick-sized increments, applying
/// queued ops before each scheduler pass.
pub fn replay(
    session: &mut Session,
    sched: &mut Scheduler<Session>,
    tick_ms: Millis,
    until: Millis,
) -> ParkgateResult<()> {
    let mut now = 0;
    loop {
        session.system_mut().platform_mut().set_time(now);
        session.apply_due(now)?;
        sched.tick(session, now);
        session.take_error()?;
        if now >= until {
            return Ok(());
        }
        now += tick_ms;
    }
}

/// Real-time loop: ticks on a tokio interval and takes operator commands
/// from `lines` until `quit` or `shutdown` resolves. End of input leaves the
/// system running.
pub async fn operate<R>(
    session: &mut Session,
    sched: &mut Scheduler<Session>,
    config: &Config,
    mut lines: Lines<R>,
    shutdown: impl Future<Output = ()>,
) -> ParkgateResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut interval = tokio::time::interval(Duration::from_millis(config.timing.tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = session.system().platform().now_ms();
                if let Err(e) = session.apply_due(now) {
                    tracing::warn!(error = %e, "operator command failed");
                }
                sched.tick(session, now);
                session.take_error()?;
            }
            line = lines.next_line(), if input_open => match line? {
                Some(line) => {
                    let line = line.trim();
                    let now = session.system().platform().now_ms();
                    match line {
                        "" => {}
                        "quit" => return Ok(()),
                        "status" => eprint!("{}", session.system().status(now).render()),
                        cmd => match cmd.parse::<Action>().and_then(|a| a.ops(now, config)) {
                            Ok(ops) => session.schedule(ops),
                            Err(e) => tracing::warn!(error = %e, command = cmd, "rejected"),
                        },
                    }
                }
                None => {
                    tracing::info!("input closed; running until interrupted");
                    input_open = false;
                }
            },
            _ = &mut shutdown => {
                tracing::info!("interrupted");
                return Ok(());
            }
        }
    }
}

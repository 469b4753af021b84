//! In-memory platform with an injectable clock.
//!
//! Inputs float to their pull level until a test (or the CLI) drives them;
//! outputs and servo angles are recorded for inspection.
//!
//! ```ignore
//! let mut p = SimPlatform::manual();
//! p.configure_input(6, Pull::Up);
//! p.drive(6, false); // press an active-low button
//! p.advance(50);
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use parkgate_core::{Channel, Millis};

use crate::{Platform, Pull};

#[derive(Debug, Clone, Copy)]
enum Clock {
    /// Time only moves when told to.
    Manual(Millis),
    /// Milliseconds since the platform was created.
    Wall(Instant),
}

#[derive(Debug, Clone)]
pub struct SimPlatform {
    clock: Clock,
    pulls: HashMap<Channel, Pull>,
    driven: HashMap<Channel, bool>,
    outputs: HashMap<Channel, bool>,
    configured_outputs: HashSet<Channel>,
    angles: HashMap<Channel, u8>,
    angle_writes: usize,
}

impl SimPlatform {
    /// Fake clock starting at 0 ms.
    pub fn manual() -> Self {
        Self::with_clock(Clock::Manual(0))
    }

    /// Clock backed by [`Instant`], for real-time runs.
    pub fn wall_clock() -> Self {
        Self::with_clock(Clock::Wall(Instant::now()))
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            pulls: HashMap::new(),
            driven: HashMap::new(),
            outputs: HashMap::new(),
            configured_outputs: HashSet::new(),
            angles: HashMap::new(),
            angle_writes: 0,
        }
    }

    /// Moves a manual clock forward. No-op on a wall clock.
    pub fn advance(&mut self, ms: Millis) {
        if let Clock::Manual(now) = &mut self.clock {
            *now += ms;
        }
    }

    /// Sets a manual clock to an absolute time; never moves it backwards.
    pub fn set_time(&mut self, at_ms: Millis) {
        if let Clock::Manual(now) = &mut self.clock {
            *now = (*now).max(at_ms);
        }
    }

    /// Forces an input to an electrical level.
    pub fn drive(&mut self, channel: Channel, high: bool) {
        self.driven.insert(channel, high);
    }

    /// Stops driving an input so it floats back to its pull level.
    pub fn release(&mut self, channel: Channel) {
        self.driven.remove(&channel);
    }

    /// Last level written to an output, `None` if never written.
    pub fn output(&self, channel: Channel) -> Option<bool> {
        self.outputs.get(&channel).copied()
    }

    /// Last servo angle written to `channel`.
    pub fn angle(&self, channel: Channel) -> Option<u8> {
        self.angles.get(&channel).copied()
    }

    pub fn angle_writes(&self) -> usize {
        self.angle_writes
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::manual()
    }
}

impl Platform for SimPlatform {
    fn configure_input(&mut self, channel: Channel, pull: Pull) {
        self.pulls.insert(channel, pull);
    }

    fn configure_output(&mut self, channel: Channel) {
        self.configured_outputs.insert(channel);
    }

    fn read_level(&mut self, channel: Channel) -> bool {
        match self.driven.get(&channel) {
            Some(&level) => level,
            None => matches!(self.pulls.get(&channel), Some(Pull::Up)),
        }
    }

    fn write_level(&mut self, channel: Channel, high: bool) {
        if !self.configured_outputs.contains(&channel) {
            tracing::warn!(channel, "write to unconfigured output ignored");
            return;
        }
        self.outputs.insert(channel, high);
    }

    fn write_angle(&mut self, channel: Channel, degrees: u8) {
        self.angles.insert(channel, degrees);
        self.angle_writes += 1;
    }

    fn now_ms(&self) -> Millis {
        match self.clock {
            Clock::Manual(now) => now,
            Clock::Wall(start) => start.elapsed().as_millis() as Millis,
        }
    }
}

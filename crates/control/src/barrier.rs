//! Barrier actuator: motion state machine, stepped servo profile, and the
//! safety interlock.
//!
//! ```text
//! CLOSED ──open()──▶ OPENING ──target reached──▶ OPEN
//!   ▲                   │                          │
//!   │                timeout ──▶ FAULT ◀── timeout │
//!   │                                     │      close()
//! CLOSED ◀──target reached── CLOSING ◀────┼────────┘
//!                                 │       │
//!                  safety sensor ─┘   recover()
//!                  stop() -> nearer of OPEN / CLOSED
//! ```

use parkgate_core::{BarrierConfig, BarrierState, Channel, Event, EventKind, Millis, TimingConfig};
use parkgate_hal::Platform;
use smallvec::SmallVec;

#[derive(Debug, Clone)]
pub struct Barrier {
    channel: Channel,
    state: BarrierState,
    current_angle: u8,
    target_angle: u8,
    open_angle: u8,
    closed_angle: u8,
    step_deg: u8,
    step_interval_ms: Millis,
    open_timeout_ms: Millis,
    close_timeout_ms: Millis,
    command_started_at: Millis,
    last_step_at: Millis,
    events: SmallVec<[Event; 4]>,
}

impl Barrier {
    /// Claims the servo channel and parks it at the closed angle.
    pub fn attach<P: Platform>(
        platform: &mut P,
        channel: Channel,
        geometry: &BarrierConfig,
        timing: &TimingConfig,
        now: Millis,
    ) -> Self {
        let barrier = Self::new(channel, geometry, timing, now);
        platform.write_angle(channel, barrier.current_angle);
        tracing::info!(
            channel,
            closed_deg = geometry.closed_deg,
            open_deg = geometry.open_deg,
            "barrier initialized"
        );
        barrier
    }

    /// Barrier in CLOSED at the closed angle, without touching hardware.
    pub fn new(channel: Channel, geometry: &BarrierConfig, timing: &TimingConfig, now: Millis) -> Self {
        Self {
            channel,
            state: BarrierState::Closed,
            current_angle: geometry.closed_deg,
            target_angle: geometry.closed_deg,
            open_angle: geometry.open_deg,
            closed_angle: geometry.closed_deg,
            step_deg: geometry.step_deg.max(1),
            step_interval_ms: timing.step_interval_ms,
            open_timeout_ms: timing.open_timeout_ms,
            close_timeout_ms: timing.close_timeout_ms,
            command_started_at: now,
            last_step_at: now,
            events: SmallVec::new(),
        }
    }

    /// Reconfigures the end stops. A closed barrier is moved to the new
    /// closed angle at once.
    pub fn set_angles<P: Platform>(&mut self, platform: &mut P, closed_deg: u8, open_deg: u8) {
        self.closed_angle = closed_deg;
        self.open_angle = open_deg;
        if self.state == BarrierState::Closed {
            self.current_angle = closed_deg;
            self.target_angle = closed_deg;
            platform.write_angle(self.channel, closed_deg);
        }
        tracing::info!(closed_deg, open_deg, "barrier angles updated");
    }

    // -- commands -------------------------------------------------------------

    pub fn open(&mut self, now: Millis) {
        match self.state {
            BarrierState::Fault => tracing::warn!("cannot open barrier: in FAULT"),
            BarrierState::Open | BarrierState::Opening => {}
            BarrierState::Closed | BarrierState::Closing => {
                self.target_angle = self.open_angle;
                self.command_started_at = now;
                self.set_state(BarrierState::Opening);
                tracing::info!("barrier opening");
            }
        }
    }

    pub fn close(&mut self, now: Millis) {
        match self.state {
            BarrierState::Fault => tracing::warn!("cannot close barrier: in FAULT"),
            BarrierState::Closed | BarrierState::Closing => {}
            BarrierState::Open | BarrierState::Opening => {
                self.target_angle = self.closed_angle;
                self.command_started_at = now;
                self.set_state(BarrierState::Closing);
                tracing::info!("barrier closing");
            }
        }
    }

    /// Halts where it stands. Motion in progress resolves to the nearer of
    /// OPEN and CLOSED; equal distance resolves to OPEN. Never yields FAULT.
    pub fn stop(&mut self, now: Millis) {
        self.target_angle = self.current_angle;
        if self.state.is_moving() {
            let resolved = self.nearest_stable();
            self.set_state(resolved);
            tracing::info!(angle = self.current_angle, state = %resolved, "barrier stopped");
            let angle = self.current_angle;
            self.push(now, EventKind::BarrierStopped { angle });
        }
    }

    /// Leaves FAULT by resolving to the nearer stable state, as `stop()`
    /// would. Returns `false` when the barrier was not faulted.
    pub fn recover(&mut self, now: Millis) -> bool {
        if self.state != BarrierState::Fault {
            return false;
        }
        self.target_angle = self.current_angle;
        let resolved = self.nearest_stable();
        self.command_started_at = now;
        self.set_state(resolved);
        tracing::info!(angle = self.current_angle, state = %resolved, "barrier recovered from FAULT");
        true
    }

    // -- periodic -------------------------------------------------------------

    /// One tick of the motion state machine.
    ///
    /// Order: safety interlock, then timeouts, then at most one servo step.
    pub fn update<P: Platform>(&mut self, platform: &mut P, now: Millis, safety_active: bool) {
        if safety_active && self.state == BarrierState::Closing {
            tracing::warn!("safety sensor active: halting closure");
            self.stop(now);
            return;
        }

        let elapsed = now.saturating_sub(self.command_started_at);
        let timeout = match self.state {
            BarrierState::Opening => Some(("open", self.open_timeout_ms)),
            BarrierState::Closing => Some(("close", self.close_timeout_ms)),
            _ => None,
        };
        if let Some((motion, limit)) = timeout {
            if elapsed > limit {
                tracing::error!(motion, elapsed_ms = elapsed, "barrier timeout");
                self.set_state(BarrierState::Fault);
                self.push(now, EventKind::BarrierTimeout { elapsed_ms: elapsed });
                return;
            }
        }

        if !self.state.is_moving() || now.saturating_sub(self.last_step_at) < self.step_interval_ms {
            return;
        }
        self.last_step_at = now;

        if self.current_angle != self.target_angle {
            self.current_angle = if self.current_angle < self.target_angle {
                self.current_angle.saturating_add(self.step_deg).min(self.target_angle)
            } else {
                self.current_angle.saturating_sub(self.step_deg).max(self.target_angle)
            };
            platform.write_angle(self.channel, self.current_angle);
        }

        if self.current_angle == self.target_angle {
            match self.state {
                BarrierState::Opening => {
                    self.set_state(BarrierState::Open);
                    tracing::info!("barrier fully open");
                    self.push(now, EventKind::BarrierOpened);
                }
                BarrierState::Closing => {
                    self.set_state(BarrierState::Closed);
                    tracing::info!("barrier fully closed");
                    self.push(now, EventKind::BarrierClosed);
                }
                BarrierState::Closed | BarrierState::Open | BarrierState::Fault => {}
            }
        }
    }

    // -- queries --------------------------------------------------------------

    pub fn state(&self) -> BarrierState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == BarrierState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == BarrierState::Closed
    }

    pub fn is_moving(&self) -> bool {
        self.state.is_moving()
    }

    pub fn is_fault(&self) -> bool {
        self.state == BarrierState::Fault
    }

    pub fn current_angle(&self) -> u8 {
        self.current_angle
    }

    pub fn target_angle(&self) -> u8 {
        self.target_angle
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    fn nearest_stable(&self) -> BarrierState {
        let to_open = self.current_angle.abs_diff(self.open_angle);
        let to_closed = self.current_angle.abs_diff(self.closed_angle);
        if to_open <= to_closed {
            BarrierState::Open
        } else {
            BarrierState::Closed
        }
    }

    fn set_state(&mut self, next: BarrierState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "barrier state");
            self.state = next;
        }
    }

    fn push(&mut self, at: Millis, kind: EventKind) {
        self.events.push(Event::new(at, kind));
    }
}

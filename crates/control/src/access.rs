//! Top-level access-control state machine.
//!
//! Sequences one transaction (entry or exit) from button edge to barrier
//! closed:
//!
//! ```text
//! IDLE ─edge─▶ CHECK_CAPACITY ─granted / exit─▶ OPENING ─open─▶ WAIT_PASS
//!  ▲                 │ denied                      │ timeout        │ pass window
//!  ├─────────────────┘                             ▼                ▼
//!  └───────────────closed──────────────────────── CLOSING ◀─────────┘
//!                                                   │ timeout
//!                       reset() ◀── FAULT ◀─────────┘  (also emergency_stop())
//! ```
//!
//! The controller borrows the barrier and the allocator for each call; it
//! never holds copies of their state.

use parkgate_core::{
    AccessState, Event, EventKind, Millis, ParkgateError, ParkgateResult, Request, TimingConfig,
    VehicleClass,
};
use smallvec::SmallVec;

use crate::allocator::CapacityAllocator;
use crate::barrier::Barrier;

#[derive(Debug, Clone)]
pub struct AccessController {
    state: AccessState,
    state_entered_at: Millis,

    // Transaction context.
    pending_class: Option<VehicleClass>,
    assigned_slot: Option<usize>,
    is_exit: bool,

    pass_time_ms: Millis,
    open_timeout_ms: Millis,
    close_timeout_ms: Millis,
    fault_reminder_ms: Millis,
    last_fault_reminder: Millis,
    safety_last: bool,

    events: SmallVec<[Event; 8]>,
}

impl AccessController {
    pub fn new(timing: &TimingConfig, now: Millis) -> Self {
        tracing::info!("access controller initialized in IDLE");
        Self {
            state: AccessState::Idle,
            state_entered_at: now,
            pending_class: None,
            assigned_slot: None,
            is_exit: false,
            pass_time_ms: timing.pass_time_ms,
            open_timeout_ms: timing.open_timeout_ms,
            close_timeout_ms: timing.close_timeout_ms,
            fault_reminder_ms: timing.fault_reminder_ms,
            last_fault_reminder: now,
            safety_last: false,
            events: SmallVec::new(),
        }
    }

    /// One tick of the transaction state machine.
    ///
    /// `requests` are this tick's button edges in priority order (VIP,
    /// freight, regular, exit). Only IDLE accepts one; the rest are dropped.
    pub fn update(
        &mut self,
        now: Millis,
        requests: &[Request],
        safety_active: bool,
        barrier: &mut Barrier,
        allocator: &mut CapacityAllocator,
    ) {
        if safety_active != self.safety_last {
            tracing::info!(active = safety_active, "safety sensor changed");
            self.safety_last = safety_active;
            self.push(now, EventKind::SafetySensor { active: safety_active });
        }

        match self.state {
            AccessState::Idle => self.handle_idle(now, requests),
            AccessState::CheckCapacity => {
                self.drop_all(now, requests);
                self.handle_check_capacity(now, barrier, allocator);
            }
            AccessState::Opening => {
                self.drop_all(now, requests);
                self.handle_opening(now, barrier);
            }
            AccessState::WaitPass => {
                self.drop_all(now, requests);
                self.handle_wait_pass(now, barrier);
            }
            AccessState::Closing => {
                self.drop_all(now, requests);
                self.handle_closing(now, safety_active, barrier);
            }
            AccessState::Fault => {
                self.drop_all(now, requests);
                self.handle_fault(now);
            }
        }
    }

    /// Starts an entry transaction. Fails with [`ParkgateError::Busy`]
    /// unless IDLE.
    pub fn request_entry(&mut self, class: VehicleClass, now: Millis) -> ParkgateResult<()> {
        if self.state != AccessState::Idle {
            return Err(ParkgateError::Busy(self.state));
        }
        self.pending_class = Some(class);
        self.is_exit = false;
        self.assigned_slot = None;
        self.transition(AccessState::CheckCapacity, now);
        tracing::info!(%class, "entry requested");
        self.push(now, EventKind::EntryRequested { class });
        Ok(())
    }

    /// Starts an exit transaction. Exits are never capacity-limited.
    pub fn request_exit(&mut self, now: Millis) -> ParkgateResult<()> {
        if self.state != AccessState::Idle {
            return Err(ParkgateError::Busy(self.state));
        }
        self.pending_class = None;
        self.is_exit = true;
        self.assigned_slot = None;
        self.transition(AccessState::CheckCapacity, now);
        tracing::info!("exit requested");
        self.push(now, EventKind::ExitRequested);
        Ok(())
    }

    /// Operator reset: FAULT -> IDLE, clearing the transaction and
    /// recovering a faulted barrier. Ignored in any other state.
    pub fn reset(&mut self, now: Millis, barrier: &mut Barrier) -> bool {
        if self.state != AccessState::Fault {
            tracing::debug!(state = %self.state, "reset ignored: not in FAULT");
            return false;
        }
        tracing::info!("manual reset from FAULT");
        barrier.recover(now);
        self.clear_context();
        self.transition(AccessState::Idle, now);
        true
    }

    /// Halts the barrier and enters FAULT from any state.
    pub fn emergency_stop(&mut self, now: Millis, barrier: &mut Barrier) {
        tracing::warn!(state = %self.state, "emergency stop");
        barrier.stop(now);
        self.enter_fault(now, "emergency stop");
    }

    // -- queries --------------------------------------------------------------

    pub fn state(&self) -> AccessState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == AccessState::Idle
    }

    pub fn is_fault(&self) -> bool {
        self.state == AccessState::Fault
    }

    pub fn pending_class(&self) -> Option<VehicleClass> {
        self.pending_class
    }

    pub fn assigned_slot(&self) -> Option<usize> {
        self.assigned_slot
    }

    pub fn is_exit_operation(&self) -> bool {
        self.is_exit
    }

    /// Time spent in the current state.
    pub fn state_elapsed(&self, now: Millis) -> Millis {
        now.saturating_sub(self.state_entered_at)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    // -- state handlers -------------------------------------------------------

    fn handle_idle(&mut self, now: Millis, requests: &[Request]) {
        let Some((first, rest)) = requests.split_first() else {
            return;
        };
        let accepted = match *first {
            Request::Entry(class) => self.request_entry(class, now),
            Request::Exit => self.request_exit(now),
        };
        if let Err(e) = accepted {
            tracing::warn!(error = %e, request = %first, "request dropped");
            self.push(now, EventKind::RequestDropped { request: *first });
        }
        for &request in rest {
            tracing::warn!(%request, "simultaneous request dropped");
            self.push(now, EventKind::RequestDropped { request });
        }
    }

    fn handle_check_capacity(
        &mut self,
        now: Millis,
        barrier: &mut Barrier,
        allocator: &mut CapacityAllocator,
    ) {
        if self.is_exit {
            self.transition(AccessState::Opening, now);
            barrier.open(now);
            return;
        }

        let Some(class) = self.pending_class else {
            tracing::error!("capacity check without a pending class");
            self.clear_context();
            self.transition(AccessState::Idle, now);
            return;
        };

        match allocator.allocate(class) {
            Some(slot) => {
                self.assigned_slot = Some(slot);
                self.transition(AccessState::Opening, now);
                barrier.open(now);
                tracing::info!(%class, slot, "access granted");
                self.push(now, EventKind::AccessGranted { class, slot });
            }
            None => {
                tracing::warn!(%class, "access denied: no available slot");
                self.push(now, EventKind::AccessDenied { class });
                self.clear_context();
                self.transition(AccessState::Idle, now);
            }
        }
    }

    fn handle_opening(&mut self, now: Millis, barrier: &mut Barrier) {
        if self.state_elapsed(now) > self.open_timeout_ms {
            self.timeout(now, "opening timeout", barrier);
            return;
        }
        if barrier.is_fault() {
            self.enter_fault(now, "barrier fault while opening");
            return;
        }
        if barrier.is_open() {
            tracing::info!("barrier open: waiting for vehicle to pass");
            self.transition(AccessState::WaitPass, now);
        }
    }

    fn handle_wait_pass(&mut self, now: Millis, barrier: &mut Barrier) {
        // No presence sensor on this path: the window is fixed.
        if self.state_elapsed(now) > self.pass_time_ms {
            tracing::info!("pass window elapsed: closing");
            self.transition(AccessState::Closing, now);
            barrier.close(now);
        }
    }

    fn handle_closing(&mut self, now: Millis, safety_active: bool, barrier: &mut Barrier) {
        if self.state_elapsed(now) > self.close_timeout_ms {
            self.timeout(now, "closing timeout", barrier);
            return;
        }
        if barrier.is_fault() {
            self.enter_fault(now, "barrier fault while closing");
            return;
        }
        if barrier.is_closed() {
            tracing::info!("barrier closed: transaction complete");
            self.clear_context();
            self.transition(AccessState::Idle, now);
            return;
        }
        // The interlock parked the barrier open; resume once it clears.
        if barrier.is_open() && !safety_active {
            tracing::info!("obstruction cleared: resuming close");
            barrier.close(now);
        }
    }

    fn handle_fault(&mut self, now: Millis) {
        if now.saturating_sub(self.last_fault_reminder) > self.fault_reminder_ms {
            tracing::warn!("system in FAULT: manual reset required");
            self.last_fault_reminder = now;
        }
    }

    // -- transitions ----------------------------------------------------------

    fn timeout(&mut self, now: Millis, reason: &'static str, barrier: &mut Barrier) {
        tracing::error!(
            reason,
            state = %self.state,
            elapsed_ms = self.state_elapsed(now),
            "controller timeout"
        );
        barrier.stop(now);
        self.enter_fault(now, reason);
    }

    fn enter_fault(&mut self, now: Millis, reason: &str) {
        self.clear_context();
        self.last_fault_reminder = now;
        if self.state != AccessState::Fault {
            self.push(now, EventKind::SystemFault { reason: reason.to_string() });
        }
        self.transition(AccessState::Fault, now);
    }

    fn drop_all(&mut self, now: Millis, requests: &[Request]) {
        for &request in requests {
            tracing::warn!(%request, state = %self.state, "request ignored: system busy");
            self.push(now, EventKind::RequestDropped { request });
        }
    }

    fn transition(&mut self, next: AccessState, now: Millis) {
        if self.state == next {
            return;
        }
        let from = self.state;
        self.state = next;
        self.state_entered_at = now;
        tracing::info!(%from, to = %next, "access controller transition");
        self.push(now, EventKind::ControllerTransition { from, to: next });
    }

    fn clear_context(&mut self) {
        self.pending_class = None;
        self.assigned_slot = None;
        self.is_exit = false;
    }

    fn push(&mut self, at: Millis, kind: EventKind) {
        self.events.push(Event::new(at, kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkgate_core::{BarrierConfig, SlotState, VipFallbackPolicy};
    use parkgate_hal::SimPlatform;

    const TICK: Millis = 50;

    /// Controller, barrier and allocator wired in tick order, without inputs.
    struct Rig {
        platform: SimPlatform,
        barrier: Barrier,
        allocator: CapacityAllocator,
        ctl: AccessController,
        now: Millis,
    }

    impl Rig {
        fn new() -> Self {
            let timing = TimingConfig::default();
            let mut platform = SimPlatform::manual();
            let barrier = Barrier::attach(&mut platform, 5, &BarrierConfig::default(), &timing, 0);
            Self {
                platform,
                barrier,
                allocator: CapacityAllocator::new(VipFallbackPolicy::FreightThenRegular),
                ctl: AccessController::new(&timing, 0),
                now: 0,
            }
        }

        fn tick_with(&mut self, requests: &[Request], safety: bool) {
            self.now += TICK;
            self.ctl
                .update(self.now, requests, safety, &mut self.barrier, &mut self.allocator);
            self.barrier.update(&mut self.platform, self.now, safety);
        }

        fn tick(&mut self) {
            self.tick_with(&[], false);
        }

        fn tick_until(&mut self, max: u32, done: impl Fn(&Self) -> bool) {
            for _ in 0..max {
                if done(self) {
                    return;
                }
                self.tick();
            }
            assert!(done(self), "condition not reached within {max} ticks");
        }
    }

    #[test]
    fn vip_entry_full_transaction() {
        let mut rig = Rig::new();
        rig.tick_with(&[Request::Entry(VehicleClass::Vip)], false);
        assert_eq!(rig.ctl.state(), AccessState::CheckCapacity);
        assert_eq!(rig.ctl.pending_class(), Some(VehicleClass::Vip));

        rig.tick();
        assert_eq!(rig.ctl.state(), AccessState::Opening);
        assert_eq!(rig.ctl.assigned_slot(), Some(0));
        assert!(rig.barrier.is_moving());

        rig.tick_until(60, |r| r.ctl.state() == AccessState::WaitPass);
        assert!(rig.barrier.is_open());

        let entered = rig.now;
        rig.tick_until(100, |r| r.ctl.state() == AccessState::Closing);
        assert!(rig.now - entered > 3000);
        assert_eq!(rig.barrier.state(), parkgate_core::BarrierState::Closing);

        rig.tick_until(60, |r| r.ctl.is_idle());
        assert!(rig.barrier.is_closed());
        assert_eq!(rig.ctl.assigned_slot(), None);
        assert_eq!(rig.ctl.pending_class(), None);
        assert_eq!(rig.allocator.slot(0).unwrap().state, SlotState::Occupied);
    }

    #[test]
    fn denied_entry_returns_to_idle() {
        let mut rig = Rig::new();
        rig.allocator.allocate(VehicleClass::Freight);
        rig.allocator.allocate(VehicleClass::Freight);

        rig.tick_with(&[Request::Entry(VehicleClass::Freight)], false);
        rig.tick();
        assert!(rig.ctl.is_idle());
        assert!(rig.barrier.is_closed());
        let events: Vec<_> = rig.ctl.drain_events().map(|e| e.kind).collect();
        assert!(events.contains(&EventKind::AccessDenied { class: VehicleClass::Freight }));
    }

    #[test]
    fn exit_bypasses_capacity() {
        let mut rig = Rig::new();
        for class in VehicleClass::ALL {
            rig.allocator.allocate(class);
            rig.allocator.allocate(class);
        }
        assert!(rig.allocator.all_full());

        rig.tick_with(&[Request::Exit], false);
        assert!(rig.ctl.is_exit_operation());
        rig.tick();
        assert_eq!(rig.ctl.state(), AccessState::Opening);
        assert_eq!(rig.ctl.assigned_slot(), None);
    }

    #[test]
    fn same_tick_priority_and_busy_drops() {
        let mut rig = Rig::new();
        rig.tick_with(
            &[
                Request::Entry(VehicleClass::Freight),
                Request::Entry(VehicleClass::Regular),
                Request::Exit,
            ],
            false,
        );
        assert_eq!(rig.ctl.pending_class(), Some(VehicleClass::Freight));

        rig.tick_with(&[Request::Entry(VehicleClass::Vip)], false);
        assert_eq!(rig.ctl.state(), AccessState::Opening);
        assert_eq!(rig.ctl.assigned_slot(), Some(2));

        let dropped = rig
            .ctl
            .drain_events()
            .filter(|e| matches!(e.kind, EventKind::RequestDropped { .. }))
            .count();
        assert_eq!(dropped, 3);
        assert!(matches!(
            rig.ctl.request_exit(rig.now),
            Err(ParkgateError::Busy(AccessState::Opening))
        ));
    }

    #[test]
    fn open_timeout_is_final_until_reset() {
        let mut rig = Rig::new();
        // Jam the barrier: a fault before the transaction blocks every open().
        rig.barrier.open(0);
        rig.barrier.update(&mut rig.platform, 6000, false);
        assert!(rig.barrier.is_fault());
        rig.now = 6000;

        rig.tick_with(&[Request::Exit], false);
        rig.tick();
        assert_eq!(rig.ctl.state(), AccessState::Opening);
        rig.tick();
        assert!(rig.ctl.is_fault());

        for _ in 0..400 {
            rig.tick_with(&[Request::Entry(VehicleClass::Vip)], false);
            assert!(rig.ctl.is_fault());
        }

        assert!(rig.ctl.reset(rig.now, &mut rig.barrier));
        assert!(rig.ctl.is_idle());
        assert!(!rig.barrier.is_fault());
    }

    #[test]
    fn controller_open_timeout_without_actuator_fault() {
        let timing = TimingConfig {
            open_timeout_ms: 500,
            ..TimingConfig::default()
        };
        let mut platform = SimPlatform::manual();
        // Actuator timeout far longer than the controller's.
        let actuator_timing = TimingConfig {
            open_timeout_ms: 60_000,
            ..TimingConfig::default()
        };
        let mut barrier =
            Barrier::attach(&mut platform, 5, &BarrierConfig::default(), &actuator_timing, 0);
        let mut allocator = CapacityAllocator::new(VipFallbackPolicy::FreightThenRegular);
        let mut ctl = AccessController::new(&timing, 0);

        let mut now = 0;
        ctl.update(now, &[Request::Exit], false, &mut barrier, &mut allocator);
        for _ in 0..20 {
            now += TICK;
            ctl.update(now, &[], false, &mut barrier, &mut allocator);
            barrier.update(&mut platform, now, false);
        }
        assert!(ctl.is_fault());
        // stop() parked the barrier in a stable state.
        assert!(!barrier.is_moving());
        assert!(!barrier.is_fault());
    }

    #[test]
    fn interlock_during_close_then_resume() {
        let mut rig = Rig::new();
        rig.tick_with(&[Request::Exit], false);
        rig.tick_until(200, |r| r.ctl.state() == AccessState::Closing);
        rig.tick();
        rig.tick();
        rig.tick_with(&[], true);
        assert!(rig.barrier.is_open());
        assert_eq!(rig.ctl.state(), AccessState::Closing);

        rig.tick_with(&[], true);
        assert!(rig.barrier.is_open());

        rig.tick();
        rig.tick_until(60, |r| r.ctl.is_idle());
        assert!(rig.barrier.is_closed());
    }

    #[test]
    fn persistent_obstruction_hits_close_timeout() {
        let mut rig = Rig::new();
        rig.tick_with(&[Request::Exit], false);
        rig.tick_until(200, |r| r.ctl.state() == AccessState::Closing);
        for _ in 0..70 {
            rig.tick_with(&[], true);
        }
        assert!(rig.ctl.is_fault());
        assert!(rig.barrier.is_open());
    }

    #[test]
    fn emergency_stop_from_any_state() {
        let mut rig = Rig::new();
        rig.tick_with(&[Request::Entry(VehicleClass::Regular)], false);
        rig.tick();
        rig.tick();
        assert!(rig.barrier.is_moving());

        rig.ctl.emergency_stop(rig.now, &mut rig.barrier);
        assert!(rig.ctl.is_fault());
        assert!(!rig.barrier.is_moving());
        assert_eq!(rig.ctl.assigned_slot(), None);

        rig.ctl.emergency_stop(rig.now, &mut rig.barrier);
        let faults = rig
            .ctl
            .drain_events()
            .filter(|e| matches!(e.kind, EventKind::SystemFault { .. }))
            .count();
        assert_eq!(faults, 1);
    }

    #[test]
    fn reset_outside_fault_is_ignored() {
        let mut rig = Rig::new();
        assert!(!rig.ctl.reset(0, &mut rig.barrier));
        assert!(rig.ctl.is_idle());
    }

    #[test]
    fn repeated_ticks_do_not_relog_transitions() {
        let mut rig = Rig::new();
        rig.tick_with(&[Request::Exit], false);
        rig.tick_until(200, |r| r.ctl.is_idle());
        for _ in 0..10 {
            rig.tick();
        }
        let transitions: Vec<_> = rig
            .ctl
            .drain_events()
            .filter_map(|e| match e.kind {
                EventKind::ControllerTransition { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                AccessState::CheckCapacity,
                AccessState::Opening,
                AccessState::WaitPass,
                AccessState::Closing,
                AccessState::Idle,
            ]
        );
    }
}

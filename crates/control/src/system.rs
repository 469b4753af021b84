//! Composition root: owns the platform and every component, and runs one
//! tick in a fixed order.
//!
//! ```text
//! tick(now):
//!   1. poll buttons + safety sensor      (inputs)
//!   2. allocator.scan                     (occupancy ground truth, indicators)
//!   3. controller.update                  (transaction state machine)
//!   4. barrier.update                     (interlock, timeout, one servo step)
//!   5. drain component events into the journal
//! ```
//!
//! Every stage sees the same `now`.

use parkgate_core::{
    Config, Event, EventKind, Millis, ParkgateError, ParkgateResult, Request, SlotState,
    VehicleClass,
};
use parkgate_hal::Platform;
use smallvec::SmallVec;

use crate::access::AccessController;
use crate::allocator::{CapacityAllocator, SlotBank};
use crate::barrier::Barrier;
use crate::input::{Button, ProximitySensor};
use crate::reporter::SystemStatus;

pub struct ParkingSystem<P: Platform> {
    platform: P,
    config: Config,
    /// Priority order: VIP, freight, regular, exit.
    buttons: [(Button, Request); 4],
    safety: ProximitySensor,
    bank: SlotBank,
    allocator: CapacityAllocator,
    barrier: Barrier,
    controller: AccessController,
    journal: Vec<Event>,
    started_at: Millis,
    last_tick: Millis,
}

impl<P: Platform> ParkingSystem<P> {
    /// Validates `config`, claims every channel, and parks the barrier closed.
    pub fn new(mut platform: P, config: Config) -> ParkgateResult<Self> {
        config.validate()?;
        let now = platform.now_ms();
        let pins = config.pins.clone();

        let buttons = [
            (pins.btn_vip, Request::Entry(VehicleClass::Vip)),
            (pins.btn_freight, Request::Entry(VehicleClass::Freight)),
            (pins.btn_regular, Request::Entry(VehicleClass::Regular)),
            (pins.btn_exit, Request::Exit),
        ]
        .map(|(channel, request)| {
            (Button::attach(&mut platform, channel, &config.buttons, now), request)
        });
        let safety = ProximitySensor::attach(&mut platform, pins.safety, &config.sensors, now);
        let bank = SlotBank::attach(&mut platform, &config, now);
        let allocator = CapacityAllocator::new(config.vip_fallback);
        let barrier = Barrier::attach(&mut platform, pins.servo, &config.barrier, &config.timing, now);
        let controller = AccessController::new(&config.timing, now);

        tracing::info!(
            tick_ms = config.timing.tick_ms,
            policy = ?config.vip_fallback,
            "parking system ready"
        );

        Ok(Self {
            platform,
            config,
            buttons,
            safety,
            bank,
            allocator,
            barrier,
            controller,
            journal: Vec::new(),
            started_at: now,
            last_tick: now,
        })
    }

    /// Runs one tick against a single time snapshot.
    pub fn tick(&mut self, now: Millis) {
        self.last_tick = now;

        let mut requests: SmallVec<[Request; 4]> = SmallVec::new();
        for (button, request) in &mut self.buttons {
            button.poll(&mut self.platform, now);
            if button.was_pressed() {
                requests.push(*request);
            }
        }
        let safety_active = self.safety.poll(&mut self.platform, now);

        self.allocator.scan(&mut self.bank, &mut self.platform, now);
        self.controller.update(
            now,
            &requests,
            safety_active,
            &mut self.barrier,
            &mut self.allocator,
        );
        self.barrier.update(&mut self.platform, now, safety_active);

        self.collect_events();
    }

    /// Reads the platform clock once and ticks with it.
    pub fn tick_now(&mut self) -> Millis {
        let now = self.platform.now_ms();
        self.tick(now);
        now
    }

    // -- operator controls ----------------------------------------------------

    /// Leaves FAULT. Returns `false` when the controller was not faulted.
    pub fn reset(&mut self, now: Millis) -> bool {
        let done = self.controller.reset(now, &mut self.barrier);
        self.collect_events();
        done
    }

    pub fn emergency_stop(&mut self, now: Millis) {
        self.controller.emergency_stop(now, &mut self.barrier);
        self.collect_events();
    }

    /// Forces one slot FREE. Its indicator follows on the next tick, where a
    /// vehicle still on the sensor takes the slot back.
    pub fn release_slot(&mut self, index: usize, now: Millis) -> ParkgateResult<bool> {
        let released = self.allocator.release_by_index(index)?;
        if released {
            self.journal
                .push(Event::new(now, EventKind::SlotReleased { slot: index }));
        }
        Ok(released)
    }

    pub fn release_all(&mut self, now: Millis) -> usize {
        let occupied: SmallVec<[usize; 6]> = self
            .allocator
            .slots()
            .iter()
            .filter(|s| s.state == SlotState::Occupied)
            .map(|s| s.index)
            .collect();
        let released = self.allocator.release_all();
        self.journal.extend(
            occupied
                .into_iter()
                .map(|slot| Event::new(now, EventKind::SlotReleased { slot })),
        );
        released
    }

    /// Reconfigures the barrier end stops.
    pub fn set_barrier_angles(&mut self, closed_deg: u8, open_deg: u8) -> ParkgateResult<()> {
        if closed_deg == open_deg || closed_deg > 180 || open_deg > 180 {
            return Err(ParkgateError::InvalidConfig(format!(
                "barrier angles closed={closed_deg} open={open_deg}"
            )));
        }
        self.barrier.set_angles(&mut self.platform, closed_deg, open_deg);
        self.config.barrier.closed_deg = closed_deg;
        self.config.barrier.open_deg = open_deg;
        Ok(())
    }

    /// One-line liveness log.
    pub fn heartbeat(&self, now: Millis) {
        tracing::info!(
            uptime_ms = self.uptime(now),
            controller = %self.controller.state(),
            barrier = %self.barrier.state(),
            free = self.allocator.total_free(),
            "heartbeat"
        );
    }

    // -- queries --------------------------------------------------------------

    pub fn status(&self, now: Millis) -> SystemStatus {
        SystemStatus::build(
            self.uptime(now),
            &self.controller,
            &self.barrier,
            &self.allocator,
            &self.bank,
        )
    }

    /// Takes every event journaled since the last drain.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, Event> {
        self.journal.drain(..)
    }

    pub fn uptime(&self, now: Millis) -> Millis {
        now.saturating_sub(self.started_at)
    }

    pub fn last_tick(&self) -> Millis {
        self.last_tick
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &AccessController {
        &self.controller
    }

    pub fn barrier(&self) -> &Barrier {
        &self.barrier
    }

    pub fn allocator(&self) -> &CapacityAllocator {
        &self.allocator
    }

    pub fn slot_bank(&self) -> &SlotBank {
        &self.bank
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    fn collect_events(&mut self) {
        self.journal.extend(self.allocator.drain_events());
        self.journal.extend(self.controller.drain_events());
        self.journal.extend(self.barrier.drain_events());
    }
}

impl<P: Platform> std::fmt::Debug for ParkingSystem<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParkingSystem")
            .field("controller", &self.controller.state())
            .field("barrier", &self.barrier.state())
            .field("free", &self.allocator.total_free())
            .field("journal", &self.journal.len())
            .finish()
    }
}

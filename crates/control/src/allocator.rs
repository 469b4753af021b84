//! Six typed slots and the allocation policy.
//!
//! Two paths write a slot's state:
//!   1. Reservation: [`CapacityAllocator::allocate`] marks the granted slot
//!      OCCUPIED immediately; [`release_by_index`](CapacityAllocator::release_by_index)
//!      forces it back to FREE.
//!   2. Ground truth: [`CapacityAllocator::scan`] polls every occupancy sensor
//!      each tick. A FREE slot whose sensor reads a vehicle becomes OCCUPIED,
//!      whether the vehicle just arrived, was parked at boot, or is still
//!      there after an operator release.
//!
//! Only a departure edge turns OCCUPIED back into FREE, so a reservation
//! stands until the vehicle leaves or an operator releases it.

use parkgate_core::{
    Config, Event, EventKind, Millis, ParkgateError, ParkgateResult, SlotState, SlotType,
    VehicleClass, VipFallbackPolicy, SLOTS_PER_TYPE, SLOT_COUNT,
};
use parkgate_hal::Platform;
use serde::Serialize;
use smallvec::SmallVec;

use crate::indicator::TrafficLight;
use crate::input::{Edge, ProximitySensor};

/// Fixed layout: `0,1: VIP | 2,3: FREIGHT | 4,5: REGULAR`.
const LAYOUT: [(SlotType, &str); SLOT_COUNT] = [
    (SlotType::Vip, "VIP1"),
    (SlotType::Vip, "VIP2"),
    (SlotType::Freight, "FREIGHT1"),
    (SlotType::Freight, "FREIGHT2"),
    (SlotType::Regular, "REG1"),
    (SlotType::Regular, "REG2"),
];

/// One physical parking space. `slot_type` and `index` never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub index: usize,
    pub slot_type: SlotType,
    pub state: SlotState,
    pub name: &'static str,
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CapacityAllocator {
    slots: [Slot; SLOT_COUNT],
    policy: VipFallbackPolicy,
    events: SmallVec<[Event; 4]>,
}

impl CapacityAllocator {
    /// All slots FREE.
    pub fn new(policy: VipFallbackPolicy) -> Self {
        let slots = std::array::from_fn(|index| {
            let (slot_type, name) = LAYOUT[index];
            Slot {
                index,
                slot_type,
                state: SlotState::Free,
                name,
            }
        });
        tracing::info!(slots = SLOT_COUNT, ?policy, "allocator initialized");
        Self {
            slots,
            policy,
            events: SmallVec::new(),
        }
    }

    /// Reserves a slot for `class`, or `None` when nothing suitable is free.
    ///
    /// Same-type slots first; a VIP then falls back through the configured
    /// policy. Never blocks, never queues.
    pub fn allocate(&mut self, class: VehicleClass) -> Option<usize> {
        let preferred = class.preferred_slot();
        let index = self.find_free(preferred).or_else(|| match class {
            VehicleClass::Vip => self
                .policy
                .order()
                .into_iter()
                .find_map(|fallback| self.find_free(fallback)),
            VehicleClass::Freight | VehicleClass::Regular => None,
        });

        let Some(i) = index else {
            tracing::warn!(%class, "no available slot");
            return None;
        };

        let slot = &mut self.slots[i];
        slot.state = SlotState::Occupied;
        if slot.slot_type == preferred {
            tracing::info!(slot = i, name = slot.name, %class, "slot allocated");
        } else {
            tracing::info!(slot = i, name = slot.name, %class, "slot allocated via VIP fallback");
        }
        Some(i)
    }

    /// Forces a slot to FREE regardless of its sensor.
    ///
    /// Returns `Ok(false)` when the slot was already free.
    pub fn release_by_index(&mut self, index: usize) -> ParkgateResult<bool> {
        let Some(slot) = self.slots.get_mut(index) else {
            tracing::error!(index, "invalid slot index");
            return Err(ParkgateError::InvalidSlot(index));
        };
        if slot.state == SlotState::Free {
            tracing::warn!(slot = index, name = slot.name, "release ignored: slot already free");
            return Ok(false);
        }
        slot.state = SlotState::Free;
        tracing::info!(slot = index, name = slot.name, "slot manually released");
        Ok(true)
    }

    /// Releases every occupied slot; returns how many changed.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut().filter(|s| s.state == SlotState::Occupied) {
            slot.state = SlotState::Free;
            released += 1;
        }
        tracing::info!(released, "all slots manually released");
        released
    }

    /// Per-tick occupancy scan: polls each slot's sensor, applies its
    /// transition or its level, and repaints any indicator that disagrees
    /// with the slot's logical state.
    pub fn scan<P: Platform>(&mut self, bank: &mut SlotBank, platform: &mut P, now: Millis) {
        for i in 0..SLOT_COUNT {
            let sensor = &mut bank.sensors[i];
            sensor.poll(platform, now);
            match sensor.take_edge() {
                Some(edge) => self.apply_sensor_edge(i, edge, now),
                None if sensor.is_detected() && self.slots[i].state == SlotState::Free => {
                    self.mark_occupied(i, now);
                }
                None => {}
            }
            let light = &mut bank.lights[i];
            if light.state() != self.slots[i].state {
                light.show(platform, self.slots[i].state);
            }
        }
    }

    /// Applies one debounced sensor transition to slot `index`.
    pub fn apply_sensor_edge(&mut self, index: usize, edge: Edge, now: Millis) {
        let Some(slot) = self.slots.get_mut(index) else {
            tracing::error!(index, "invalid slot index");
            return;
        };
        match (edge, slot.state) {
            (Edge::Activated, SlotState::Free) => self.mark_occupied(index, now),
            (Edge::Activated, SlotState::Occupied) => {
                tracing::debug!(slot = index, name = slot.name, "reservation confirmed by sensor");
            }
            (Edge::Deactivated, SlotState::Occupied) => {
                slot.state = SlotState::Free;
                tracing::info!(slot = index, name = slot.name, "slot freed");
                self.events.push(Event::new(now, EventKind::SlotFreed { slot: index }));
            }
            (Edge::Deactivated, SlotState::Free) => {
                tracing::warn!(
                    slot = index,
                    name = slot.name,
                    "sensor cleared on a slot already marked free"
                );
            }
        }
    }

    // -- queries --------------------------------------------------------------

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[Slot; SLOT_COUNT] {
        &self.slots
    }

    pub fn policy(&self) -> VipFallbackPolicy {
        self.policy
    }

    pub fn free_count(&self, slot_type: SlotType) -> usize {
        self.slots
            .iter()
            .filter(|s| s.slot_type == slot_type && s.state == SlotState::Free)
            .count()
    }

    pub fn occupied_count(&self, slot_type: SlotType) -> usize {
        SLOTS_PER_TYPE - self.free_count(slot_type)
    }

    pub fn total_free(&self) -> usize {
        self.slots.iter().filter(|s| s.state == SlotState::Free).count()
    }

    pub fn total_occupied(&self) -> usize {
        SLOT_COUNT - self.total_free()
    }

    pub fn all_full(&self) -> bool {
        self.total_free() == 0
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    fn mark_occupied(&mut self, index: usize, now: Millis) {
        let slot = &mut self.slots[index];
        slot.state = SlotState::Occupied;
        tracing::info!(slot = index, name = slot.name, "slot occupied");
        self.events.push(Event::new(now, EventKind::SlotOccupied { slot: index }));
    }

    fn find_free(&self, slot_type: SlotType) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.slot_type == slot_type && s.state == SlotState::Free)
    }
}

// ---------------------------------------------------------------------------
// Slot hardware
// ---------------------------------------------------------------------------

/// Occupancy sensor and indicator for every slot, index-aligned with the
/// allocator's slots.
#[derive(Debug, Clone)]
pub struct SlotBank {
    sensors: [ProximitySensor; SLOT_COUNT],
    lights: [TrafficLight; SLOT_COUNT],
}

impl SlotBank {
    pub fn attach<P: Platform>(platform: &mut P, cfg: &Config, now: Millis) -> Self {
        let sensors = std::array::from_fn(|i| {
            ProximitySensor::attach(platform, cfg.pins.slot_sensors[i], &cfg.sensors, now)
        });
        let lights = std::array::from_fn(|i| TrafficLight::attach(platform, cfg.pins.indicators[i]));
        Self { sensors, lights }
    }

    pub fn is_detected(&self, index: usize) -> Option<bool> {
        self.sensors.get(index).map(ProximitySensor::is_detected)
    }

    pub fn light(&self, index: usize) -> Option<&TrafficLight> {
        self.lights.get(index)
    }
}

//! Status snapshot and its boxed text rendering.
//!
//! Takes the controller, barrier and allocator as they stand and produces a
//! serialisable [`SystemStatus`] plus a human-readable report.

use parkgate_core::{AccessState, BarrierState, Millis, SlotState, SlotType};
use serde::Serialize;

use crate::access::AccessController;
use crate::allocator::{CapacityAllocator, SlotBank};
use crate::barrier::Barrier;

/// Point-in-time view of the whole system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub uptime_ms: Millis,
    pub controller: AccessState,
    pub barrier: BarrierState,
    pub barrier_angle: u8,
    pub slots: Vec<SlotStatus>,
    pub total_occupied: usize,
    pub total_free: usize,
    pub by_type: Vec<TypeCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub index: usize,
    pub name: &'static str,
    pub slot_type: SlotType,
    pub state: SlotState,
    /// Debounced sensor reading, which may disagree with a reservation.
    pub detected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub slot_type: SlotType,
    pub free: usize,
    pub occupied: usize,
}

impl SystemStatus {
    pub fn build(
        uptime_ms: Millis,
        controller: &AccessController,
        barrier: &Barrier,
        allocator: &CapacityAllocator,
        bank: &SlotBank,
    ) -> Self {
        let slots = allocator
            .slots()
            .iter()
            .map(|s| SlotStatus {
                index: s.index,
                name: s.name,
                slot_type: s.slot_type,
                state: s.state,
                detected: bank.is_detected(s.index).unwrap_or(false),
            })
            .collect();

        let by_type = SlotType::ALL
            .into_iter()
            .map(|slot_type| TypeCount {
                slot_type,
                free: allocator.free_count(slot_type),
                occupied: allocator.occupied_count(slot_type),
            })
            .collect();

        SystemStatus {
            uptime_ms,
            controller: controller.state(),
            barrier: barrier.state(),
            barrier_angle: barrier.current_angle(),
            slots,
            total_occupied: allocator.total_occupied(),
            total_free: allocator.total_free(),
            by_type,
        }
    }

    /// Render the snapshot as a boxed report.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                    PARKGATE STATUS REPORT                    ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        row(&mut out, "Uptime:", &format!("{:.1} s", self.uptime_ms as f64 / 1000.0));
        row(&mut out, "Controller:", &self.controller.to_string());
        row(&mut out, "Barrier:", &format!("{} @ {}°", self.barrier, self.barrier_angle));
        row(
            &mut out,
            "Occupancy:",
            &format!("{} occupied / {} free", self.total_occupied, self.total_free),
        );
        for t in &self.by_type {
            row(
                &mut out,
                &format!("  {}:", t.slot_type),
                &format!("{} free", t.free),
            );
        }
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str("║  SLOTS                                                       ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for s in &self.slots {
            let sensor = if s.detected { "vehicle" } else { "clear" };
            out.push_str(&format!(
                "║  [{}] {:<10}{:<9}{:<10}sensor: {:<20} ║\n",
                s.index, s.name, s.slot_type, s.state, sensor
            ));
        }

        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}

fn row(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!("║  {:<20}{:>38}  ║\n", label, value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkgate_core::{Config, TimingConfig, VehicleClass};
    use parkgate_hal::SimPlatform;

    fn snapshot(alloc: &CapacityAllocator) -> SystemStatus {
        let cfg = Config::default();
        let mut p = SimPlatform::manual();
        let bank = SlotBank::attach(&mut p, &cfg, 0);
        let barrier = Barrier::new(5, &cfg.barrier, &cfg.timing, 0);
        let ctl = AccessController::new(&TimingConfig::default(), 0);
        SystemStatus::build(12_500, &ctl, &barrier, alloc, &bank)
    }

    #[test]
    fn counts_follow_allocator() {
        let mut alloc = CapacityAllocator::new(Default::default());
        alloc.allocate(VehicleClass::Vip);
        alloc.allocate(VehicleClass::Vip);
        alloc.allocate(VehicleClass::Vip);

        let status = snapshot(&alloc);
        assert_eq!(status.total_occupied, 3);
        assert_eq!(status.total_free, 3);
        assert_eq!(
            status.by_type[0],
            TypeCount { slot_type: SlotType::Vip, free: 0, occupied: 2 }
        );
        assert_eq!(status.by_type[1].free, 1);
        assert_eq!(status.slots[2].state, SlotState::Occupied);
        assert!(!status.slots[2].detected);
    }

    #[test]
    fn render_lists_every_slot() {
        let alloc = CapacityAllocator::new(Default::default());
        let text = snapshot(&alloc).render();
        assert!(text.contains("PARKGATE STATUS REPORT"));
        assert!(text.contains("IDLE"));
        assert!(text.contains("CLOSED @ 10°"));
        assert!(text.contains("12.5 s"));
        for name in ["VIP1", "VIP2", "FREIGHT1", "FREIGHT2", "REG1", "REG2"] {
            assert!(text.contains(name), "missing {name}");
        }
    }

    #[test]
    fn serializes_snake_case() {
        let alloc = CapacityAllocator::new(Default::default());
        let v = serde_json::to_value(snapshot(&alloc)).unwrap();
        assert_eq!(v["controller"], "idle");
        assert_eq!(v["barrier"], "closed");
        assert_eq!(v["slots"][4]["name"], "REG1");
        assert_eq!(v["by_type"][2]["slot_type"], "regular");
    }
}

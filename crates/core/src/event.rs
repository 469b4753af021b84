//! Typed journal of notable things that happened during a tick.
//!
//! Components buffer events as they transition; the composition root drains
//! them in tick order so a consumer sees one consistent timeline.

use serde::{Deserialize, Serialize};

use crate::types::{AccessState, Millis, Request, VehicleClass};

/// A timestamped [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub at_ms: Millis,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(at_ms: Millis, kind: EventKind) -> Self {
        Self { at_ms, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    EntryRequested { class: VehicleClass },
    ExitRequested,
    AccessGranted { class: VehicleClass, slot: usize },
    AccessDenied { class: VehicleClass },
    /// A button edge that arrived while busy or lost the same-tick priority.
    RequestDropped { request: Request },
    SlotOccupied { slot: usize },
    SlotFreed { slot: usize },
    /// Operator override.
    SlotReleased { slot: usize },
    BarrierOpened,
    BarrierClosed,
    BarrierStopped { angle: u8 },
    BarrierTimeout { elapsed_ms: Millis },
    SafetySensor { active: bool },
    ControllerTransition { from: AccessState, to: AccessState },
    SystemFault { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_flat() {
        let ev = Event::new(1250, EventKind::AccessGranted { class: VehicleClass::Vip, slot: 0 });
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["at_ms"], 1250);
        assert_eq!(v["event"], "access_granted");
        assert_eq!(v["class"], "vip");
        assert_eq!(v["slot"], 0);
    }
}

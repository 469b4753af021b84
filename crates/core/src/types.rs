//! Domain types for the parkgate access controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds from a monotonic clock.
pub type Millis = u64;

/// Digital I/O channel identifier (a GPIO pin number on real hardware).
pub type Channel = u8;

/// Number of physical slots in the facility.
pub const SLOT_COUNT: usize = 6;

/// Slots reserved for each [`SlotType`].
pub const SLOTS_PER_TYPE: usize = 2;

// ---------------------------------------------------------------------------
// Vehicles and slots
// ---------------------------------------------------------------------------

/// Class of an arriving vehicle. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Vip,
    Freight,
    Regular,
}

impl VehicleClass {
    /// All classes in request priority order.
    pub const ALL: [VehicleClass; 3] = [Self::Vip, Self::Freight, Self::Regular];

    /// The slot type this class parks in by default.
    pub const fn preferred_slot(self) -> SlotType {
        match self {
            Self::Vip => SlotType::Vip,
            Self::Freight => SlotType::Freight,
            Self::Regular => SlotType::Regular,
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Vip => "VIP",
            Self::Freight => "FREIGHT",
            Self::Regular => "REGULAR",
        })
    }
}

/// Type of a physical slot. A slot's type never changes after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Vip,
    Freight,
    Regular,
}

impl SlotType {
    pub const ALL: [SlotType; 3] = [Self::Vip, Self::Freight, Self::Regular];
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Vip => "VIP",
            Self::Freight => "FREIGHT",
            Self::Regular => "REG",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    #[default]
    Free,
    Occupied,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Free => "FREE",
            Self::Occupied => "OCCUPIED",
        })
    }
}

// ---------------------------------------------------------------------------
// State machines
// ---------------------------------------------------------------------------

/// Motion state of the barrier actuator.
///
/// `Fault` is only left through an explicit recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
    Fault,
}

impl BarrierState {
    #[inline]
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }
}

impl fmt::Display for BarrierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Closed => "CLOSED",
            Self::Opening => "OPENING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Fault => "FAULT",
        })
    }
}

/// State of the top-level access transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    #[default]
    Idle,
    CheckCapacity,
    Opening,
    WaitPass,
    Closing,
    Fault,
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Idle => "IDLE",
            Self::CheckCapacity => "CHECK_CAPACITY",
            Self::Opening => "OPENING",
            Self::WaitPass => "WAIT_PASS",
            Self::Closing => "CLOSING",
            Self::Fault => "FAULT",
        })
    }
}

/// A request decoded from the operator buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "class")]
pub enum Request {
    Entry(VehicleClass),
    Exit,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(class) => write!(f, "entry({class})"),
            Self::Exit => f.write_str("exit"),
        }
    }
}

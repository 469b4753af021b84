//! Domain models, configuration, events, and error definitions.
//!
//! Foundation crate -- no hardware or async dependencies.

pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::{
    BarrierConfig, Config, IndicatorPins, InputConfig, PinMap, Polarity, TimingConfig,
    VipFallbackPolicy,
};
pub use error::{ParkgateError, ParkgateResult};
pub use event::{Event, EventKind};
pub use types::{
    AccessState, BarrierState, Channel, Millis, Request, SlotState, SlotType, VehicleClass,
    SLOTS_PER_TYPE, SLOT_COUNT,
};

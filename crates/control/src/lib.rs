//! Debounced inputs, slot allocation, barrier motion, the access-control
//! state machine, and the composition root that ticks them together.

pub mod access;
pub mod allocator;
pub mod barrier;
pub mod indicator;
pub mod input;
pub mod reporter;
pub mod scheduler;
pub mod sink;
pub mod system;

pub use access::AccessController;
pub use allocator::{CapacityAllocator, Slot, SlotBank};
pub use barrier::Barrier;
pub use indicator::TrafficLight;
pub use input::{Button, DebouncedInput, Edge, ProximitySensor};
pub use reporter::{SlotStatus, SystemStatus, TypeCount};
pub use scheduler::Scheduler;
pub use sink::JsonStreamSink;
pub use system::ParkingSystem;

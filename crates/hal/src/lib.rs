//! Hardware abstraction for the parkgate controller.
//!
//! The control logic only ever talks to a [`Platform`]: read a digital
//! level, write a digital level, write a servo angle, read the clock.
//! [`sim::SimPlatform`] is the in-memory implementation used by tests and
//! the CLI.

pub mod sim;

use parkgate_core::{Channel, Millis};

pub use sim::SimPlatform;

/// Input pull configuration applied when a channel is claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
}

/// Narrow capability interface over GPIO, PWM and a monotonic clock.
///
/// Calls never block; the whole tick runs on one thread.
pub trait Platform {
    fn configure_input(&mut self, channel: Channel, pull: Pull);
    fn configure_output(&mut self, channel: Channel);

    /// Raw electrical level, `true` = HIGH.
    fn read_level(&mut self, channel: Channel) -> bool;
    fn write_level(&mut self, channel: Channel, high: bool);

    /// Commands the servo on `channel` to `degrees`.
    fn write_angle(&mut self, channel: Channel, degrees: u8);

    /// Monotonic, non-decreasing milliseconds.
    fn now_ms(&self) -> Millis;
}

impl<P: Platform + ?Sized> Platform for &mut P {
    fn configure_input(&mut self, channel: Channel, pull: Pull) {
        (**self).configure_input(channel, pull)
    }

    fn configure_output(&mut self, channel: Channel) {
        (**self).configure_output(channel)
    }

    fn read_level(&mut self, channel: Channel) -> bool {
        (**self).read_level(channel)
    }

    fn write_level(&mut self, channel: Channel, high: bool) {
        (**self).write_level(channel, high)
    }

    fn write_angle(&mut self, channel: Channel, degrees: u8) {
        (**self).write_angle(channel, degrees)
    }

    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}

//! Two-color slot indicator: red = occupied, green = free.

use parkgate_core::{IndicatorPins, SlotState};
use parkgate_hal::Platform;

#[derive(Debug, Clone)]
pub struct TrafficLight {
    pins: IndicatorPins,
    state: SlotState,
}

impl TrafficLight {
    /// Claims both channels and starts green.
    pub fn attach<P: Platform>(platform: &mut P, pins: IndicatorPins) -> Self {
        platform.configure_output(pins.red);
        platform.configure_output(pins.green);
        let mut light = Self {
            pins,
            state: SlotState::Free,
        };
        light.set_free(platform);
        light
    }

    pub fn show<P: Platform>(&mut self, platform: &mut P, state: SlotState) {
        match state {
            SlotState::Free => self.set_free(platform),
            SlotState::Occupied => self.set_occupied(platform),
        }
    }

    pub fn set_occupied<P: Platform>(&mut self, platform: &mut P) {
        platform.write_level(self.pins.red, true);
        platform.write_level(self.pins.green, false);
        self.state = SlotState::Occupied;
        tracing::debug!(red = self.pins.red, green = self.pins.green, "indicator occupied");
    }

    pub fn set_free<P: Platform>(&mut self, platform: &mut P) {
        platform.write_level(self.pins.red, false);
        platform.write_level(self.pins.green, true);
        self.state = SlotState::Free;
        tracing::debug!(red = self.pins.red, green = self.pins.green, "indicator free");
    }

    /// Both lamps dark; the logical state is kept.
    pub fn set_off<P: Platform>(&mut self, platform: &mut P) {
        platform.write_level(self.pins.red, false);
        platform.write_level(self.pins.green, false);
    }

    pub fn state(&self) -> SlotState {
        self.state
    }
}

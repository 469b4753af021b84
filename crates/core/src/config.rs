//! Runtime configuration: timings, barrier geometry, input polarity, pin map.
//!
//! Every section falls back to the factory defaults, so a JSON file only
//! needs the fields it overrides:
//!
//! ```json
//! { "timing": { "pass_time_ms": 4000 }, "vip_fallback": "regular_then_freight" }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ParkgateError, ParkgateResult};
use crate::types::{Channel, Millis, SlotType, SLOT_COUNT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub barrier: BarrierConfig,
    pub buttons: InputConfig,
    pub sensors: InputConfig,
    pub pins: PinMap,
    pub vip_fallback: VipFallbackPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            barrier: BarrierConfig::default(),
            buttons: InputConfig::button(),
            sensors: InputConfig::pnp_sensor(),
            pins: PinMap::default(),
            vip_fallback: VipFallbackPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> ParkgateResult<Self> {
        let cfg: Config = serde_json::from_str(s)
            .map_err(|e| ParkgateError::InvalidConfig(format!("malformed JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ParkgateResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects configurations the state machines cannot honor.
    pub fn validate(&self) -> ParkgateResult<()> {
        let b = &self.barrier;
        if b.step_deg == 0 {
            return Err(ParkgateError::InvalidConfig("barrier.step_deg must be > 0".into()));
        }
        if b.open_deg == b.closed_deg {
            return Err(ParkgateError::InvalidConfig(
                "barrier.open_deg and barrier.closed_deg must differ".into(),
            ));
        }
        if b.open_deg > 180 || b.closed_deg > 180 {
            return Err(ParkgateError::InvalidConfig(
                "barrier angles must be within 0..=180".into(),
            ));
        }
        let t = &self.timing;
        if t.tick_ms == 0 {
            return Err(ParkgateError::InvalidConfig("timing.tick_ms must be > 0".into()));
        }
        if t.step_interval_ms == 0 {
            return Err(ParkgateError::InvalidConfig(
                "timing.step_interval_ms must be > 0".into(),
            ));
        }
        if t.open_timeout_ms == 0 || t.close_timeout_ms == 0 {
            return Err(ParkgateError::InvalidConfig("timeouts must be > 0".into()));
        }
        self.pins.validate()
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Window the barrier stays open for a vehicle to pass.
    pub pass_time_ms: Millis,
    pub open_timeout_ms: Millis,
    pub close_timeout_ms: Millis,
    /// Minimum time between two servo steps.
    pub step_interval_ms: Millis,
    /// Period of the combined update (20 Hz by default).
    pub tick_ms: Millis,
    pub status_interval_ms: Millis,
    pub heartbeat_interval_ms: Millis,
    /// Minimum spacing of the "still in FAULT" reminder.
    pub fault_reminder_ms: Millis,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pass_time_ms: 3000,
            open_timeout_ms: 5000,
            close_timeout_ms: 3000,
            step_interval_ms: 20,
            tick_ms: 50,
            status_interval_ms: 30_000,
            heartbeat_interval_ms: 5000,
            fault_reminder_ms: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Barrier geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    pub closed_deg: u8,
    pub open_deg: u8,
    pub step_deg: u8,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            closed_deg: 10,
            open_deg: 90,
            step_deg: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Which electrical level means "active".
///
/// Buttons wired to a pull-up are `ActiveLow`; PNP proximity sensors are
/// `ActiveHigh`, NPN sensors `ActiveLow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    /// Logical level for a stable electrical level.
    #[inline]
    pub fn logical(self, electrical: bool) -> bool {
        match self {
            Self::ActiveHigh => electrical,
            Self::ActiveLow => !electrical,
        }
    }

    /// Electrical level that reads as inactive.
    #[inline]
    pub fn idle_level(self) -> bool {
        matches!(self, Self::ActiveLow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub debounce_ms: Millis,
    pub pull_up: bool,
    pub polarity: Polarity,
}

impl InputConfig {
    /// Pull-up, active-low push buttons.
    pub fn button() -> Self {
        Self {
            debounce_ms: 30,
            pull_up: true,
            polarity: Polarity::ActiveLow,
        }
    }

    /// PNP inductive sensors driving the line high on detection.
    pub fn pnp_sensor() -> Self {
        Self {
            debounce_ms: 30,
            pull_up: false,
            polarity: Polarity::ActiveHigh,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self::button()
    }
}

/// Search order used when both VIP slots are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VipFallbackPolicy {
    #[default]
    FreightThenRegular,
    RegularThenFreight,
}

impl VipFallbackPolicy {
    pub const fn order(self) -> [SlotType; 2] {
        match self {
            Self::FreightThenRegular => [SlotType::Freight, SlotType::Regular],
            Self::RegularThenFreight => [SlotType::Regular, SlotType::Freight],
        }
    }
}

// ---------------------------------------------------------------------------
// Pin map
// ---------------------------------------------------------------------------

/// Red/green pair of one slot's traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorPins {
    pub red: Channel,
    pub green: Channel,
}

/// Channel assignment. Slot-indexed arrays follow the layout
/// `0,1: VIP | 2,3: FREIGHT | 4,5: REGULAR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub servo: Channel,
    pub btn_vip: Channel,
    pub btn_freight: Channel,
    pub btn_regular: Channel,
    pub btn_exit: Channel,
    pub safety: Channel,
    pub slot_sensors: [Channel; SLOT_COUNT],
    pub indicators: [IndicatorPins; SLOT_COUNT],
}

impl PinMap {
    fn validate(&self) -> ParkgateResult<()> {
        let mut seen = std::collections::HashSet::new();
        let all = [
            self.servo,
            self.btn_vip,
            self.btn_freight,
            self.btn_regular,
            self.btn_exit,
            self.safety,
        ]
        .into_iter()
        .chain(self.slot_sensors)
        .chain(self.indicators.iter().flat_map(|p| [p.red, p.green]));

        for ch in all {
            if !seen.insert(ch) {
                return Err(ParkgateError::InvalidConfig(format!(
                    "channel {ch} assigned more than once"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PinMap {
    fn default() -> Self {
        const fn tl(red: Channel, green: Channel) -> IndicatorPins {
            IndicatorPins { red, green }
        }
        Self {
            servo: 5,
            btn_vip: 6,
            btn_freight: 7,
            btn_regular: 8,
            btn_exit: 9,
            safety: 10,
            slot_sensors: [11, 12, 13, 14, 15, 16],
            indicators: [
                tl(17, 18),
                tl(19, 20),
                tl(21, 35),
                tl(36, 37),
                tl(38, 39),
                tl(40, 41),
            ],
        }
    }
}

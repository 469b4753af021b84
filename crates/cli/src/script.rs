//! Scenario scripts and operator commands.
//!
//! Both surfaces decode into an [`Action`]; an action expands into timed
//! [`Op`]s against the simulated platform's pins.
//!
//! ```json
//! { "duration_ms": 20000,
//!   "steps": [
//!     { "at_ms": 1000, "action": "press", "button": "vip" },
//!     { "at_ms": 9000, "action": "occupy", "slot": 0 },
//!     { "at_ms": 9500, "action": "safety_on" } ] }
//! ```

use std::path::Path;
use std::str::FromStr;

use parkgate_core::{Channel, Config, Millis, ParkgateError, ParkgateResult, SLOT_COUNT};
use serde::Deserialize;

const DEFAULT_HOLD_MS: Millis = 100;

fn default_hold() -> Millis {
    DEFAULT_HOLD_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonName {
    Vip,
    Freight,
    Regular,
    Exit,
}

impl ButtonName {
    fn channel(self, cfg: &Config) -> Channel {
        match self {
            Self::Vip => cfg.pins.btn_vip,
            Self::Freight => cfg.pins.btn_freight,
            Self::Regular => cfg.pins.btn_regular,
            Self::Exit => cfg.pins.btn_exit,
        }
    }
}

impl FromStr for ButtonName {
    type Err = ParkgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vip" => Ok(Self::Vip),
            "freight" => Ok(Self::Freight),
            "regular" | "reg" => Ok(Self::Regular),
            "exit" => Ok(Self::Exit),
            other => Err(ParkgateError::InvalidInput(format!("unknown button: {other}"))),
        }
    }
}

/// Something the operator or the environment does to the lot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Press {
        button: ButtonName,
        #[serde(default = "default_hold")]
        hold_ms: Millis,
    },
    Occupy { slot: usize },
    Vacate { slot: usize },
    SafetyOn,
    SafetyOff,
    Reset,
    EmergencyStop,
    ReleaseSlot { slot: usize },
    ReleaseAll,
}

/// Primitive step applied by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Hold an input at an electrical level.
    Drive(Channel, bool),
    /// Let an input fall back to its pull level.
    Float(Channel),
    Reset,
    EmergencyStop,
    ReleaseSlot(usize),
    ReleaseAll,
}

impl Action {
    /// Expands into timed ops starting at `at`.
    pub fn ops(&self, at: Millis, cfg: &Config) -> ParkgateResult<Vec<(Millis, Op)>> {
        let button_active = !cfg.buttons.polarity.idle_level();
        let sensor_active = !cfg.sensors.polarity.idle_level();
        let ops = match *self {
            Action::Press { button, hold_ms } => {
                let ch = button.channel(cfg);
                vec![(at, Op::Drive(ch, button_active)), (at + hold_ms, Op::Float(ch))]
            }
            Action::Occupy { slot } => {
                vec![(at, Op::Drive(cfg.pins.slot_sensors[check_slot(slot)?], sensor_active))]
            }
            Action::Vacate { slot } => vec![(at, Op::Float(cfg.pins.slot_sensors[check_slot(slot)?]))],
            Action::SafetyOn => vec![(at, Op::Drive(cfg.pins.safety, sensor_active))],
            Action::SafetyOff => vec![(at, Op::Float(cfg.pins.safety))],
            Action::Reset => vec![(at, Op::Reset)],
            Action::EmergencyStop => vec![(at, Op::EmergencyStop)],
            Action::ReleaseSlot { slot } => vec![(at, Op::ReleaseSlot(check_slot(slot)?))],
            Action::ReleaseAll => vec![(at, Op::ReleaseAll)],
        };
        Ok(ops)
    }
}

fn check_slot(slot: usize) -> ParkgateResult<usize> {
    if slot < SLOT_COUNT {
        Ok(slot)
    } else {
        Err(ParkgateError::InvalidSlot(slot))
    }
}

/// Parses one stdin command line, e.g. `press vip`, `occupy 2`,
/// `safety on`, `release all`.
impl FromStr for Action {
    type Err = ParkgateError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let slot = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| ParkgateError::InvalidInput(format!("bad slot index: {s}")))
        };
        match words.as_slice() {
            ["press", button] => Ok(Action::Press {
                button: button.parse()?,
                hold_ms: DEFAULT_HOLD_MS,
            }),
            ["press", button, hold] => Ok(Action::Press {
                button: button.parse()?,
                hold_ms: hold
                    .parse()
                    .map_err(|_| ParkgateError::InvalidInput(format!("bad hold time: {hold}")))?,
            }),
            ["occupy", s] => Ok(Action::Occupy { slot: slot(*s)? }),
            ["vacate", s] => Ok(Action::Vacate { slot: slot(*s)? }),
            ["safety", "on"] => Ok(Action::SafetyOn),
            ["safety", "off"] => Ok(Action::SafetyOff),
            ["reset"] => Ok(Action::Reset),
            ["estop"] | ["emergency_stop"] => Ok(Action::EmergencyStop),
            ["release", "all"] => Ok(Action::ReleaseAll),
            ["release", s] => Ok(Action::ReleaseSlot { slot: slot(*s)? }),
            _ => Err(ParkgateError::InvalidInput(format!("unknown command: {line}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_ms: Millis,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub duration_ms: Option<Millis>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json_str(s: &str) -> ParkgateResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| ParkgateError::InvalidInput(format!("malformed script: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ParkgateResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Every op of every step, ordered by time. Ops at the same time keep
    /// script order.
    pub fn timeline(&self, cfg: &Config) -> ParkgateResult<Vec<(Millis, Op)>> {
        let mut ops = Vec::new();
        for step in &self.steps {
            ops.extend(step.action.ops(step.at_ms, cfg)?);
        }
        ops.sort_by_key(|(at, _)| *at);
        Ok(ops)
    }

    /// Explicit duration, or the last op plus `settle_ms`.
    pub fn duration(&self, cfg: &Config, settle_ms: Millis) -> ParkgateResult<Millis> {
        if let Some(d) = self.duration_ms {
            return Ok(d);
        }
        let last = self.timeline(cfg)?.last().map_or(0, |(at, _)| *at);
        Ok(last + settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_steps() {
        let script = Script::from_json_str(
            r#"{
                "steps": [
                    { "at_ms": 500, "action": "occupy", "slot": 3 },
                    { "at_ms": 100, "action": "press", "button": "exit", "hold_ms": 200 },
                    { "at_ms": 900, "action": "emergency_stop" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(script.steps.len(), 3);
        assert_eq!(
            script.steps[1].action,
            Action::Press { button: ButtonName::Exit, hold_ms: 200 }
        );

        let cfg = Config::default();
        let timeline = script.timeline(&cfg).unwrap();
        assert_eq!(
            timeline,
            vec![
                (100, Op::Drive(cfg.pins.btn_exit, false)),
                (300, Op::Float(cfg.pins.btn_exit)),
                (500, Op::Drive(cfg.pins.slot_sensors[3], true)),
                (900, Op::EmergencyStop),
            ]
        );
        assert_eq!(script.duration(&cfg, 1000).unwrap(), 1900);
    }

    #[test]
    fn press_defaults_hold_time() {
        let script = Script::from_json_str(
            r#"{ "duration_ms": 5000, "steps": [ { "at_ms": 0, "action": "press", "button": "vip" } ] }"#,
        )
        .unwrap();
        assert_eq!(
            script.steps[0].action,
            Action::Press { button: ButtonName::Vip, hold_ms: DEFAULT_HOLD_MS }
        );
        assert_eq!(script.duration(&Config::default(), 0).unwrap(), 5000);
    }

    #[test]
    fn rejects_out_of_range_slot() {
        let script = Script::from_json_str(
            r#"{ "steps": [ { "at_ms": 0, "action": "vacate", "slot": 6 } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            script.timeline(&Config::default()),
            Err(ParkgateError::InvalidSlot(6))
        ));
    }

    #[test]
    fn parses_operator_commands() {
        assert_eq!(
            "press reg".parse::<Action>().unwrap(),
            Action::Press { button: ButtonName::Regular, hold_ms: DEFAULT_HOLD_MS }
        );
        assert_eq!("occupy 2".parse::<Action>().unwrap(), Action::Occupy { slot: 2 });
        assert_eq!("safety on".parse::<Action>().unwrap(), Action::SafetyOn);
        assert_eq!("release all".parse::<Action>().unwrap(), Action::ReleaseAll);
        assert_eq!("release 4".parse::<Action>().unwrap(), Action::ReleaseSlot { slot: 4 });
        assert_eq!("estop".parse::<Action>().unwrap(), Action::EmergencyStop);
        assert!("press taxi".parse::<Action>().is_err());
        assert!("open sesame".parse::<Action>().is_err());
    }
}

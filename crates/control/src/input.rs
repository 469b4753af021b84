//! Debounced digital inputs with consumable edges.
//!
//! A raw level is promoted to `stable` once it has held for longer than the
//! debounce window. Level queries apply the configured [`Polarity`]; edge
//! queries compare against the level seen by the previous edge query and
//! fire once per transition.
//!
//! [`Polarity`]: parkgate_core::Polarity

use parkgate_core::{Channel, InputConfig, Millis, Polarity};
use parkgate_hal::{Platform, Pull};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Activated,
    Deactivated,
}

#[derive(Debug, Clone)]
pub struct DebouncedInput {
    channel: Channel,
    debounce_ms: Millis,
    polarity: Polarity,
    last_raw: bool,
    stable: bool,
    /// Logical level observed by the last edge query.
    reported: bool,
    last_change: Millis,
}

impl DebouncedInput {
    /// Claims `channel` on the platform and seeds the filter with its
    /// current level, so a line that is already active does not produce a
    /// spurious edge at startup.
    pub fn attach<P: Platform>(
        platform: &mut P,
        channel: Channel,
        cfg: &InputConfig,
        now: Millis,
    ) -> Self {
        platform.configure_input(channel, if cfg.pull_up { Pull::Up } else { Pull::None });
        let raw = platform.read_level(channel);
        tracing::debug!(
            channel,
            pull_up = cfg.pull_up,
            polarity = ?cfg.polarity,
            "input attached"
        );
        Self::with_level(channel, cfg, raw, now)
    }

    pub fn with_level(channel: Channel, cfg: &InputConfig, raw: bool, now: Millis) -> Self {
        Self {
            channel,
            debounce_ms: cfg.debounce_ms,
            polarity: cfg.polarity,
            last_raw: raw,
            stable: raw,
            reported: cfg.polarity.logical(raw),
            last_change: now,
        }
    }

    /// Feeds one raw sample and returns the debounced logical level.
    pub fn sample(&mut self, raw: bool, now: Millis) -> bool {
        if raw != self.last_raw {
            self.last_change = now;
            self.last_raw = raw;
        }
        if now.saturating_sub(self.last_change) > self.debounce_ms {
            self.stable = raw;
        }
        self.is_active()
    }

    pub fn poll<P: Platform>(&mut self, platform: &mut P, now: Millis) -> bool {
        let raw = platform.read_level(self.channel);
        self.sample(raw, now)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.polarity.logical(self.stable)
    }

    /// Consumes the pending transition, if any.
    pub fn take_edge(&mut self) -> Option<Edge> {
        let level = self.is_active();
        if level == self.reported {
            return None;
        }
        self.reported = level;
        Some(if level { Edge::Activated } else { Edge::Deactivated })
    }

    /// `true` once per inactive -> active transition.
    ///
    /// Shares its memory with [`was_deactivated`](Self::was_deactivated):
    /// either query consumes whatever transition is pending.
    pub fn was_activated(&mut self) -> bool {
        self.take_edge() == Some(Edge::Activated)
    }

    pub fn was_deactivated(&mut self) -> bool {
        self.take_edge() == Some(Edge::Deactivated)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
}

// ---------------------------------------------------------------------------
// Named wrappers
// ---------------------------------------------------------------------------

/// Operator push button.
#[derive(Debug, Clone)]
pub struct Button(DebouncedInput);

impl Button {
    pub fn attach<P: Platform>(
        platform: &mut P,
        channel: Channel,
        cfg: &InputConfig,
        now: Millis,
    ) -> Self {
        Self(DebouncedInput::attach(platform, channel, cfg, now))
    }

    pub fn poll<P: Platform>(&mut self, platform: &mut P, now: Millis) -> bool {
        self.0.poll(platform, now)
    }

    pub fn is_pressed(&self) -> bool {
        self.0.is_active()
    }

    /// `true` exactly once per press.
    pub fn was_pressed(&mut self) -> bool {
        self.0.was_activated()
    }
}

/// Inductive proximity sensor (slot occupancy or barrier obstruction).
#[derive(Debug, Clone)]
pub struct ProximitySensor(DebouncedInput);

impl ProximitySensor {
    pub fn attach<P: Platform>(
        platform: &mut P,
        channel: Channel,
        cfg: &InputConfig,
        now: Millis,
    ) -> Self {
        Self(DebouncedInput::attach(platform, channel, cfg, now))
    }

    pub fn poll<P: Platform>(&mut self, platform: &mut P, now: Millis) -> bool {
        self.0.poll(platform, now)
    }

    pub fn is_detected(&self) -> bool {
        self.0.is_active()
    }

    pub fn take_edge(&mut self) -> Option<Edge> {
        self.0.take_edge()
    }

    pub fn was_activated(&mut self) -> bool {
        self.0.was_activated()
    }

    pub fn was_deactivated(&mut self) -> bool {
        self.0.was_deactivated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkgate_hal::SimPlatform;

    fn active_high() -> InputConfig {
        InputConfig {
            debounce_ms: 30,
            pull_up: false,
            polarity: Polarity::ActiveHigh,
        }
    }

    #[test]
    fn short_glitch_is_filtered() {
        let mut input = DebouncedInput::with_level(1, &active_high(), false, 0);
        assert!(!input.sample(true, 10));
        assert!(!input.sample(false, 20));
        assert!(!input.sample(false, 100));
        assert_eq!(input.take_edge(), None);
    }

    #[test]
    fn level_promoted_only_after_window_elapses() {
        let mut input = DebouncedInput::with_level(1, &active_high(), false, 0);
        assert!(!input.sample(true, 100));
        // Exactly the window is not enough.
        assert!(!input.sample(true, 130));
        assert!(input.sample(true, 131));
    }

    #[test]
    fn edge_fires_once_per_transition() {
        let mut input = DebouncedInput::with_level(1, &active_high(), false, 0);
        input.sample(true, 100);
        input.sample(true, 200);
        assert!(input.was_activated());
        assert!(!input.was_activated());

        input.sample(false, 300);
        input.sample(false, 400);
        assert!(input.was_deactivated());
        assert!(!input.was_deactivated());
    }

    #[test]
    fn edge_queries_share_memory() {
        let mut input = DebouncedInput::with_level(1, &active_high(), false, 0);
        input.sample(true, 100);
        input.sample(true, 200);
        // Asking for the wrong edge still consumes the pending one.
        assert!(!input.was_deactivated());
        assert!(!input.was_activated());
    }

    #[test]
    fn active_low_button_press_and_release() {
        let mut platform = SimPlatform::manual();
        let cfg = InputConfig::button();
        let mut button = Button::attach(&mut platform, 6, &cfg, 0);

        // Pull-up idles HIGH: not pressed, no startup edge.
        assert!(!button.poll(&mut platform, 0));
        assert!(!button.was_pressed());

        platform.drive(6, false);
        button.poll(&mut platform, 50);
        assert!(!button.is_pressed());
        button.poll(&mut platform, 100);
        assert!(button.is_pressed());
        assert!(button.was_pressed());
        assert!(!button.was_pressed());

        platform.release(6);
        button.poll(&mut platform, 150);
        button.poll(&mut platform, 200);
        assert!(!button.is_pressed());
        assert!(!button.was_pressed());
    }

    #[test]
    fn npn_sensor_reads_inverted() {
        let cfg = InputConfig {
            debounce_ms: 30,
            pull_up: true,
            polarity: Polarity::ActiveLow,
        };
        let mut sensor = ProximitySensor(DebouncedInput::with_level(11, &cfg, true, 0));
        assert!(!sensor.is_detected());
        sensor.0.sample(false, 10);
        sensor.0.sample(false, 50);
        assert!(sensor.is_detected());
        assert_eq!(sensor.take_edge(), Some(Edge::Activated));
    }

    #[test]
    fn line_active_at_startup_has_no_edge() {
        let mut platform = SimPlatform::manual();
        platform.drive(11, true);
        let mut sensor = ProximitySensor::attach(&mut platform, 11, &active_high(), 0);
        sensor.poll(&mut platform, 100);
        assert!(sensor.is_detected());
        assert!(!sensor.was_activated());
    }
}

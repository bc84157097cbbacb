use crate::button::{button_name, ButtonSink, Timestamp, BTN_LEFT, BTN_MIDDLE};
use crate::chord::{self, ChordEvent, ChordState, Effect, Timing, DEFAULT_CHORD_TIMEOUT};
use crate::timer::DeadlineTimer;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Outcome of a configuration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    Success,
    /// The requested value is neither enabled nor disabled.
    Invalid,
}

/// The two values middle-button emulation can be set to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulationSetting {
    Enabled,
    Disabled,
}

impl FromStr for EmulationSetting {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" | "enable" | "on" | "true" | "1" => Ok(EmulationSetting::Enabled),
            "disabled" | "disable" | "off" | "false" | "0" => Ok(EmulationSetting::Disabled),
            _ => Err(()),
        }
    }
}

/// Middle-button emulation for one pointing device.
///
/// Chords Left+Right into a middle click. All calls for a device must come
/// from one serial event loop; the context never blocks and never spawns.
pub struct EmulationContext {
    device: String,
    state: ChordState,
    chord_start_time: Timestamp,
    /// One bit per button code, relative to `BTN_LEFT`.
    held_mask: u32,
    enabled: bool,
    enabled_default: bool,
    want_enabled: bool,
    timer: DeadlineTimer,
    timeout_us: u64,
}

impl EmulationContext {
    /// Create the context at device-attach time. `device` is only used to
    /// tag diagnostics.
    pub fn new(device: impl Into<String>, default_enabled: bool) -> Self {
        Self {
            device: device.into(),
            state: ChordState::Idle,
            chord_start_time: 0,
            held_mask: 0,
            enabled: default_enabled,
            enabled_default: default_enabled,
            want_enabled: default_enabled,
            timer: DeadlineTimer::new(),
            timeout_us: micros(DEFAULT_CHORD_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_us = micros(timeout);
        self
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn state(&self) -> ChordState {
        self.state
    }

    pub fn held_mask(&self) -> u32 {
        self.held_mask
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// When the owner must call [`check_timer`](Self::check_timer) next, if at all.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timer.deadline()
    }

    /// Feed one physical button change. Returns true if the caller must not
    /// forward the raw event.
    pub fn filter_button(
        &mut self,
        button: u16,
        pressed: bool,
        time: Timestamp,
        sink: &mut impl ButtonSink,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let event = ChordEvent::classify(button, pressed);

        let bit = match button.checked_sub(BTN_LEFT).map(u32::from) {
            Some(bit) if bit < u32::BITS => bit,
            _ => {
                error!(
                    device = %self.device,
                    button,
                    "button mask too small for {}",
                    button_name(button)
                );
                return true;
            }
        };

        let suppress = self.dispatch(event, time, sink);

        let old_mask = self.held_mask;
        if pressed {
            self.held_mask |= 1 << bit;
        } else {
            self.held_mask &= !(1 << bit);
        }

        if old_mask != self.held_mask && self.held_mask == 0 {
            self.dispatch(ChordEvent::AllUp, time, sink);
            self.apply_config();
        }

        suppress
    }

    /// Deliver the chord deadline expiry.
    pub fn on_timeout(&mut self, now: Timestamp, sink: &mut impl ButtonSink) {
        self.dispatch(ChordEvent::Timeout, now, sink);
    }

    /// Fire the deadline if it has passed. Returns true if it fired.
    pub fn check_timer(&mut self, now: Timestamp, sink: &mut impl ButtonSink) -> bool {
        if !self.timer.fire(now) {
            return false;
        }
        self.on_timeout(now, sink);
        true
    }

    /// Request a new enable state. Takes effect once no button is held.
    pub fn set_enabled(&mut self, enabled: bool) -> ConfigStatus {
        self.want_enabled = enabled;
        self.apply_config();
        ConfigStatus::Success
    }

    /// Like [`set_enabled`](Self::set_enabled) but from an untyped value.
    pub fn configure(&mut self, value: &str) -> ConfigStatus {
        match value.parse::<EmulationSetting>() {
            Ok(EmulationSetting::Enabled) => self.set_enabled(true),
            Ok(EmulationSetting::Disabled) => self.set_enabled(false),
            Err(()) => ConfigStatus::Invalid,
        }
    }

    /// The effective enable state, which may lag a pending request.
    pub fn get_enabled(&self) -> bool {
        self.enabled
    }

    /// The most recently requested enable state.
    pub fn requested_enabled(&self) -> bool {
        self.want_enabled
    }

    pub fn get_default_enabled(&self) -> bool {
        self.enabled_default
    }

    /// True while an enable/disable request waits for the buttons to go up.
    pub fn is_config_pending(&self) -> bool {
        self.enabled != self.want_enabled
    }

    /// Release everything this context pressed downstream and return to
    /// Idle. Used when the device goes away with buttons still held.
    pub fn release_all(&mut self, now: Timestamp, sink: &mut impl ButtonSink) {
        if self.state == ChordState::Middle {
            sink.notify_button(now, BTN_MIDDLE, false);
        }
        if self.state != ChordState::Idle || self.held_mask != 0 {
            debug!(device = %self.device, state = %self.state, "releasing held buttons");
        }
        self.timer.cancel();
        self.state = ChordState::Idle;
        self.held_mask = 0;
        self.apply_config();
    }

    fn apply_config(&mut self) {
        if self.want_enabled == self.enabled || self.held_mask != 0 {
            return;
        }
        self.enabled = self.want_enabled;
        info!(device = %self.device, enabled = self.enabled, "middle button emulation changed");
    }

    fn dispatch(&mut self, event: ChordEvent, now: Timestamp, sink: &mut impl ButtonSink) -> bool {
        let current = self.state;
        let timing = Timing {
            now,
            chord_start: self.chord_start_time,
            timeout: self.timeout_us,
        };
        let tr = chord::transition(current, event, &timing);

        for effect in &tr.effects {
            match *effect {
                Effect::Emit(n) => sink.notify_button(n.time, n.button, n.pressed),
                Effect::ArmTimer { at } => {
                    self.chord_start_time = now;
                    self.timer.arm(at);
                }
                Effect::CancelTimer => self.timer.cancel(),
                Effect::Defect => {
                    error!(
                        device = %self.device,
                        state = %current,
                        event = %event,
                        "invalid event in middle button state"
                    );
                }
            }
        }
        self.state = tr.next;

        debug!(
            device = %self.device,
            from = %current,
            event = %event,
            to = %tr.next,
            suppress = tr.suppress,
            "middlebutton state"
        );
        tr.suppress
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

impl Drop for EmulationContext {
    fn drop(&mut self) {
        if self.timer.is_armed() {
            debug!(device = %self.device, "cancelling chord deadline on removal");
        }
        self.timer.cancel();
    }
}

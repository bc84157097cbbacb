use crate::uinput_emitter::{self, EmitterSink, EventEmitter};
use evdev::{EventType, InputEvent};
use midclick_core::button::{is_pointer_button, ButtonSink, Timestamp};
use midclick_core::emulation::EmulationContext;
use midclick_core::ipc::DeviceStatus;
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Microseconds since the epoch, the clock evdev stamps events with.
pub fn timestamp_us(t: SystemTime) -> Timestamp {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as Timestamp)
        .unwrap_or(0)
}

pub fn now_us() -> Timestamp {
    timestamp_us(SystemTime::now())
}

/// Routes one grabbed pointer's events through its emulation context and
/// out to the virtual device.
pub struct PointerRouter {
    name: String,
    emulation: EmulationContext,
    /// Buttons this device currently holds down on the virtual pointer.
    pressed: BTreeSet<u16>,
}

/// Emits through the virtual pointer and keeps `pressed` in step with it.
struct TrackingSink<'a, E: EventEmitter> {
    inner: EmitterSink<'a, E>,
    pressed: &'a mut BTreeSet<u16>,
}

impl<E: EventEmitter> ButtonSink for TrackingSink<'_, E> {
    fn notify_button(&mut self, time: Timestamp, button: u16, pressed: bool) {
        track(self.pressed, button, pressed);
        self.inner.notify_button(time, button, pressed);
    }
}

fn track(set: &mut BTreeSet<u16>, button: u16, pressed: bool) {
    if pressed {
        set.insert(button);
    } else {
        set.remove(&button);
    }
}

impl PointerRouter {
    pub fn new(name: impl Into<String>, emulation: EmulationContext) -> Self {
        Self {
            name: name.into(),
            emulation,
            pressed: BTreeSet::new(),
        }
    }

    pub fn emulation_mut(&mut self) -> &mut EmulationContext {
        &mut self.emulation
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.emulation.next_deadline()
    }

    /// Fire the chord deadline if `now` has reached it.
    pub fn check_timer(&mut self, now: Timestamp, emitter: &mut impl EventEmitter) -> bool {
        let mut sink = TrackingSink {
            inner: EmitterSink::new(emitter),
            pressed: &mut self.pressed,
        };
        self.emulation.check_timer(now, &mut sink)
    }

    /// Process one raw event: button changes go through emulation, the rest
    /// is relayed unchanged.
    pub fn process_event(&mut self, event: InputEvent, emitter: &mut impl EventEmitter) {
        if event.event_type() == EventType::KEY
            && is_pointer_button(event.code())
            && event.value() != 2
        {
            let time = timestamp_us(event.timestamp());
            let pressed = event.value() == 1;
            let mut sink = TrackingSink {
                inner: EmitterSink::new(&mut *emitter),
                pressed: &mut self.pressed,
            };
            // An overdue deadline belongs before this event.
            self.emulation.check_timer(time, &mut sink);
            if self
                .emulation
                .filter_button(event.code(), pressed, time, &mut sink)
            {
                return;
            }
            track(&mut self.pressed, event.code(), pressed);
        }

        if let Err(e) = uinput_emitter::relay_event(emitter, &event) {
            warn!(device = %self.name, error = %e, "relay error");
        }
    }

    /// Device is gone: release every button it still holds downstream.
    pub fn release_all(&mut self, now: Timestamp, emitter: &mut impl EventEmitter) {
        let mut sink = TrackingSink {
            inner: EmitterSink::new(&mut *emitter),
            pressed: &mut self.pressed,
        };
        self.emulation.release_all(now, &mut sink);

        let stuck = std::mem::take(&mut self.pressed);
        if !stuck.is_empty() {
            info!(device = %self.name, count = stuck.len(), "releasing buttons of removed device");
        }
        let mut sink = EmitterSink::new(emitter);
        for button in stuck {
            sink.notify_button(now, button, false);
        }
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            name: self.name.clone(),
            enabled: self.emulation.get_enabled(),
            default_enabled: self.emulation.get_default_enabled(),
            pending: self.emulation.is_config_pending(),
            state: self.emulation.state().to_string(),
        }
    }
}

use anyhow::{Context, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key, RelativeAxisType};
use midclick_core::button::{ButtonSink, Timestamp, BTN_LEFT, BTN_TASK};
use tracing::{info, warn};

pub trait EventEmitter {
    fn emit_events(&mut self, events: &[InputEvent]) -> Result<()>;
}

impl EventEmitter for VirtualDevice {
    fn emit_events(&mut self, events: &[InputEvent]) -> Result<()> {
        self.emit(events)?;
        Ok(())
    }
}

/// Name of the virtual pointer; also used to skip it during discovery.
pub const VIRTUAL_DEVICE_NAME: &str = "midclickd virtual pointer";

pub fn create_virtual_device() -> Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    for code in BTN_LEFT..=BTN_TASK {
        keys.insert(Key::new(code));
    }

    let mut axes = AttributeSet::<RelativeAxisType>::new();
    for axis in [
        RelativeAxisType::REL_X,
        RelativeAxisType::REL_Y,
        RelativeAxisType::REL_WHEEL,
        RelativeAxisType::REL_HWHEEL,
        RelativeAxisType::REL_WHEEL_HI_RES,
        RelativeAxisType::REL_HWHEEL_HI_RES,
    ] {
        axes.insert(axis);
    }

    let vdev = VirtualDeviceBuilder::new()
        .context("creating VirtualDeviceBuilder")?
        .name(VIRTUAL_DEVICE_NAME)
        .with_keys(&keys)
        .context("setting keys")?
        .with_relative_axes(&axes)
        .context("setting relative axes")?
        .build()
        .context("building virtual device")?;

    info!("virtual uinput pointer created");
    Ok(vdev)
}

pub fn relay_event(emitter: &mut impl EventEmitter, event: &InputEvent) -> Result<()> {
    emitter.emit_events(&[*event])?;
    Ok(())
}

fn syn() -> InputEvent {
    InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
}

/// Writes emulated button changes to an emitter as KEY + SYN_REPORT frames.
pub struct EmitterSink<'a, E: EventEmitter> {
    emitter: &'a mut E,
}

impl<'a, E: EventEmitter> EmitterSink<'a, E> {
    pub fn new(emitter: &'a mut E) -> Self {
        Self { emitter }
    }
}

impl<E: EventEmitter> ButtonSink for EmitterSink<'_, E> {
    fn notify_button(&mut self, _time: Timestamp, button: u16, pressed: bool) {
        // uinput stamps its own time; ordering is all that survives
        let frame = [
            InputEvent::new(EventType::KEY, button, i32::from(pressed)),
            syn(),
        ];
        if let Err(e) = self.emitter.emit_events(&frame) {
            warn!(error = %e, button, pressed, "emit button error");
        }
    }
}

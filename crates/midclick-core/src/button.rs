/// Microseconds on the event clock. Non-decreasing within one device's stream.
pub type Timestamp = u64;

// evdev button codes from Linux input-event-codes.h
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const BTN_SIDE: u16 = 0x113;
pub const BTN_EXTRA: u16 = 0x114;
pub const BTN_FORWARD: u16 = 0x115;
pub const BTN_BACK: u16 = 0x116;
pub const BTN_TASK: u16 = 0x117;

/// Start of the joystick range; everything in `BTN_LEFT..BTN_JOYSTICK` is a
/// pointer button.
const BTN_JOYSTICK: u16 = 0x120;

/// True for codes in the mouse button block (BTN_LEFT up to the joystick range).
pub fn is_pointer_button(code: u16) -> bool {
    (BTN_LEFT..BTN_JOYSTICK).contains(&code)
}

pub fn button_name(code: u16) -> &'static str {
    match code {
        BTN_LEFT => "BTN_LEFT",
        BTN_RIGHT => "BTN_RIGHT",
        BTN_MIDDLE => "BTN_MIDDLE",
        BTN_SIDE => "BTN_SIDE",
        BTN_EXTRA => "BTN_EXTRA",
        BTN_FORWARD => "BTN_FORWARD",
        BTN_BACK => "BTN_BACK",
        BTN_TASK => "BTN_TASK",
        _ => "BTN_UNKNOWN",
    }
}

/// A button state change delivered downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonNotification {
    pub time: Timestamp,
    pub button: u16,
    pub pressed: bool,
}

/// Downstream consumer of emulated and replayed button events.
///
/// Fire-and-forget: implementations log their own failures.
pub trait ButtonSink {
    fn notify_button(&mut self, time: Timestamp, button: u16, pressed: bool);
}

impl ButtonSink for Vec<ButtonNotification> {
    fn notify_button(&mut self, time: Timestamp, button: u16, pressed: bool) {
        self.push(ButtonNotification {
            time,
            button,
            pressed,
        });
    }
}

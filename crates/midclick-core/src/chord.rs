use crate::button::{ButtonNotification, Timestamp, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use std::fmt;
use std::time::Duration;

/// How long a single chord button may be held before it is replayed as a
/// plain click.
pub const DEFAULT_CHORD_TIMEOUT: Duration = Duration::from_millis(50);

/// Chord detector states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordState {
    /// Nothing held, waiting for the first chord button.
    Idle,
    /// Left is down and suppressed; waiting for Right or the deadline.
    LeftDown,
    /// Right is down and suppressed; waiting for Left or the deadline.
    RightDown,
    /// Emulated middle button is down.
    Middle,
    /// Right went up after a middle click, Left still held.
    LeftUpPending,
    /// Left went up after a middle click, Right still held.
    RightUpPending,
    /// Chord abandoned; forward everything until all buttons are up.
    Passthrough,
    /// Another button interrupted the middle click; swallow both releases.
    IgnoreBoth,
    /// Left is still held from a finished chord and gets swallowed.
    IgnoreLeft,
    /// Right is still held from a finished chord and gets swallowed.
    IgnoreRight,
}

impl ChordState {
    /// States that wait on the chord deadline.
    pub fn has_deadline(self) -> bool {
        matches!(self, ChordState::LeftDown | ChordState::RightDown)
    }
}

impl fmt::Display for ChordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChordState::Idle => "IDLE",
            ChordState::LeftDown => "LEFT_DOWN",
            ChordState::RightDown => "RIGHT_DOWN",
            ChordState::Middle => "MIDDLE",
            ChordState::LeftUpPending => "LEFT_UP_PENDING",
            ChordState::RightUpPending => "RIGHT_UP_PENDING",
            ChordState::Passthrough => "PASSTHROUGH",
            ChordState::IgnoreBoth => "IGNORE_LR",
            ChordState::IgnoreLeft => "IGNORE_L",
            ChordState::IgnoreRight => "IGNORE_R",
        };
        f.write_str(s)
    }
}

/// Input alphabet of the chord detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordEvent {
    LeftDown,
    RightDown,
    LeftUp,
    RightUp,
    /// Any button other than Left/Right, pressed or released.
    Other,
    Timeout,
    /// No chord button is physically held any more.
    AllUp,
}

impl ChordEvent {
    /// Map a raw button change onto the chord alphabet. A real middle button
    /// counts as `Other` and aborts emulation like any third button.
    pub fn classify(button: u16, pressed: bool) -> Self {
        match (button, pressed) {
            (BTN_LEFT, true) => ChordEvent::LeftDown,
            (BTN_LEFT, false) => ChordEvent::LeftUp,
            (BTN_RIGHT, true) => ChordEvent::RightDown,
            (BTN_RIGHT, false) => ChordEvent::RightUp,
            _ => ChordEvent::Other,
        }
    }
}

impl fmt::Display for ChordEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChordEvent::LeftDown => "L_DOWN",
            ChordEvent::RightDown => "R_DOWN",
            ChordEvent::LeftUp => "L_UP",
            ChordEvent::RightUp => "R_UP",
            ChordEvent::Other => "OTHER",
            ChordEvent::Timeout => "TIMEOUT",
            ChordEvent::AllUp => "ALL_UP",
        };
        f.write_str(s)
    }
}

/// Side effects requested by a transition, applied by the owner in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Deliver a button notification downstream.
    Emit(ButtonNotification),
    /// Start the chord deadline; the current event time becomes the chord start.
    ArmTimer { at: Timestamp },
    CancelTimer,
    /// The event is impossible in the current state.
    Defect,
}

/// Clock inputs a transition may need.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Time of the event being processed.
    pub now: Timestamp,
    /// Time of the press that started the current chord attempt.
    pub chord_start: Timestamp,
    /// Chord deadline length in microseconds.
    pub timeout: u64,
}

/// Result of feeding one event to the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ChordState,
    /// Whether the raw event must be withheld from downstream.
    pub suppress: bool,
    pub effects: Vec<Effect>,
}

impl Transition {
    /// Stay put and swallow the event.
    fn stay(state: ChordState) -> Self {
        Self {
            next: state,
            suppress: true,
            effects: Vec::new(),
        }
    }

    /// Stay put and let the event through.
    fn pass(state: ChordState) -> Self {
        Self {
            next: state,
            suppress: false,
            effects: Vec::new(),
        }
    }

    fn defect(state: ChordState) -> Self {
        Self {
            next: state,
            suppress: true,
            effects: vec![Effect::Defect],
        }
    }

    fn emit(mut self, time: Timestamp, button: u16, pressed: bool) -> Self {
        self.effects.push(Effect::Emit(ButtonNotification {
            time,
            button,
            pressed,
        }));
        self
    }

    /// Switch state. Only the chord-wait states run a deadline; entering any
    /// other state cancels it.
    fn enter(mut self, state: ChordState, timing: &Timing) -> Self {
        self.next = state;
        if state.has_deadline() {
            self.effects.push(Effect::ArmTimer {
                at: timing.now.saturating_add(timing.timeout),
            });
        } else {
            self.effects.push(Effect::CancelTimer);
        }
        self
    }

    fn passthrough(mut self) -> Self {
        self.suppress = false;
        self
    }
}

/// Compute the next state and effects for `event` in `state`.
pub fn transition(state: ChordState, event: ChordEvent, timing: &Timing) -> Transition {
    match state {
        ChordState::Idle => idle(event, timing),
        ChordState::LeftDown => first_down(state, BTN_LEFT, event, timing),
        ChordState::RightDown => first_down(state, BTN_RIGHT, event, timing),
        ChordState::Middle => middle(event, timing),
        ChordState::LeftUpPending => left_up_pending(event, timing),
        ChordState::RightUpPending => right_up_pending(event, timing),
        ChordState::Passthrough => passthrough(event, timing),
        ChordState::IgnoreBoth => ignore_both(event, timing),
        ChordState::IgnoreLeft => ignore_left(event, timing),
        ChordState::IgnoreRight => ignore_right(event, timing),
    }
}

fn idle(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::Idle;
    match event {
        ChordEvent::LeftDown => Transition::stay(state).enter(ChordState::LeftDown, t),
        ChordEvent::RightDown => Transition::stay(state).enter(ChordState::RightDown, t),
        // a third button held down blocks chording until everything is up
        ChordEvent::Other => Transition::stay(state)
            .enter(ChordState::Passthrough, t)
            .passthrough(),
        ChordEvent::LeftUp | ChordEvent::RightUp | ChordEvent::Timeout => {
            Transition::defect(state)
        }
        ChordEvent::AllUp => Transition::stay(state),
    }
}

/// `LeftDown` and `RightDown` are mirror images; `held` is the button that
/// started the attempt and whose press is still withheld.
fn first_down(state: ChordState, held: u16, event: ChordEvent, t: &Timing) -> Transition {
    let (other_down, same_up) = if held == BTN_LEFT {
        (ChordEvent::RightDown, ChordEvent::LeftUp)
    } else {
        (ChordEvent::LeftDown, ChordEvent::RightUp)
    };

    match event {
        e if e == other_down => Transition::stay(state)
            .emit(t.now, BTN_MIDDLE, true)
            .enter(ChordState::Middle, t),
        e if e == same_up => Transition::stay(state)
            .emit(t.chord_start, held, true)
            .emit(t.now, held, false)
            .enter(ChordState::Idle, t),
        ChordEvent::Other => Transition::stay(state)
            .emit(t.chord_start, held, true)
            .enter(ChordState::Passthrough, t)
            .passthrough(),
        ChordEvent::Timeout => Transition::stay(state)
            .emit(t.chord_start, held, true)
            .enter(ChordState::Passthrough, t),
        // second press of the held button, release of the absent one, AllUp
        _ => Transition::defect(state),
    }
}

fn middle(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::Middle;
    match event {
        ChordEvent::LeftDown | ChordEvent::RightDown => Transition::defect(state),
        ChordEvent::Other => Transition::stay(state)
            .emit(t.now, BTN_MIDDLE, false)
            .enter(ChordState::IgnoreBoth, t)
            .passthrough(),
        ChordEvent::LeftUp => Transition::stay(state)
            .emit(t.now, BTN_MIDDLE, false)
            .enter(ChordState::RightUpPending, t),
        ChordEvent::RightUp => Transition::stay(state)
            .emit(t.now, BTN_MIDDLE, false)
            .enter(ChordState::LeftUpPending, t),
        ChordEvent::Timeout | ChordEvent::AllUp => Transition::defect(state),
    }
}

fn left_up_pending(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::LeftUpPending;
    match event {
        ChordEvent::RightDown => Transition::stay(state)
            .emit(t.now, BTN_MIDDLE, true)
            .enter(ChordState::Middle, t),
        ChordEvent::Other => Transition::stay(state)
            .enter(ChordState::IgnoreLeft, t)
            .passthrough(),
        ChordEvent::LeftUp => Transition::stay(state).enter(ChordState::Idle, t),
        ChordEvent::LeftDown
        | ChordEvent::RightUp
        | ChordEvent::Timeout
        | ChordEvent::AllUp => Transition::defect(state),
    }
}

fn right_up_pending(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::RightUpPending;
    match event {
        ChordEvent::LeftDown => Transition::stay(state)
            .emit(t.now, BTN_MIDDLE, true)
            .enter(ChordState::Middle, t),
        ChordEvent::Other => Transition::stay(state)
            .enter(ChordState::IgnoreRight, t)
            .passthrough(),
        ChordEvent::RightUp => Transition::stay(state).enter(ChordState::Idle, t),
        ChordEvent::RightDown
        | ChordEvent::LeftUp
        | ChordEvent::Timeout
        | ChordEvent::AllUp => Transition::defect(state),
    }
}

fn passthrough(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::Passthrough;
    match event {
        ChordEvent::LeftDown
        | ChordEvent::RightDown
        | ChordEvent::LeftUp
        | ChordEvent::RightUp
        | ChordEvent::Other => Transition::pass(state),
        ChordEvent::Timeout => Transition::defect(state),
        ChordEvent::AllUp => Transition::stay(state).enter(ChordState::Idle, t),
    }
}

fn ignore_both(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::IgnoreBoth;
    match event {
        ChordEvent::Other => Transition::pass(state),
        ChordEvent::LeftUp => Transition::stay(state).enter(ChordState::IgnoreRight, t),
        ChordEvent::RightUp => Transition::stay(state).enter(ChordState::IgnoreLeft, t),
        ChordEvent::LeftDown
        | ChordEvent::RightDown
        | ChordEvent::Timeout
        | ChordEvent::AllUp => Transition::defect(state),
    }
}

fn ignore_left(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::IgnoreLeft;
    match event {
        ChordEvent::RightDown | ChordEvent::RightUp | ChordEvent::Other => {
            Transition::pass(state)
        }
        ChordEvent::LeftUp => Transition::stay(state).enter(ChordState::Passthrough, t),
        ChordEvent::LeftDown | ChordEvent::Timeout | ChordEvent::AllUp => {
            Transition::defect(state)
        }
    }
}

fn ignore_right(event: ChordEvent, t: &Timing) -> Transition {
    let state = ChordState::IgnoreRight;
    match event {
        ChordEvent::LeftDown | ChordEvent::LeftUp | ChordEvent::Other => {
            Transition::pass(state)
        }
        ChordEvent::RightUp => Transition::stay(state).enter(ChordState::Passthrough, t),
        ChordEvent::RightDown => Transition::defect(state),
        ChordEvent::Timeout | ChordEvent::AllUp => Transition::stay(state),
    }
}

//! Property-based invariant tests for middle-button emulation.
//!
//! Random but physically possible interleavings of Left, Right, a real
//! middle button and a side button, with random gaps so the chord deadline
//! fires at arbitrary points:
//!
//! 1. The deadline is armed exactly while waiting for the second chord button
//! 2. Emulated middle press/release stay balanced
//! 3. AllUp in Idle does nothing
//! 4. Downstream never sees the same button change twice in a row
//! 5. Releasing everything always returns the detector to Idle

use midclick_core::button::{
    ButtonNotification, Timestamp, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_SIDE,
};
use midclick_core::chord::{transition, ChordEvent, ChordState, Effect, Timing};
use midclick_core::emulation::EmulationContext;
use proptest::prelude::*;
use std::collections::HashMap;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    /// Press the button if it is up, release it if it is down.
    Toggle(u16),
    /// Let time pass, in milliseconds.
    Wait(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Toggle(BTN_LEFT)),
        4 => Just(Op::Toggle(BTN_RIGHT)),
        1 => Just(Op::Toggle(BTN_MIDDLE)),
        1 => Just(Op::Toggle(BTN_SIDE)),
        3 => (0u64..120).prop_map(Op::Wait),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 0..80)
}

/// Runs a sequence and records everything a downstream consumer would see.
struct Run {
    ctx: EmulationContext,
    now: Timestamp,
    held: HashMap<u16, bool>,
    emitted: Vec<ButtonNotification>,
    /// Emitted notifications and forwarded raw events, in delivery order.
    downstream: Vec<(u16, bool)>,
}

impl Run {
    fn new() -> Self {
        Self {
            ctx: EmulationContext::new("proptest pointer", true),
            now: 0,
            held: HashMap::new(),
            emitted: Vec::new(),
            downstream: Vec::new(),
        }
    }

    fn fire_due_timer(&mut self) {
        let mut out = Vec::new();
        self.ctx.check_timer(self.now, &mut out);
        self.record(out);
    }

    fn step(&mut self, op: &Op) {
        match *op {
            Op::Wait(ms) => {
                self.now += ms * 1_000;
                self.fire_due_timer();
            }
            Op::Toggle(button) => {
                self.fire_due_timer();
                let pressed = !self.held.get(&button).copied().unwrap_or(false);
                self.held.insert(button, pressed);
                let mut out = Vec::new();
                let suppressed = self.ctx.filter_button(button, pressed, self.now, &mut out);
                self.record(out);
                if !suppressed {
                    self.downstream.push((button, pressed));
                }
            }
        }
    }

    fn record(&mut self, out: Vec<ButtonNotification>) {
        for n in out {
            self.downstream.push((n.button, n.pressed));
            self.emitted.push(n);
        }
    }

    fn release_all(&mut self) {
        let held: Vec<u16> = self
            .held
            .iter()
            .filter(|(_, down)| **down)
            .map(|(b, _)| *b)
            .collect();
        for button in held {
            self.now += 1_000;
            self.step(&Op::Toggle(button));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Deadline armed iff in LeftDown/RightDown
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn deadline_armed_only_while_waiting_for_chord(ops in ops_strategy()) {
        let mut run = Run::new();
        for op in &ops {
            run.step(op);
            let state = run.ctx.state();
            prop_assert_eq!(
                run.ctx.is_timer_armed(),
                matches!(state, ChordState::LeftDown | ChordState::RightDown),
                "state {} after {:?}", state, op
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Emulated middle press/release balance
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn emulated_middle_stays_balanced(ops in ops_strategy()) {
        let mut run = Run::new();
        for op in &ops {
            run.step(op);
        }
        run.release_all();

        let mut down: i64 = 0;
        for n in run.emitted.iter().filter(|n| n.button == BTN_MIDDLE) {
            down += if n.pressed { 1 } else { -1 };
            prop_assert!((0..=1).contains(&down), "unbalanced middle: {:?}", run.emitted);
        }
        prop_assert_eq!(down, 0, "middle left pressed after full release");
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. AllUp is a no-op in Idle
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn all_up_in_idle_is_noop(now in any::<u32>(), start in any::<u32>()) {
        let timing = Timing {
            now: u64::from(now),
            chord_start: u64::from(start),
            timeout: 50_000,
        };
        let tr = transition(ChordState::Idle, ChordEvent::AllUp, &timing);
        prop_assert_eq!(tr.next, ChordState::Idle);
        prop_assert!(!tr.effects.iter().any(|e| matches!(e, Effect::Emit(_))));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. No duplicate presses or releases downstream
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn downstream_never_repeats_a_button_change(ops in ops_strategy()) {
        let mut run = Run::new();
        for op in &ops {
            run.step(op);
        }
        run.release_all();

        let mut last: HashMap<u16, bool> = HashMap::new();
        for &(button, pressed) in &run.downstream {
            let previous = last.insert(button, pressed);
            prop_assert_ne!(
                previous, Some(pressed),
                "button {:#x} repeated {} in {:?}", button, pressed, run.downstream
            );
            if previous.is_none() {
                prop_assert!(pressed, "release of {:#x} before any press", button);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 5. Full release resets detection
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn releasing_everything_returns_to_idle(ops in ops_strategy()) {
        let mut run = Run::new();
        for op in &ops {
            run.step(op);
        }
        run.release_all();
        prop_assert_eq!(run.ctx.state(), ChordState::Idle);
        prop_assert_eq!(run.ctx.held_mask(), 0);
        prop_assert!(!run.ctx.is_timer_armed());
    }
}

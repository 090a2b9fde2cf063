//! Time-based debouncing of the polled button lines.
//!
//! A line must hold the same raw level for a full debounce window before a
//! press or release registers. Only presses produce events, and at most one
//! event leaves each poll: lines are scanned in [`Button::ALL`] order and
//! the first press wins. Later lines that also qualified keep their state
//! and fire on the following poll.

use embassy_time::{Duration, Instant};

use crate::fsm::Event;
use crate::input::{Button, Level, BUTTON_COUNT};

/// Per-line debounce state. Owned by the controller task only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonState {
    pub button: Button,
    pub raw_level: Level,
    pub last_transition: Instant,
    pub is_pressed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Press,
    Release,
}

impl ButtonState {
    pub fn new(button: Button, now: Instant) -> Self {
        Self {
            button,
            raw_level: Level::High,
            last_transition: now,
            is_pressed: false,
        }
    }

    fn track(&mut self, level: Level, now: Instant) {
        if level != self.raw_level {
            self.raw_level = level;
            self.last_transition = now;
        }
    }

    fn stable_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_transition)
    }

    fn settle(&mut self, now: Instant, window: Duration) -> Option<Edge> {
        if self.stable_for(now) < window {
            return None;
        }
        match (self.is_pressed, self.raw_level.is_active()) {
            (false, true) => {
                self.is_pressed = true;
                Some(Edge::Press)
            }
            (true, false) => {
                self.is_pressed = false;
                Some(Edge::Release)
            }
            _ => None,
        }
    }
}

pub struct Debouncer {
    lines: [ButtonState; BUTTON_COUNT],
    window: Duration,
}

impl Debouncer {
    /// All lines start released at `now`.
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            lines: Button::ALL.map(|b| ButtonState::new(b, now)),
            window,
        }
    }

    /// Feed one sample of every line. Returns the event for the first line
    /// (in priority order) whose debounced press completed on this poll.
    pub fn poll(&mut self, levels: [Level; BUTTON_COUNT], now: Instant) -> Option<Event> {
        let mut event = None;
        for (line, level) in self.lines.iter_mut().zip(levels) {
            line.track(level, now);
            if event.is_some() {
                continue;
            }
            if line.settle(now, self.window) == Some(Edge::Press) {
                event = Some(line.button.event());
            }
        }
        event
    }

    pub fn state(&self, button: Button) -> &ButtonState {
        &self.lines[button as usize]
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(50);

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn only(button: Button) -> [Level; BUTTON_COUNT] {
        let mut levels = [Level::High; BUTTON_COUNT];
        levels[button as usize] = Level::Low;
        levels
    }

    const IDLE: [Level; BUTTON_COUNT] = [Level::High; BUTTON_COUNT];

    /// Poll every 10 ms from `from` to `to` (exclusive) with `levels(t)`.
    fn run(
        d: &mut Debouncer,
        from: u64,
        to: u64,
        levels: impl Fn(u64) -> [Level; BUTTON_COUNT],
    ) -> std::vec::Vec<(u64, Event)> {
        (from..to)
            .step_by(10)
            .filter_map(|t| d.poll(levels(t), at(t)).map(|e| (t, e)))
            .collect()
    }

    #[test]
    fn steady_press_fires_once_after_window() {
        let mut d = Debouncer::new(WINDOW, at(0));
        let events = run(&mut d, 0, 300, |_| only(Button::Down));
        assert_eq!(events, [(50, Event::Down)]);
        assert!(d.state(Button::Down).is_pressed);
    }

    #[test]
    fn two_presses_within_window_yield_one_event() {
        let mut d = Debouncer::new(WINDOW, at(0));
        // Press at 0, bounce open at 10, press again at 20 and hold.
        let events = run(&mut d, 0, 200, |t| {
            if t == 10 {
                IDLE
            } else {
                only(Button::Select1)
            }
        });
        assert_eq!(events, [(70, Event::Select1)]);
    }

    #[test]
    fn short_glitch_never_fires() {
        let mut d = Debouncer::new(WINDOW, at(0));
        let events = run(&mut d, 0, 200, |t| {
            if (10..40).contains(&t) {
                only(Button::Up)
            } else {
                IDLE
            }
        });
        assert!(events.is_empty());
    }

    #[test]
    fn release_emits_nothing_and_rearms() {
        let mut d = Debouncer::new(WINDOW, at(0));
        let mut events = run(&mut d, 0, 100, |_| only(Button::Left));
        events.extend(run(&mut d, 100, 200, |_| IDLE));
        assert!(!d.state(Button::Left).is_pressed);
        events.extend(run(&mut d, 200, 300, |_| only(Button::Left)));
        assert_eq!(events, [(50, Event::Left), (250, Event::Left)]);
    }

    #[test]
    fn first_line_wins_and_next_fires_on_following_poll() {
        let mut d = Debouncer::new(WINDOW, at(0));
        let both = |_: u64| {
            let mut l = only(Button::Up);
            l[Button::Select2 as usize] = Level::Low;
            l
        };
        let events = run(&mut d, 0, 100, both);
        assert_eq!(events, [(50, Event::Up), (60, Event::Select2)]);
    }

    #[test]
    fn clock_going_backwards_does_not_panic() {
        let mut d = Debouncer::new(WINDOW, at(100));
        assert_eq!(d.poll(only(Button::Up), at(50)), None);
    }
}

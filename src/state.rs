//! Shared application state (the model).
//!
//! One `AppState` exists per run. It is constructed explicitly at start-up
//! and shared by reference with the input task (writer) and the render
//! tasks (readers). All access goes through one async mutex with a bounded
//! wait:
//!
//! - reads that lose the race return the last value any caller observed;
//! - writes that lose the race report `Outcome::Busy` and change nothing.
//!
//! Each applied change bumps `version`. Renderers compare it against the
//! version they last drew, so several of them can detect the same change
//! independently. The legacy single `changed` flag is kept for callers
//! that only need "something happened since I last cleared it".

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration};

use crate::clock::{Clock, DateTime};
use crate::config::StateTimeouts;
use crate::error::Error;
use crate::fsm::{next_action, Action, Event, FsmState};
use crate::sync::{RawMutex, SyncHub};
use crate::todo::{TodoList, TodoSummary};

/// Result of a mutation attempt.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The model changed.
    Applied,
    /// Valid call, nothing to do: value already current, out of range,
    /// or the model has been torn down.
    Ignored,
    /// The state lock was not available within its budget. Retry later.
    Busy,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Outcome::Busy)
    }
}

/// Everything a renderer needs, read under one lock acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub menu_index: usize,
    pub fsm_state: FsmState,
    pub changed: bool,
    pub version: u32,
    pub last_time: Option<DateTime>,
    pub todo: TodoSummary,
}

impl Snapshot {
    const INITIAL: Snapshot = Snapshot {
        menu_index: 0,
        fsm_state: FsmState::Menu,
        changed: false,
        version: 0,
        last_time: None,
        todo: TodoSummary {
            total: 0,
            completed: 0,
            percent: 0,
        },
    };
}

pub(crate) struct Model {
    menu_index: usize,
    fsm_state: FsmState,
    changed: bool,
    version: u32,
    last_time: Option<DateTime>,
    todo: TodoList,
}

impl Model {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            menu_index: self.menu_index,
            fsm_state: self.fsm_state,
            changed: self.changed,
            version: self.version,
            last_time: self.last_time,
            todo: self.todo.summary(),
        }
    }

    fn mark_changed(&mut self) {
        self.changed = true;
        self.version = self.version.wrapping_add(1);
    }

    fn enter(&mut self, state: FsmState) -> bool {
        if self.fsm_state == state {
            return false;
        }
        self.fsm_state = state;
        true
    }

    /// Apply a transition. Returns whether index or state moved.
    fn apply(&mut self, action: Action, len: usize) -> bool {
        match action {
            Action::PrevItem => {
                self.menu_index = (self.menu_index + len - 1) % len;
                true
            }
            Action::NextItem => {
                self.menu_index = (self.menu_index + 1) % len;
                true
            }
            Action::Enter(_) | Action::ConfirmExit => match action.target_state() {
                Some(target) => self.enter(target),
                None => false,
            },
            Action::RefreshTime | Action::SettingsAction | Action::Ignore => false,
        }
    }
}

pub struct AppState<'a> {
    hub: &'a SyncHub,
    menu: &'static [&'static str],
    model: Mutex<RawMutex, Model>,
    last_seen: BlockingMutex<RawMutex, Cell<Snapshot>>,
    open: AtomicBool,
    timeouts: StateTimeouts,
}

impl<'a> AppState<'a> {
    /// Build the model around a non-empty menu. Starts on `Menu`, index 0.
    pub fn new(hub: &'a SyncHub, menu: &'static [&'static str]) -> Result<Self, Error> {
        Self::with_timeouts(hub, menu, StateTimeouts::default())
    }

    pub fn with_timeouts(
        hub: &'a SyncHub,
        menu: &'static [&'static str],
        timeouts: StateTimeouts,
    ) -> Result<Self, Error> {
        if menu.is_empty() {
            return Err(Error::EmptyMenu);
        }
        Ok(Self {
            hub,
            menu,
            model: Mutex::new(Model {
                menu_index: 0,
                fsm_state: FsmState::Menu,
                changed: false,
                version: 0,
                last_time: None,
                todo: TodoList::new(),
            }),
            last_seen: BlockingMutex::new(Cell::new(Snapshot::INITIAL)),
            open: AtomicBool::new(true),
            timeouts,
        })
    }

    async fn lock(&self, timeout: Duration) -> Option<MutexGuard<'_, RawMutex, Model>> {
        with_timeout(timeout, self.model.lock()).await.ok()
    }

    fn remember(&self, model: &Model) -> Snapshot {
        let snap = model.snapshot();
        self.last_seen.lock(|c| c.set(snap));
        snap
    }

    fn cached(&self) -> Snapshot {
        self.last_seen.lock(|c| c.get())
    }

    /// Run `f` on the model under the write budget. `f` returns whether it
    /// changed anything; an applied change bumps the version, sets the
    /// shared flag and posts an advisory message.
    async fn mutate<F>(&self, f: F) -> Outcome
    where
        F: FnOnce(&mut Model, usize) -> bool,
    {
        if !self.is_open() {
            return Outcome::Ignored;
        }
        let Some(mut model) = self.lock(self.timeouts.write).await else {
            return Outcome::Busy;
        };
        if !f(&mut model, self.menu.len()) {
            self.remember(&model);
            return Outcome::Ignored;
        }
        model.mark_changed();
        let snap = self.remember(&model);
        drop(model);
        self.hub.notify_state_change(snap.fsm_state, snap.menu_index);
        Outcome::Applied
    }

    // Menu index

    pub async fn menu_index(&self) -> usize {
        match self.lock(self.timeouts.read).await {
            Some(model) => self.remember(&model).menu_index,
            None => self.cached().menu_index,
        }
    }

    /// Jump to `index`. Out-of-range or unchanged values are ignored and
    /// leave the `changed` flag alone.
    pub async fn set_menu_index(&self, index: usize) -> Outcome {
        self.mutate(|m, len| {
            if index >= len || index == m.menu_index {
                return false;
            }
            m.menu_index = index;
            true
        })
        .await
    }

    /// Move down one entry, wrapping to the top.
    pub async fn increment_menu_index(&self) -> Outcome {
        self.mutate(|m, len| m.apply(Action::NextItem, len)).await
    }

    /// Move up one entry, wrapping to the bottom.
    pub async fn decrement_menu_index(&self) -> Outcome {
        self.mutate(|m, len| m.apply(Action::PrevItem, len)).await
    }

    // FSM state

    pub async fn state(&self) -> FsmState {
        match self.lock(self.timeouts.read).await {
            Some(model) => self.remember(&model).fsm_state,
            None => self.cached().fsm_state,
        }
    }

    /// Switch screens. Setting the current state is a no-op.
    pub async fn set_state(&self, state: FsmState) -> Outcome {
        let outcome = self.mutate(|m, _| m.enter(state)).await;
        if outcome.is_applied() {
            info!("State changed to: {:?}", state);
        }
        outcome
    }

    /// Run one FSM step for `event`: read state and index, pick the action
    /// and apply it, all under one lock hold.
    ///
    /// On `Busy` the event is dropped and the action reported as `Ignore`.
    pub async fn apply_event(&self, event: Event) -> (Action, Outcome) {
        let mut action = Action::Ignore;
        let outcome = self
            .mutate(|m, len| {
                action = next_action(m.fsm_state, event, m.menu_index);
                m.apply(action, len)
            })
            .await;
        (action, outcome)
    }

    // Change tracking

    pub async fn has_changed(&self) -> bool {
        match self.lock(self.timeouts.changed).await {
            Some(model) => self.remember(&model).changed,
            None => self.cached().changed,
        }
    }

    /// Clear the shared `changed` flag.
    pub async fn clear_changed(&self) -> Outcome {
        let Some(mut model) = self.lock(self.timeouts.read).await else {
            return Outcome::Busy;
        };
        if !model.changed {
            return Outcome::Ignored;
        }
        model.changed = false;
        self.remember(&model);
        Outcome::Applied
    }

    /// Clear the `changed` flag only if no change landed after `version`.
    ///
    /// Renderers call this after drawing `version` so a change made while
    /// they were drawing stays flagged for everyone else.
    pub async fn acknowledge(&self, version: u32) -> Outcome {
        let Some(mut model) = self.lock(self.timeouts.read).await else {
            return Outcome::Busy;
        };
        if !model.changed || model.version != version {
            return Outcome::Ignored;
        }
        model.changed = false;
        self.remember(&model);
        Outcome::Applied
    }

    /// Monotonic change counter.
    pub async fn version(&self) -> u32 {
        match self.lock(self.timeouts.read).await {
            Some(model) => self.remember(&model).version,
            None => self.cached().version,
        }
    }

    /// All renderable fields from one lock acquisition, or the last
    /// observed snapshot if the lock is busy.
    pub async fn snapshot(&self) -> Snapshot {
        match self.lock(self.timeouts.read).await {
            Some(model) => self.remember(&model),
            None => self.cached(),
        }
    }

    // Time

    /// Pull the current time from `clock`. No-op (and no error) when the
    /// clock is unavailable or the read fails. Does not mark the model
    /// changed: time is a mirror, not navigation state.
    pub async fn update_time<C: Clock>(&self, clock: &mut C) -> Outcome {
        if !clock.available() {
            return Outcome::Ignored;
        }
        match clock.now() {
            Some(now) => self.set_time(now).await,
            None => Outcome::Ignored,
        }
    }

    pub async fn set_time(&self, now: DateTime) -> Outcome {
        if !self.is_open() {
            return Outcome::Ignored;
        }
        let Some(mut model) = self.lock(self.timeouts.write).await else {
            return Outcome::Busy;
        };
        model.last_time = Some(now);
        self.remember(&model);
        Outcome::Applied
    }

    pub async fn time(&self) -> Option<DateTime> {
        match self.lock(self.timeouts.read).await {
            Some(model) => self.remember(&model).last_time,
            None => self.cached().last_time,
        }
    }

    /// Wait for the lock without a bound and return the time mirror.
    pub async fn wait_for_time(&self) -> Option<DateTime> {
        let model = self.model.lock().await;
        self.remember(&model).last_time
    }

    // Menu data

    pub fn menu_len(&self) -> usize {
        self.menu.len()
    }

    pub fn menu_items(&self) -> &'static [&'static str] {
        self.menu
    }

    /// Item label, or "Invalid" for an out-of-range index.
    pub fn menu_item(&self, index: usize) -> &'static str {
        self.menu.get(index).copied().unwrap_or("Invalid")
    }

    pub async fn current_menu_item(&self) -> &'static str {
        self.menu_item(self.menu_index().await)
    }

    // To-do list

    /// Run `f` against the to-do list. `None` if the lock was busy or the
    /// model is closed. Changes to the list do not bump the version; the
    /// Settings screen picks them up on its next redraw.
    pub async fn with_todo<R>(&self, f: impl FnOnce(&mut TodoList) -> R) -> Option<R> {
        if !self.is_open() {
            return None;
        }
        let mut model = self.lock(self.timeouts.write).await?;
        let out = f(&mut model.todo);
        self.remember(&model);
        Some(out)
    }

    /// Hold the state lock, as a slow renderer would.
    #[cfg(test)]
    pub(crate) async fn lock_for_test(&self) -> MutexGuard<'_, RawMutex, Model> {
        self.model.lock().await
    }

    // Lifecycle

    /// Tear down: every later mutation is ignored. Reads keep working.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        debug!("App state closed");
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MENU_ITEMS;
    use crate::sync::Flags;
    use embassy_futures::block_on;

    fn fixture(hub: &SyncHub) -> AppState<'_> {
        AppState::new(hub, &MENU_ITEMS).unwrap()
    }

    #[test]
    fn starts_on_menu_at_zero_unchanged() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            assert_eq!(state.menu_index().await, 0);
            assert_eq!(state.state().await, FsmState::Menu);
            assert!(!state.has_changed().await);
            assert_eq!(state.version().await, 0);
        });
    }

    #[test]
    fn empty_menu_is_rejected() {
        let hub = SyncHub::new();
        assert_eq!(AppState::new(&hub, &[]).err(), Some(Error::EmptyMenu));
    }

    #[test]
    fn increment_and_decrement_wrap() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            assert!(state.decrement_menu_index().await.is_applied());
            assert_eq!(state.menu_index().await, 3);
            assert!(state.increment_menu_index().await.is_applied());
            assert_eq!(state.menu_index().await, 0);
        });
    }

    #[test]
    fn out_of_range_index_is_a_silent_noop() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            let before = state.snapshot().await;
            assert_eq!(state.set_menu_index(4).await, Outcome::Ignored);
            assert_eq!(state.set_menu_index(usize::MAX).await, Outcome::Ignored);
            assert_eq!(state.snapshot().await, before);
        });
    }

    #[test]
    fn setting_same_state_does_not_mark_changed() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            assert_eq!(state.set_state(FsmState::Menu).await, Outcome::Ignored);
            assert!(!state.has_changed().await);

            assert_eq!(state.set_state(FsmState::About).await, Outcome::Applied);
            assert!(state.has_changed().await);
            assert_eq!(state.version().await, 1);
        });
        assert!(hub.flags().contains(Flags::STATE_CHANGED));
        assert!(hub.message_count() >= 1);
    }

    #[test]
    fn changed_flag_persists_until_cleared() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            let _ = state.set_menu_index(2).await;
            for _ in 0..5 {
                assert!(state.has_changed().await);
                let _ = state.snapshot().await;
            }
            assert_eq!(state.clear_changed().await, Outcome::Applied);
            assert!(!state.has_changed().await);
            assert_eq!(state.clear_changed().await, Outcome::Ignored);
        });
    }

    #[test]
    fn acknowledge_keeps_flag_when_newer_change_landed() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            let _ = state.increment_menu_index().await;
            let drawn = state.version().await;
            let _ = state.increment_menu_index().await;
            assert_eq!(state.acknowledge(drawn).await, Outcome::Ignored);
            assert!(state.has_changed().await);
            let latest = state.version().await;
            assert_eq!(state.acknowledge(latest).await, Outcome::Applied);
            assert!(!state.has_changed().await);
        });
    }

    #[test]
    fn busy_lock_returns_last_observed_values() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            let _ = state.set_menu_index(2).await;
            let _ = state.set_state(FsmState::Settings).await;

            let held = state.model.lock().await;
            assert_eq!(state.menu_index().await, 2);
            assert_eq!(state.state().await, FsmState::Settings);
            assert_eq!(state.increment_menu_index().await, Outcome::Busy);
            assert_eq!(state.clear_changed().await, Outcome::Busy);
            drop(held);

            assert_eq!(state.menu_index().await, 2);
        });
    }

    #[test]
    fn time_read_uses_the_read_budget() {
        let hub = SyncHub::new();
        let timeouts = StateTimeouts {
            read: Duration::from_millis(5),
            changed: Duration::from_millis(5),
            write: Duration::from_secs(5),
        };
        let state = AppState::with_timeouts(&hub, &MENU_ITEMS, timeouts).unwrap();
        let t = DateTime::new(2024, 5, 6, 7, 8, 9);
        block_on(async {
            assert!(state.set_time(t).await.is_applied());
            let held = state.model.lock().await;
            let start = std::time::Instant::now();
            assert_eq!(state.time().await, Some(t));
            assert!(start.elapsed() < std::time::Duration::from_secs(1));
            drop(held);
        });
    }

    struct FixedClock(Option<DateTime>, bool);

    impl Clock for FixedClock {
        fn available(&self) -> bool {
            self.1
        }
        fn now(&mut self) -> Option<DateTime> {
            self.0
        }
    }

    #[test]
    fn update_time_is_noop_without_clock() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        let t = DateTime::new(2024, 1, 2, 3, 4, 5);
        block_on(async {
            let mut missing = FixedClock(Some(t), false);
            assert_eq!(state.update_time(&mut missing).await, Outcome::Ignored);
            assert_eq!(state.time().await, None);

            let mut rtc = FixedClock(Some(t), true);
            assert_eq!(state.update_time(&mut rtc).await, Outcome::Applied);
            assert_eq!(state.wait_for_time().await, Some(t));
            assert!(!state.has_changed().await);

            let mut broken = FixedClock(None, true);
            assert_eq!(state.update_time(&mut broken).await, Outcome::Ignored);
            assert_eq!(state.time().await, Some(t));
        });
    }

    #[test]
    fn apply_event_walks_the_menu() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            assert_eq!(
                state.apply_event(Event::Down).await,
                (Action::NextItem, Outcome::Applied)
            );
            assert_eq!(
                state.apply_event(Event::Select1).await,
                (Action::Enter(FsmState::Settings), Outcome::Applied)
            );
            assert_eq!(
                state.apply_event(Event::Up).await,
                (Action::Ignore, Outcome::Ignored)
            );
            assert_eq!(
                state.apply_event(Event::Select2).await,
                (Action::Enter(FsmState::Menu), Outcome::Applied)
            );
            assert_eq!(state.menu_index().await, 1);
            assert_eq!(state.version().await, 3);
        });
    }

    #[test]
    fn home_select_changes_nothing() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            let (action, outcome) = state.apply_event(Event::Select1).await;
            assert_eq!(action, Action::RefreshTime);
            assert_eq!(outcome, Outcome::Ignored);
            assert!(!state.has_changed().await);
        });
    }

    #[test]
    fn menu_item_lookup() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        assert_eq!(state.menu_len(), 4);
        assert_eq!(state.menu_item(1), "Settings");
        assert_eq!(state.menu_item(7), "Invalid");
        block_on(async {
            let _ = state.set_menu_index(3).await;
            assert_eq!(state.current_menu_item().await, "Exit");
        });
    }

    #[test]
    fn closed_state_ignores_mutations() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        state.close();
        block_on(async {
            assert_eq!(state.increment_menu_index().await, Outcome::Ignored);
            assert_eq!(state.set_state(FsmState::About).await, Outcome::Ignored);
            assert!(state.with_todo(|t| t.add("x", 3, 0)).await.is_none());
            assert_eq!(state.menu_index().await, 0);
        });
    }

    #[test]
    fn todo_summary_is_part_of_snapshot() {
        let hub = SyncHub::new();
        let state = fixture(&hub);
        block_on(async {
            let id = state.with_todo(|t| t.add("write docs", 4, 0)).await.flatten().unwrap();
            let _ = state.with_todo(|t| t.add("review", 3, 0)).await;
            let _ = state.with_todo(|t| t.toggle_complete(id)).await;
            let snap = state.snapshot().await;
            assert_eq!(snap.todo.total, 2);
            assert_eq!(snap.todo.completed, 1);
            assert_eq!(snap.todo.percent, 50);
        });
    }
}

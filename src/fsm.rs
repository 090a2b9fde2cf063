//! Menu navigation state machine.
//!
//! The transition table is a pure function of `(state, event, menu_index)`
//! returning an `Action`; applying that action to the shared model is the
//! controller's job. Every pair not listed below maps to `Action::Ignore`.

/// Screens the UI can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsmState {
    /// Main menu with the selectable item list.
    Menu,
    /// Settings page.
    Settings,
    /// About page.
    About,
    /// Exit confirmation prompt.
    ConfirmExit,
}

impl FsmState {
    pub const ALL: [FsmState; 4] = [
        FsmState::Menu,
        FsmState::Settings,
        FsmState::About,
        FsmState::ConfirmExit,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            FsmState::Menu => "Main Menu",
            FsmState::Settings => "Settings",
            FsmState::About => "About",
            FsmState::ConfirmExit => "Confirm Exit",
        }
    }
}

/// Abstract input events (after debouncing).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Up,
    Down,
    Left,
    Right,
    Select1,
    Select2,
    /// Reserved for auto-return-to-menu; no transition today.
    Timeout,
    None,
}

impl Event {
    pub const ALL: [Event; 8] = [
        Event::Up,
        Event::Down,
        Event::Left,
        Event::Right,
        Event::Select1,
        Event::Select2,
        Event::Timeout,
        Event::None,
    ];
}

/// What a transition asks the model to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Move the menu cursor up (wraps).
    PrevItem,
    /// Move the menu cursor down (wraps).
    NextItem,
    /// "Home" selected: refresh the time mirror, no state change.
    RefreshTime,
    /// Switch to another screen.
    Enter(FsmState),
    /// Settings primary action. Hook for future settings editing.
    SettingsAction,
    /// Exit confirmed. Returns to the menu; real power-down is not wired.
    ConfirmExit,
    /// Nothing to do for this (state, event) pair.
    Ignore,
}

impl Action {
    /// The screen this action ends on, if it switches screens.
    pub fn target_state(&self) -> Option<FsmState> {
        match self {
            Action::Enter(s) => Some(*s),
            Action::ConfirmExit => Some(FsmState::Menu),
            _ => None,
        }
    }
}

/// Map the selected menu entry to its `Select1` action.
pub fn menu_selection(menu_index: usize) -> Action {
    match menu_index {
        0 => Action::RefreshTime,
        1 => Action::Enter(FsmState::Settings),
        2 => Action::Enter(FsmState::About),
        3 => Action::Enter(FsmState::ConfirmExit),
        _ => Action::Ignore,
    }
}

/// Core transition table.
pub fn next_action(state: FsmState, event: Event, menu_index: usize) -> Action {
    use Event::*;
    use FsmState::*;

    match (state, event) {
        // Menu
        (Menu, Up) => Action::PrevItem,
        (Menu, Down) => Action::NextItem,
        (Menu, Select1) => menu_selection(menu_index),

        // Settings
        (Settings, Left | Select2) => Action::Enter(Menu),
        (Settings, Select1) => Action::SettingsAction,

        // About
        (About, Left | Select2) => Action::Enter(Menu),

        // ConfirmExit
        (ConfirmExit, Select1) => Action::ConfirmExit,
        (ConfirmExit, Left | Select2) => Action::Enter(Menu),

        // Default: stay in current state
        _ => Action::Ignore,
    }
}

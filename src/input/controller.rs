//! Controller task: poll, debounce, drive the FSM.

use embassy_time::{Duration, Instant};

use crate::config::Timing;
use crate::fsm::{Action, Event};
use crate::input::{Debouncer, InputLines};
use crate::state::{AppState, Outcome};
use crate::sync::{Flags, SyncHub, SystemMessage};

pub struct InputProcessor<'a, I> {
    hub: &'a SyncHub,
    state: &'a AppState<'a>,
    lines: I,
    debouncer: Debouncer,
    poll: Duration,
}

impl<'a, I: InputLines> InputProcessor<'a, I> {
    pub fn new(hub: &'a SyncHub, state: &'a AppState<'a>, lines: I, timing: &Timing) -> Self {
        Self {
            hub,
            state,
            lines,
            debouncer: Debouncer::new(timing.debounce, Instant::now()),
            poll: timing.input_poll,
        }
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Sample the lines once at `now` and dispatch the debounced event,
    /// if any.
    pub async fn poll_at(&mut self, now: Instant) -> Option<(Event, Outcome)> {
        let event = self.debouncer.poll(self.lines.levels(), now)?;
        let outcome = self.dispatch(event).await;
        Some((event, outcome))
    }

    /// Feed one event through the FSM.
    ///
    /// A busy state lock drops the event; the user presses again.
    pub async fn dispatch(&self, event: Event) -> Outcome {
        let _ = self.hub.try_send(SystemMessage::ButtonEvent(event));

        let (action, outcome) = self.state.apply_event(event).await;
        match (action, outcome) {
            (_, Outcome::Busy) => debug!("State busy, {:?} dropped", event),
            (Action::RefreshTime, _) => {
                info!("Home selected");
                self.hub.request_time_refresh();
            }
            (Action::SettingsAction, _) => info!("Settings action"),
            (Action::ConfirmExit, _) => info!("Exit confirmed - back to menu"),
            (Action::Enter(target), Outcome::Applied) => info!("State changed to: {:?}", target),
            (Action::Ignore, _) => trace!("{:?} ignored", event),
            _ => {}
        }
        outcome
    }

    /// Task body: report ready, poll until shutdown, acknowledge stop.
    pub async fn run(mut self) {
        self.hub.notify_controller_ready();

        while !self.hub.is_shutdown() {
            let _ = self.poll_at(Instant::now()).await;
            let _ = self.hub.flags().wait_any(Flags::SHUTDOWN, self.poll).await;
        }

        self.hub.flags().set(Flags::CONTROLLER_STOPPED);
        debug!("Controller task stopped");
    }
}

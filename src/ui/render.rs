//! Per-display render task.
//!
//! Each task wakes at its display's refresh period, takes one snapshot of
//! the model and redraws only when something it shows has moved on. A
//! full frame is drawn while holding the display lock, so two displays on
//! the same bus never interleave partial frames.

use embassy_time::Duration;

use crate::clock::DateTime;
use crate::config::Timing;
use crate::error::{Component, Error};
use crate::fsm::FsmState;
use crate::state::{AppState, Snapshot};
use crate::sync::{Flags, SyncHub, SystemMessage, DEFAULT_TIMEOUT};
use crate::ui::{CharPanel, Display, DisplayId, Frame, OledPanel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Drawn {
    state: FsmState,
    version: u32,
    time: Option<DateTime>,
}

/// What one renderer last put on its glass.
///
/// Each renderer keeps its own cursor and compares the model version with
/// the one it drew, so one renderer acknowledging a change never hides it
/// from another.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderCursor {
    drawn: Option<Drawn>,
}

impl RenderCursor {
    pub const fn new() -> Self {
        Self { drawn: None }
    }

    /// Redraw on the first tick, on a new screen, on a new model version,
    /// while the shared `changed` flag is up, or when a time-bearing
    /// screen has a newer time.
    pub fn needs_render(&self, snap: &Snapshot, shows_time: bool) -> bool {
        let Some(drawn) = self.drawn else {
            return true;
        };
        snap.changed
            || drawn.state != snap.fsm_state
            || drawn.version != snap.version
            || (shows_time && drawn.time != snap.last_time)
    }

    pub fn mark(&mut self, snap: &Snapshot) {
        self.drawn = Some(Drawn {
            state: snap.fsm_state,
            version: snap.version,
            time: snap.last_time,
        });
    }

    pub fn last_version(&self) -> Option<u32> {
        self.drawn.map(|d| d.version)
    }
}

pub struct RenderTask<'a, O, L> {
    hub: &'a SyncHub,
    state: &'a AppState<'a>,
    display: Display<O, L>,
    period: Duration,
    lock_timeout: Duration,
    cursor: RenderCursor,
}

impl<'a, O: OledPanel, L: CharPanel> RenderTask<'a, O, L> {
    pub fn new(
        hub: &'a SyncHub,
        state: &'a AppState<'a>,
        display: Display<O, L>,
        timing: &Timing,
    ) -> Self {
        let period = display.refresh_period(timing);
        Self {
            hub,
            state,
            display,
            period,
            lock_timeout: timing.display_lock,
            cursor: RenderCursor::new(),
        }
    }

    pub fn id(&self) -> DisplayId {
        self.display.id()
    }

    pub fn display(&self) -> &Display<O, L> {
        &self.display
    }

    pub fn cursor(&self) -> &RenderCursor {
        &self.cursor
    }

    /// Initialise the panel under the display lock and report ready.
    ///
    /// On failure the ready flag is never set, so start-up times out and
    /// names this display as missing.
    pub async fn start(&mut self) -> Result<(), Error> {
        let id = self.id();
        let Some(_guard) = self.hub.lock_display(DEFAULT_TIMEOUT).await else {
            return Err(Error::InitFailed(Component::Display(id)));
        };
        self.display
            .init()
            .map_err(|_| Error::InitFailed(Component::Display(id)))?;
        self.hub.notify_display_ready(id);
        Ok(())
    }

    /// One refresh cycle. Returns `true` if a frame was drawn.
    ///
    /// Skips (and retries next tick) if the display lock or the panel is
    /// unavailable.
    pub async fn tick(&mut self) -> bool {
        let snap = self.state.snapshot().await;
        if !self
            .cursor
            .needs_render(&snap, self.display.shows_time(snap.fsm_state))
        {
            return false;
        }

        let id = self.id();
        let Some(guard) = self.hub.lock_display(self.lock_timeout).await else {
            trace!("{} display busy, render deferred", id.name());
            return false;
        };
        let frame = Frame::new(&snap, self.state.menu_items());
        let drawn = self.display.render(&frame);
        drop(guard);

        if let Err(e) = drawn {
            warn!("{} render failed: {:?}", id.name(), e);
            return false;
        }

        let _ = self.state.acknowledge(snap.version).await;
        if self.cursor.last_version() != Some(snap.version) {
            let _ = self.hub.try_send(SystemMessage::DisplayUpdate(id));
        }
        self.cursor.mark(&snap);
        true
    }

    /// Blank the panel and acknowledge stop.
    pub async fn stop(&mut self) {
        let id = self.id();
        match self.hub.lock_display(self.lock_timeout).await {
            Some(_guard) => {
                if self.display.clear().is_err() {
                    warn!("{} clear failed", id.name());
                }
            }
            None => warn!("{} display busy at shutdown, left as is", id.name()),
        }
        self.hub.flags().set(id.stopped_flag());
        debug!("{} task stopped", id.name());
    }

    /// Task body: start, refresh until shutdown, stop.
    pub async fn run(mut self) {
        let id = self.id();
        if let Err(e) = self.start().await {
            error!("{} display init failed: {:?}", id.name(), e);
            self.hub.flags().set(id.stopped_flag());
            return;
        }
        info!("{} task started", id.name());

        while !self.hub.is_shutdown() {
            self.tick().await;
            // Sleeps one period, wakes early on shutdown.
            let _ = self.hub.flags().wait_any(Flags::SHUTDOWN, self.period).await;
        }

        self.stop().await;
    }
}

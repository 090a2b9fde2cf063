//! Start-up handshake, periodic health check and ordered teardown.
//!
//! Start-up: wait (bounded) for the controller and both displays to report
//! ready, then mark the system `OPERATIONAL`. A missing signal is reported
//! with the bits that never arrived and `OPERATIONAL` is never set.
//!
//! Health: every period, log queue pressure and stack headroom; every
//! status period, print a short report under the console lock. When the
//! shutdown flag goes up, run the teardown.
//!
//! Teardown: controller first, then the displays, then the clock. Each
//! task is asked to stop via `SHUTDOWN` and confirms with its own stopped
//! flag; no task is torn down while it could still hold a lock. Only then
//! are the model and the hub closed.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant};

use crate::config::{Timing, QUEUE_WARN_THRESHOLD, STACK_HEADROOM_WARN_BYTES};
use crate::error::Error;
use crate::state::AppState;
use crate::sync::{Flags, SyncHub, SystemMessage, DEFAULT_TIMEOUT};

/// Word written over unused stack at boot.
pub const STACK_PAINT: u32 = 0xC0FF_EE00;

/// Reports how much stack the deepest call chain has left untouched.
pub trait HeadroomProbe {
    /// Remaining bytes, or `None` if this target can't tell.
    fn headroom(&self) -> Option<usize>;
}

/// Probe for targets without a painted stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProbe;

impl HeadroomProbe for NoProbe {
    fn headroom(&self) -> Option<usize> {
        None
    }
}

/// Count the bytes at the low end of a painted stack region that still
/// carry [`STACK_PAINT`]. The stack grows down, so the first word that
/// differs marks the deepest point reached.
pub fn untouched_bytes(region: &[u32]) -> usize {
    region.iter().take_while(|w| **w == STACK_PAINT).count() * core::mem::size_of::<u32>()
}

/// Wait for every task to report ready within `timeout`.
///
/// On success sets `OPERATIONAL`. On timeout returns
/// `Error::StartupTimeout` naming the missing bits.
pub async fn await_ready(hub: &SyncHub, timeout: Duration) -> Result<(), Error> {
    match hub.wait_for_system_ready(timeout).await {
        Ok(_) => {
            hub.flags().set(Flags::OPERATIONAL);
            match hub.lock_console().await {
                Some(_console) => info!("=== System Ready ==="),
                None => info!("System ready"),
            }
            Ok(())
        }
        Err(missing) => {
            error!("System startup timeout, missing {:?}", missing);
            Err(Error::StartupTimeout { missing })
        }
    }
}

/// Start-up policy: wait for every task to report ready, and on timeout
/// stop the tasks that did come up before returning the error. A failed
/// start-up never leaves a partly running system behind.
pub async fn startup(hub: &SyncHub, state: &AppState<'_>, timing: &Timing) -> Result<(), Error> {
    let Err(e) = await_ready(hub, timing.ready_timeout).await else {
        return Ok(());
    };
    let report = teardown(hub, state, timing).await;
    if !report.is_clean() {
        warn!("Tasks still running after failed start-up: {:?}", report.missing);
    }
    Err(e)
}

/// One health sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HealthReport {
    pub queued: usize,
    pub queue_pressure: bool,
    pub headroom: Option<usize>,
    pub low_headroom: bool,
    pub shutdown: bool,
}

pub struct HealthMonitor<'a, P> {
    hub: &'a SyncHub,
    state: &'a AppState<'a>,
    probe: P,
    timing: Timing,
    started: Instant,
    last_report: Instant,
}

impl<'a, P: HeadroomProbe> HealthMonitor<'a, P> {
    pub fn new(hub: &'a SyncHub, state: &'a AppState<'a>, probe: P, timing: &Timing) -> Self {
        let now = Instant::now();
        Self {
            hub,
            state,
            probe,
            timing: *timing,
            started: now,
            last_report: now,
        }
    }

    /// Sample queue fill, stack headroom and the shutdown flag. Pressure
    /// is logged, never acted on.
    pub fn check(&self) -> HealthReport {
        let queued = self.hub.message_count();
        let queue_pressure = queued > QUEUE_WARN_THRESHOLD;
        if queue_pressure {
            warn!("Message queue filling up ({} messages)", queued);
        }

        let headroom = self.probe.headroom();
        let low_headroom = matches!(headroom, Some(b) if b < STACK_HEADROOM_WARN_BYTES);
        if low_headroom {
            warn!("Low stack headroom: {} bytes", headroom.unwrap_or(0));
        }

        HealthReport {
            queued,
            queue_pressure,
            headroom,
            low_headroom,
            shutdown: self.hub.is_shutdown(),
        }
    }

    /// Print uptime and headroom if the status period has elapsed.
    /// Returns `true` if the report was written.
    pub async fn report_status(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_report) < self.timing.status_report {
            return false;
        }
        let Some(_console) = self.hub.lock_console().await else {
            trace!("Console busy, status report skipped");
            return false;
        };
        self.last_report = now;

        let snap = self.state.snapshot().await;
        let uptime = now.saturating_duration_since(self.started).as_secs();
        info!("System uptime: {} s", uptime);
        info!(
            "Stack headroom: {} bytes, queue: {}/{}",
            self.probe.headroom().unwrap_or(0),
            self.hub.message_count(),
            self.hub.message_capacity()
        );
        info!(
            "Screen: {:?}, item {}, tasks {}/{}",
            snap.fsm_state,
            snap.menu_index,
            snap.todo.completed,
            snap.todo.total
        );
        true
    }

    /// Task body. Checks every health period until shutdown is observed,
    /// then runs the teardown and returns its report.
    pub async fn run(mut self) -> TeardownReport {
        loop {
            let _ = self
                .hub
                .flags()
                .wait_any(Flags::SHUTDOWN, self.timing.health_period)
                .await;

            let report = self.check();
            if report.shutdown {
                match self.hub.lock_console().await {
                    Some(_console) => info!("Shutdown signal received, cleaning up..."),
                    None => info!("Shutdown signal received"),
                }
                return teardown(self.hub, self.state, &self.timing).await;
            }
            let _ = self.report_status(Instant::now()).await;
        }
    }
}

/// Which tasks confirmed stop during teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TeardownReport {
    pub stopped: Flags,
    pub missing: Flags,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Stop order: controller, OLED, LCD, clock.
pub const TEARDOWN_ORDER: [Flags; 4] = [
    Flags::CONTROLLER_STOPPED,
    Flags::OLED_STOPPED,
    Flags::LCD_STOPPED,
    Flags::CLOCK_STOPPED,
];

/// Ask every task to stop, wait for each acknowledgement in order
/// (bounded per task), then close the model and the hub.
pub async fn teardown(hub: &SyncHub, state: &AppState<'_>, timing: &Timing) -> TeardownReport {
    hub.signal_shutdown();

    let mut stopped = Flags::empty();
    let mut missing = Flags::empty();
    for flag in TEARDOWN_ORDER {
        match hub.flags().wait_all(flag, timing.teardown_ack).await {
            Ok(_) => stopped |= flag,
            Err(_) => {
                warn!("No stop acknowledgement for {:?}", flag);
                missing |= flag;
            }
        }
    }

    state.close();
    hub.close();
    info!("Cleanup complete");

    TeardownReport { stopped, missing }
}

/// Drain the advisory queue into the log until shutdown.
pub async fn run_event_log(hub: &SyncHub) {
    while !hub.is_shutdown() {
        let next = select(
            hub.receive_message(DEFAULT_TIMEOUT),
            hub.flags().wait_any(Flags::SHUTDOWN, DEFAULT_TIMEOUT),
        )
        .await;
        match next {
            Either::First(Some(msg)) => log_message(&msg),
            Either::First(None) | Either::Second(_) => {}
        }
    }
}

fn log_message(msg: &SystemMessage) {
    match msg {
        SystemMessage::StateChange { state, menu_index } => {
            trace!("msg: state {:?} index {}", state, menu_index)
        }
        SystemMessage::ButtonEvent(event) => trace!("msg: button {:?}", event),
        SystemMessage::DisplayUpdate(id) => trace!("msg: {} redrawn", id.name()),
        SystemMessage::SystemEvent { code, param } => {
            debug!("msg: system event {} ({})", code, param)
        }
    }
}

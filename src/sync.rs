//! Cross-task coordination: locks, the advisory message queue and the
//! readiness / shutdown flags.
//!
//! `SyncHub` knows nothing about menus or displays. It is constructed once
//! at start-up and handed to every task by reference (a `StaticCell` on
//! target, a stack value shared across scoped threads in tests).
//!
//! Every blocking operation takes a bound. Lock helpers return `Option`
//! so a caller that loses the race has to decide, explicitly, to skip this
//! cycle and retry on the next one.

use core::cell::RefCell;
use core::future::poll_fn;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll};

use bitflags::bitflags;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;
use embassy_sync::waitqueue::MultiWakerRegistration;
use embassy_time::{with_timeout, Duration};

use crate::config::{
    CONSOLE_LOCK_TIMEOUT_MS, DEFAULT_TIMEOUT_MS, FLAG_WAITERS, MESSAGE_QUEUE_SIZE,
};
use crate::fsm::{Event, FsmState};
use crate::ui::DisplayId;

/// Raw mutex used for every primitive. Tasks run on executors of
/// different interrupt priorities, so a critical section is required.
pub type RawMutex = CriticalSectionRawMutex;

/// Held while a display task draws a full frame.
pub type DisplayGuard<'a> = MutexGuard<'a, RawMutex, ()>;

/// Held while a multi-line report is written to the console.
pub type ConsoleGuard<'a> = MutexGuard<'a, RawMutex, ()>;

/// Default bound for queue and flag waits.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

bitflags! {
    /// System-wide event bits.
    ///
    /// Readiness and stop bits are monotone for one run; `SHUTDOWN` is
    /// terminal. Only `STATE_CHANGED` may be cleared.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u16 {
        const STATE_CHANGED      = 1 << 0;
        const CONTROLLER_READY   = 1 << 1;
        const OLED_READY         = 1 << 2;
        const LCD_READY          = 1 << 3;
        const SHUTDOWN           = 1 << 4;
        const OPERATIONAL        = 1 << 5;
        const CONTROLLER_STOPPED = 1 << 6;
        const OLED_STOPPED       = 1 << 7;
        const LCD_STOPPED        = 1 << 8;
        const CLOCK_STOPPED      = 1 << 9;

        /// Every display has come up.
        const DISPLAY_READY = Self::OLED_READY.bits() | Self::LCD_READY.bits();
        /// What start-up waits for.
        const SYSTEM_READY = Self::CONTROLLER_READY.bits() | Self::DISPLAY_READY.bits();
        /// Bits that `clear` is allowed to touch.
        const CLEARABLE = Self::STATE_CHANGED.bits();
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Flags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Flags({=u16:#x})", self.bits())
    }
}

/// Advisory notifications. Nothing in the FSM depends on these being
/// delivered; they exist for diagnostics and future consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemMessage {
    StateChange { state: FsmState, menu_index: u8 },
    ButtonEvent(Event),
    DisplayUpdate(DisplayId),
    SystemEvent { code: u16, param: u16 },
}

struct FlagState {
    bits: Flags,
    waiters: MultiWakerRegistration<FLAG_WAITERS>,
}

/// Event-group style flags: any task may set bits and any number of tasks
/// may wait for some or all of a mask.
pub struct EventFlags {
    inner: BlockingMutex<RawMutex, RefCell<FlagState>>,
}

impl EventFlags {
    pub const fn new() -> Self {
        Self {
            inner: BlockingMutex::new(RefCell::new(FlagState {
                bits: Flags::empty(),
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    /// Set `flags` and wake every waiter.
    pub fn set(&self, flags: Flags) {
        self.inner.lock(|s| {
            let mut s = s.borrow_mut();
            s.bits |= flags;
            s.waiters.wake();
        });
    }

    /// Clear `flags`. Readiness, stop and shutdown bits are ignored.
    pub fn clear(&self, flags: Flags) {
        self.inner.lock(|s| {
            s.borrow_mut().bits &= !(flags & Flags::CLEARABLE);
        });
    }

    pub fn current(&self) -> Flags {
        self.inner.lock(|s| s.borrow().bits)
    }

    pub fn contains(&self, flags: Flags) -> bool {
        self.current().contains(flags)
    }

    fn poll_mask(&self, cx: &mut Context<'_>, mask: Flags, all: bool) -> Poll<Flags> {
        self.inner.lock(|s| {
            let mut s = s.borrow_mut();
            let hit = if all {
                s.bits.contains(mask)
            } else {
                s.bits.intersects(mask)
            };
            if hit {
                Poll::Ready(s.bits)
            } else {
                s.waiters.register(cx.waker());
                Poll::Pending
            }
        })
    }

    /// Wait until every bit in `mask` is set.
    ///
    /// Returns the full flag word on success, or the bits of `mask` that
    /// were still missing when the bound expired.
    pub async fn wait_all(&self, mask: Flags, timeout: Duration) -> Result<Flags, Flags> {
        match with_timeout(timeout, poll_fn(|cx| self.poll_mask(cx, mask, true))).await {
            Ok(bits) => Ok(bits),
            Err(_) => Err(mask - self.current()),
        }
    }

    /// Wait until at least one bit in `mask` is set.
    pub async fn wait_any(&self, mask: Flags, timeout: Duration) -> Option<Flags> {
        with_timeout(timeout, poll_fn(|cx| self.poll_mask(cx, mask, false)))
            .await
            .ok()
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the display and console locks, the message queue and the flags.
pub struct SyncHub {
    display: Mutex<RawMutex, ()>,
    console: Mutex<RawMutex, ()>,
    queue: Channel<RawMutex, SystemMessage, MESSAGE_QUEUE_SIZE>,
    flags: EventFlags,
    time_refresh: Signal<RawMutex, ()>,
    closed: AtomicBool,
}

impl SyncHub {
    pub const fn new() -> Self {
        Self {
            display: Mutex::new(()),
            console: Mutex::new(()),
            queue: Channel::new(),
            flags: EventFlags::new(),
            time_refresh: Signal::new(),
            closed: AtomicBool::new(false),
        }
    }

    // Locks

    /// Take the display lock, giving up after `timeout`.
    pub async fn lock_display(&self, timeout: Duration) -> Option<DisplayGuard<'_>> {
        with_timeout(timeout, self.display.lock()).await.ok()
    }

    /// Take the console lock with the standard 100 ms budget.
    pub async fn lock_console(&self) -> Option<ConsoleGuard<'_>> {
        with_timeout(
            Duration::from_millis(CONSOLE_LOCK_TIMEOUT_MS),
            self.console.lock(),
        )
        .await
        .ok()
    }

    // Message queue

    /// Queue a message, waiting up to `timeout` for space.
    pub async fn send_message(&self, msg: SystemMessage, timeout: Duration) -> bool {
        if self.is_closed() {
            return false;
        }
        with_timeout(timeout, self.queue.send(msg)).await.is_ok()
    }

    /// Queue a message only if there is room right now.
    pub fn try_send(&self, msg: SystemMessage) -> bool {
        !self.is_closed() && self.queue.try_send(msg).is_ok()
    }

    /// Take the oldest message, waiting up to `timeout` for one.
    pub async fn receive_message(&self, timeout: Duration) -> Option<SystemMessage> {
        with_timeout(timeout, self.queue.receive()).await.ok()
    }

    pub fn try_receive(&self) -> Option<SystemMessage> {
        self.queue.try_receive().ok()
    }

    pub fn message_count(&self) -> usize {
        self.queue.len()
    }

    pub fn message_capacity(&self) -> usize {
        MESSAGE_QUEUE_SIZE
    }

    // Flags

    pub fn flags(&self) -> &EventFlags {
        &self.flags
    }

    /// Record a model change: sets `STATE_CHANGED` and posts an advisory
    /// message without blocking. A full queue drops the message.
    pub fn notify_state_change(&self, state: FsmState, menu_index: usize) {
        self.flags.set(Flags::STATE_CHANGED);
        let msg = SystemMessage::StateChange {
            state,
            menu_index: menu_index.min(u8::MAX as usize) as u8,
        };
        if !self.try_send(msg) {
            trace!("message queue full, state change not posted");
        }
    }

    pub fn notify_controller_ready(&self) {
        self.flags.set(Flags::CONTROLLER_READY);
        info!("Controller system ready");
    }

    pub fn notify_display_ready(&self, id: DisplayId) {
        self.flags.set(id.ready_flag());
        info!("{} display ready", id.name());
    }

    pub fn signal_shutdown(&self) {
        self.flags.set(Flags::SHUTDOWN);
        info!("System shutdown signaled");
    }

    pub fn is_shutdown(&self) -> bool {
        self.flags.contains(Flags::SHUTDOWN)
    }

    /// Wait for the controller and every display to report ready.
    pub async fn wait_for_system_ready(&self, timeout: Duration) -> Result<Flags, Flags> {
        self.flags.wait_all(Flags::SYSTEM_READY, timeout).await
    }

    // Clock refresh requests

    /// Ask the clock task to refresh the time mirror now.
    pub fn request_time_refresh(&self) {
        self.time_refresh.signal(());
    }

    pub(crate) fn time_refresh(&self) -> &Signal<RawMutex, ()> {
        &self.time_refresh
    }

    // Teardown

    /// Final release: refuse further messages and drop anything queued.
    /// Called by teardown after every task has acknowledged stop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.queue.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn readiness_bits_cannot_be_cleared() {
        let flags = EventFlags::new();
        flags.set(Flags::CONTROLLER_READY | Flags::STATE_CHANGED | Flags::SHUTDOWN);
        flags.clear(Flags::all());
        assert_eq!(flags.current(), Flags::CONTROLLER_READY | Flags::SHUTDOWN);
    }

    #[test]
    fn wait_all_reports_missing_bits_on_timeout() {
        let flags = EventFlags::new();
        flags.set(Flags::CONTROLLER_READY | Flags::OLED_READY);
        let res = block_on(flags.wait_all(Flags::SYSTEM_READY, Duration::from_millis(20)));
        assert_eq!(res, Err(Flags::LCD_READY));
    }

    #[test]
    fn wait_all_returns_immediately_when_set() {
        let flags = EventFlags::new();
        flags.set(Flags::SYSTEM_READY);
        let res = block_on(flags.wait_all(Flags::SYSTEM_READY, Duration::from_millis(1)));
        assert!(res.unwrap().contains(Flags::SYSTEM_READY));
    }

    #[test]
    fn wait_any_sees_bit_set_from_other_thread() {
        let flags = EventFlags::new();
        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                flags.set(Flags::SHUTDOWN);
            });
            let got = block_on(flags.wait_any(
                Flags::SHUTDOWN | Flags::OPERATIONAL,
                Duration::from_millis(1000),
            ));
            assert_eq!(got, Some(Flags::SHUTDOWN));
        });
    }

    #[test]
    fn queue_is_bounded_and_fifo() {
        let hub = SyncHub::new();
        for i in 0..MESSAGE_QUEUE_SIZE as u16 {
            assert!(hub.try_send(SystemMessage::SystemEvent { code: i, param: 0 }));
        }
        assert!(!hub.try_send(SystemMessage::SystemEvent { code: 99, param: 0 }));
        assert_eq!(hub.message_count(), MESSAGE_QUEUE_SIZE);

        let sent = block_on(hub.send_message(
            SystemMessage::SystemEvent { code: 99, param: 0 },
            Duration::from_millis(10),
        ));
        assert!(!sent);

        assert_eq!(
            hub.try_receive(),
            Some(SystemMessage::SystemEvent { code: 0, param: 0 })
        );
        assert_eq!(hub.message_count(), MESSAGE_QUEUE_SIZE - 1);
    }

    #[test]
    fn state_change_notification_never_blocks_on_full_queue() {
        let hub = SyncHub::new();
        for _ in 0..MESSAGE_QUEUE_SIZE + 3 {
            hub.notify_state_change(FsmState::Menu, 1);
        }
        assert_eq!(hub.message_count(), MESSAGE_QUEUE_SIZE);
        assert!(hub.flags().contains(Flags::STATE_CHANGED));
    }

    #[test]
    fn display_lock_times_out_while_held() {
        let hub = SyncHub::new();
        block_on(async {
            let held = hub.lock_display(Duration::from_millis(10)).await;
            assert!(held.is_some());
            assert!(hub.lock_display(Duration::from_millis(10)).await.is_none());
            drop(held);
            assert!(hub.lock_display(Duration::from_millis(10)).await.is_some());
        });
    }

    #[test]
    fn closed_hub_rejects_messages() {
        let hub = SyncHub::new();
        assert!(hub.try_send(SystemMessage::ButtonEvent(Event::Up)));
        hub.close();
        assert_eq!(hub.message_count(), 0);
        assert!(!hub.try_send(SystemMessage::ButtonEvent(Event::Down)));
        assert!(hub.is_closed());
    }

    #[test]
    fn receive_times_out_on_empty_queue() {
        let hub = SyncHub::new();
        assert_eq!(block_on(hub.receive_message(Duration::from_millis(5))), None);
    }
}

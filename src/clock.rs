//! Wall-clock mirror.
//!
//! The RTC is an optional peripheral. When it is missing the model keeps
//! whatever time it last saw (or none), and screens show stale or
//! placeholder text. Nothing here ever fails the caller.

use core::fmt::Write;

use embassy_futures::select::{select, Either};
use embassy_time::Duration;
use heapless::String;

use crate::state::AppState;
use crate::sync::{Flags, SyncHub};

/// Calendar time as read from the RTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// `true` if every field is within its calendar range.
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }

    /// "HH:MM:SS"
    pub fn format_hms(&self) -> String<8> {
        let mut s = String::new();
        let _ = write!(s, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second);
        s
    }

    /// "HH:MM:SS DD/MM/YYYY"
    pub fn format_full(&self) -> String<19> {
        let mut s = String::new();
        let _ = write!(
            s,
            "{:02}:{:02}:{:02} {:02}/{:02}/{:04}",
            self.hour, self.minute, self.second, self.day, self.month, self.year
        );
        s
    }
}

/// Source of wall-clock time.
pub trait Clock {
    /// Whether the peripheral answered at start-up.
    fn available(&self) -> bool;

    /// Current time, or `None` if the read failed.
    fn now(&mut self) -> Option<DateTime>;
}

/// Stand-in used when no RTC is fitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoClock;

impl Clock for NoClock {
    fn available(&self) -> bool {
        false
    }

    fn now(&mut self) -> Option<DateTime> {
        None
    }
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn available(&self) -> bool {
        (**self).available()
    }

    fn now(&mut self) -> Option<DateTime> {
        (**self).now()
    }
}

/// Keep `AppState::last_time` in step with the RTC.
///
/// Refreshes once per `period`, or immediately when the controller asks
/// via `SyncHub::request_time_refresh`. Wakes early on shutdown, exits and
/// acknowledges with `CLOCK_STOPPED`.
pub async fn run_clock<C: Clock>(
    hub: &SyncHub,
    state: &AppState<'_>,
    mut clock: C,
    period: Duration,
) {
    if clock.available() {
        info!("Clock task started");
    } else {
        warn!("RTC not available - time will not be shown");
    }

    let _ = state.update_time(&mut clock).await;
    while !hub.is_shutdown() {
        let woke = select(
            hub.flags().wait_any(Flags::SHUTDOWN, period),
            hub.time_refresh().wait(),
        )
        .await;
        match woke {
            Either::First(Some(_)) => break,
            Either::First(None) => {
                let _ = state.update_time(&mut clock).await;
            }
            Either::Second(_) => {
                let _ = state.update_time(&mut clock).await;
                if let Some(now) = state.time().await {
                    info!("Home selected - Current Time: {}", now.format_full().as_str());
                }
            }
        }
    }

    hub.flags().set(Flags::CLOCK_STOPPED);
    debug!("Clock task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MENU_ITEMS;
    use core::sync::atomic::{AtomicU8, Ordering};
    use embassy_futures::block_on;

    #[test]
    fn formats_pad_with_zeroes() {
        let t = DateTime::new(2024, 3, 7, 9, 5, 1);
        assert_eq!(t.format_hms().as_str(), "09:05:01");
        assert_eq!(t.format_full().as_str(), "09:05:01 07/03/2024");
    }

    #[test]
    fn validity_checks_ranges() {
        assert!(DateTime::new(2024, 12, 31, 23, 59, 59).is_valid());
        assert!(!DateTime::new(2024, 13, 1, 0, 0, 0).is_valid());
        assert!(!DateTime::new(2024, 1, 0, 0, 0, 0).is_valid());
        assert!(!DateTime::new(2024, 1, 1, 24, 0, 0).is_valid());
    }

    /// Clock whose seconds count the reads made so far.
    struct Counting<'c>(&'c AtomicU8);

    impl Clock for Counting<'_> {
        fn available(&self) -> bool {
            true
        }

        fn now(&mut self) -> Option<DateTime> {
            let second = self.0.fetch_add(1, Ordering::SeqCst);
            Some(DateTime::new(2024, 1, 1, 12, 0, second))
        }
    }

    #[test]
    fn refresh_request_reads_the_clock_before_reporting() {
        let hub = SyncHub::new();
        let state = AppState::new(&hub, &MENU_ITEMS).unwrap();
        let reads = AtomicU8::new(0);
        std::thread::scope(|s| {
            s.spawn(|| block_on(run_clock(&hub, &state, Counting(&reads), Duration::from_secs(10))));

            std::thread::sleep(std::time::Duration::from_millis(20));
            assert_eq!(reads.load(Ordering::SeqCst), 1);
            hub.request_time_refresh();
            std::thread::sleep(std::time::Duration::from_millis(20));
            assert_eq!(reads.load(Ordering::SeqCst), 2);
            let shown = block_on(state.time()).map(|t| t.second);
            assert_eq!(shown, Some(1));

            hub.signal_shutdown();
        });
        assert!(hub.flags().contains(Flags::CLOCK_STOPPED));
    }

    #[test]
    fn shutdown_wakes_a_long_period() {
        let hub = SyncHub::new();
        let state = AppState::new(&hub, &MENU_ITEMS).unwrap();
        std::thread::scope(|s| {
            s.spawn(|| block_on(run_clock(&hub, &state, NoClock, Duration::from_secs(60))));
            std::thread::sleep(std::time::Duration::from_millis(20));
            hub.signal_shutdown();
            let acked = block_on(
                hub.flags()
                    .wait_all(Flags::CLOCK_STOPPED, Duration::from_millis(200)),
            );
            assert!(acked.is_ok());
        });
    }

    #[test]
    fn no_clock_is_unavailable() {
        let mut c = NoClock;
        assert!(!c.available());
        assert_eq!(c.now(), None);
    }
}

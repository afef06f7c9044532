//! Debounced edge detection, kept free of I/O so tests drive it with
//! synthetic clocks.

use core_events::{PRESSES_ACCEPTED, PRESSES_DEBOUNCED};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Number of physical button channels the kiosk samples.
pub const BUTTON_COUNT: usize = 2;

/// Rising-edge detector with one debounce window shared across both channels.
///
/// Both channels share a single last-accepted timestamp, so near-simultaneous
/// presses cannot register twice across the two buttons.
/// When both channels rise in the same poll tick, the lower-numbered channel
/// is evaluated first, its acceptance moves the timestamp, and the other
/// channel's edge falls inside the window. Suppressed edges are dropped, not
/// queued, and are not retried on later ticks (the level is high by then, so
/// there is no rising edge left to see).
#[derive(Debug)]
pub struct EdgeDetector {
    previous: [bool; BUTTON_COUNT],
    last_accepted: Option<Instant>,
    window: Duration,
}

impl EdgeDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            previous: [false; BUTTON_COUNT],
            last_accepted: None,
            window,
        }
    }

    /// Feed one poll tick of sampled levels. Returns the channel whose press
    /// was accepted this tick, if any. At most one press per tick.
    pub fn sample(&mut self, levels: [bool; BUTTON_COUNT], now: Instant) -> Option<usize> {
        let mut accepted = None;
        for (channel, &level) in levels.iter().enumerate() {
            let rising = level && !self.previous[channel];
            if rising {
                if accepted.is_none() && self.window_elapsed(now) {
                    self.last_accepted = Some(now);
                    accepted = Some(channel);
                    PRESSES_ACCEPTED.fetch_add(1, Ordering::Relaxed);
                } else {
                    PRESSES_DEBOUNCED.fetch_add(1, Ordering::Relaxed);
                }
            }
            self.previous[channel] = level;
        }
        accepted
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        match self.last_accepted {
            None => true,
            Some(last) => now.duration_since(last) >= self.window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(50);

    fn ticks(start: Instant, step_ms: u64) -> impl Iterator<Item = Instant> {
        (0u64..).map(move |i| start + Duration::from_millis(i * step_ms))
    }

    #[test]
    fn clean_rising_edge_is_accepted() {
        let mut det = EdgeDetector::new(WINDOW);
        let mut clock = ticks(Instant::now(), 10);
        assert_eq!(det.sample([false, false], clock.next().unwrap()), None);
        assert_eq!(det.sample([true, false], clock.next().unwrap()), Some(0));
    }

    #[test]
    fn level_held_high_emits_once() {
        let mut det = EdgeDetector::new(WINDOW);
        let mut clock = ticks(Instant::now(), 10);
        assert_eq!(det.sample([true, false], clock.next().unwrap()), Some(0));
        for _ in 0..20 {
            assert_eq!(det.sample([true, false], clock.next().unwrap()), None);
        }
    }

    #[test]
    fn release_never_emits() {
        let mut det = EdgeDetector::new(WINDOW);
        let mut clock = ticks(Instant::now(), 10);
        det.sample([true, false], clock.next().unwrap());
        assert_eq!(det.sample([false, false], clock.next().unwrap()), None);
    }

    #[test]
    fn double_toggle_inside_window_yields_one_press() {
        let mut det = EdgeDetector::new(WINDOW);
        let start = Instant::now();
        // Press, release, press again all within 30 ms < 50 ms window.
        assert_eq!(det.sample([true, false], start), Some(0));
        assert_eq!(
            det.sample([false, false], start + Duration::from_millis(10)),
            None
        );
        assert_eq!(
            det.sample([true, false], start + Duration::from_millis(20)),
            None
        );
    }

    #[test]
    fn double_toggle_with_full_gap_yields_two_presses() {
        let mut det = EdgeDetector::new(WINDOW);
        let start = Instant::now();
        assert_eq!(det.sample([true, false], start), Some(0));
        assert_eq!(
            det.sample([false, false], start + Duration::from_millis(25)),
            None
        );
        assert_eq!(
            det.sample([true, false], start + Duration::from_millis(50)),
            Some(0)
        );
    }

    #[test]
    fn same_tick_double_press_accepts_first_channel_only() {
        let mut det = EdgeDetector::new(WINDOW);
        let start = Instant::now();
        assert_eq!(det.sample([true, true], start), Some(0));
        // Channel 1 stays high on the following ticks: its edge was consumed,
        // not deferred, so nothing further is emitted.
        assert_eq!(
            det.sample([true, true], start + Duration::from_millis(10)),
            None
        );
        assert_eq!(
            det.sample([true, true], start + Duration::from_millis(100)),
            None
        );
    }

    #[test]
    fn suppressed_channel_fires_after_release_and_gap() {
        let mut det = EdgeDetector::new(WINDOW);
        let start = Instant::now();
        assert_eq!(det.sample([true, true], start), Some(0));
        assert_eq!(
            det.sample([false, false], start + Duration::from_millis(10)),
            None
        );
        assert_eq!(
            det.sample([false, true], start + Duration::from_millis(60)),
            Some(1)
        );
    }

    #[test]
    fn cross_channel_presses_share_one_window() {
        let mut det = EdgeDetector::new(WINDOW);
        let start = Instant::now();
        assert_eq!(det.sample([true, false], start), Some(0));
        // Button 1 rises 20 ms later, inside the window opened by button 0.
        assert_eq!(
            det.sample([true, true], start + Duration::from_millis(20)),
            None
        );
    }

    #[test]
    fn first_press_ever_needs_no_prior_gap() {
        let mut det = EdgeDetector::new(WINDOW);
        assert_eq!(det.sample([false, true], Instant::now()), Some(1));
    }
}

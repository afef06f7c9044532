//! Core command types and channel helpers for Duet.
//!
//! Everything that crosses a thread boundary in the kiosk is defined here:
//! the command vocabulary, the bounded command channel, the process-wide
//! shutdown flag, and the telemetry counters the other crates increment.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// The dispatcher consumes from a bounded crossbeam channel sized by `COMMAND_CHANNEL_CAP`.
// Producers (button poll thread, foreground key source) must never block and never observe an
// error on a full channel: a command that does not fit is dropped and counted. The consumer
// drains every iteration, so the channel is empty in practice; the capacity absorbs bursts.
// -------------------------------------------------------------------------------------------------
pub const COMMAND_CHANNEL_CAP: usize = 64;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Simple atomic counters (no locking, fetch_add relaxed). Incremented at the event site, read by
// unit tests and logged once at shutdown. A future metrics integration can export them; for now
// they keep drop/debounce behavior observable without a metrics dependency.
// -------------------------------------------------------------------------------------------------
pub static COMMANDS_ENQUEUED: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_DROPPED_FULL: AtomicU64 = AtomicU64::new(0); // try_send hit a full channel
pub static PRESSES_ACCEPTED: AtomicU64 = AtomicU64::new(0);
pub static PRESSES_DEBOUNCED: AtomicU64 = AtomicU64::new(0); // edges suppressed inside the window
pub static READ_FAILURES: AtomicU64 = AtomicU64::new(0); // transient hardware read errors
// Poll task lifecycle telemetry
pub static POLL_STARTS: AtomicU64 = AtomicU64::new(0);
pub static POLL_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static POLL_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
// Vote worker telemetry
pub static VOTES_ENQUEUED: AtomicU64 = AtomicU64::new(0);
pub static VOTES_FAILED: AtomicU64 = AtomicU64::new(0);

/// Which half of a pair the user picked.
///
/// The wire protocol numbers the halves: right is option `1`, left is
/// option `2`. That mapping is fixed by the vote server, not a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Numeric vote option for the remote coordinator.
    pub fn vote_option(self) -> u8 {
        match self {
            Side::Right => 1,
            Side::Left => 2,
        }
    }
}

/// Commands consumed by the render dispatcher, strictly in enqueue order.
///
/// `Display` may be enqueued redundantly in bursts; applying a stale one is
/// harmless because the renderer always draws the gallery's current state,
/// never a captured snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Display,
    /// Highlight the chosen side, record the vote, settle, then advance.
    VoteAndAdvance(Side),
    /// Re-sync the asset store and rebuild the collection.
    Reload,
    Quit,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Next => "next",
            Command::Previous => "previous",
            Command::Display => "display",
            Command::VoteAndAdvance(Side::Left) => "vote_left",
            Command::VoteAndAdvance(Side::Right) => "vote_right",
            Command::Reload => "reload",
            Command::Quit => "quit",
        }
    }
}

/// Foreground window/keyboard events drained by the dispatcher every
/// iteration, before the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    CloseRequested,
    /// The surface was resized or exposed and wants the current frame again.
    RedrawNeeded,
    Key(KeyCode),
}

/// Normalized logical keys the kiosk reacts to. Anything else is ignored at
/// the surface layer and never reaches translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Esc,
    Left,
    Right,
}

// -------------------------------------------------------------------------------------------------
// Command channel
// -------------------------------------------------------------------------------------------------

/// Producer half of the command channel. Cloneable; every producer shares the
/// drop-on-full policy documented at [`COMMAND_CHANNEL_CAP`].
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: crossbeam_channel::Sender<Command>,
}

/// Consumer half. Single consumer by convention (the dispatcher loop); the
/// type does not enforce it beyond not being `Clone`.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: crossbeam_channel::Receiver<Command>,
}

/// Create the bounded command channel with the standard capacity.
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    command_channel_with_cap(COMMAND_CHANNEL_CAP)
}

/// Capacity-parameterized constructor so tests can force the full-channel path.
pub fn command_channel_with_cap(cap: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(cap);
    (CommandSender { tx }, CommandReceiver { rx })
}

impl CommandSender {
    /// Enqueue without blocking. Returns `false` only when the consumer is
    /// gone (channel disconnected); the producer loop should exit then. A
    /// full channel drops the command, counts it, and still returns `true`.
    pub fn send(&self, cmd: Command) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => {
                COMMANDS_ENQUEUED.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(crossbeam_channel::TrySendError::Full(dropped)) => {
                COMMANDS_DROPPED_FULL.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "events.channel",
                    command = dropped.as_str(),
                    "command_dropped_channel_full"
                );
                true
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }
}

impl CommandReceiver {
    /// Non-blocking drain of exactly one command.
    pub fn try_next(&self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// Commands currently queued. Used by tests and the shutdown log line.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

// -------------------------------------------------------------------------------------------------
// Shutdown flag
// -------------------------------------------------------------------------------------------------

/// Process-wide cooperative shutdown flag.
///
/// Set once (quit event or fatal error) and observed by both loops at their
/// next iteration boundary. Worst-case shutdown latency is therefore one poll
/// interval on the input side; nothing is interrupted mid-operation.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn side_vote_options_match_wire_protocol() {
        assert_eq!(Side::Right.vote_option(), 1);
        assert_eq!(Side::Left.vote_option(), 2);
    }

    #[test]
    fn channel_preserves_fifo_order() {
        let (tx, rx) = command_channel();
        tx.send(Command::Next);
        tx.send(Command::Display);
        tx.send(Command::VoteAndAdvance(Side::Left));
        assert_eq!(rx.try_next(), Some(Command::Next));
        assert_eq!(rx.try_next(), Some(Command::Display));
        assert_eq!(rx.try_next(), Some(Command::VoteAndAdvance(Side::Left)));
        assert_eq!(rx.try_next(), None);
    }

    #[test]
    fn send_never_blocks_when_full_and_counts_drops() {
        let (tx, rx) = command_channel_with_cap(2);
        let before = COMMANDS_DROPPED_FULL.load(Ordering::Relaxed);
        // Two fit, the rest fall on the floor without blocking this thread.
        for _ in 0..10 {
            assert!(tx.send(Command::Display));
        }
        assert_eq!(rx.pending(), 2);
        let dropped = COMMANDS_DROPPED_FULL.load(Ordering::Relaxed) - before;
        assert_eq!(dropped, 8);
    }

    #[test]
    fn send_reports_disconnect() {
        let (tx, rx) = command_channel_with_cap(4);
        drop(rx);
        assert!(!tx.send(Command::Next));
    }

    #[test]
    fn fifo_holds_per_producer_under_concurrent_enqueue() {
        // Interleaving across producers is unspecified; per-producer order is not.
        // Each producer sends an alternating two-command pattern so its restricted
        // subsequence of the drained output betrays any reordering.
        fn pattern_a(i: usize) -> Command {
            if i % 2 == 0 {
                Command::Next
            } else {
                Command::Display
            }
        }
        fn pattern_b(i: usize) -> Command {
            if i % 2 == 0 {
                Command::Previous
            } else {
                Command::Reload
            }
        }

        let (tx, rx) = command_channel_with_cap(256);
        let tx_a = tx.clone();
        let a = std::thread::spawn(move || {
            for i in 0..50 {
                tx_a.send(pattern_a(i));
            }
        });
        let tx_b = tx.clone();
        let b = std::thread::spawn(move || {
            for i in 0..50 {
                tx_b.send(pattern_b(i));
            }
        });
        a.join().unwrap();
        b.join().unwrap();

        let mut seen = Vec::new();
        while let Some(cmd) = rx.try_next() {
            seen.push(cmd);
        }
        assert_eq!(seen.len(), 100);

        let from_a: Vec<Command> = seen
            .iter()
            .copied()
            .filter(|cmd| matches!(cmd, Command::Next | Command::Display))
            .collect();
        let from_b: Vec<Command> = seen
            .iter()
            .copied()
            .filter(|cmd| matches!(cmd, Command::Previous | Command::Reload))
            .collect();
        assert_eq!(from_a, (0..50).map(pattern_a).collect::<Vec<_>>());
        assert_eq!(from_b, (0..50).map(pattern_b).collect::<Vec<_>>());
    }

    #[test]
    fn shutdown_flag_latches() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_set());
        let clone = flag.clone();
        clone.trigger();
        assert!(flag.is_set());
    }
}

use crate::ButtonSource;
use crate::edge::{BUTTON_COUNT, EdgeDetector};
use core_events::{
    Command, CommandSender, POLL_STARTS, POLL_STOP_CHANNEL, POLL_STOP_SIGNAL, READ_FAILURES,
    ShutdownFlag, Side,
};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Timing and wiring for the poll loop. All durations are configuration, not
/// constants, so tests compress them.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub error_backoff: Duration,
    /// Command emitted per channel. Channel 0 is the right-hand button.
    pub bindings: [Command; BUTTON_COUNT],
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            debounce: Duration::from_millis(50),
            error_backoff: Duration::from_millis(100),
            bindings: [
                Command::VoteAndAdvance(Side::Right),
                Command::VoteAndAdvance(Side::Left),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Running,
    ShutdownSignal,
    ChannelClosed,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
        }
    }
}

/// The background polling loop: sample both channels, debounce, map accepted
/// presses to commands, enqueue. Runs until the shutdown flag is observed or
/// the command channel disconnects.
pub struct ButtonPollTask<S: ButtonSource> {
    source: S,
    sender: CommandSender,
    shutdown: ShutdownFlag,
    detector: EdgeDetector,
    settings: PollSettings,
    exit_reason: ExitReason,
}

impl<S: ButtonSource> ButtonPollTask<S> {
    pub fn new(
        source: S,
        sender: CommandSender,
        shutdown: ShutdownFlag,
        settings: PollSettings,
    ) -> Self {
        let detector = EdgeDetector::new(settings.debounce);
        Self {
            source,
            sender,
            shutdown,
            detector,
            settings,
            exit_reason: ExitReason::Running,
        }
    }

    pub fn run(mut self) {
        info!(target: "input.thread", "button_poll_started");
        POLL_STARTS.fetch_add(1, Ordering::Relaxed);

        loop {
            if self.shutdown.is_set() {
                self.exit_reason = ExitReason::ShutdownSignal;
                break;
            }

            let levels = match self.read_levels() {
                Some(levels) => levels,
                None => {
                    // Transient read fault: back off and retry, never die.
                    thread::sleep(self.settings.error_backoff);
                    continue;
                }
            };

            if let Some(channel) = self.detector.sample(levels, Instant::now()) {
                let cmd = self.settings.bindings[channel];
                info!(
                    target: "input.thread",
                    channel,
                    command = cmd.as_str(),
                    "press_accepted"
                );
                if !self.sender.send(cmd) {
                    self.exit_reason = ExitReason::ChannelClosed;
                    break;
                }
            }

            thread::sleep(self.settings.poll_interval);
        }

        match self.exit_reason {
            ExitReason::ShutdownSignal => {
                POLL_STOP_SIGNAL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::ChannelClosed => {
                POLL_STOP_CHANNEL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::Running => {}
        }

        info!(
            target: "input.thread",
            reason = self.exit_reason.as_str(),
            "button_poll_stopped"
        );
    }

    /// One tick's worth of samples, or `None` when any channel read failed
    /// (the whole tick is abandoned).
    fn read_levels(&mut self) -> Option<[bool; BUTTON_COUNT]> {
        let mut levels = [false; BUTTON_COUNT];
        for (channel, slot) in levels.iter_mut().enumerate() {
            match self.source.read(channel) {
                Ok(level) => *slot = level,
                Err(err) => {
                    READ_FAILURES.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: "input.thread",
                        channel,
                        error = %err,
                        "button_read_failed"
                    );
                    return None;
                }
            }
        }
        Some(levels)
    }
}

/// Spawn the poll loop on a named OS thread.
pub fn spawn_button_poll<S: ButtonSource>(
    source: S,
    sender: CommandSender,
    shutdown: ShutdownFlag,
    settings: PollSettings,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("button-poll".to_string())
        .spawn(move || ButtonPollTask::new(source, sender, shutdown, settings).run())
}

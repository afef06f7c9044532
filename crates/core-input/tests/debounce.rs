//! End-to-end poll-thread tests: a scripted source drives the spawned task
//! through a real channel with compressed timings.

use core_events::{Command, ShutdownFlag, Side, command_channel};
use core_input::{BUTTON_COUNT, ButtonSource, PollSettings, spawn_button_poll};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One script step per poll tick; trips the shutdown flag when exhausted.
struct Script {
    steps: Arc<Mutex<VecDeque<[bool; BUTTON_COUNT]>>>,
    pending: Option<[bool; BUTTON_COUNT]>,
    shutdown: ShutdownFlag,
}

impl Script {
    fn new(steps: Vec<[bool; BUTTON_COUNT]>, shutdown: ShutdownFlag) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            pending: None,
            shutdown,
        }
    }
}

impl ButtonSource for Script {
    fn read(&mut self, channel: usize) -> anyhow::Result<bool> {
        if channel == 0 {
            match self.steps.lock().unwrap().pop_front() {
                Some(levels) => {
                    self.pending = Some(levels);
                    Ok(levels[0])
                }
                None => {
                    self.shutdown.trigger();
                    Ok(false)
                }
            }
        } else {
            Ok(self.pending.take().map(|l| l[channel]).unwrap_or(false))
        }
    }
}

fn collect(steps: Vec<[bool; BUTTON_COUNT]>, debounce: Duration) -> Vec<Command> {
    let (tx, rx) = command_channel();
    let shutdown = ShutdownFlag::new();
    let script = Script::new(steps, shutdown.clone());
    let settings = PollSettings {
        poll_interval: Duration::from_millis(1),
        debounce,
        error_backoff: Duration::from_millis(1),
        ..PollSettings::default()
    };
    let handle = spawn_button_poll(script, tx, shutdown, settings).expect("spawn poll thread");
    handle.join().expect("poll thread panicked");

    let mut out = Vec::new();
    while let Some(cmd) = rx.try_next() {
        out.push(cmd);
    }
    out
}

#[test]
fn bounce_inside_window_registers_once() {
    // A window no test machine will outrun: every toggle after the first
    // lands inside it regardless of scheduling jitter.
    let commands = collect(
        vec![
            [false, false],
            [true, false],
            [false, false],
            [true, false],
            [false, false],
            [true, false],
        ],
        Duration::from_secs(10),
    );
    assert_eq!(commands, vec![Command::VoteAndAdvance(Side::Right)]);
}

#[test]
fn spaced_presses_register_twice() {
    // Each tick sleeps at least 1 ms, so with a 1 ms window every clean
    // rising edge lands outside the previous press's window.
    let commands = collect(
        vec![
            [false, false],
            [true, false],
            [false, false],
            [false, false],
            [true, false],
        ],
        Duration::from_millis(1),
    );
    assert_eq!(
        commands,
        vec![
            Command::VoteAndAdvance(Side::Right),
            Command::VoteAndAdvance(Side::Right),
        ]
    );
}

#[test]
fn both_buttons_same_tick_register_once() {
    let commands = collect(
        vec![[false, false], [true, true], [true, true], [false, false]],
        Duration::from_secs(10),
    );
    assert_eq!(commands, vec![Command::VoteAndAdvance(Side::Right)]);
}

#[test]
fn alternating_buttons_with_gaps_register_in_order() {
    let commands = collect(
        vec![
            [false, false],
            [true, false],
            [false, false],
            [false, false],
            [false, true],
            [false, false],
        ],
        Duration::from_millis(1),
    );
    assert_eq!(
        commands,
        vec![
            Command::VoteAndAdvance(Side::Right),
            Command::VoteAndAdvance(Side::Left),
        ]
    );
}

//! Button input service: polled hardware sources, debounced edge detection,
//! and the background poll task feeding the command channel.

mod edge;
mod gpio;
mod poll_service;

pub use edge::{BUTTON_COUNT, EdgeDetector};
pub use gpio::SysfsButtonSource;
pub use poll_service::{ButtonPollTask, PollSettings, spawn_button_poll};

/// A polled two-channel digital input.
///
/// `read` must not block; the poll task calls it for every channel on every
/// tick. Errors are transient by contract: the task logs them, backs off,
/// and keeps polling.
pub trait ButtonSource: Send + 'static {
    fn read(&mut self, channel: usize) -> anyhow::Result<bool>;
}

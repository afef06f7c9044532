//! Command layer: key translation and the dispatcher that applies
//! commands to the gallery.
//!
//! Keyboard events become [`ControlAction`]s in `translate`; button
//! presses arrive over the command channel already shaped as
//! [`core_events::Command`]s. `dispatch` is the single place both paths
//! meet, so the vote/advance sequence behaves identically no matter
//! which input produced it.

mod dispatch;
mod translate;

pub use dispatch::{DispatchContext, DispatchResult, dispatch};
pub use translate::{ControlAction, translate};

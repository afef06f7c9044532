//! Frame composition for the kiosk display.
//!
//! Everything here is pure pixel work on [`Frame`], a plain `0RGB` buffer
//! in the layout the presentation surface consumes directly. Decoded
//! images come out of [`AssetCache`]; the composers place them with the
//! same arithmetic for every frame size, so layout is testable without a
//! window.
//!
//! Exposed components:
//! - `Frame`: owned pixel grid with clipped fill/blit primitives.
//! - `layout`: slot arithmetic for the side-by-side pair view and the
//!   screen-filling single view.
//! - `compose`: assembles full frames, including highlight borders and
//!   placeholder panels for assets that failed to decode.
//! - `AssetCache`: path-keyed decode cache plus background file warming.

mod cache;
mod compose;
mod frame;
pub mod layout;

pub use cache::{AssetCache, warm_paths};
pub use compose::{compose_empty, compose_pair, compose_single};
pub use frame::{Frame, rgb};

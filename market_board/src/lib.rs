//! Market board: places index markers on a world map and assembles renderable frames
//! from the market feed.
//!
//! - `layout` — geographic projection plus overlap relaxation.
//! - `positions` — position memoisation across value-only refreshes.
//! - `marker` — responsive marker size hint.
//! - `board` — combines feed updates, positions and sizing into `BoardFrame`s.
#![warn(missing_docs)]
pub mod board;
pub mod layout;
pub mod marker;
pub mod positions;

pub use board::{Board, BoardFrame};
pub use layout::{Point, PositionMap, Viewport, layout};
pub use marker::MarkerSize;
pub use positions::PositionCache;

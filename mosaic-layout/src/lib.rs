//! Grid placement, folder sizing and the edit bridge for Mosaic projects.

pub mod bridge;
pub mod engine;
pub mod folder;
pub mod spatial;

pub use bridge::{Applied, BridgeError, BridgeStats, EditBridge, Effect, MAX_SURFACE_ROWS};
pub use engine::{push_down, GridSolver, Placement, SolverConfig};
pub use folder::{folder_row_span, GridMetrics};
pub use spatial::OccupancyGrid;

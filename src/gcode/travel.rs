//! Travel-avoidance planner flags.
//!
//! The actual travel routing is an external concern; the emission engine is
//! only responsible for toggling these flags correctly at object, skirt and
//! brim boundaries and for handing the planner the union of object
//! footprints to route around.

use crate::geometry::Polygon;

/// Flags and data consulted by the command formatter when computing travel
/// paths.
#[derive(Debug, Default)]
pub struct AvoidCrossingPerimeters {
    /// Route the next travel moves on the external (object-to-object)
    /// motion planner.
    pub use_external_mp: bool,
    /// One-shot: allow a single straight travel move, then resume routing.
    pub disable_once: bool,
    external_islands: Vec<Polygon>,
}

impl AvoidCrossingPerimeters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the external motion planner with the islands to route
    /// around (object footprints repeated per placement copy).
    pub fn init_external_mp(&mut self, islands: Vec<Polygon>) {
        self.external_islands = islands;
    }

    /// Islands the external planner knows about.
    pub fn external_islands(&self) -> &[Polygon] {
        &self.external_islands
    }

    /// Consume the one-shot disable flag.
    pub fn take_disable_once(&mut self) -> bool {
        std::mem::take(&mut self.disable_once)
    }
}

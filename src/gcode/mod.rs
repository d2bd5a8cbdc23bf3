//! G-code generation: scheduling, grouping, chaining and emission.
//!
//! The pipeline is strictly sequential: [`GCodeAssembler`] folds the ordered
//! task sequence produced by [`scheduler::LayerScheduler`] over a single
//! [`GeneratorState`], emitting instruction text through the command
//! formatter ([`writer::GCodeWriter`]) as it goes. No step may be reordered
//! relative to this fold without changing output semantics.

pub mod assembler;
pub mod autospeed;
pub mod chaining;
pub mod filters;
pub mod islands;
pub mod macros;
pub mod scheduler;
pub mod temperature;
pub mod travel;
pub mod usage;
pub mod writer;

pub use assembler::GCodeAssembler;
pub use autospeed::AutoSpeedCalculator;
pub use chaining::{chained_path_from, chained_points};
pub use filters::{FilterPipeline, GCodeFilter};
pub use islands::{BucketKey, BucketRole, LayerBuckets};
pub use macros::PlaceholderParser;
pub use scheduler::{LayerRef, LayerScheduler, LayerTask};
pub use temperature::TemperatureSequencer;
pub use travel::AvoidCrossingPerimeters;
pub use usage::{ExtruderUsageAccumulator, UsageTotals};
pub use writer::GCodeWriter;

use crate::Coord;
use std::collections::BTreeSet;

/// Mutable state threaded through the per-layer emission fold.
///
/// Owned by the assembler and passed by exclusive reference; never shared
/// and never accessed concurrently.
#[derive(Debug, Default)]
pub struct GeneratorState {
    /// Whether the current layer is the first printed layer; selects the
    /// skirt's extruder rotation and planner handling.
    pub first_layer: bool,
    /// Index of the layer currently being emitted.
    pub layer_index: usize,
    /// Volumetric speed cap for the active layer (mm³/s, 0 = unset).
    pub volumetric_speed: f64,
    /// Whether the second-layer temperature transition has fired.
    pub second_layer_things_done: bool,
    /// Scaled Z heights at which the skirt has already been extruded.
    pub skirt_done: BTreeSet<Coord>,
    /// Whether the brim has been extruded.
    pub brim_done: bool,
    /// Placement offset of the last emitted object copy, used to detect
    /// object-to-object travel.
    pub last_obj_copy: Option<crate::geometry::Point>,
}

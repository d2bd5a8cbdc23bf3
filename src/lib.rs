//! G-code emission engine.
//!
//! This crate converts a fully sliced print plan (per-object layers holding
//! perimeter and infill geometry) into a linear G-code instruction stream,
//! minimizing toolchanges and travel distance while honoring per-region
//! speed and temperature policy and tracking material usage.
//!
//! The entry point is [`gcode::GCodeAssembler`], which drives the layer
//! scheduler, island assigner, path chainer, autospeed calculator and
//! temperature sequencer over a [`print::Print`] plan.

use thiserror::Error;

pub mod config;
pub mod extrusion;
pub mod flow;
pub mod gcode;
pub mod geometry;
pub mod print;

/// Scaled integer coordinate type.
pub type Coord = i64;

/// Floating-point coordinate type (mm).
pub type CoordF = f64;

/// Scaling factor between millimeters and internal integer units.
///
/// All 2D geometry uses integer coordinates scaled by this factor to avoid
/// floating-point precision issues; Z heights are bucketed through the same
/// factor so layers of different objects land in the same bucket.
pub const SCALING_FACTOR: CoordF = 1_000_000.0;

/// Scale a floating-point coordinate (mm) to internal integer units.
#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

/// Unscale an internal integer coordinate back to millimeters.
#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

/// Crate-wide error type.
///
/// Only unrecoverable structural violations of the print-plan invariants
/// surface here; degenerate geometry, missing layer regions and malformed
/// speed configuration are absorbed where they are detected.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while writing the output stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An object with no layers reached the scheduler.
    #[error("object \"{0}\" has no layers")]
    EmptyObject(String),

    /// An extrusion references an extruder with no configured filament.
    #[error("extruder {0} has no configured filament parameters")]
    UnknownExtruder(usize),

    /// An extrusion was emitted before any extruder was selected.
    #[error("no active extruder selected")]
    NoActiveExtruder,
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_unscale_roundtrip() {
        let v = 12.345;
        assert!((unscale(scale(v)) - v).abs() < 1e-6);
    }

    #[test]
    fn test_scale_is_deterministic_bucket_key() {
        // Two layers at the same nominal Z must land in the same bucket.
        assert_eq!(scale(0.2 + 0.2), scale(0.4));
    }
}

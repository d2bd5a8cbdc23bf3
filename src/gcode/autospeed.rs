//! Autospeed: deriving a per-layer volumetric speed cap from geometry.
//!
//! When a region leaves any of its feature speeds automatic, the safe
//! feedrate for the whole layer is anchored at the thinnest cross-section:
//! the volumetric rate produced by printing the smallest mm³/mm at the
//! maximum print speed. Any larger cross-section then needs slower
//! feedrates, which the command formatter derives from the cap.

use tracing::trace;

use crate::print::{Layer, LayerKind, Print, PrintObject};

/// Flows at or below this rate (mm³/mm) are treated as numeric noise from
/// degenerate geometry, not as real extrusion.
const NEGLIGIBLE_FLOW: f64 = 0.01;

/// Computes the per-layer volumetric speed cap.
pub struct AutoSpeedCalculator;

impl AutoSpeedCalculator {
    /// Derive the cap for one layer.
    ///
    /// Returns `None` when no candidate flow survives (all speeds explicit,
    /// or the layer holds no real extrusion); the previous cap then stays
    /// in effect.
    pub fn layer_cap(print: &Print, object: &PrintObject, layer: &Layer) -> Option<f64> {
        let mut candidates: Vec<f64> = Vec::new();

        for (region_id, region) in print.regions.iter().enumerate() {
            // a region with no content on this layer contributes nothing
            let Some(layerm) = layer.get_region(region_id) else {
                continue;
            };
            if !region.config.perimeter_speeds_explicit() {
                candidates.extend(layerm.perimeters.min_mm3_per_mm());
            }
            if !region.config.infill_speeds_explicit() {
                candidates.extend(layerm.fills.min_mm3_per_mm());
            }
        }

        if let LayerKind::Support {
            support_fills,
            interface_fills,
        } = &layer.kind
        {
            let explicit = object.config.support_material_speed > 0.0
                && object.config.support_material_interface_speed > 0.0;
            if !explicit {
                candidates.extend(support_fills.min_mm3_per_mm());
                candidates.extend(interface_fills.min_mm3_per_mm());
            }
        }

        candidates.retain(|&v| v > NEGLIGIBLE_FLOW);
        let min_mm3_per_mm = candidates.iter().copied().fold(f64::INFINITY, f64::min);
        if !min_mm3_per_mm.is_finite() {
            return None;
        }

        let mut volumetric_speed = min_mm3_per_mm * print.config.max_print_speed;
        if print.config.max_volumetric_speed > 0.0 {
            volumetric_speed = volumetric_speed.min(print.config.max_volumetric_speed);
        }
        trace!(volumetric_speed, layer = layer.id, "autospeed cap");
        Some(volumetric_speed)
    }
}

//! Print region configuration.
//!
//! A region is a section of the print sharing one material and feature
//! configuration (extruder assignment, speeds, widths). Many layers point at
//! the same region; the config is immutable during emission.

use serde::{Deserialize, Serialize};

/// Configuration for a specific print region.
///
/// Speeds set to 0 mean "automatic": when not all speeds of a feature class
/// are explicit, the autospeed calculator derives a volumetric cap from the
/// region's thinnest extrusion instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintRegionConfig {
    // === Extruder assignment (1-based, matching the machine's tool numbers) ===
    /// Extruder used for perimeters.
    pub perimeter_extruder: usize,
    /// Extruder used for sparse infill.
    pub infill_extruder: usize,
    /// Extruder used for solid infill.
    pub solid_infill_extruder: usize,

    // === Perimeter speeds (mm/s, 0 = auto) ===
    pub perimeter_speed: f64,
    pub small_perimeter_speed: f64,
    pub external_perimeter_speed: f64,

    // === Infill speeds (mm/s, 0 = auto) ===
    pub infill_speed: f64,
    pub solid_infill_speed: f64,
    pub top_solid_infill_speed: f64,
    pub gap_fill_speed: f64,

    /// Bridge speed (mm/s, 0 = auto); shared by both feature classes.
    pub bridge_speed: f64,

    // === Extrusion widths (mm, 0 = auto) ===
    pub external_perimeter_extrusion_width: f64,
    pub perimeter_extrusion_width: f64,
    pub infill_extrusion_width: f64,
    pub solid_infill_extrusion_width: f64,
    pub top_infill_extrusion_width: f64,
}

impl Default for PrintRegionConfig {
    fn default() -> Self {
        Self {
            perimeter_extruder: 1,
            infill_extruder: 1,
            solid_infill_extruder: 1,
            perimeter_speed: 60.0,
            small_perimeter_speed: 15.0,
            external_perimeter_speed: 30.0,
            infill_speed: 80.0,
            solid_infill_speed: 20.0,
            top_solid_infill_speed: 15.0,
            gap_fill_speed: 20.0,
            bridge_speed: 60.0,
            external_perimeter_extrusion_width: 0.0,
            perimeter_extrusion_width: 0.0,
            infill_extrusion_width: 0.0,
            solid_infill_extrusion_width: 0.0,
            top_infill_extrusion_width: 0.0,
        }
    }
}

impl PrintRegionConfig {
    /// Whether every perimeter-class speed is explicitly configured.
    ///
    /// When any of them is automatic, the region's perimeter flows feed the
    /// autospeed candidate set.
    pub fn perimeter_speeds_explicit(&self) -> bool {
        self.perimeter_speed > 0.0
            && self.small_perimeter_speed > 0.0
            && self.external_perimeter_speed > 0.0
            && self.bridge_speed > 0.0
    }

    /// Whether every infill-class speed is explicitly configured.
    pub fn infill_speeds_explicit(&self) -> bool {
        self.infill_speed > 0.0
            && self.solid_infill_speed > 0.0
            && self.top_solid_infill_speed > 0.0
            && self.bridge_speed > 0.0
            && self.gap_fill_speed > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_speeds_are_explicit() {
        let config = PrintRegionConfig::default();
        assert!(config.perimeter_speeds_explicit());
        assert!(config.infill_speeds_explicit());
    }

    #[test]
    fn test_one_auto_speed_disables_explicit() {
        let mut config = PrintRegionConfig::default();
        config.small_perimeter_speed = 0.0;
        assert!(!config.perimeter_speeds_explicit());
        assert!(config.infill_speeds_explicit());
    }
}

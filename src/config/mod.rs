//! Configuration for G-code emission.
//!
//! Three levels of configuration exist: job-wide ([`PrintConfig`]),
//! per-object ([`PrintObjectConfig`]) and per-region
//! ([`PrintRegionConfig`]). Regions share their config across all layers;
//! nothing here is mutated during emission.
//!
//! All three serialize through serde, which also drives the trailing
//! `; key = value` configuration dump of the output document.

mod region_config;

pub use region_config::PrintRegionConfig;

use serde::{Deserialize, Serialize};

/// Read a per-extruder value, falling back to the first entry.
///
/// Mirrors how per-filament option vectors behave: a single configured
/// value applies to every extruder.
pub fn get_at<T: Copy + Default>(values: &[T], index: usize) -> T {
    values
        .get(index)
        .or_else(|| values.first())
        .copied()
        .unwrap_or_default()
}

/// Job-wide print configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintConfig {
    // === Temperatures ===
    /// Per-extruder steady-state temperature (°C, 0 = off).
    pub temperature: Vec<i32>,
    /// Per-extruder first-layer temperature (°C, 0 = off).
    pub first_layer_temperature: Vec<i32>,
    /// Whether the machine has a heated bed.
    pub has_heatbed: bool,
    /// Bed temperature after the first layer (°C, 0 = off).
    pub bed_temperature: i32,
    /// First-layer bed temperature (°C, 0 = off).
    pub first_layer_bed_temperature: i32,

    // === Cooling ===
    /// Whether cooling logic is enabled.
    pub cooling: bool,
    /// Number of initial layers with the fan disabled.
    pub disable_fan_first_layers: u32,

    // === Custom scripts ===
    /// Custom start G-code, expanded through the macro processor.
    pub start_gcode: String,
    /// Custom end G-code.
    pub end_gcode: String,
    /// Per-filament custom start G-code.
    pub start_filament_gcode: Vec<String>,
    /// Per-filament custom end G-code.
    pub end_filament_gcode: Vec<String>,
    /// Custom G-code emitted before every layer change.
    pub before_layer_gcode: String,
    /// Custom G-code emitted at every layer change.
    pub layer_gcode: String,
    /// Free-form notes echoed into the output header.
    pub notes: String,

    // === Sequencing ===
    /// Print each object completely before starting the next one.
    pub complete_objects: bool,
    /// Extrude infill before perimeters within each island.
    pub infill_first: bool,
    /// Route travel moves around perimeters.
    pub avoid_crossing_perimeters: bool,
    /// Drop idle extruders to a standby temperature.
    pub ooze_prevention: bool,
    /// Temperature delta applied to idle extruders (°C).
    pub standby_temperature_delta: i32,
    /// Emit `; printing object` labels around each object copy.
    pub label_printed_objects: bool,

    // === Skirt and brim ===
    /// Number of skirt loops.
    pub skirts: u32,
    /// Number of layers the skirt covers (-1 = all layers).
    pub skirt_height: i32,
    /// Minimum total skirt extrusion length on the first layer (mm).
    pub min_skirt_length: f64,
    /// Skirt extrusion width (mm, 0 = auto).
    pub skirt_extrusion_width: f64,
    /// Extruder used for the brim (1-based).
    pub brim_extruder: usize,

    // === Speeds ===
    /// Upper bound for any print move (mm/s); anchors autospeed.
    pub max_print_speed: f64,
    /// Volumetric rate ceiling (mm³/s, 0 = unlimited).
    pub max_volumetric_speed: f64,
    /// Speed for non-extruding travel moves (mm/s).
    pub travel_speed: f64,

    // === Filament ===
    /// Per-extruder filament diameter (mm).
    pub filament_diameter: Vec<f64>,
    /// Per-extruder filament density (g/cm³).
    pub filament_density: Vec<f64>,
    /// Per-extruder filament cost (money/kg).
    pub filament_cost: Vec<f64>,

    // === Retraction ===
    /// Per-extruder retraction length (mm).
    pub retract_length: Vec<f64>,
    /// Per-extruder retraction speed (mm/s).
    pub retract_speed: Vec<f64>,

    // === First layer ===
    /// First-layer extrusion width override (mm, 0 = per-role widths).
    pub first_layer_extrusion_width: f64,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            temperature: vec![200],
            first_layer_temperature: vec![205],
            has_heatbed: true,
            bed_temperature: 55,
            first_layer_bed_temperature: 60,
            cooling: true,
            disable_fan_first_layers: 1,
            start_gcode: "G28 ; home all axes".to_string(),
            end_gcode: "M84 ; disable motors".to_string(),
            start_filament_gcode: Vec::new(),
            end_filament_gcode: Vec::new(),
            before_layer_gcode: String::new(),
            layer_gcode: String::new(),
            notes: String::new(),
            complete_objects: false,
            infill_first: false,
            avoid_crossing_perimeters: false,
            ooze_prevention: false,
            standby_temperature_delta: -5,
            label_printed_objects: false,
            skirts: 1,
            skirt_height: 1,
            min_skirt_length: 0.0,
            skirt_extrusion_width: 0.0,
            brim_extruder: 1,
            max_print_speed: 80.0,
            max_volumetric_speed: 0.0,
            travel_speed: 130.0,
            filament_diameter: vec![1.75],
            filament_density: vec![1.25],
            filament_cost: vec![25.0],
            retract_length: vec![2.0],
            retract_speed: vec![40.0],
            first_layer_extrusion_width: 0.0,
        }
    }
}

impl PrintConfig {
    /// Steady-state temperature for an extruder.
    #[inline]
    pub fn temperature_at(&self, extruder: usize) -> i32 {
        get_at(&self.temperature, extruder)
    }

    /// First-layer temperature for an extruder.
    #[inline]
    pub fn first_layer_temperature_at(&self, extruder: usize) -> i32 {
        get_at(&self.first_layer_temperature, extruder)
    }

    /// Whether the skirt extends over every layer of the print.
    #[inline]
    pub fn has_infinite_skirt(&self) -> bool {
        self.skirt_height < 0
    }
}

/// Per-object print configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintObjectConfig {
    /// Layer height (mm).
    pub layer_height: f64,
    /// Number of raft layers under the object.
    pub raft_layers: u32,
    /// Whether support material is generated for this object.
    pub support_material: bool,
    /// Support material speed (mm/s, 0 = auto).
    pub support_material_speed: f64,
    /// Support interface speed (mm/s, 0 = auto).
    pub support_material_interface_speed: f64,
    /// Extruder used for support material (1-based).
    pub support_material_extruder: usize,
    /// Extruder used for support interfaces (1-based).
    pub support_material_interface_extruder: usize,
    /// Support extrusion width (mm, 0 = auto).
    pub support_material_extrusion_width: f64,
}

impl Default for PrintObjectConfig {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            raft_layers: 0,
            support_material: false,
            support_material_speed: 60.0,
            support_material_interface_speed: 60.0,
            support_material_extruder: 1,
            support_material_interface_extruder: 1,
            support_material_extrusion_width: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_at_falls_back_to_first() {
        let temps = vec![200, 210];
        assert_eq!(get_at(&temps, 0), 200);
        assert_eq!(get_at(&temps, 1), 210);
        assert_eq!(get_at(&temps, 5), 200);
        assert_eq!(get_at::<i32>(&[], 0), 0);
    }

    #[test]
    fn test_infinite_skirt() {
        let mut config = PrintConfig::default();
        assert!(!config.has_infinite_skirt());
        config.skirt_height = -1;
        assert!(config.has_infinite_skirt());
    }
}

//! Temperature sequencing around custom scripts and layer transitions.
//!
//! Custom start/end scripts may set temperatures themselves; the sequencer
//! scans them for the known command codes (bed: M140/M190, extruder:
//! M104/M109, case-insensitive) and only injects its own commands when a
//! side's scripts carry none. Injection brackets the script: a non-blocking
//! set before it, a blocking set-and-wait after it, so the script runs
//! while heaters come up but printing never starts cold.

use regex::Regex;

use crate::config::PrintConfig;

use super::writer::GCodeWriter;

/// Decides which temperature commands the engine must emit itself.
#[derive(Debug)]
pub struct TemperatureSequencer {
    bed_command: Regex,
    extruder_command: Regex,
}

impl Default for TemperatureSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureSequencer {
    pub fn new() -> Self {
        Self {
            // static patterns, known valid
            bed_command: Regex::new(r"(?i)M(?:190|140)").expect("bed command pattern"),
            extruder_command: Regex::new(r"(?i)M(?:109|104)").expect("extruder command pattern"),
        }
    }

    /// Whether any of the given scripts already sets the bed temperature.
    pub fn scripts_set_bed<'a>(&self, scripts: impl IntoIterator<Item = &'a str>) -> bool {
        scripts.into_iter().any(|s| self.bed_command.is_match(s))
    }

    /// Whether any of the given scripts already sets an extruder temperature.
    pub fn scripts_set_extruder<'a>(&self, scripts: impl IntoIterator<Item = &'a str>) -> bool {
        scripts
            .into_iter()
            .any(|s| self.extruder_command.is_match(s))
    }

    /// Whether the engine must inject bed commands around the start scripts.
    pub fn needs_start_bed(&self, config: &PrintConfig) -> bool {
        config.has_heatbed
            && config.first_layer_bed_temperature > 0
            && !self.scripts_set_bed(start_scripts(config))
    }

    /// Whether the engine must inject extruder commands around the start
    /// scripts.
    pub fn needs_start_extruder(&self, config: &PrintConfig) -> bool {
        !self.scripts_set_extruder(start_scripts(config))
    }

    /// Whether the engine must turn the bed off after the end scripts.
    pub fn needs_end_bed(&self, config: &PrintConfig) -> bool {
        config.has_heatbed
            && config.first_layer_bed_temperature > 0
            && !self.scripts_set_bed(end_scripts(config))
    }

    /// Whether the engine must turn the extruders off after the end scripts.
    pub fn needs_end_extruder(&self, config: &PrintConfig) -> bool {
        !self.scripts_set_extruder(end_scripts(config))
    }

    /// First-layer temperature commands for every extruder.
    ///
    /// With ooze prevention active, idle extruders start at the standby
    /// delta above/below the first-layer temperature.
    pub fn first_layer_temperatures(
        &self,
        config: &PrintConfig,
        writer: &GCodeWriter,
        wait: bool,
    ) -> String {
        let mut gcode = String::new();
        for &id in writer.extruders.keys() {
            let mut temp = config.first_layer_temperature_at(id);
            if config.ooze_prevention {
                temp += config.standby_temperature_delta;
            }
            if temp > 0 {
                gcode.push_str(&writer.set_temperature(temp, wait, Some(id)));
            }
        }
        gcode
    }

    /// Temperature changes fired once at the transition into the second
    /// layer: steady-state extruder temperatures where they differ from the
    /// first-layer ones, and the steady-state bed temperature likewise.
    ///
    /// The caller tracks the once-per-job latch; this only formats.
    pub fn second_layer_transition(&self, config: &PrintConfig, writer: &GCodeWriter) -> String {
        let mut gcode = String::new();
        for &id in writer.extruders.keys() {
            let temp = config.temperature_at(id);
            if temp > 0 && temp != config.first_layer_temperature_at(id) {
                gcode.push_str(&writer.set_temperature(temp, false, Some(id)));
            }
        }
        if config.has_heatbed
            && config.first_layer_bed_temperature > 0
            && config.bed_temperature != config.first_layer_bed_temperature
        {
            gcode.push_str(&writer.set_bed_temperature(config.bed_temperature, false));
        }
        gcode
    }
}

fn start_scripts(config: &PrintConfig) -> impl Iterator<Item = &str> {
    std::iter::once(config.start_gcode.as_str())
        .chain(config.start_filament_gcode.iter().map(String::as_str))
}

fn end_scripts(config: &PrintConfig) -> impl Iterator<Item = &str> {
    std::iter::once(config.end_gcode.as_str())
        .chain(config.end_filament_gcode.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(config: &PrintConfig, ids: &[usize]) -> GCodeWriter {
        let mut writer = GCodeWriter::new(config);
        writer.set_extruders(ids.iter().copied(), config).unwrap();
        writer
    }

    #[test]
    fn test_existing_bed_command_suppresses_injection() {
        let mut config = PrintConfig::default();
        config.start_gcode = "M190 S60\nG28".to_string();
        let sequencer = TemperatureSequencer::new();
        assert!(!sequencer.needs_start_bed(&config));
    }

    #[test]
    fn test_bed_scan_is_case_insensitive() {
        let mut config = PrintConfig::default();
        config.start_gcode = "m140 s60".to_string();
        let sequencer = TemperatureSequencer::new();
        assert!(!sequencer.needs_start_bed(&config));
    }

    #[test]
    fn test_filament_script_counts_for_the_side() {
        let mut config = PrintConfig::default();
        config.start_gcode = "G28".to_string();
        config.start_filament_gcode = vec!["M104 S215".to_string()];
        let sequencer = TemperatureSequencer::new();
        assert!(!sequencer.needs_start_extruder(&config));
        assert!(sequencer.needs_start_bed(&config));
    }

    #[test]
    fn test_injection_needed_when_scripts_are_silent() {
        let mut config = PrintConfig::default();
        config.start_gcode = "G28 ; home".to_string();
        let sequencer = TemperatureSequencer::new();
        assert!(sequencer.needs_start_bed(&config));
        assert!(sequencer.needs_start_extruder(&config));
    }

    #[test]
    fn test_second_layer_transition_only_on_difference() {
        let mut config = PrintConfig::default();
        config.first_layer_temperature = vec![205];
        config.temperature = vec![205];
        config.first_layer_bed_temperature = 60;
        config.bed_temperature = 60;
        let sequencer = TemperatureSequencer::new();
        let w = writer(&config, &[0]);
        assert_eq!(sequencer.second_layer_transition(&config, &w), "");

        config.temperature = vec![200];
        config.bed_temperature = 55;
        let gcode = sequencer.second_layer_transition(&config, &w);
        assert!(gcode.contains("M104 S200"));
        assert!(gcode.contains("M140 S55"));
    }

    #[test]
    fn test_ooze_prevention_applies_standby_delta() {
        let mut config = PrintConfig::default();
        config.first_layer_temperature = vec![200];
        config.ooze_prevention = true;
        config.standby_temperature_delta = -15;
        let sequencer = TemperatureSequencer::new();
        let w = writer(&config, &[0]);
        let gcode = sequencer.first_layer_temperatures(&config, &w, false);
        assert!(gcode.contains("S185"));
    }
}

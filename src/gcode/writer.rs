//! The command formatter: turns moves, temperatures and toolchanges into
//! instruction text.
//!
//! The formatter is a collaborator of the assembler with a narrow surface;
//! everything it returns is opaque text appended verbatim to the output
//! stream. It owns the machine-facing state: current position, active
//! extruder, retraction and fan speed, plus the per-extruder filament
//! accounting read once at job end.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use tracing::trace;

use crate::config::{get_at, PrintConfig};
use crate::extrusion::{ExtrusionEntity, ExtrusionPath};
use crate::geometry::{Point, PointF};
use crate::{Error, Result};

use super::travel::AvoidCrossingPerimeters;
use super::GeneratorState;

/// One extruder with its filament parameters and running usage.
#[derive(Debug, Clone)]
pub struct Extruder {
    /// Extruder id (0-based).
    pub id: usize,
    filament_diameter: f64,
    filament_density: f64,
    filament_cost: f64,
    retract_length: f64,
    retract_speed: f64,
    /// Absolute E position (mm of filament).
    pub e: f64,
    /// Currently retracted amount (mm of filament).
    pub retracted: f64,
}

impl Extruder {
    /// Build an extruder from the job config.
    ///
    /// An extruder referenced without configured filament parameters is a
    /// structural error: no partial document is valid output.
    pub fn new(id: usize, config: &PrintConfig) -> Result<Self> {
        let filament_diameter = get_at(&config.filament_diameter, id);
        if filament_diameter <= 0.0 {
            return Err(Error::UnknownExtruder(id));
        }
        Ok(Self {
            id,
            filament_diameter,
            filament_density: get_at(&config.filament_density, id),
            filament_cost: get_at(&config.filament_cost, id),
            retract_length: get_at(&config.retract_length, id),
            retract_speed: get_at(&config.retract_speed, id),
            e: 0.0,
            retracted: 0.0,
        })
    }

    /// Cross-sectional area of the filament (mm²).
    #[inline]
    pub fn filament_area(&self) -> f64 {
        (self.filament_diameter / 2.0).powi(2) * PI
    }

    /// Consume a volume of material (mm³), returning the new absolute E.
    pub fn extrude_volume(&mut self, mm3: f64) -> f64 {
        self.e += mm3 / self.filament_area();
        self.e
    }

    /// Total filament length consumed (mm).
    #[inline]
    pub fn used_filament(&self) -> f64 {
        self.e
    }

    /// Total volume extruded (mm³).
    #[inline]
    pub fn extruded_volume(&self) -> f64 {
        self.e * self.filament_area()
    }

    /// Filament density (g/cm³).
    #[inline]
    pub fn filament_density(&self) -> f64 {
        self.filament_density
    }

    /// Filament cost per kilogram.
    #[inline]
    pub fn filament_cost(&self) -> f64 {
        self.filament_cost
    }
}

/// Formats machine commands and tracks machine-facing state.
#[derive(Debug)]
pub struct GCodeWriter {
    /// Extruders available to the job, keyed by id.
    pub extruders: BTreeMap<usize, Extruder>,
    /// Travel-avoidance flags consulted when formatting travel moves.
    pub avoid_crossing: AvoidCrossingPerimeters,
    current_extruder: Option<usize>,
    multiple_extruders: bool,
    /// Current absolute position (mm), unknown before the first move.
    pos: Option<PointF>,
    /// Origin added to entity coordinates (per object copy placement).
    origin: PointF,
    travel_speed: f64,
    max_print_speed: f64,
    fan_speed: Option<u32>,
}

impl GCodeWriter {
    pub fn new(config: &PrintConfig) -> Self {
        Self {
            extruders: BTreeMap::new(),
            avoid_crossing: AvoidCrossingPerimeters::new(),
            current_extruder: None,
            multiple_extruders: false,
            pos: None,
            origin: PointF::zero(),
            travel_speed: config.travel_speed,
            max_print_speed: config.max_print_speed,
            fan_speed: None,
        }
    }

    /// Register the extruders the job will use.
    pub fn set_extruders(
        &mut self,
        ids: impl IntoIterator<Item = usize>,
        config: &PrintConfig,
    ) -> Result<()> {
        for id in ids {
            self.extruders.insert(id, Extruder::new(id, config)?);
        }
        self.multiple_extruders = self.extruders.len() > 1;
        Ok(())
    }

    /// The currently active extruder.
    pub fn extruder(&self) -> Option<&Extruder> {
        self.current_extruder.and_then(|id| self.extruders.get(&id))
    }

    /// Id of the currently active extruder.
    #[inline]
    pub fn current_extruder_id(&self) -> Option<usize> {
        self.current_extruder
    }

    /// Set the coordinate origin for subsequent entity coordinates.
    pub fn set_origin(&mut self, origin: PointF) {
        self.origin = origin;
    }

    /// Last position in scaled units, relative to the current origin.
    ///
    /// This is the point path chaining starts from.
    pub fn last_pos(&self) -> Point {
        match self.pos {
            Some(p) => Point::new_scale(p.x - self.origin.x, p.y - self.origin.y),
            None => Point::zero(),
        }
    }

    /// General setup commands emitted once after the custom start script.
    pub fn preamble(&self) -> String {
        "G21 ; set units to millimeters\n\
         G90 ; use absolute coordinates\n\
         M82 ; use absolute distances for extrusion\n"
            .to_string()
    }

    /// Format an extruder temperature command.
    ///
    /// `wait` selects the blocking variant (set and wait) over the
    /// non-blocking one (set and continue).
    pub fn set_temperature(&self, temperature: i32, wait: bool, tool: Option<usize>) -> String {
        let code = if wait { "M109" } else { "M104" };
        let mut line = format!("{} S{}", code, temperature);
        if let Some(tool) = tool {
            if self.multiple_extruders {
                line.push_str(&format!(" T{}", tool));
            }
        }
        line.push_str(" ; set temperature");
        if wait {
            line.push_str(" and wait for it to be reached");
        }
        line.push('\n');
        line
    }

    /// Format a bed temperature command.
    pub fn set_bed_temperature(&self, temperature: i32, wait: bool) -> String {
        let code = if wait { "M190" } else { "M140" };
        format!(
            "{} S{} ; set bed temperature{}\n",
            code,
            temperature,
            if wait { " and wait for it to be reached" } else { "" }
        )
    }

    /// Format a fan speed command. `dont_save` leaves the persistent fan
    /// speed untouched (used for the one-shot first-layer fan disable).
    pub fn set_fan(&mut self, speed: u32, dont_save: bool) -> String {
        if !dont_save {
            self.fan_speed = Some(speed);
        }
        if speed == 0 {
            "M107 ; disable fan\n".to_string()
        } else {
            format!("M106 S{} ; enable fan\n", (speed.min(100) * 255) / 100)
        }
    }

    /// Switch the active extruder, retracting first.
    ///
    /// Returns an empty string when the extruder is already active, so
    /// callers may issue it freely and no spurious toolchanges appear.
    pub fn set_extruder(&mut self, id: usize) -> String {
        if self.current_extruder == Some(id) {
            return String::new();
        }
        let mut gcode = self.retract();
        self.current_extruder = Some(id);
        if self.multiple_extruders {
            gcode.push_str(&format!("T{}\n", id));
        }
        gcode
    }

    /// Retract the current extruder's filament.
    pub fn retract(&mut self) -> String {
        let Some(id) = self.current_extruder else {
            return String::new();
        };
        let Some(extruder) = self.extruders.get_mut(&id) else {
            return String::new();
        };
        if extruder.retract_length <= 0.0 || extruder.retracted > 0.0 {
            return String::new();
        }
        extruder.retracted = extruder.retract_length;
        extruder.e -= extruder.retract_length;
        format!(
            "G1 E{:.5} F{:.0} ; retract\n",
            extruder.e,
            extruder.retract_speed * 60.0
        )
    }

    fn unretract(&mut self) -> String {
        let Some(id) = self.current_extruder else {
            return String::new();
        };
        let Some(extruder) = self.extruders.get_mut(&id) else {
            return String::new();
        };
        if extruder.retracted <= 0.0 {
            return String::new();
        }
        extruder.e += extruder.retracted;
        extruder.retracted = 0.0;
        format!(
            "G1 E{:.5} F{:.0} ; unretract\n",
            extruder.e,
            extruder.retract_speed * 60.0
        )
    }

    /// Format a travel move to a point given in origin-relative scaled
    /// coordinates.
    pub fn travel_to(&mut self, point: Point, comment: &str) -> String {
        // The planner flag is one-shot: a single straight move is allowed
        // right after skirt/brim, then routing resumes.
        let _straight = self.avoid_crossing.take_disable_once();
        let target = self.absolute(point);
        self.pos = Some(target);
        format!(
            "G1 X{:.3} Y{:.3} F{:.0} ; {}\n",
            target.x,
            target.y,
            self.travel_speed * 60.0,
            comment
        )
    }

    /// Extrude an entity, travelling to its start first.
    ///
    /// `speed_mm_s` above zero overrides the feedrate; otherwise the
    /// feedrate derives from the layer's volumetric cap, clamped to the
    /// configured maximum print speed.
    ///
    /// Extruding through an extruder that was never registered is a
    /// structural error: the moves would carry no filament accounting.
    pub fn extrude(
        &mut self,
        entity: &ExtrusionEntity,
        label: &str,
        speed_mm_s: f64,
        state: &GeneratorState,
    ) -> Result<String> {
        let Some(id) = self.current_extruder else {
            return Err(Error::NoActiveExtruder);
        };
        if !self.extruders.contains_key(&id) {
            return Err(Error::UnknownExtruder(id));
        }

        let mut gcode = String::new();
        let mut paths: Vec<&ExtrusionPath> = Vec::new();
        collect_paths(entity, &mut paths);

        for path in paths {
            if path.polyline.len() < 2 {
                trace!(label, "skipping degenerate extrusion path");
                continue;
            }
            let speed = self.resolve_speed(speed_mm_s, path.mm3_per_mm, state);
            gcode.push_str(&self.travel_to(
                path.polyline[0],
                &format!("move to first {} point", label),
            ));
            gcode.push_str(&self.unretract());

            let origin = self.origin;
            let Some(extruder) = self.extruders.get_mut(&id) else {
                return Err(Error::UnknownExtruder(id));
            };
            let mut first_segment = true;
            for window in path.polyline.windows(2) {
                let (a, b) = (window[0], window[1]);
                let seg_mm = a.distance(&b) / crate::SCALING_FACTOR;
                let volume = path.mm3_per_mm * seg_mm;
                let e = extruder.extrude_volume(volume);
                let p = b.to_f64();
                let target = PointF::new(p.x + origin.x, p.y + origin.y);
                self.pos = Some(target);
                if first_segment {
                    gcode.push_str(&format!(
                        "G1 X{:.3} Y{:.3} E{:.5} F{:.0} ; {}\n",
                        target.x,
                        target.y,
                        e,
                        speed * 60.0,
                        label
                    ));
                    first_segment = false;
                } else {
                    gcode.push_str(&format!(
                        "G1 X{:.3} Y{:.3} E{:.5} ; {}\n",
                        target.x, target.y, e, label
                    ));
                }
            }
        }
        Ok(gcode)
    }

    fn resolve_speed(&self, speed_mm_s: f64, mm3_per_mm: f64, state: &GeneratorState) -> f64 {
        let speed = if speed_mm_s > 0.0 {
            speed_mm_s
        } else if state.volumetric_speed > 0.0 && mm3_per_mm > 0.0 {
            state.volumetric_speed / mm3_per_mm
        } else {
            self.max_print_speed
        };
        speed.min(self.max_print_speed)
    }

    fn absolute(&self, point: Point) -> PointF {
        let p = point.to_f64();
        PointF::new(p.x + self.origin.x, p.y + self.origin.y)
    }
}

fn collect_paths<'a>(entity: &'a ExtrusionEntity, out: &mut Vec<&'a ExtrusionPath>) {
    match entity {
        ExtrusionEntity::Path(p) => out.push(p),
        ExtrusionEntity::Loop(l) => out.extend(l.paths.iter()),
        ExtrusionEntity::Collection(c) => {
            for e in &c.entities {
                collect_paths(e, out);
            }
        }
    }
}

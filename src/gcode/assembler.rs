//! The top-level G-code assembler.
//!
//! Owns the generator state and sequences the whole document: preamble,
//! skirt/brim/object body, footer. Layer tasks come from the scheduler and
//! are folded strictly in order; all instruction text goes through the
//! command formatter and the per-layer filter pipeline.

use std::io::Write;

use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::extrusion::{ExtrusionEntity, ExtrusionRole};
use crate::geometry::{PointF, Polygon};
use crate::print::{LayerKind, Print, PrintRegion, RegionFlowRole};
use crate::Result;

use super::autospeed::AutoSpeedCalculator;
use super::chaining::chained_path_from;
use super::filters::FilterPipeline;
use super::islands::{BucketRole, LayerBuckets};
use super::macros::PlaceholderParser;
use super::scheduler::{LayerRef, LayerScheduler, LayerTask};
use super::temperature::TemperatureSequencer;
use super::usage::{ExtruderUsageAccumulator, UsageTotals};
use super::writer::GCodeWriter;
use super::GeneratorState;

/// Assembles the final G-code document for a print plan.
pub struct GCodeAssembler<'a> {
    print: &'a Print,
    writer: GCodeWriter,
    state: GeneratorState,
    temperature: TemperatureSequencer,
    placeholder: PlaceholderParser,
    filters: FilterPipeline,
    usage: UsageTotals,
}

impl<'a> GCodeAssembler<'a> {
    pub fn new(print: &'a Print) -> Result<Self> {
        let mut writer = GCodeWriter::new(&print.config);
        writer.set_extruders(print.extruders(), &print.config)?;

        let layer_count: usize = if print.config.complete_objects {
            print
                .objects
                .iter()
                .map(|o| o.copies.len() * o.total_layer_count())
                .sum()
        } else {
            print.objects.iter().map(|o| o.total_layer_count()).sum()
        };

        let mut placeholder = PlaceholderParser::new();
        placeholder.set("layer_count", layer_count);

        Ok(Self {
            print,
            writer,
            state: GeneratorState::default(),
            temperature: TemperatureSequencer::new(),
            placeholder,
            filters: FilterPipeline::new(),
            usage: UsageTotals::default(),
        })
    }

    /// Install a post-filter; composition follows installation order.
    pub fn push_filter(&mut self, filter: Box<dyn super::filters::GCodeFilter>) {
        self.filters.push(filter);
    }

    /// Usage totals, valid after [`output`](Self::output) has run.
    pub fn usage(&self) -> &UsageTotals {
        &self.usage
    }

    /// Emit the whole document.
    pub fn output<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let config = &self.print.config;

        // Banner and notes.
        writeln!(
            out,
            "; generated by print-gcode {} on {}\n",
            env!("CARGO_PKG_VERSION"),
            Local::now().format("%Y-%m-%d at %H:%M:%S")
        )?;
        if !config.notes.is_empty() {
            for line in config.notes.lines() {
                writeln!(out, "; {}", line)?;
            }
            writeln!(out)?;
        }

        self.write_flow_summary(out)?;

        self.placeholder.update_timestamp();

        // The fan stays off for the first layers; set before any heating.
        if config.cooling && config.disable_fan_first_layers > 0 {
            out.write_all(self.writer.set_fan(0, true).as_bytes())?;
        }

        // Bracket the start scripts with temperature commands unless the
        // scripts set temperatures themselves.
        let inject_bed = self.temperature.needs_start_bed(config);
        let inject_extruder = self.temperature.needs_start_extruder(config);
        if inject_bed {
            out.write_all(
                self.writer
                    .set_bed_temperature(config.first_layer_bed_temperature, false)
                    .as_bytes(),
            )?;
        }
        if inject_extruder {
            out.write_all(
                self.temperature
                    .first_layer_temperatures(config, &self.writer, false)
                    .as_bytes(),
            )?;
        }

        writeln!(out, "{}", self.placeholder.process(&config.start_gcode))?;
        for script in &config.start_filament_gcode {
            writeln!(out, "{}", self.placeholder.process(script))?;
        }

        if inject_bed {
            out.write_all(
                self.writer
                    .set_bed_temperature(config.first_layer_bed_temperature, true)
                    .as_bytes(),
            )?;
        }
        if inject_extruder {
            out.write_all(
                self.temperature
                    .first_layer_temperatures(config, &self.writer, true)
                    .as_bytes(),
            )?;
        }

        out.write_all(self.writer.preamble().as_bytes())?;

        // Hand the external travel planner the object footprints, repeated
        // per placement copy.
        if config.avoid_crossing_perimeters {
            let mut islands: Vec<Polygon> = Vec::new();
            for object in &self.print.objects {
                let contours: Vec<&Polygon> = object
                    .layers
                    .iter()
                    .flat_map(|l| l.slices.iter().map(|s| &s.contour))
                    .collect();
                if contours.is_empty() {
                    continue;
                }
                for &copy in &object.copies {
                    islands.extend(contours.iter().map(|c| c.translated(copy)));
                }
            }
            self.writer.avoid_crossing.init_external_mp(islands);
        }

        // Initial extruder only after the custom start scripts.
        if let Some(&first) = self.print.extruders().iter().next() {
            out.write_all(self.writer.set_extruder(first).as_bytes())?;
        }

        self.state.first_layer = true;

        let tasks = LayerScheduler::schedule(self.print)?;
        debug!(tasks = tasks.len(), "starting layer emission");
        for task in tasks {
            self.process_layer(task, out)?;
        }
        out.write_all(self.filters.flush().as_bytes())?;

        // Footer: retract, end scripts, heaters off.
        out.write_all(self.writer.retract().as_bytes())?;
        let silence_bed = self.temperature.needs_end_bed(config);
        let silence_extruder = self.temperature.needs_end_extruder(config);
        for script in &config.end_filament_gcode {
            writeln!(out, "{}", self.placeholder.process(script))?;
        }
        writeln!(out, "{}", self.placeholder.process(&config.end_gcode))?;
        if silence_extruder {
            for &id in &self.print.extruders() {
                out.write_all(self.writer.set_temperature(0, false, Some(id)).as_bytes())?;
            }
        }
        if silence_bed {
            out.write_all(self.writer.set_bed_temperature(0, false).as_bytes())?;
        }

        // Filament usage summary.
        self.usage = ExtruderUsageAccumulator::accumulate(&self.writer.extruders);
        for usage in self.usage.per_extruder.values() {
            writeln!(
                out,
                "; filament used = {:.2}mm ({:.2}cm3)",
                usage.length,
                usage.volume / 1000.0
            )?;
            if usage.weight > 0.0 {
                writeln!(out, "; filament used = {:.2}g", usage.weight)?;
                if usage.cost > 0.0 {
                    writeln!(out, "; filament cost = {:.2}", usage.cost)?;
                }
            }
        }
        writeln!(
            out,
            "; total filament used = {:.2}mm",
            self.usage.total_used_filament
        )?;
        writeln!(out, "; total filament cost = {:.2}", self.usage.total_cost)?;
        writeln!(out)?;

        // Full configuration dump: job, default object, default region.
        write_config_dump(out, &self.print.config)?;
        write_config_dump(out, &self.print.default_object_config)?;
        write_config_dump(out, &self.print.default_region_config)?;

        Ok(())
    }

    /// Per-region flow/speed summary lines of the preamble.
    fn write_flow_summary<W: Write>(&self, out: &mut W) -> Result<()> {
        let Some(first_object) = self.print.objects.first() else {
            return Ok(());
        };
        let layer_height = first_object.config.layer_height;
        let config = &self.print.config;

        for region in &self.print.regions {
            let lines = [
                (
                    "external perimeters",
                    RegionFlowRole::ExternalPerimeter,
                    region.config.external_perimeter_speed,
                ),
                (
                    "perimeters",
                    RegionFlowRole::Perimeter,
                    region.config.perimeter_speed,
                ),
                ("infill", RegionFlowRole::Infill, region.config.infill_speed),
                (
                    "solid infill",
                    RegionFlowRole::SolidInfill,
                    region.config.solid_infill_speed,
                ),
                (
                    "top solid infill",
                    RegionFlowRole::TopSolidInfill,
                    region.config.top_solid_infill_speed,
                ),
            ];
            for (label, role, speed) in lines {
                let flow = region.flow(role, layer_height);
                let mm3_per_mm = flow.mm3_per_mm().unwrap_or(0.0);
                let mut vol_speed = mm3_per_mm * speed;
                if config.max_volumetric_speed > 0.0 {
                    vol_speed = vol_speed.min(config.max_volumetric_speed);
                }
                writeln!(
                    out,
                    "; {} extrusion width = {:.2}mm ({:.2}mm^3/s)",
                    label,
                    flow.width(),
                    vol_speed
                )?;
            }
            if self.print.has_support_material() {
                let width = if first_object.config.support_material_extrusion_width > 0.0 {
                    first_object.config.support_material_extrusion_width
                } else {
                    0.45
                };
                let flow = crate::flow::Flow::new(width.max(layer_height), layer_height)
                    .unwrap_or_else(|_| crate::flow::Flow::bridging_flow(width));
                let mut vol_speed =
                    flow.mm3_per_mm().unwrap_or(0.0) * first_object.config.support_material_speed;
                if config.max_volumetric_speed > 0.0 {
                    vol_speed = vol_speed.min(config.max_volumetric_speed);
                }
                writeln!(
                    out,
                    "; support material extrusion width = {:.2}mm ({:.2}mm^3/s)",
                    flow.width(),
                    vol_speed
                )?;
            }
            if config.first_layer_extrusion_width > 0.0 {
                writeln!(
                    out,
                    "; first layer extrusion width = {:.2}mm",
                    config.first_layer_extrusion_width
                )?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Emit one layer of one object at all of its placement copies.
    fn process_layer<W: Write>(&mut self, task: LayerTask, out: &mut W) -> Result<()> {
        let object = &self.print.objects[task.object_index];
        let layer = match task.layer {
            LayerRef::Normal(i) => &object.layers[i],
            LayerRef::Support(i) => &object.support_layers[i],
        };
        let config = &self.print.config;
        let mut gcode = String::new();

        self.state.first_layer = layer.id == 0;

        // A new cap only replaces the previous one when the layer yields
        // autospeed candidates.
        if let Some(cap) = AutoSpeedCalculator::layer_cap(self.print, object, layer) {
            self.state.volumetric_speed = cap;
        }

        // Second-layer temperature transition, once per job.
        if !self.state.second_layer_things_done && layer.id == 1 {
            gcode.push_str(&self.temperature.second_layer_transition(config, &self.writer));
            self.state.second_layer_things_done = true;
        }

        // Custom per-layer scripts see the current layer variables.
        if !config.before_layer_gcode.is_empty() || !config.layer_gcode.is_empty() {
            self.placeholder.set("layer_num", self.state.layer_index);
            self.placeholder.set("layer_z", layer.print_z);
            self.placeholder.set(
                "current_retraction",
                self.writer.extruder().map(|e| e.retracted).unwrap_or(0.0),
            );
            if !config.before_layer_gcode.is_empty() {
                gcode.push_str(&self.placeholder.process(&config.before_layer_gcode));
                gcode.push('\n');
            }
            if !config.layer_gcode.is_empty() {
                gcode.push_str(&self.placeholder.process(&config.layer_gcode));
                gcode.push('\n');
            }
        }

        self.emit_skirt(task, object, layer, &mut gcode)?;
        self.emit_brim(object, &mut gcode)?;

        for (copy_idx, &copy) in object.copies.iter().enumerate() {
            if config.label_printed_objects {
                gcode.push_str(&format!(
                    "; printing object {} id:{} copy {}\n",
                    object.name, task.object_index, copy_idx
                ));
            }

            // When starting a different object copy, route the first travel
            // move on the external planner.
            if self.state.last_obj_copy.is_some_and(|last| last != copy) {
                self.writer.avoid_crossing.use_external_mp = true;
            }
            self.state.last_obj_copy = Some(copy);
            self.writer.set_origin(copy.to_f64());

            // Support first: it may use a lower Z and travelling across it
            // while printing other things is avoided this way.
            if let LayerKind::Support {
                support_fills,
                interface_fills,
            } = &layer.kind
            {
                if !interface_fills.is_empty() {
                    gcode.push_str(&self.writer.set_extruder(
                        object
                            .config
                            .support_material_interface_extruder
                            .saturating_sub(1),
                    ));
                    let chained = chained_path_from(interface_fills, self.writer.last_pos());
                    for entity in &chained.entities {
                        gcode.push_str(&self.writer.extrude(
                            entity,
                            "support material interface",
                            object.config.support_material_interface_speed,
                            &self.state,
                        )?);
                    }
                }
                if !support_fills.is_empty() {
                    gcode.push_str(
                        &self
                            .writer
                            .set_extruder(object.config.support_material_extruder.saturating_sub(1)),
                    );
                    let chained = chained_path_from(support_fills, self.writer.last_pos());
                    for entity in &chained.entities {
                        gcode.push_str(&self.writer.extrude(
                            entity,
                            "support material",
                            object.config.support_material_speed,
                            &self.state,
                        )?);
                    }
                }
            }

            // Group extrusions by extruder, then by island: toolchanges are
            // minimized by draining the currently-loaded extruder first and
            // visiting the rest in ascending id order.
            let buckets = LayerBuckets::assign(layer, &self.print.regions);
            let mut extruder_order = buckets.extruders();
            if let Some(last) = self.writer.current_extruder_id() {
                if let Some(pos) = extruder_order.iter().position(|&e| e == last) {
                    extruder_order.remove(pos);
                    extruder_order.insert(0, last);
                }
            }

            for extruder in extruder_order {
                gcode.push_str(&self.writer.set_extruder(extruder));
                for island in buckets.islands(extruder) {
                    if config.infill_first {
                        self.extrude_infill(&buckets, extruder, island, &mut gcode)?;
                        self.extrude_perimeters(&buckets, extruder, island, &mut gcode)?;
                    } else {
                        self.extrude_perimeters(&buckets, extruder, island, &mut gcode)?;
                        self.extrude_infill(&buckets, extruder, island, &mut gcode)?;
                    }
                }
            }

            if config.label_printed_objects {
                gcode.push_str(&format!(
                    "; stop printing object {} id:{} copy {}\n",
                    object.name, task.object_index, copy_idx
                ));
            }
        }

        out.write_all(self.filters.apply(&gcode).as_bytes())?;
        self.state.layer_index += 1;
        Ok(())
    }

    /// Skirt emission: once per distinct Z while the skirt is active, also
    /// along raft layers, never along support layers.
    fn emit_skirt(
        &mut self,
        task: LayerTask,
        object: &crate::print::PrintObject,
        layer: &crate::print::Layer,
        gcode: &mut String,
    ) -> Result<()> {
        let config = &self.print.config;
        if self.print.skirt.is_empty() {
            return Ok(());
        }
        let raft = (layer.id as u32) < object.config.raft_layers;
        let skirt_active = config.has_infinite_skirt()
            || (self.state.skirt_done.len() as i32) < config.skirt_height;
        let due = raft
            || (skirt_active
                && !self.state.skirt_done.contains(&task.print_z)
                && !layer.is_support());
        if !due {
            return Ok(());
        }

        let extruder_ids: Vec<usize> = self.writer.extruders.keys().copied().collect();
        if extruder_ids.is_empty() {
            return Ok(());
        }

        self.writer.set_origin(PointF::zero());
        self.writer.avoid_crossing.use_external_mp = true;
        gcode.push_str(&self.writer.set_extruder(extruder_ids[0]));

        if config.has_infinite_skirt() || raft || (layer.id as i64) < config.skirt_height as i64 {
            let skirt_flow = self.print.skirt_flow().with_height(layer.height);
            let mm3_per_mm = skirt_flow.mm3_per_mm().unwrap_or(0.0);

            for (i, entity) in self.print.skirt.entities.iter().enumerate() {
                // layers above the first ignore min_skirt_length and print
                // only the configured loop count with the current extruder
                if !self.state.first_layer && i >= config.skirts as usize {
                    break;
                }
                // first layer: distribute loops across all extruders in
                // blocks so each one gets primed
                let extruder_id = extruder_ids[(i / extruder_ids.len()) % extruder_ids.len()];
                if self.state.first_layer {
                    gcode.push_str(&self.writer.set_extruder(extruder_id));
                }

                let mut entity = entity.clone();
                set_entity_flow(&mut entity, layer.height, mm3_per_mm);
                gcode.push_str(&self.writer.extrude(
                    &entity,
                    "skirt",
                    object.config.support_material_speed,
                    &self.state,
                )?);
            }
        }

        self.state.skirt_done.insert(task.print_z);
        self.writer.avoid_crossing.use_external_mp = false;
        // allow a straight travel move from the skirt to the first object
        if self.state.first_layer {
            self.writer.avoid_crossing.disable_once = true;
        }
        Ok(())
    }

    /// Brim emission: exactly once, at the configured brim extruder.
    fn emit_brim(&mut self, object: &crate::print::PrintObject, gcode: &mut String) -> Result<()> {
        if self.state.brim_done || self.print.brim.is_empty() {
            return Ok(());
        }
        gcode.push_str(&self.writer.set_extruder(self.print.brim_extruder()));
        self.writer.set_origin(PointF::zero());
        self.writer.avoid_crossing.use_external_mp = true;
        for entity in &self.print.brim.entities {
            gcode.push_str(&self.writer.extrude(
                entity,
                "brim",
                object.config.support_material_speed,
                &self.state,
            )?);
        }
        self.state.brim_done = true;
        self.writer.avoid_crossing.use_external_mp = false;
        // allow a straight travel move to the first object point
        self.writer.avoid_crossing.disable_once = true;
        Ok(())
    }

    /// Perimeters are emitted in original order: their start points carry
    /// seam-placement semantics that chaining would destroy.
    fn extrude_perimeters(
        &mut self,
        buckets: &LayerBuckets,
        extruder: usize,
        island: usize,
        gcode: &mut String,
    ) -> Result<()> {
        for (region_id, collection) in buckets.collections(extruder, island, BucketRole::Perimeter) {
            let region = self.print.get_region(region_id);
            for entity in &collection.entities {
                let speed = region.map_or(0.0, |r| role_speed(r, entity));
                gcode.push_str(&self.writer.extrude(entity, "perimeter", speed, &self.state)?);
            }
        }
        Ok(())
    }

    /// Infill groups are chained greedily from the current position; each
    /// group stays atomic.
    fn extrude_infill(
        &mut self,
        buckets: &LayerBuckets,
        extruder: usize,
        island: usize,
        gcode: &mut String,
    ) -> Result<()> {
        for (region_id, collection) in buckets.collections(extruder, island, BucketRole::Infill) {
            let region = self.print.get_region(region_id);
            let chained = chained_path_from(collection, self.writer.last_pos());
            for entity in &chained.entities {
                let speed = region.map_or(0.0, |r| role_speed(r, entity));
                gcode.push_str(&self.writer.extrude(entity, "infill", speed, &self.state)?);
            }
        }
        Ok(())
    }
}

/// Per-role configured speed; zero means "derive from the autospeed cap".
fn role_speed(region: &PrintRegion, entity: &ExtrusionEntity) -> f64 {
    match entity.role() {
        Some(ExtrusionRole::Perimeter) => region.config.perimeter_speed,
        Some(ExtrusionRole::ExternalPerimeter) => region.config.external_perimeter_speed,
        Some(ExtrusionRole::InternalInfill) => region.config.infill_speed,
        Some(ExtrusionRole::SolidInfill) => region.config.solid_infill_speed,
        Some(ExtrusionRole::TopSolidInfill) => region.config.top_solid_infill_speed,
        Some(ExtrusionRole::GapFill) => region.config.gap_fill_speed,
        _ => 0.0,
    }
}

/// Rewrite an entity's flow to a layer height (skirt reuse across layers).
fn set_entity_flow(entity: &mut ExtrusionEntity, height: f64, mm3_per_mm: f64) {
    match entity {
        ExtrusionEntity::Path(p) => {
            p.height = height;
            p.mm3_per_mm = mm3_per_mm;
        }
        ExtrusionEntity::Loop(l) => {
            for p in &mut l.paths {
                p.height = height;
                p.mm3_per_mm = mm3_per_mm;
            }
        }
        ExtrusionEntity::Collection(c) => {
            for e in &mut c.entities {
                set_entity_flow(e, height, mm3_per_mm);
            }
        }
    }
}

/// Append a config struct as `; key = value` lines, keys sorted.
fn write_config_dump<W: Write, C: Serialize>(out: &mut W, config: &C) -> Result<()> {
    let value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(map) = value {
        for (key, value) in map {
            writeln!(out, "; {} = {}", key, dump_value(&value))?;
        }
    }
    Ok(())
}

fn dump_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.replace('\n', "\\n"),
        serde_json::Value::Array(items) => items
            .iter()
            .map(dump_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

//! End-to-end G-code emission tests.
//!
//! These tests drive the whole pipeline through a print plan and inspect the
//! resulting document, covering:
//! - Global layer ordering across multiple objects
//! - Autospeed interaction with explicit per-class speeds
//! - Temperature command injection around the custom start script
//! - Multi-extruder toolchanges and filament usage accounting
//! - Skirt scheduling

use print_gcode::extrusion::{
    ExtrusionEntity, ExtrusionEntityCollection, ExtrusionLoop, ExtrusionPath, ExtrusionRole,
};
use print_gcode::gcode::GCodeAssembler;
use print_gcode::geometry::Point;
use print_gcode::print::{Layer, LayerRegion, Print, PrintObject, PrintRegion};

/// A closed square loop centered at (cx, cy) with half side r (mm).
fn square_loop(cx: f64, cy: f64, r: f64, role: ExtrusionRole, mm3_per_mm: f64) -> ExtrusionEntity {
    ExtrusionEntity::Loop(ExtrusionLoop::from_polyline(
        vec![
            Point::new_scale(cx - r, cy - r),
            Point::new_scale(cx + r, cy - r),
            Point::new_scale(cx + r, cy + r),
            Point::new_scale(cx - r, cy + r),
            Point::new_scale(cx - r, cy - r),
        ],
        role,
        mm3_per_mm,
    ))
}

/// A horizontal infill stroke grouped into an atomic collection.
fn infill_group(y: f64, mm3_per_mm: f64) -> ExtrusionEntity {
    let mut group = ExtrusionEntityCollection::new();
    group.push(ExtrusionEntity::Path(ExtrusionPath::new(
        vec![Point::new_scale(1.0, y), Point::new_scale(9.0, y)],
        ExtrusionRole::InternalInfill,
        mm3_per_mm,
    )));
    ExtrusionEntity::Collection(group)
}

/// An object with `n_layers` layers, each carrying one perimeter loop and
/// one infill group in region 0.
fn simple_object(name: &str, x: f64, y: f64, n_layers: usize) -> PrintObject {
    let mut object = PrintObject::new(name);
    object.copies = vec![Point::new_scale(x, y)];
    for i in 0..n_layers {
        let mut layer = Layer::new(i, 0.2 * (i as f64 + 1.0), 0.2);
        let mut layerm = LayerRegion::default();
        layerm
            .perimeters
            .push(square_loop(5.0, 5.0, 4.0, ExtrusionRole::Perimeter, 0.04));
        layerm.fills.push(infill_group(5.0, 0.05));
        layer.regions.push(layerm);
        object.layers.push(layer);
    }
    object
}

fn simple_print(n_layers: usize) -> Print {
    let mut print = Print::new();
    print.regions.push(PrintRegion::default());
    print.objects.push(simple_object("part", 0.0, 0.0, n_layers));
    print
}

fn emit(print: &Print) -> String {
    let mut assembler = GCodeAssembler::new(print).expect("plan should be valid");
    let mut out = Vec::new();
    assembler.output(&mut out).expect("emission should succeed");
    String::from_utf8(out).expect("output should be valid UTF-8")
}

/// Positions of every occurrence of a marker in the document.
fn positions(doc: &str, marker: &str) -> Vec<usize> {
    doc.match_indices(marker).map(|(i, _)| i).collect()
}

#[test]
fn test_document_smoke() {
    let doc = emit(&simple_print(3));

    // fixed framing commands
    assert!(doc.contains("G21 ; set units to millimeters"));
    assert!(doc.contains("G90 ; use absolute coordinates"));
    assert!(doc.contains("M82 ; use absolute distances for extrusion"));
    // default start/end scripts in place
    let start = doc.find("G28 ; home all axes").unwrap();
    let end = doc.find("M84 ; disable motors").unwrap();
    let first_move = doc.find("move to first perimeter point").unwrap();
    assert!(start < first_move && first_move < end);
    // usage summary and config dump close the document
    assert!(doc.find("; total filament used =").unwrap() > end);
    assert!(doc.find("; layer_height = 0.2").unwrap() > end);
}

#[test]
fn test_two_objects_interleave_by_z_nearest_first() {
    let mut print = Print::new();
    print.config.label_printed_objects = true;
    print.regions.push(PrintRegion::default());
    // "far" is pushed first but sits farther from the origin
    print.objects.push(simple_object("far", 80.0, 80.0, 2));
    print.objects.push(simple_object("near", 2.0, 2.0, 2));
    let doc = emit(&print);

    let near = positions(&doc, "; printing object near");
    let far = positions(&doc, "; printing object far");
    assert_eq!(near.len(), 2);
    assert_eq!(far.len(), 2);
    // per shared Z the near object goes first, and both layer-0 emissions
    // precede both layer-1 emissions
    assert!(near[0] < far[0]);
    assert!(far[0] < near[1]);
    assert!(near[1] < far[1]);
}

#[test]
fn test_complete_objects_mode_finishes_one_object_first() {
    let mut print = Print::new();
    print.config.complete_objects = true;
    print.config.label_printed_objects = true;
    print.regions.push(PrintRegion::default());
    print.objects.push(simple_object("far", 80.0, 80.0, 2));
    print.objects.push(simple_object("near", 2.0, 2.0, 2));
    let doc = emit(&print);

    let near = positions(&doc, "; printing object near");
    let far = positions(&doc, "; printing object far");
    // both near layers strictly precede both far layers
    assert!(near[1] < far[0]);
}

#[test]
fn test_autospeed_excludes_explicit_perimeters() {
    let mut print = simple_print(1);
    // infill class automatic, perimeter class fully explicit
    print.regions[0].config.infill_speed = 0.0;
    print.config.max_volumetric_speed = 2.0;
    let doc = emit(&print);

    // the thinnest infill flow is 0.05 mm3/mm: 0.05 * 80 = 4.0 mm3/s,
    // clamped to 2.0, so infill runs at 2.0 / 0.05 = 40 mm/s
    assert!(doc.contains("F2400 ; infill"));
    // had the thinner perimeter flow (0.04) leaked into the candidate set
    // the cap would be 1.6 mm3/s and infill would run at 32 mm/s
    assert!(!doc.contains("F1920 ; infill"));
    // perimeters keep their explicit 60 mm/s
    assert!(doc.contains("F3600 ; perimeter"));
}

#[test]
fn test_start_script_temperatures_are_not_duplicated() {
    let mut print = simple_print(1);
    print.config.start_gcode = "M190 S65\nM109 S210\nG28".to_string();
    let doc = emit(&print);
    // the trailing config dump echoes the script text; inspect the printed
    // body only
    let body = &doc[..doc.find("; total filament used =").unwrap()];

    // the script already heats both; nothing is injected around it
    assert_eq!(positions(body, "M190").len(), 1);
    assert_eq!(positions(body, "M109").len(), 1);
    assert!(!body.contains("M140 S60"));
    assert!(!body.contains("M104 S205"));
}

#[test]
fn test_default_temperatures_bracket_start_script() {
    let doc = emit(&simple_print(1));

    let m140 = doc.find("M140 S60").unwrap();
    let m104 = doc.find("M104 S205").unwrap();
    let start = doc.find("G28 ; home all axes").unwrap();
    let m190 = doc.find("M190 S60").unwrap();
    let m109 = doc.find("M109 S205").unwrap();
    assert!(m140 < start && m104 < start);
    assert!(start < m190 && start < m109);
}

#[test]
fn test_two_extruder_toolchange_and_usage() {
    let mut print = Print::new();
    // region 1 prints with the second extruder
    print.regions.push(PrintRegion::default());
    let mut second = PrintRegion::default();
    second.config.perimeter_extruder = 2;
    second.config.infill_extruder = 2;
    second.config.solid_infill_extruder = 2;
    print.regions.push(second);
    print.config.filament_diameter = vec![1.75, 1.75];
    print.config.filament_density = vec![1.25, 1.10];
    // keep the dangling end-of-job retraction out of the usage figures
    print.config.retract_length = vec![0.0, 0.0];

    let mut object = PrintObject::new("bimaterial");
    object.copies = vec![Point::zero()];
    let mut layer = Layer::new(0, 0.2, 0.2);
    let mut first_region = LayerRegion::default();
    first_region
        .perimeters
        .push(square_loop(5.0, 5.0, 4.0, ExtrusionRole::Perimeter, 0.04));
    let mut second_region = LayerRegion::default();
    second_region
        .perimeters
        .push(square_loop(15.0, 5.0, 4.0, ExtrusionRole::Perimeter, 0.04));
    layer.regions.push(first_region);
    layer.regions.push(second_region);
    object.layers.push(layer);
    print.objects.push(object);

    let mut assembler = GCodeAssembler::new(&print).unwrap();
    let mut out = Vec::new();
    assembler.output(&mut out).unwrap();
    let doc = String::from_utf8(out).unwrap();

    assert!(doc.contains("T1\n"));

    let usage = assembler.usage();
    assert_eq!(usage.per_extruder.len(), 2);
    let total: f64 = usage.per_extruder.values().map(|u| u.length).sum();
    assert!((total - usage.total_used_filament).abs() < 1e-9);
    // identical geometry, identical filament: equal lengths
    let lengths: Vec<f64> = usage.per_extruder.values().map(|u| u.length).collect();
    assert!((lengths[0] - lengths[1]).abs() < 1e-6);
    // different densities produce different weights
    let weights: Vec<f64> = usage.per_extruder.values().map(|u| u.weight).collect();
    assert!(weights[0] > weights[1]);
}

#[test]
fn test_skirt_prints_on_first_layer_only_by_default() {
    let mut print = simple_print(3);
    print
        .skirt
        .push(square_loop(5.0, 5.0, 8.0, ExtrusionRole::Skirt, 0.05));
    let doc = emit(&print);

    assert_eq!(positions(&doc, "move to first skirt point").len(), 1);
    // the skirt comes before any object perimeter
    let skirt = doc.find("move to first skirt point").unwrap();
    let perimeter = doc.find("move to first perimeter point").unwrap();
    assert!(skirt < perimeter);
}

#[test]
fn test_infinite_skirt_prints_on_every_layer() {
    let mut print = simple_print(3);
    print.config.skirt_height = -1;
    print
        .skirt
        .push(square_loop(5.0, 5.0, 8.0, ExtrusionRole::Skirt, 0.05));
    let doc = emit(&print);

    assert_eq!(positions(&doc, "move to first skirt point").len(), 3);
}

#[test]
fn test_skirt_prints_alongside_raft_layers() {
    let mut print = simple_print(3);
    print.objects[0].config.raft_layers = 2;
    print
        .skirt
        .push(square_loop(5.0, 5.0, 8.0, ExtrusionRole::Skirt, 0.05));
    let doc = emit(&print);

    // skirt_height stays at its default of 1, but both raft layers still
    // get a skirt pass; the plain layer above them does not
    assert_eq!(positions(&doc, "move to first skirt point").len(), 2);
}

#[test]
fn test_fan_disabled_before_heating() {
    let doc = emit(&simple_print(1));

    let fan_off = doc.find("M107").unwrap();
    let bed = doc.find("M140 S60").unwrap();
    let extruder = doc.find("M104 S205").unwrap();
    assert!(fan_off < bed && fan_off < extruder);
}

#[test]
fn test_brim_prints_once() {
    let mut print = simple_print(2);
    print
        .brim
        .push(square_loop(5.0, 5.0, 10.0, ExtrusionRole::Brim, 0.05));
    let doc = emit(&print);

    assert_eq!(positions(&doc, "move to first brim point").len(), 1);
}

#[test]
fn test_brim_on_dedicated_extruder_registers_and_extrudes() {
    let mut print = simple_print(1);
    print.config.brim_extruder = 2;
    print.config.filament_diameter = vec![1.75, 1.75];
    print.config.filament_density = vec![1.25, 1.25];
    // keep the dangling end-of-job retraction out of the usage figures
    print.config.retract_length = vec![0.0, 0.0];
    print
        .brim
        .push(square_loop(5.0, 5.0, 10.0, ExtrusionRole::Brim, 0.05));

    let mut assembler = GCodeAssembler::new(&print).unwrap();
    let mut out = Vec::new();
    assembler.output(&mut out).unwrap();
    let doc = String::from_utf8(out).unwrap();

    // the brim extruder is part of the plan even though no region uses it
    assert!(doc.contains("T1\n"));
    // its moves carry real filament, not zeroed E values
    assert!(!doc.contains("E0.00000 ; brim"));
    let usage = assembler.usage();
    assert!(usage.per_extruder.contains_key(&1));
    assert!(usage.per_extruder[&1].length > 0.0);
}

#[test]
fn test_infill_first_flips_island_order() {
    let mut print = simple_print(1);
    print.config.infill_first = true;
    let doc = emit(&print);
    let infill = doc.find("move to first infill point").unwrap();
    let perimeter = doc.find("move to first perimeter point").unwrap();
    assert!(infill < perimeter);

    let mut print = simple_print(1);
    print.config.infill_first = false;
    let doc = emit(&print);
    let infill = doc.find("move to first infill point").unwrap();
    let perimeter = doc.find("move to first perimeter point").unwrap();
    assert!(perimeter < infill);
}

#[test]
fn test_empty_object_is_rejected() {
    let mut print = Print::new();
    print.regions.push(PrintRegion::default());
    print.objects.push(PrintObject::new("hollow"));
    let mut assembler = GCodeAssembler::new(&print).unwrap();
    let mut out = Vec::new();
    assert!(assembler.output(&mut out).is_err());
}

#[test]
fn test_layer_scripts_see_layer_variables() {
    let mut print = simple_print(2);
    print.config.before_layer_gcode = ";BEFORE [layer_num]".to_string();
    print.config.layer_gcode = ";CHANGE z=[layer_z]".to_string();
    let doc = emit(&print);

    assert!(doc.contains(";BEFORE 0"));
    assert!(doc.contains(";BEFORE 1"));
    assert!(doc.contains(";CHANGE z=0.2"));
    assert!(doc.contains(";CHANGE z=0.4"));
}

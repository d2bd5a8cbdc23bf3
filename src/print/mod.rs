//! The print plan: objects, regions and layers ready for emission.
//!
//! This module holds the sliced geometry the emission engine consumes.
//! A [`Print`] owns its objects and regions for the duration of the job;
//! each [`PrintObject`] owns an ordered sequence of layers (normal and
//! support) tagged with their print height.

use std::collections::BTreeSet;

use crate::config::{PrintConfig, PrintObjectConfig, PrintRegionConfig};
use crate::extrusion::ExtrusionEntityCollection;
use crate::flow::Flow;
use crate::geometry::{ExPolygons, Point};
use crate::CoordF;

/// The whole print job.
#[derive(Debug, Default)]
pub struct Print {
    /// Job-wide configuration.
    pub config: PrintConfig,
    /// Defaults echoed into the trailing config dump.
    pub default_object_config: PrintObjectConfig,
    /// Defaults echoed into the trailing config dump.
    pub default_region_config: PrintRegionConfig,
    /// Objects to be printed.
    pub objects: Vec<PrintObject>,
    /// Shared per-material/per-feature regions, indexed by region id.
    pub regions: Vec<PrintRegion>,
    /// Skirt loops, ordered innermost-last.
    pub skirt: ExtrusionEntityCollection,
    /// Brim entities.
    pub brim: ExtrusionEntityCollection,
}

impl Print {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set of extruders (0-based) this job uses, in ascending order.
    ///
    /// Collected from region assignments plus support extruders of objects
    /// that carry support material.
    pub fn extruders(&self) -> BTreeSet<usize> {
        let mut set = BTreeSet::new();
        for region in &self.regions {
            set.insert(region.config.perimeter_extruder.saturating_sub(1));
            set.insert(region.config.infill_extruder.saturating_sub(1));
            set.insert(region.config.solid_infill_extruder.saturating_sub(1));
        }
        for object in &self.objects {
            if object.config.support_material || !object.support_layers.is_empty() {
                set.insert(object.config.support_material_extruder.saturating_sub(1));
                set.insert(
                    object
                        .config
                        .support_material_interface_extruder
                        .saturating_sub(1),
                );
            }
        }
        if !self.brim.is_empty() {
            set.insert(self.brim_extruder());
        }
        set
    }

    /// Whether any object in the job has support material.
    pub fn has_support_material(&self) -> bool {
        self.objects
            .iter()
            .any(|o| o.config.support_material || !o.support_layers.is_empty())
    }

    /// Extruder used for the brim (0-based).
    #[inline]
    pub fn brim_extruder(&self) -> usize {
        self.config.brim_extruder.saturating_sub(1)
    }

    /// Flow used for skirt loops on the first layer.
    ///
    /// The per-layer skirt emission rewrites the height to the current
    /// layer's height.
    pub fn skirt_flow(&self) -> Flow {
        let width = if self.config.skirt_extrusion_width > 0.0 {
            self.config.skirt_extrusion_width
        } else {
            0.5
        };
        let height = self
            .objects
            .first()
            .map(|o| o.config.layer_height)
            .unwrap_or(0.2);
        // Width and height validated positive above.
        Flow::new(width, height).unwrap_or_else(|_| Flow::bridging_flow(width))
    }

    /// Look up a region by id.
    #[inline]
    pub fn get_region(&self, region_id: usize) -> Option<&PrintRegion> {
        self.regions.get(region_id)
    }
}

/// A region shared by many layers: one material/feature configuration.
#[derive(Debug, Clone, Default)]
pub struct PrintRegion {
    pub config: PrintRegionConfig,
}

impl PrintRegion {
    pub fn new(config: PrintRegionConfig) -> Self {
        Self { config }
    }

    /// Flow for one of this region's feature classes at a given layer height.
    ///
    /// Used by the preamble summary; the width falls back to a conservative
    /// default when the per-role width is automatic.
    pub fn flow_width(&self, role: RegionFlowRole) -> f64 {
        let configured = match role {
            RegionFlowRole::ExternalPerimeter => self.config.external_perimeter_extrusion_width,
            RegionFlowRole::Perimeter => self.config.perimeter_extrusion_width,
            RegionFlowRole::Infill => self.config.infill_extrusion_width,
            RegionFlowRole::SolidInfill => self.config.solid_infill_extrusion_width,
            RegionFlowRole::TopSolidInfill => self.config.top_infill_extrusion_width,
        };
        if configured > 0.0 {
            configured
        } else {
            0.45
        }
    }

    /// Flow for one of this region's feature classes at a given layer height.
    pub fn flow(&self, role: RegionFlowRole, layer_height: f64) -> Flow {
        let width = self.flow_width(role).max(layer_height);
        // width >= height by construction
        Flow::new(width, layer_height).unwrap_or_else(|_| Flow::bridging_flow(width))
    }
}

/// Feature classes a region computes flows for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionFlowRole {
    ExternalPerimeter,
    Perimeter,
    Infill,
    SolidInfill,
    TopSolidInfill,
}

/// One physical model with one or more placement copies.
#[derive(Debug, Default)]
pub struct PrintObject {
    /// Object name, used by `label_printed_objects`.
    pub name: String,
    /// Placement copies as scaled 2D offsets; the first copy is the
    /// object's reference point for visit ordering.
    pub copies: Vec<Point>,
    /// Per-object configuration.
    pub config: PrintObjectConfig,
    /// Normal layers, bottom-up.
    pub layers: Vec<Layer>,
    /// Support layers, bottom-up.
    pub support_layers: Vec<Layer>,
}

impl PrintObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            copies: vec![Point::zero()],
            ..Self::default()
        }
    }

    /// Total number of layers (normal plus support).
    pub fn total_layer_count(&self) -> usize {
        self.layers.len() + self.support_layers.len()
    }
}

/// A single horizontal slice of one object, normal or support.
#[derive(Debug, Default)]
pub struct Layer {
    /// Monotonically increasing layer index within the object (0-based).
    pub id: usize,
    /// Print height of the top of this layer (mm).
    pub print_z: CoordF,
    /// Layer thickness (mm).
    pub height: CoordF,
    /// Slice polygons of the object's cross-section at this height; each
    /// one identifies an island for extrusion grouping.
    pub slices: ExPolygons,
    /// Per-region extrusion content, indexed by region id.
    pub regions: Vec<LayerRegion>,
    /// Normal or support variant data.
    pub kind: LayerKind,
}

impl Layer {
    pub fn new(id: usize, print_z: CoordF, height: CoordF) -> Self {
        Self {
            id,
            print_z,
            height,
            ..Self::default()
        }
    }

    /// Whether this is a support layer.
    #[inline]
    pub fn is_support(&self) -> bool {
        matches!(self.kind, LayerKind::Support { .. })
    }

    /// Extrusion content of a region on this layer.
    ///
    /// `None` means the region has nothing on this layer, which is not an
    /// error (objects and regions have differing layer spans).
    #[inline]
    pub fn get_region(&self, region_id: usize) -> Option<&LayerRegion> {
        self.regions.get(region_id)
    }
}

/// Variant data distinguishing normal from support layers.
#[derive(Debug, Default)]
pub enum LayerKind {
    /// A normal object layer; its content lives in the layer's regions.
    #[default]
    Normal,
    /// A support layer; support extrusions are not region-structured.
    Support {
        /// Base support extrusions.
        support_fills: ExtrusionEntityCollection,
        /// Support interface extrusions, printed before the base.
        interface_fills: ExtrusionEntityCollection,
    },
}

/// Extrusion content of one region on one layer.
#[derive(Debug, Default)]
pub struct LayerRegion {
    /// Perimeter groups; each entity is an atomic group for one slice.
    pub perimeters: ExtrusionEntityCollection,
    /// Infill groups; each entity is an atomic group for one surface.
    pub fills: ExtrusionEntityCollection,
}

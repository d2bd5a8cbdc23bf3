//! Island assignment: structuring a layer's entities for emission.
//!
//! Every non-degenerate entity of a layer lands in exactly one bucket keyed
//! by (extruder, island, region, role). Grouping by extruder first minimizes
//! toolchanges; islands group by spatial locality so the head finishes one
//! connected area before travelling to the next.

use std::collections::BTreeMap;

use tracing::trace;

use crate::extrusion::{ExtrusionEntity, ExtrusionEntityCollection};
use crate::geometry::{BoundingBox, Point};
use crate::print::{Layer, PrintRegion};

/// Which feature class a bucket holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketRole {
    Perimeter,
    Infill,
}

/// Composite key of one emission bucket.
///
/// Keys order by (extruder, island, region, role), which is exactly the
/// nesting the emission loop walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub extruder: usize,
    pub island: usize,
    pub region: usize,
    pub role: BucketRole,
}

/// Flat table of emission buckets for one layer.
#[derive(Debug, Default)]
pub struct LayerBuckets {
    buckets: BTreeMap<BucketKey, ExtrusionEntityCollection>,
}

impl LayerBuckets {
    /// Assign a layer's perimeter and infill groups to buckets.
    ///
    /// Island index is the first slice polygon whose bounding box and outer
    /// contour contain the entity's first point; the last slice index is the
    /// unconditional fallback so every non-degenerate entity is assigned
    /// exactly once. Holes are not excluded: perimeters and infill are
    /// pre-clipped, so outer-contour containment suffices.
    pub fn assign(layer: &Layer, regions: &[PrintRegion]) -> Self {
        let slice_bboxes: Vec<BoundingBox> =
            layer.slices.iter().map(|s| s.bounding_box()).collect();
        let n_slices = layer.slices.len();

        let point_inside_slice = |i: usize, point: &Point| -> bool {
            slice_bboxes[i].contains(point) && layer.slices[i].contour.contains_point(point)
        };
        let island_of = |point: Option<Point>| -> usize {
            if let Some(p) = point {
                for i in 0..n_slices {
                    // the last index is the catch-all bucket, first match wins
                    if i == n_slices - 1 || point_inside_slice(i, &p) {
                        return i;
                    }
                }
            }
            0
        };

        let mut buckets = Self::default();
        for (region_id, region) in regions.iter().enumerate() {
            let Some(layerm) = layer.get_region(region_id) else {
                // no content for this region on this layer
                continue;
            };

            let perimeter_extruder = region.config.perimeter_extruder.saturating_sub(1);
            for entity in &layerm.perimeters.entities {
                if entity.length() == 0.0 {
                    trace!(region_id, "skipping zero-length perimeter group");
                    continue;
                }
                buckets.append(
                    BucketKey {
                        extruder: perimeter_extruder,
                        island: island_of(entity.first_point()),
                        region: region_id,
                        role: BucketRole::Perimeter,
                    },
                    entity,
                );
            }

            for entity in &layerm.fills.entities {
                if entity.length() == 0.0 {
                    trace!(region_id, "skipping zero-length infill group");
                    continue;
                }
                let extruder = if entity.is_solid_infill() {
                    region.config.solid_infill_extruder.saturating_sub(1)
                } else {
                    region.config.infill_extruder.saturating_sub(1)
                };
                buckets.append(
                    BucketKey {
                        extruder,
                        island: island_of(entity.first_point()),
                        region: region_id,
                        role: BucketRole::Infill,
                    },
                    entity,
                );
            }
        }
        buckets
    }

    fn append(&mut self, key: BucketKey, entity: &ExtrusionEntity) {
        self.buckets.entry(key).or_default().append(entity);
    }

    /// Extruders with content, ascending.
    pub fn extruders(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.buckets.keys().map(|k| k.extruder).collect();
        out.dedup();
        out
    }

    /// Islands with content for one extruder, in index order.
    pub fn islands(&self, extruder: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .buckets
            .keys()
            .filter(|k| k.extruder == extruder)
            .map(|k| k.island)
            .collect();
        out.dedup();
        out
    }

    /// Collections of one feature class within one (extruder, island),
    /// ordered by region id.
    pub fn collections(
        &self,
        extruder: usize,
        island: usize,
        role: BucketRole,
    ) -> impl Iterator<Item = (usize, &ExtrusionEntityCollection)> {
        self.buckets
            .iter()
            .filter(move |(k, _)| k.extruder == extruder && k.island == island && k.role == role)
            .map(|(k, v)| (k.region, v))
    }

    /// Total number of bucketed entities.
    pub fn entity_count(&self) -> usize {
        self.buckets.values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

//! Layer scheduling: the global (object, layer) emission order.
//!
//! Objects are visited in a greedy nearest-neighbor tour over their
//! reference placement points; layers are merged across objects into one
//! z-ascending sequence so all content at a shared height is printed before
//! the head moves up. The physical process requires strict bottom-up
//! progression, which is what makes this a total order over
//! (Z ascending, object-visit-rank).

use std::collections::BTreeMap;

use tracing::debug;

use crate::geometry::Point;
use crate::print::{Print, PrintObject};
use crate::{scale, Coord, Error, Result};

/// Reference to one layer of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRef {
    /// Index into the object's normal layers.
    Normal(usize),
    /// Index into the object's support layers.
    Support(usize),
}

/// One unit of emission work: a single layer of a single object, printed at
/// all of the object's placement copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerTask {
    /// Index of the object in the print plan.
    pub object_index: usize,
    /// Print height in scaled units (the z-bucket key).
    pub print_z: Coord,
    /// Which of the object's layers to emit.
    pub layer: LayerRef,
}

/// Computes the global layer emission order.
pub struct LayerScheduler;

impl LayerScheduler {
    /// Produce the ordered task sequence for a print plan.
    ///
    /// An object with no layers at all is a structural error; an object
    /// simply missing a layer at some shared Z contributes nothing at that
    /// height.
    pub fn schedule(print: &Print) -> Result<Vec<LayerTask>> {
        for object in &print.objects {
            if object.total_layer_count() == 0 {
                return Err(Error::EmptyObject(object.name.clone()));
            }
        }

        let visit_order = Self::object_visit_order(&print.objects);
        let tasks = if print.config.complete_objects {
            Self::schedule_complete_objects(print, &visit_order)
        } else {
            Self::schedule_interleaved(print, &visit_order)
        };
        debug!(
            objects = print.objects.len(),
            tasks = tasks.len(),
            "layer schedule computed"
        );
        Ok(tasks)
    }

    /// Greedy nearest-neighbor tour over each object's reference placement
    /// point (its first copy), starting at the origin.
    fn object_visit_order(objects: &[PrintObject]) -> Vec<usize> {
        let reference_points: Vec<Point> = objects
            .iter()
            .map(|o| o.copies.first().copied().unwrap_or_else(Point::zero))
            .collect();
        super::chaining::chained_points(&reference_points)
    }

    /// Default mode: merge all objects' layers into one z-ascending stream.
    fn schedule_interleaved(print: &Print, visit_order: &[usize]) -> Vec<LayerTask> {
        // Z is bucketed in scaled integer units so layers of different
        // objects at the same nominal height never diverge into separate
        // buckets through floating-point noise.
        let mut buckets: BTreeMap<Coord, Vec<LayerTask>> = BTreeMap::new();
        for (object_index, object) in print.objects.iter().enumerate() {
            for (i, layer) in object.layers.iter().enumerate() {
                buckets
                    .entry(scale(layer.print_z))
                    .or_default()
                    .push(LayerTask {
                        object_index,
                        print_z: scale(layer.print_z),
                        layer: LayerRef::Normal(i),
                    });
            }
            for (i, layer) in object.support_layers.iter().enumerate() {
                buckets
                    .entry(scale(layer.print_z))
                    .or_default()
                    .push(LayerTask {
                        object_index,
                        print_z: scale(layer.print_z),
                        layer: LayerRef::Support(i),
                    });
            }
        }

        let mut tasks = Vec::new();
        for bucket in buckets.values() {
            for &object_index in visit_order {
                // preserves normal-before-support insertion order per object
                tasks.extend(bucket.iter().filter(|t| t.object_index == object_index));
            }
        }
        tasks
    }

    /// Alternate mode: finish each object completely before the next one.
    fn schedule_complete_objects(print: &Print, visit_order: &[usize]) -> Vec<LayerTask> {
        let mut tasks = Vec::new();
        for &object_index in visit_order {
            let object = &print.objects[object_index];
            let mut object_tasks: Vec<LayerTask> = Vec::new();
            for (i, layer) in object.layers.iter().enumerate() {
                object_tasks.push(LayerTask {
                    object_index,
                    print_z: scale(layer.print_z),
                    layer: LayerRef::Normal(i),
                });
            }
            for (i, layer) in object.support_layers.iter().enumerate() {
                object_tasks.push(LayerTask {
                    object_index,
                    print_z: scale(layer.print_z),
                    layer: LayerRef::Support(i),
                });
            }
            // stable: normal stays before support within one z
            object_tasks.sort_by_key(|t| t.print_z);
            tasks.extend(object_tasks);
        }
        tasks
    }
}

//! Greedy path chaining.
//!
//! Reorders a group of extrusion entities so consecutive travel distance is
//! minimized from a given starting point. This is O(n²) nearest-neighbor,
//! not optimal: n per island is small and "good enough" travel reduction is
//! all ordering needs. Entities whose end point is nearer than their start
//! are flipped when their direction is free (open paths); atomic groups and
//! loops keep their internal order.

use crate::extrusion::ExtrusionEntityCollection;
use crate::geometry::Point;

/// Chain a collection's entities starting from `start`.
///
/// The output is a permutation of the input: nothing is dropped or
/// duplicated, entities without geometry sort last.
pub fn chained_path_from(
    collection: &ExtrusionEntityCollection,
    start: Point,
) -> ExtrusionEntityCollection {
    let mut remaining: Vec<_> = collection.entities.iter().cloned().collect();
    let mut ordered = ExtrusionEntityCollection::new();
    let mut current = start;

    while !remaining.is_empty() {
        let mut best: Option<(usize, bool, i128)> = None;
        for (i, entity) in remaining.iter().enumerate() {
            let Some(first) = entity.first_point() else {
                continue;
            };
            let d_start = current.distance_squared(&first);
            // strict comparison keeps the earliest entity on ties
            if best.is_none_or(|(_, _, d)| d_start < d) {
                best = Some((i, false, d_start));
            }
            if entity.can_reverse() {
                if let Some(last) = entity.last_point() {
                    let d_end = current.distance_squared(&last);
                    if best.is_none_or(|(_, _, d)| d_end < d) {
                        best = Some((i, true, d_end));
                    }
                }
            }
        }

        let (index, flip) = match best {
            Some((i, flip, _)) => (i, flip),
            // only geometry-less entities remain; emit them in input order
            None => (0, false),
        };

        let mut entity = remaining.remove(index);
        if flip {
            entity.reverse();
        }
        if let Some(far_end) = entity.last_point() {
            current = far_end;
        }
        ordered.push(entity);
    }

    ordered
}

/// Greedy nearest-neighbor visiting order over a set of reference points,
/// starting from the origin. Ties break on insertion order.
///
/// Used to compute the object-visit order of the layer scheduler: a greedy
/// tour, not an optimal one.
pub fn chained_points(points: &[Point]) -> Vec<usize> {
    let mut order = Vec::with_capacity(points.len());
    let mut visited = vec![false; points.len()];
    let mut current = Point::zero();

    for _ in 0..points.len() {
        let mut best: Option<(usize, i128)> = None;
        for (i, p) in points.iter().enumerate() {
            if visited[i] {
                continue;
            }
            let d = current.distance_squared(p);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        // points is non-empty on every iteration by construction
        if let Some((i, _)) = best {
            visited[i] = true;
            order.push(i);
            current = points[i];
        }
    }

    order
}

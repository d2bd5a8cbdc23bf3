//! Extrusion entities: paths, loops and collections.
//!
//! An extrusion entity is a polyline (open path) or closed loop of scaled 2D
//! points tagged with a role and a flow. Collections group entities per role
//! per region per layer; a collection appearing inside another collection is
//! an atomic group that chaining must keep together.

use crate::geometry::Point;
use crate::CoordF;
use serde::{Deserialize, Serialize};

/// Role of an extrusion entity.
///
/// The role selects the destination extruder, the speed policy and the
/// label attached to the emitted moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtrusionRole {
    Perimeter,
    ExternalPerimeter,
    InternalInfill,
    SolidInfill,
    TopSolidInfill,
    GapFill,
    Skirt,
    Brim,
    SupportMaterial,
    SupportMaterialInterface,
}

impl ExtrusionRole {
    /// Whether this role is printed with the solid-infill extruder.
    #[inline]
    pub fn is_solid_infill(&self) -> bool {
        matches!(self, Self::SolidInfill | Self::TopSolidInfill)
    }

    /// Human-readable label used in emitted G-code comments.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Perimeter => "perimeter",
            Self::ExternalPerimeter => "perimeter",
            Self::InternalInfill => "infill",
            Self::SolidInfill => "infill",
            Self::TopSolidInfill => "infill",
            Self::GapFill => "gap fill",
            Self::Skirt => "skirt",
            Self::Brim => "brim",
            Self::SupportMaterial => "support material",
            Self::SupportMaterialInterface => "support material interface",
        }
    }
}

/// An open extrusion path: a polyline with a role and a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrusionPath {
    /// The points of the path, in scaled coordinates.
    pub polyline: Vec<Point>,
    /// Role of this path.
    pub role: ExtrusionRole,
    /// Volumetric flow (mm³ per mm of travel).
    pub mm3_per_mm: CoordF,
    /// Extrusion width (mm).
    pub width: CoordF,
    /// Extrusion height (mm).
    pub height: CoordF,
}

impl ExtrusionPath {
    pub fn new(polyline: Vec<Point>, role: ExtrusionRole, mm3_per_mm: CoordF) -> Self {
        Self {
            polyline,
            role,
            mm3_per_mm,
            width: 0.0,
            height: 0.0,
        }
    }

    /// First point of the path; `None` for a degenerate empty path.
    #[inline]
    pub fn first_point(&self) -> Option<Point> {
        self.polyline.first().copied()
    }

    /// Last point of the path; `None` for a degenerate empty path.
    #[inline]
    pub fn last_point(&self) -> Option<Point> {
        self.polyline.last().copied()
    }

    /// Total length of the path in scaled units.
    pub fn length(&self) -> CoordF {
        self.polyline
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }

    /// Reverse the direction of the path in place.
    pub fn reverse(&mut self) {
        self.polyline.reverse();
    }
}

/// A closed extrusion loop, stored as one or more consecutive paths.
///
/// Splitting a loop into paths allows different flows along the loop
/// (e.g. overhang segments); the last point of the final path coincides
/// with the first point of the first path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrusionLoop {
    pub paths: Vec<ExtrusionPath>,
}

impl ExtrusionLoop {
    pub fn new(paths: Vec<ExtrusionPath>) -> Self {
        Self { paths }
    }

    /// Build a loop from a single closed polyline.
    pub fn from_polyline(polyline: Vec<Point>, role: ExtrusionRole, mm3_per_mm: CoordF) -> Self {
        Self {
            paths: vec![ExtrusionPath::new(polyline, role, mm3_per_mm)],
        }
    }

    #[inline]
    pub fn first_point(&self) -> Option<Point> {
        self.paths.first().and_then(|p| p.first_point())
    }

    pub fn length(&self) -> CoordF {
        self.paths.iter().map(|p| p.length()).sum()
    }
}

/// Any extrusion entity: a path, a loop, or an atomic group of entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtrusionEntity {
    Path(ExtrusionPath),
    Loop(ExtrusionLoop),
    /// A group that must be extruded as a unit; chaining may reorder groups
    /// relative to each other but never the contents of a group.
    Collection(ExtrusionEntityCollection),
}

impl ExtrusionEntity {
    /// First point of the entity, if it has any geometry.
    pub fn first_point(&self) -> Option<Point> {
        match self {
            Self::Path(p) => p.first_point(),
            Self::Loop(l) => l.first_point(),
            Self::Collection(c) => c.first_point(),
        }
    }

    /// Last point of the entity. For loops this equals the first point.
    pub fn last_point(&self) -> Option<Point> {
        match self {
            Self::Path(p) => p.last_point(),
            Self::Loop(l) => l.first_point(),
            Self::Collection(c) => c.last_point(),
        }
    }

    /// Total length in scaled units.
    pub fn length(&self) -> CoordF {
        match self {
            Self::Path(p) => p.length(),
            Self::Loop(l) => l.length(),
            Self::Collection(c) => c.length(),
        }
    }

    /// Whether the entity can be flipped by the path chainer.
    ///
    /// Loops have coincident endpoints and atomic groups carry an internal
    /// order, so only open paths reverse.
    pub fn can_reverse(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    /// Reverse the entity direction if it is reversible.
    pub fn reverse(&mut self) {
        if let Self::Path(p) = self {
            p.reverse();
        }
    }

    /// The role of the entity (first role found for groups).
    pub fn role(&self) -> Option<ExtrusionRole> {
        match self {
            Self::Path(p) => Some(p.role),
            Self::Loop(l) => l.paths.first().map(|p| p.role),
            Self::Collection(c) => c.entities.iter().find_map(|e| e.role()),
        }
    }

    /// Minimum volumetric flow across the entity, if it has any geometry.
    pub fn min_mm3_per_mm(&self) -> Option<CoordF> {
        match self {
            Self::Path(p) => Some(p.mm3_per_mm),
            Self::Loop(l) => l
                .paths
                .iter()
                .map(|p| p.mm3_per_mm)
                .fold(None, |acc, v| Some(acc.map_or(v, |a: CoordF| a.min(v)))),
            Self::Collection(c) => c.min_mm3_per_mm(),
        }
    }

    /// Whether this entity is solid or top solid infill.
    pub fn is_solid_infill(&self) -> bool {
        self.role().is_some_and(|r| r.is_solid_infill())
    }
}

/// An ordered collection of extrusion entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtrusionEntityCollection {
    pub entities: Vec<ExtrusionEntity>,
}

impl ExtrusionEntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: Vec<ExtrusionEntity>) -> Self {
        Self { entities }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn push(&mut self, entity: ExtrusionEntity) {
        self.entities.push(entity);
    }

    /// Append a clone of another entity to this collection.
    pub fn append(&mut self, entity: &ExtrusionEntity) {
        self.entities.push(entity.clone());
    }

    pub fn first_point(&self) -> Option<Point> {
        self.entities.iter().find_map(|e| e.first_point())
    }

    pub fn last_point(&self) -> Option<Point> {
        self.entities.iter().rev().find_map(|e| e.last_point())
    }

    pub fn length(&self) -> CoordF {
        self.entities.iter().map(|e| e.length()).sum()
    }

    /// Minimum volumetric flow across all contained entities.
    ///
    /// `None` when the collection holds no geometry, so empty regions never
    /// contribute an autospeed candidate.
    pub fn min_mm3_per_mm(&self) -> Option<CoordF> {
        self.entities
            .iter()
            .filter_map(|e| e.min_mm3_per_mm())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: CoordF| a.min(v))))
    }
}

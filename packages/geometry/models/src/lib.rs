#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry kinds, coordinate trees, and wire geometry types.
//!
//! Two coordinate orders exist side by side and must never be mixed:
//!
//! * **Source order** (`[x, y]` = `[longitude, latitude]`) is what every
//!   geometry representation hands out. [`RawGeometry`] carries it.
//! * **Wire order** (`[latitude, longitude]`) is what the frontends
//!   consume. [`WireGeometry`] and [`BoundingBox`] carry it, always as
//!   [`LatLon`] values.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A single position in source order: `[x, y]` (longitude, latitude).
pub type Position = [f64; 2];

/// Type tag of a wire record's geometry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// An ordered sequence of positions.
    Line,
    /// An exterior ring followed by zero or more interior rings.
    Polygon,
    /// A sequence of polygons.
    MultiPolygon,
    /// A cluster of features, shaped as a multipolygon on the wire.
    Cluster,
}

/// A coordinate tree in source order, as yielded by a geometry adapter.
///
/// Polygon rings are guaranteed closed with at least four positions when
/// produced by the adapter; this type itself does not enforce it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGeometry {
    /// `[x, y]`
    Point(Position),
    /// Vertices in order.
    Line(Vec<Position>),
    /// Exterior ring first, then interior rings.
    Polygon(Vec<Vec<Position>>),
    /// Component polygons, each as a list of rings.
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl RawGeometry {
    /// Returns the type tag for this geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::Line(_) => GeometryKind::Line,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }
}

/// A position in wire order. Serializes as `[latitude, longitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    /// Swaps a source-order `[x, y]` position into wire order.
    #[must_use]
    pub const fn from_position(position: Position) -> Self {
        Self(position[1], position[0])
    }

    /// Latitude component.
    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.0
    }

    /// Longitude component.
    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.1
    }

    /// Per-axis minimum of two positions.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0), self.1.min(other.1))
    }

    /// Per-axis maximum of two positions.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0), self.1.max(other.1))
    }
}

/// A normalized coordinate tree in wire order.
///
/// Serializes without a tag; the nesting depth identifies the shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireGeometry {
    /// `[lat, lon]`
    Point(LatLon),
    /// `[[lat, lon], ...]`
    Line(Vec<LatLon>),
    /// `[ring, ...]`, exterior first.
    Polygon(Vec<Vec<LatLon>>),
    /// `[[ring, ...], ...]`, one list of rings per component polygon.
    MultiPolygon(Vec<Vec<Vec<LatLon>>>),
}

impl WireGeometry {
    /// Returns the type tag for this geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::Line(_) => GeometryKind::Line,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Iterates over every position in the tree, rings in order.
    pub fn positions(&self) -> Box<dyn Iterator<Item = LatLon> + '_> {
        match self {
            Self::Point(p) => Box::new(std::iter::once(*p)),
            Self::Line(line) => Box::new(line.iter().copied()),
            Self::Polygon(rings) => Box::new(rings.iter().flatten().copied()),
            Self::MultiPolygon(polygons) => {
                Box::new(polygons.iter().flatten().flatten().copied())
            }
        }
    }
}

/// Bounding box in wire order.
///
/// Point geometries get a point-shaped box (`[lat, lon]`); everything else
/// gets a `[min_corner, max_corner]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BoundingBox {
    /// Box of a point geometry: both corners are the point itself.
    Point(LatLon),
    /// `(min_corner, max_corner)`
    Corners(LatLon, LatLon),
}

impl BoundingBox {
    /// Computes the box spanning every position, or `None` when there are
    /// none.
    pub fn from_positions(positions: impl IntoIterator<Item = LatLon>) -> Option<Self> {
        positions.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self::Corners(p, p),
                Some(b) => Self::Corners(b.min().min(p), b.max().max(p)),
            })
        })
    }

    /// Minimum corner (south-west).
    #[must_use]
    pub const fn min(&self) -> LatLon {
        match *self {
            Self::Point(p) | Self::Corners(p, _) => p,
        }
    }

    /// Maximum corner (north-east).
    #[must_use]
    pub const fn max(&self) -> LatLon {
        match *self {
            Self::Point(p) | Self::Corners(_, p) => p,
        }
    }

    /// Whether `p` lies inside the box, corners included.
    #[must_use]
    pub fn contains(&self, p: LatLon) -> bool {
        let (min, max) = (self.min(), self.max());
        (min.0..=max.0).contains(&p.0) && (min.1..=max.1).contains(&p.1)
    }
}

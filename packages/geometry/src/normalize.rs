//! Coordinate normalization into the wire format.
//!
//! Every position is swapped from source order `[x, y]` into wire order
//! `[lat, lon]`. Bounding boxes are computed over every position of the
//! tree, interior rings included, so holes never shrink a box. Rings are
//! copied verbatim: nothing here closes, reorders, or rounds.

use generic_map_api_geometry_models::{BoundingBox, LatLon, Position, RawGeometry, WireGeometry};

use crate::{GeometryError, GeometryValue};

fn swap_all(positions: &[Position]) -> Vec<LatLon> {
    positions.iter().copied().map(LatLon::from_position).collect()
}

fn swap_rings(rings: &[Vec<Position>]) -> Vec<Vec<LatLon>> {
    rings.iter().map(|ring| swap_all(ring)).collect()
}

/// Normalizes a source-order coordinate tree.
///
/// Returns the wire geometry and its bounding box. Points get a
/// point-shaped box; all other kinds get `(min_corner, max_corner)`.
///
/// # Errors
///
/// Returns [`GeometryError::EmptyGeometry`] if a non-point geometry has no
/// positions.
pub fn normalize(raw: &RawGeometry) -> Result<(WireGeometry, BoundingBox), GeometryError> {
    let geom = match raw {
        RawGeometry::Point(p) => {
            let p = LatLon::from_position(*p);
            return Ok((WireGeometry::Point(p), BoundingBox::Point(p)));
        }
        RawGeometry::Line(line) => WireGeometry::Line(swap_all(line)),
        RawGeometry::Polygon(rings) => WireGeometry::Polygon(swap_rings(rings)),
        RawGeometry::MultiPolygon(polygons) => {
            WireGeometry::MultiPolygon(polygons.iter().map(|p| swap_rings(p)).collect())
        }
    };

    let bbox = BoundingBox::from_positions(geom.positions()).ok_or(GeometryError::EmptyGeometry)?;

    Ok((geom, bbox))
}

/// Extracts and normalizes a geometry value in one step.
///
/// # Errors
///
/// Returns [`GeometryError`] if extraction or normalization fails.
pub fn normalize_value(value: GeometryValue<'_>) -> Result<(WireGeometry, BoundingBox), GeometryError> {
    normalize(&value.raw_geometry()?)
}

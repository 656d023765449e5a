//! Geometry representation recognition.
//!
//! A [`GeometryValue`] borrows a geometry in one of the supported
//! representation families and yields its coordinate tree in source order
//! (`[x, y]`) without interpreting it. Each family has its own extractor,
//! expressed as a [`GeometrySource`] implementation; callers never need to
//! know which family they are holding.

use generic_map_api_geometry_models::{Position, RawGeometry};
use serde_json::Value;

use crate::GeometryError;

/// Anything that can hand out its coordinate tree in source order.
///
/// Implement this for domain types that carry their own coordinates and
/// pass them as [`GeometryValue::Custom`].
pub trait GeometrySource {
    /// Returns the coordinate tree in source order.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the value is not a supported geometry
    /// kind or its coordinates are malformed.
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError>;
}

/// A borrowed geometry in one of the recognized representation families.
#[derive(Clone, Copy)]
pub enum GeometryValue<'a> {
    /// A `geo-types` geometry.
    Geo(&'a geo::Geometry<f64>),
    /// A typed `GeoJSON` geometry.
    GeoJson(&'a geojson::Geometry),
    /// A `GeoJSON`-like JSON object with `type` and `coordinates` keys.
    Mapping(&'a Value),
    /// Any other type exposing its coordinates.
    Custom(&'a dyn GeometrySource),
}

impl std::fmt::Debug for GeometryValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geo(g) => f.debug_tuple("Geo").field(g).finish(),
            Self::GeoJson(g) => f.debug_tuple("GeoJson").field(g).finish(),
            Self::Mapping(v) => f.debug_tuple("Mapping").field(v).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<'a> From<&'a geo::Geometry<f64>> for GeometryValue<'a> {
    fn from(value: &'a geo::Geometry<f64>) -> Self {
        Self::Geo(value)
    }
}

impl<'a> From<&'a geojson::Geometry> for GeometryValue<'a> {
    fn from(value: &'a geojson::Geometry) -> Self {
        Self::GeoJson(value)
    }
}

impl<'a> From<&'a Value> for GeometryValue<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Mapping(value)
    }
}

impl GeometryValue<'_> {
    /// Extracts the coordinate tree in source order.
    ///
    /// Polygon rings are checked here: every ring must be closed and hold
    /// at least four positions. Nothing downstream re-closes rings.
    ///
    /// # Errors
    ///
    /// * [`GeometryError::UnsupportedGeometryKind`] if the value matches no
    ///   recognized shape
    /// * [`GeometryError::MalformedCoordinates`] if positions are not
    ///   numeric pairs
    /// * [`GeometryError::UnclosedRing`] / [`GeometryError::RingTooShort`]
    ///   for invalid polygon rings
    /// * [`GeometryError::EmptyGeometry`] if there are no positions
    pub fn raw_geometry(self) -> Result<RawGeometry, GeometryError> {
        let raw = match self {
            Self::Geo(g) => g.raw_geometry(),
            Self::GeoJson(g) => g.raw_geometry(),
            Self::Mapping(v) => v.raw_geometry(),
            Self::Custom(source) => source.raw_geometry(),
        }?;
        validate(&raw)?;
        Ok(raw)
    }

    /// Centroid of the geometry, in source order.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if extraction fails or the geometry has
    /// no centroid.
    pub fn centroid(self) -> Result<geo::Point<f64>, GeometryError> {
        use geo::Centroid as _;

        to_geo(&self.raw_geometry()?)
            .centroid()
            .ok_or(GeometryError::EmptyGeometry)
    }
}

/// Converts a source-order coordinate tree into a `geo-types` geometry.
#[must_use]
pub fn to_geo(raw: &RawGeometry) -> geo::Geometry<f64> {
    fn line(positions: &[Position]) -> geo::LineString<f64> {
        geo::LineString::from(positions.to_vec())
    }

    fn polygon(rings: &[Vec<Position>]) -> geo::Polygon<f64> {
        let mut rings = rings.iter().map(|r| line(r));
        let exterior = rings.next().unwrap_or_else(|| geo::LineString::new(vec![]));
        geo::Polygon::new(exterior, rings.collect())
    }

    match raw {
        RawGeometry::Point([x, y]) => geo::Geometry::Point(geo::Point::new(*x, *y)),
        RawGeometry::Line(positions) => geo::Geometry::LineString(line(positions)),
        RawGeometry::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)),
        RawGeometry::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(geo::MultiPolygon(
            polygons.iter().map(|p| polygon(p)).collect(),
        )),
    }
}

fn validate(raw: &RawGeometry) -> Result<(), GeometryError> {
    match raw {
        RawGeometry::Point(_) => Ok(()),
        RawGeometry::Line(line) if line.is_empty() => Err(GeometryError::EmptyGeometry),
        RawGeometry::Line(_) => Ok(()),
        RawGeometry::Polygon(rings) => validate_polygon(rings),
        RawGeometry::MultiPolygon(polygons) if polygons.is_empty() => {
            Err(GeometryError::EmptyGeometry)
        }
        RawGeometry::MultiPolygon(polygons) => {
            polygons.iter().try_for_each(|p| validate_polygon(p))
        }
    }
}

fn validate_polygon(rings: &[Vec<Position>]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(GeometryError::RingTooShort { len: ring.len() });
        }
        if ring.first() != ring.last() {
            return Err(GeometryError::UnclosedRing);
        }
    }
    Ok(())
}

// ── geo-types ───────────────────────────────────────────────────────

fn geo_line(line: &geo::LineString<f64>) -> Vec<Position> {
    line.coords().map(|c| [c.x, c.y]).collect()
}

fn geo_polygon(polygon: &geo::Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(geo_line)
        .collect()
}

impl GeometrySource for geo::Point<f64> {
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError> {
        Ok(RawGeometry::Point([self.x(), self.y()]))
    }
}

impl GeometrySource for geo::LineString<f64> {
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError> {
        Ok(RawGeometry::Line(geo_line(self)))
    }
}

impl GeometrySource for geo::Polygon<f64> {
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError> {
        Ok(RawGeometry::Polygon(geo_polygon(self)))
    }
}

impl GeometrySource for geo::MultiPolygon<f64> {
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError> {
        Ok(RawGeometry::MultiPolygon(
            self.iter().map(geo_polygon).collect(),
        ))
    }
}

impl GeometrySource for geo::Geometry<f64> {
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError> {
        match self {
            Self::Point(p) => p.raw_geometry(),
            Self::Line(l) => Ok(RawGeometry::Line(vec![
                [l.start.x, l.start.y],
                [l.end.x, l.end.y],
            ])),
            Self::LineString(l) => l.raw_geometry(),
            Self::Polygon(p) => p.raw_geometry(),
            Self::MultiPolygon(mp) => mp.raw_geometry(),
            Self::Rect(r) => r.to_polygon().raw_geometry(),
            Self::Triangle(t) => t.to_polygon().raw_geometry(),
            Self::MultiPoint(_) => Err(GeometryError::unsupported("MultiPoint")),
            Self::MultiLineString(_) => Err(GeometryError::unsupported("MultiLineString")),
            Self::GeometryCollection(_) => {
                Err(GeometryError::unsupported("GeometryCollection"))
            }
        }
    }
}

// ── typed GeoJSON ───────────────────────────────────────────────────

fn geojson_position(position: &[f64]) -> Result<Position, GeometryError> {
    match position {
        [x, y, ..] => Ok([*x, *y]),
        _ => Err(GeometryError::malformed(format!(
            "position has {} ordinates, expected at least 2",
            position.len()
        ))),
    }
}

fn geojson_positions(positions: &[Vec<f64>]) -> Result<Vec<Position>, GeometryError> {
    positions.iter().map(|p| geojson_position(p)).collect()
}

fn geojson_rings(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<Position>>, GeometryError> {
    rings.iter().map(|r| geojson_positions(r)).collect()
}

impl GeometrySource for geojson::Geometry {
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError> {
        use geojson::Value as G;

        match &self.value {
            G::Point(p) => Ok(RawGeometry::Point(geojson_position(p)?)),
            G::LineString(line) => Ok(RawGeometry::Line(geojson_positions(line)?)),
            G::Polygon(rings) => Ok(RawGeometry::Polygon(geojson_rings(rings)?)),
            G::MultiPolygon(polygons) => Ok(RawGeometry::MultiPolygon(
                polygons
                    .iter()
                    .map(|p| geojson_rings(p))
                    .collect::<Result<_, _>>()?,
            )),
            G::MultiPoint(_) => Err(GeometryError::unsupported("MultiPoint")),
            G::MultiLineString(_) => Err(GeometryError::unsupported("MultiLineString")),
            G::GeometryCollection(_) => Err(GeometryError::unsupported("GeometryCollection")),
        }
    }
}

// ── GeoJSON-like mappings ───────────────────────────────────────────

fn json_array<'a>(value: &'a Value, what: &str) -> Result<&'a [Value], GeometryError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| GeometryError::malformed(format!("{what} is not an array")))
}

fn json_number(value: &Value) -> Result<f64, GeometryError> {
    value
        .as_f64()
        .ok_or_else(|| GeometryError::malformed(format!("`{value}` is not a number")))
}

fn json_position(value: &Value) -> Result<Position, GeometryError> {
    match json_array(value, "position")? {
        [x, y, ..] => Ok([json_number(x)?, json_number(y)?]),
        other => Err(GeometryError::malformed(format!(
            "position has {} ordinates, expected at least 2",
            other.len()
        ))),
    }
}

fn json_positions(value: &Value) -> Result<Vec<Position>, GeometryError> {
    json_array(value, "position list")?
        .iter()
        .map(json_position)
        .collect()
}

fn json_rings(value: &Value) -> Result<Vec<Vec<Position>>, GeometryError> {
    json_array(value, "ring list")?
        .iter()
        .map(json_positions)
        .collect()
}

impl GeometrySource for Value {
    fn raw_geometry(&self) -> Result<RawGeometry, GeometryError> {
        let (Some(kind), Some(coordinates)) = (
            self.get("type").and_then(Value::as_str),
            self.get("coordinates"),
        ) else {
            return Err(GeometryError::unsupported(
                "mapping without `type` and `coordinates`",
            ));
        };

        match kind {
            "Point" => Ok(RawGeometry::Point(json_position(coordinates)?)),
            "LineString" => Ok(RawGeometry::Line(json_positions(coordinates)?)),
            "Polygon" => Ok(RawGeometry::Polygon(json_rings(coordinates)?)),
            "MultiPolygon" => Ok(RawGeometry::MultiPolygon(
                json_array(coordinates, "polygon list")?
                    .iter()
                    .map(json_rings)
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(GeometryError::unsupported(other)),
        }
    }
}

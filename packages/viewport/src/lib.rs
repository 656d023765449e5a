#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request viewports.
//!
//! A [`Viewport`] is built once per request from query parameters and is
//! read-only afterwards. It is either an explicit pair of corners (usually
//! decoded from a geohash pair), a slippy-map tile address, or
//! [`Viewport::Empty`], which imposes no spatial filter at all.
//!
//! All coordinates here are in source order: `x` is longitude, `y` is
//! latitude.

use std::f64::consts::PI;

use geo::{Intersects as _, Point, Polygon, Rect};

/// Errors raised while decoding viewport query parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewportError {
    /// The parameter text does not decode into corners or a tile address.
    #[error("Malformed viewport parameter `{param}`: {message}")]
    MalformedViewportParameter {
        /// The raw parameter value.
        param: String,
        /// Description of what went wrong.
        message: String,
    },
}

impl ViewportError {
    fn malformed(param: &str, message: impl Into<String>) -> Self {
        Self::MalformedViewportParameter {
            param: param.to_string(),
            message: message.into(),
        }
    }
}

/// The spatial window of a request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Viewport {
    /// Explicit corners.
    Corners {
        /// North-west corner.
        upper_left: Point<f64>,
        /// South-east corner.
        lower_right: Point<f64>,
    },
    /// A slippy-map tile.
    Tile {
        /// Tile column.
        x: u32,
        /// Tile row.
        y: u32,
        /// Zoom level.
        z: u8,
    },
    /// No spatial filter.
    #[default]
    Empty,
}

impl Viewport {
    /// Builds a viewport from the `tile` and `viewport` query parameters.
    ///
    /// `tile` wins when both are present; with neither the viewport is
    /// [`Viewport::Empty`].
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::MalformedViewportParameter`] if the chosen
    /// parameter does not parse.
    pub fn from_query(tile: Option<&str>, viewport: Option<&str>) -> Result<Self, ViewportError> {
        let viewport = match (tile, viewport) {
            (Some(tile), _) => Self::from_tile_param(tile)?,
            (None, Some(geohashes)) => Self::from_geohashes_param(geohashes)?,
            (None, None) => Self::Empty,
        };
        log::trace!("Request viewport: {viewport:?}");
        Ok(viewport)
    }

    /// Decodes `"<nw_geohash>/<se_geohash>"`, or a single geohash used for
    /// both corners.
    ///
    /// Longitudes come from the outer edges of the cells (west of the
    /// first, east of the second) and latitudes from their inner edges
    /// (south of the first, north of the second). A single geohash
    /// therefore yields exactly its own cell.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::MalformedViewportParameter`] if a geohash is
    /// empty or contains invalid characters.
    pub fn from_geohashes_param(param: &str) -> Result<Self, ViewportError> {
        let mut hashes = param.split('/');
        let first = hashes.next().unwrap_or_default();
        let second = hashes.next().unwrap_or(first);

        let decode = |hash: &str| -> Result<Rect<f64>, ViewportError> {
            if hash.is_empty() {
                return Err(ViewportError::malformed(param, "empty geohash"));
            }
            geohash::decode_bbox(hash).map_err(|e| ViewportError::malformed(param, e.to_string()))
        };

        let first_cell = decode(first)?;
        let second_cell = decode(second)?;

        Ok(Self::Corners {
            upper_left: first_cell.min().into(),
            lower_right: second_cell.max().into(),
        })
    }

    /// Decodes `"x/y/z"`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewportError::MalformedViewportParameter`] unless the
    /// parameter is exactly three non-negative integers.
    pub fn from_tile_param(param: &str) -> Result<Self, ViewportError> {
        let parts: Vec<&str> = param.split('/').collect();
        let [x, y, z] = parts.as_slice() else {
            return Err(ViewportError::malformed(
                param,
                "tile has to be defined by exactly 3 integers",
            ));
        };

        let int = |s: &str| {
            s.trim()
                .parse::<u32>()
                .map_err(|e| ViewportError::malformed(param, format!("`{s}`: {e}")))
        };

        let z = u8::try_from(int(z)?)
            .map_err(|_| ViewportError::malformed(param, "zoom level out of range"))?;

        Ok(Self::Tile {
            x: int(x)?,
            y: int(y)?,
            z,
        })
    }

    /// Whether this viewport imposes no spatial filter.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The viewport as a rectangle, or `None` for [`Viewport::Empty`].
    #[must_use]
    pub fn to_rect(&self) -> Option<Rect<f64>> {
        match *self {
            Self::Corners {
                upper_left,
                lower_right,
            } => Some(Rect::new(upper_left.0, lower_right.0)),
            Self::Tile { x, y, z } => {
                let upper_left = tile_corner(f64::from(x), f64::from(y), z);
                let lower_right = tile_corner(f64::from(x) + 1.0, f64::from(y) + 1.0, z);
                Some(Rect::new(upper_left.0, lower_right.0))
            }
            Self::Empty => None,
        }
    }

    /// The viewport as a bounding polygon, or `None` for
    /// [`Viewport::Empty`].
    #[must_use]
    pub fn to_polygon(&self) -> Option<Polygon<f64>> {
        self.to_rect().map(|rect| rect.to_polygon())
    }

    /// `(width, height)` in degrees, or `None` for [`Viewport::Empty`].
    #[must_use]
    pub fn dimensions(&self) -> Option<(f64, f64)> {
        self.to_rect().map(|rect| (rect.width(), rect.height()))
    }

    /// Whether `geometry` falls inside the viewport. Always `true` for
    /// [`Viewport::Empty`].
    #[must_use]
    pub fn intersects(&self, geometry: &geo::Geometry<f64>) -> bool {
        self.to_polygon()
            .is_none_or(|polygon| geometry.intersects(&polygon))
    }
}

/// North-west corner of slippy-map tile `(x, y)` at zoom `z`, as
/// `(longitude, latitude)` degrees.
#[must_use]
pub fn tile_to_degrees(x: u32, y: u32, z: u8) -> Point<f64> {
    tile_corner(f64::from(x), f64::from(y), z)
}

fn tile_corner(x: f64, y: f64, z: u8) -> Point<f64> {
    let n = 2_f64.powi(i32::from(z));
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    Point::new(lon, lat)
}

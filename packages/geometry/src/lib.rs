#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry adapters and coordinate normalization.
//!
//! The [`adapter`] module recognizes a geometry value's representation
//! (`geo-types`, typed `GeoJSON`, a `GeoJSON`-like JSON mapping, or any
//! type implementing [`GeometrySource`]) and yields its coordinate tree in
//! source order. The [`normalize`] module turns that tree into the wire
//! format: axis-swapped `[lat, lon]` coordinates plus a bounding box.

pub mod adapter;
pub mod normalize;

pub use adapter::{GeometrySource, GeometryValue};
pub use generic_map_api_geometry_models as models;
pub use normalize::{normalize, normalize_value};

/// Errors raised while extracting or normalizing a single geometry.
///
/// These are always scoped to one item; callers iterating over a stream
/// of items skip or report the failing item and carry on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The value matches none of the recognized geometry shapes.
    #[error("Unsupported geometry kind: {kind}")]
    UnsupportedGeometryKind {
        /// Name of the kind that was encountered.
        kind: String,
    },

    /// The kind was recognized but its coordinates are not usable.
    #[error("Malformed coordinates: {message}")]
    MalformedCoordinates {
        /// Description of what went wrong.
        message: String,
    },

    /// A polygon ring does not end where it starts.
    #[error("Polygon ring is not closed")]
    UnclosedRing,

    /// A polygon ring has fewer than four positions.
    #[error("Polygon ring has {len} positions, expected at least 4")]
    RingTooShort {
        /// Number of positions in the offending ring.
        len: usize,
    },

    /// The geometry has no positions at all.
    #[error("Geometry is empty")]
    EmptyGeometry,
}

impl GeometryError {
    pub(crate) fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedGeometryKind { kind: kind.into() }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedCoordinates {
            message: message.into(),
        }
    }
}

//! Wire record shapes.

use generic_map_api_geometry_models::{BoundingBox, GeometryKind, WireGeometry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of member records a [`ClusterDetail::Summary`] exposes unless
/// the serializer says otherwise.
pub const DEFAULT_SUMMARY_LIMIT: usize = 10;

/// Record keys extra attributes may not use.
pub const RESERVED_KEYS: [&str; 4] = ["type", "id", "geom", "bbox"];

/// A serialized feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireRecord {
    /// Type tags, e.g. `["polygon"]` or `["parcel", "polygon"]`.
    #[serde(rename = "type")]
    pub type_tag: Vec<String>,
    /// Opaque identifier, `null` when the serializer has none.
    pub id: Value,
    /// Normalized coordinates in `[lat, lon]` order.
    pub geom: WireGeometry,
    /// Bounding box of `geom`.
    pub bbox: BoundingBox,
    /// Extra per-feature attributes, flattened into the record. Never
    /// holds one of [`RESERVED_KEYS`].
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// A serialized cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecord {
    /// Always `["cluster"]`.
    #[serde(rename = "type")]
    pub type_tag: Vec<String>,
    /// Always `null`.
    pub id: Value,
    /// The cluster hull as a multipolygon, `[lat, lon]` order.
    pub geom: WireGeometry,
    /// Bounding box of the hull.
    pub bbox: BoundingBox,
    /// Number of member features.
    pub count: usize,
    /// Member records, depending on [`ClusterDetail`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<WireRecord>>,
}

impl ClusterRecord {
    pub(crate) fn new(
        geom: WireGeometry,
        bbox: BoundingBox,
        count: usize,
        items: Option<Vec<WireRecord>>,
    ) -> Self {
        Self {
            type_tag: vec![GeometryKind::Cluster.to_string()],
            id: Value::Null,
            geom,
            bbox,
            count,
            items,
        }
    }
}

/// Either kind of record in a list response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MapItem {
    /// A single feature.
    Feature(WireRecord),
    /// A cluster of features.
    Cluster(ClusterRecord),
}

/// How much of a cluster's membership its record exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterDetail {
    /// Member count only.
    #[default]
    Count,
    /// Member count plus the first few member records.
    Summary,
    /// Member count plus every member record.
    Full,
}

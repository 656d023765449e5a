#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature and cluster serialization.
//!
//! [`FeatureSerializer`] is the per-feature-type seam: an implementation
//! says where an item's geometry lives, and optionally its id, feature type
//! tag, and extra attributes. The provided methods turn items, clusters,
//! and clustering outputs into [`WireRecord`]s / [`ClusterRecord`]s.
//!
//! Streams produced by [`serialize_stream`] and
//! [`serialize_clustered_stream`] are lazy and single-pass. A failing item
//! yields an `Err` for that item only; everything after it is still
//! produced. Dropping the stream stops all upstream work.

pub mod bounds;
pub mod record;

use generic_map_api_clustering_models::{Cluster, ClusteringOutput};
use generic_map_api_geometry::{GeometryError, GeometryValue, normalize_value};
use generic_map_api_geometry_models::GeometryKind;
use serde_json::{Map, Value};

pub use bounds::{
    BoundingBoxAccumulator, BoundsSummary, Corner, find_bounding_box, find_clustered_bounding_box,
};
pub use record::{
    ClusterDetail, ClusterRecord, DEFAULT_SUMMARY_LIMIT, MapItem, RESERVED_KEYS, WireRecord,
};

/// Errors that can occur while serializing a single item or cluster.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeError {
    /// Geometry extraction or normalization failed.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// Serialization strategy for one feature type.
pub trait FeatureSerializer<T: ?Sized> {
    /// Where the item's geometry lives.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the item has no usable geometry.
    fn geometry<'a>(&self, item: &'a T) -> Result<GeometryValue<'a>, GeometryError>;

    /// Feature type tag prefixed to every record's type.
    fn feature_type(&self) -> Option<&str> {
        None
    }

    /// The item's identifier.
    fn id(&self, _item: &T) -> Value {
        Value::Null
    }

    /// Extra attributes merged into the item's record. Keys in
    /// [`RESERVED_KEYS`] are dropped.
    fn extra_attributes(&self, _item: &T) -> Map<String, Value> {
        Map::new()
    }

    /// How much membership cluster records expose.
    fn cluster_detail(&self) -> ClusterDetail {
        ClusterDetail::Count
    }

    /// Member records exposed by [`ClusterDetail::Summary`].
    fn summary_limit(&self) -> usize {
        DEFAULT_SUMMARY_LIMIT
    }

    /// `[feature_type?, kind]`
    fn type_tag(&self, kind: GeometryKind) -> Vec<String> {
        self.feature_type()
            .map(str::to_string)
            .into_iter()
            .chain(std::iter::once(kind.to_string()))
            .collect()
    }

    /// Serializes a single item.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] if the item's geometry cannot be
    /// extracted or normalized.
    fn serialize(&self, item: &T) -> Result<WireRecord, SerializeError> {
        let (geom, bbox) = normalize_value(self.geometry(item)?)?;

        let mut attributes = self.extra_attributes(item);
        attributes.retain(|key, _| {
            let reserved = RESERVED_KEYS.contains(&key.as_str());
            if reserved {
                log::debug!("Dropping reserved attribute `{key}`");
            }
            !reserved
        });

        Ok(WireRecord {
            type_tag: self.type_tag(geom.kind()),
            id: self.id(item),
            geom,
            bbox,
            attributes,
        })
    }

    /// Serializes a single item for a detail view. Same as
    /// [`Self::serialize`] unless overridden.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] if the item's geometry cannot be
    /// extracted or normalized.
    fn serialize_details(&self, item: &T) -> Result<WireRecord, SerializeError> {
        self.serialize(item)
    }

    /// Serializes a cluster.
    ///
    /// Members whose geometry fails are left out of `items` but still
    /// counted.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] if the cluster hull cannot be normalized.
    fn serialize_cluster(&self, cluster: &Cluster<&T>) -> Result<ClusterRecord, SerializeError> {
        let (geom, bbox) = normalize_value(GeometryValue::Custom(&cluster.shape))?;

        let limit = match self.cluster_detail() {
            ClusterDetail::Count => None,
            ClusterDetail::Summary => Some(self.summary_limit()),
            ClusterDetail::Full => Some(cluster.len()),
        };

        let items = limit.map(|limit| {
            cluster
                .items
                .iter()
                .filter_map(|member| match self.serialize(member) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        log::debug!("Skipping cluster member: {e}");
                        None
                    }
                })
                .take(limit)
                .collect()
        });

        Ok(ClusterRecord::new(geom, bbox, cluster.len(), items))
    }

    /// Serializes one element of a clustering output stream.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] if the orphan or cluster fails to
    /// serialize.
    fn serialize_output(&self, output: &ClusteringOutput<&T>) -> Result<MapItem, SerializeError> {
        match output {
            ClusteringOutput::Cluster(cluster) => self.serialize_cluster(cluster).map(MapItem::Cluster),
            ClusteringOutput::Orphan(item) => self.serialize(item).map(MapItem::Feature),
        }
    }
}

type GeometryFn<T> =
    Box<dyn for<'a> Fn(&'a T) -> Result<GeometryValue<'a>, GeometryError> + Send + Sync>;
type IdFn<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type AttributesFn<T> = Box<dyn Fn(&T) -> Map<String, Value> + Send + Sync>;

/// A [`FeatureSerializer`] assembled from closures.
pub struct BasicFeatureSerializer<T> {
    feature_type: Option<String>,
    geometry: GeometryFn<T>,
    id: Option<IdFn<T>>,
    attributes: Option<AttributesFn<T>>,
    cluster_detail: ClusterDetail,
    summary_limit: usize,
}

impl<T> std::fmt::Debug for BasicFeatureSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicFeatureSerializer")
            .field("feature_type", &self.feature_type)
            .field("cluster_detail", &self.cluster_detail)
            .field("summary_limit", &self.summary_limit)
            .finish_non_exhaustive()
    }
}

impl<T> BasicFeatureSerializer<T> {
    /// Creates a serializer that reads geometries with `geometry`.
    #[must_use]
    pub fn new(
        geometry: impl for<'a> Fn(&'a T) -> Result<GeometryValue<'a>, GeometryError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            feature_type: None,
            geometry: Box::new(geometry),
            id: None,
            attributes: None,
            cluster_detail: ClusterDetail::default(),
            summary_limit: DEFAULT_SUMMARY_LIMIT,
        }
    }

    /// Sets the feature type tag.
    #[must_use]
    pub fn with_feature_type(mut self, feature_type: impl Into<String>) -> Self {
        self.feature_type = Some(feature_type.into());
        self
    }

    /// Sets the id extractor.
    #[must_use]
    pub fn with_id(mut self, id: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        self.id = Some(Box::new(id));
        self
    }

    /// Sets the extra-attribute extractor.
    #[must_use]
    pub fn with_attributes(
        mut self,
        attributes: impl Fn(&T) -> Map<String, Value> + Send + Sync + 'static,
    ) -> Self {
        self.attributes = Some(Box::new(attributes));
        self
    }

    /// Sets how much membership cluster records expose.
    #[must_use]
    pub const fn with_cluster_detail(mut self, cluster_detail: ClusterDetail) -> Self {
        self.cluster_detail = cluster_detail;
        self
    }

    /// Sets the member count exposed by [`ClusterDetail::Summary`].
    #[must_use]
    pub const fn with_summary_limit(mut self, summary_limit: usize) -> Self {
        self.summary_limit = summary_limit;
        self
    }
}

impl<T> FeatureSerializer<T> for BasicFeatureSerializer<T> {
    fn geometry<'a>(&self, item: &'a T) -> Result<GeometryValue<'a>, GeometryError> {
        (self.geometry)(item)
    }

    fn feature_type(&self) -> Option<&str> {
        self.feature_type.as_deref()
    }

    fn id(&self, item: &T) -> Value {
        self.id.as_ref().map_or(Value::Null, |id| id(item))
    }

    fn extra_attributes(&self, item: &T) -> Map<String, Value> {
        self.attributes
            .as_ref()
            .map_or_else(Map::new, |attributes| attributes(item))
    }

    fn cluster_detail(&self) -> ClusterDetail {
        self.cluster_detail
    }

    fn summary_limit(&self) -> usize {
        self.summary_limit
    }
}

/// Lazily serializes every item.
pub fn serialize_stream<'a, T, S>(
    serializer: &'a S,
    items: impl IntoIterator<Item = &'a T> + 'a,
) -> impl Iterator<Item = Result<WireRecord, SerializeError>> + 'a
where
    T: ?Sized + 'a,
    S: FeatureSerializer<T> + ?Sized,
{
    items.into_iter().map(move |item| serializer.serialize(item))
}

/// Lazily serializes a clustering output stream.
pub fn serialize_clustered_stream<'a, T, S>(
    serializer: &'a S,
    outputs: impl IntoIterator<Item = ClusteringOutput<&'a T>> + 'a,
) -> impl Iterator<Item = Result<MapItem, SerializeError>> + 'a
where
    T: ?Sized + 'a,
    S: FeatureSerializer<T> + ?Sized,
{
    outputs
        .into_iter()
        .map(move |output| serializer.serialize_output(&output))
}

/// Drains a record stream, keeping successes and logging failures.
pub fn collect_records<R>(records: impl IntoIterator<Item = Result<R, SerializeError>>) -> Vec<R> {
    records
        .into_iter()
        .filter_map(|record| match record {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Dropping item that failed to serialize: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use generic_map_api_geometry_models::{BoundingBox, LatLon, WireGeometry};
    use serde_json::json;

    struct Item {
        id: i64,
        geometry: Value,
    }

    fn point_item(id: i64, x: f64, y: f64) -> Item {
        Item {
            id,
            geometry: json!({"type": "Point", "coordinates": [x, y]}),
        }
    }

    fn serializer() -> BasicFeatureSerializer<Item> {
        BasicFeatureSerializer::new(|item: &Item| Ok(GeometryValue::Mapping(&item.geometry)))
    }

    struct Geometryless;

    impl FeatureSerializer<Item> for Geometryless {
        fn geometry<'a>(&self, item: &'a Item) -> Result<GeometryValue<'a>, GeometryError> {
            Ok(GeometryValue::Mapping(&item.geometry))
        }
    }

    fn square_cluster(items: Vec<&Item>) -> Cluster<&Item> {
        let ring = geo::LineString::from(vec![
            (0.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (1.0, 0.0),
            (0.0, 0.0),
        ]);
        Cluster {
            centroid: geo::Point::new(0.5, 0.5),
            shape: geo::MultiPolygon(vec![geo::Polygon::new(ring, vec![])]),
            items,
        }
    }

    #[test]
    fn serializes_point_without_feature_type() {
        let record = serializer().serialize(&point_item(1, 1.0, 2.0)).unwrap();
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"type": ["point"], "geom": [2.0, 1.0], "id": null, "bbox": [2.0, 1.0]})
        );
    }

    #[test]
    fn prefixes_configured_feature_type() {
        let serializer = serializer().with_feature_type("test");
        let record = serializer.serialize(&point_item(1, 1.0, 2.0)).unwrap();
        assert_eq!(record.type_tag, vec!["test", "point"]);
    }

    #[test]
    fn type_tag_ends_with_geometry_kind() {
        let line = Item {
            id: 1,
            geometry: json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]}),
        };
        for serializer in [serializer(), serializer().with_feature_type("road")] {
            let record = serializer.serialize(&line).unwrap();
            assert_eq!(record.type_tag.last().map(String::as_str), Some("line"));
            assert_eq!(record.type_tag.len(), 1 + usize::from(serializer.feature_type().is_some()));
        }
    }

    #[test]
    fn uses_id_and_attribute_extractors() {
        let serializer = serializer()
            .with_id(|item| json!(item.id))
            .with_attributes(|_| {
                let mut map = Map::new();
                map.insert("category".to_string(), json!("A"));
                map
            });
        let record = serializer.serialize(&point_item(7, 20.0, 50.0)).unwrap();
        assert_eq!(record.id, json!(7));
        assert_eq!(record.attributes.get("category"), Some(&json!("A")));
    }

    #[test]
    fn reserved_attribute_keys_cannot_shadow_record_fields() {
        let serializer = serializer()
            .with_id(|item| json!(item.id))
            .with_attributes(|_| {
                let mut map = Map::new();
                map.insert("id".to_string(), json!("shadow"));
                map.insert("geom".to_string(), json!("bogus"));
                map.insert("name".to_string(), json!("Alpha"));
                map
            });
        let record = serializer.serialize(&point_item(1, 20.0, 50.0)).unwrap();

        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(text.matches("\"id\"").count(), 1);
        assert_eq!(text.matches("\"geom\"").count(), 1);
        assert_eq!(
            serde_json::from_str::<Value>(&text).unwrap(),
            json!({
                "type": ["point"],
                "id": 1,
                "geom": [50.0, 20.0],
                "bbox": [50.0, 20.0],
                "name": "Alpha",
            })
        );
    }

    #[test]
    fn trait_defaults_need_only_geometry() {
        let record = Geometryless.serialize_details(&point_item(3, 1.0, 2.0)).unwrap();
        assert_eq!(record.id, Value::Null);
        assert!(record.attributes.is_empty());
        assert_eq!(Geometryless.cluster_detail(), ClusterDetail::Count);
    }

    #[test]
    fn serializes_cluster_from_its_hull() {
        let a = point_item(1, 0.0, 0.0);
        let b = point_item(2, 1.0, 1.0);
        let record = serializer().serialize_cluster(&square_cluster(vec![&a, &b])).unwrap();

        assert_eq!(record.type_tag, vec!["cluster"]);
        assert_eq!(record.id, Value::Null);
        assert_eq!(record.count, 2);
        assert!(record.items.is_none());
        assert!(matches!(record.geom, WireGeometry::MultiPolygon(_)));
        assert_eq!(record.bbox, BoundingBox::Corners(LatLon(0.0, 0.0), LatLon(1.0, 1.0)));
    }

    #[test]
    fn summary_detail_truncates_members() {
        let items: Vec<Item> = (0..5).map(|i| point_item(i, 0.0, 0.0)).collect();
        let serializer = serializer()
            .with_cluster_detail(ClusterDetail::Summary)
            .with_summary_limit(2);
        let record = serializer
            .serialize_cluster(&square_cluster(items.iter().collect()))
            .unwrap();
        assert_eq!(record.count, 5);
        assert_eq!(record.items.map(|items| items.len()), Some(2));
    }

    #[test]
    fn full_detail_skips_broken_members_but_counts_them() {
        let good = point_item(1, 0.0, 0.0);
        let broken = Item {
            id: 2,
            geometry: json!({"type": "Circle"}),
        };
        let serializer = serializer().with_cluster_detail(ClusterDetail::Full);
        let record = serializer
            .serialize_cluster(&square_cluster(vec![&good, &broken]))
            .unwrap();
        assert_eq!(record.count, 2);
        assert_eq!(record.items.map(|items| items.len()), Some(1));
    }

    #[test]
    fn summary_fills_its_limit_past_broken_members() {
        let broken = Item {
            id: 0,
            geometry: json!({"type": "Circle"}),
        };
        let items: Vec<Item> = (1..4).map(|i| point_item(i, 0.0, 0.0)).collect();
        let mut members = vec![&broken];
        members.extend(items.iter());

        let serializer = serializer()
            .with_id(|item| json!(item.id))
            .with_cluster_detail(ClusterDetail::Summary)
            .with_summary_limit(2);
        let record = serializer.serialize_cluster(&square_cluster(members)).unwrap();

        assert_eq!(record.count, 4);
        let ids: Vec<Value> = record
            .items
            .unwrap()
            .into_iter()
            .map(|member| member.id)
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
    }

    #[test]
    fn stream_isolates_failing_items() {
        let items = vec![
            point_item(1, 0.0, 0.0),
            Item {
                id: 2,
                geometry: json!({"type": "MultiPoint", "coordinates": [[0, 0]]}),
            },
            point_item(3, 1.0, 1.0),
        ];
        let serializer = serializer();
        let results: Vec<_> = serialize_stream(&serializer, &items).collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SerializeError::Geometry(GeometryError::UnsupportedGeometryKind { .. }))
        ));
        assert!(results[2].is_ok());
        assert_eq!(collect_records(results).len(), 2);
    }

    #[test]
    fn clustered_stream_renders_orphans_as_features() {
        let a = point_item(1, 0.0, 0.0);
        let b = point_item(2, 5.0, 5.0);
        let outputs = vec![
            ClusteringOutput::Cluster(square_cluster(vec![&a])),
            ClusteringOutput::Orphan(&b),
        ];
        let serializer = serializer();
        let items = collect_records(serialize_clustered_stream(&serializer, outputs));

        assert!(matches!(items[0], MapItem::Cluster(_)));
        assert!(matches!(items[1], MapItem::Feature(_)));
    }
}

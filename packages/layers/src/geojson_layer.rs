//! In-memory layers backed by a `GeoJSON` feature collection.

use std::collections::BTreeMap;
use std::path::Path;

use generic_map_api_clustering_models::ClusteringConfig;
use generic_map_api_geometry::adapter::to_geo;
use generic_map_api_geometry::{GeometryError, GeometryValue};
use generic_map_api_serializer::{BasicFeatureSerializer, FeatureSerializer, RESERVED_KEYS};
use generic_map_api_viewport::Viewport;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::{Map, Value, json};

use crate::{
    FeatureLayer, LayerDefinition, LayerError, ParamValue, ParsedParams, QueryParam,
    ViewportRequirement,
};

/// A layer whose features live in memory, loaded once from `GeoJSON`.
///
/// Features without an id get their position in the collection as id, and
/// ids must be unique after that. Every feature must carry a geometry the
/// adapter accepts; loading fails otherwise.
pub struct GeoJsonLayer {
    definition: LayerDefinition,
    features: Vec<Feature>,
    shapes: Vec<geo::Geometry<f64>>,
    ids: BTreeMap<String, usize>,
    serializer: BasicFeatureSerializer<Feature>,
}

impl std::fmt::Debug for GeoJsonLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoJsonLayer")
            .field("id", &self.definition.id)
            .field("features", &self.features.len())
            .finish_non_exhaustive()
    }
}

fn id_key(id: &Id) -> String {
    match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
    }
}

fn id_value(id: &Id) -> Value {
    match id {
        Id::String(s) => Value::String(s.clone()),
        Id::Number(n) => Value::Number(n.clone()),
    }
}

fn feature_geometry(feature: &Feature) -> Result<GeometryValue<'_>, GeometryError> {
    feature
        .geometry
        .as_ref()
        .map(GeometryValue::GeoJson)
        .ok_or(GeometryError::EmptyGeometry)
}

fn select_attributes(feature: &Feature, attributes: &[String]) -> Map<String, Value> {
    attributes
        .iter()
        .filter_map(|name| {
            feature
                .property(name)
                .map(|value| (name.clone(), value.clone()))
        })
        .collect()
}

fn property_matches(feature: &Feature, property: &str, value: &ParamValue) -> bool {
    match feature.property(property) {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => value.accepts(text),
        Some(other) => value.accepts(&other.to_string()),
    }
}

fn serializer_for(definition: &LayerDefinition) -> BasicFeatureSerializer<Feature> {
    let attributes = definition.attributes.clone();

    let mut serializer = BasicFeatureSerializer::new(feature_geometry)
        .with_id(|feature: &Feature| feature.id.as_ref().map_or(Value::Null, id_value))
        .with_attributes(move |feature: &Feature| select_attributes(feature, &attributes))
        .with_cluster_detail(definition.cluster_detail);

    if let Some(feature_type) = &definition.feature_type {
        serializer = serializer.with_feature_type(feature_type.clone());
    }
    if let Some(summary_limit) = definition.summary_limit {
        serializer = serializer.with_summary_limit(summary_limit);
    }

    serializer
}

impl GeoJsonLayer {
    /// Builds a layer from an already parsed collection.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::ReservedAttribute`] if a configured attribute
    /// shadows a fixed record key, [`LayerError::DuplicateFeatureId`] if
    /// two features share an id, or [`LayerError::Geometry`] if a feature
    /// has no geometry or an unsupported one.
    pub fn new(definition: LayerDefinition, collection: FeatureCollection) -> Result<Self, LayerError> {
        if let Some(attribute) = definition
            .attributes
            .iter()
            .find(|attribute| RESERVED_KEYS.contains(&attribute.as_str()))
        {
            return Err(LayerError::ReservedAttribute {
                layer: definition.id.clone(),
                attribute: attribute.clone(),
            });
        }

        let mut features = collection.features;
        let mut shapes = Vec::with_capacity(features.len());
        let mut ids = BTreeMap::new();

        for (index, feature) in features.iter_mut().enumerate() {
            let id = feature
                .id
                .get_or_insert_with(|| Id::Number(serde_json::Number::from(index)));
            let key = id_key(id);
            if ids.insert(key.clone(), index).is_some() {
                return Err(LayerError::DuplicateFeatureId {
                    layer: definition.id.clone(),
                    id: key,
                });
            }

            let shape = feature_geometry(feature)
                .and_then(GeometryValue::raw_geometry)
                .map(|raw| to_geo(&raw))
                .map_err(|source| LayerError::Geometry {
                    layer: definition.id.clone(),
                    index,
                    source,
                })?;
            shapes.push(shape);
        }

        log::info!(
            "Loaded {} features into layer `{}`",
            features.len(),
            definition.id
        );

        Ok(Self {
            serializer: serializer_for(&definition),
            definition,
            features,
            shapes,
            ids,
        })
    }

    /// Builds a layer from `GeoJSON` text.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::GeoJson`] if the text does not parse,
    /// [`LayerError::NotAFeatureCollection`] if it is a bare geometry or
    /// feature, or any error of [`Self::new`].
    pub fn from_geojson_str(definition: LayerDefinition, text: &str) -> Result<Self, LayerError> {
        match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => Self::new(definition, collection),
            GeoJson::Feature(_) | GeoJson::Geometry(_) => Err(LayerError::NotAFeatureCollection {
                layer: definition.id,
            }),
        }
    }

    /// Reads the layer's data file, resolved against `base_dir` when
    /// relative.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Io`] if the file cannot be read, or any error
    /// of [`Self::from_geojson_str`].
    pub fn load(definition: LayerDefinition, base_dir: &Path) -> Result<Self, LayerError> {
        let path = base_dir.join(&definition.path);
        log::debug!("Reading layer `{}` from {}", definition.id, path.display());
        let text = std::fs::read_to_string(&path).map_err(|source| LayerError::Io { path, source })?;
        Self::from_geojson_str(definition, &text)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FeatureLayer for GeoJsonLayer {
    fn id(&self) -> &str {
        &self.definition.id
    }

    fn display_name(&self) -> &str {
        &self.definition.name
    }

    fn category(&self) -> &[String] {
        &self.definition.category
    }

    fn clustering(&self) -> bool {
        self.definition.clustering
    }

    fn clustering_config(&self) -> &ClusteringConfig {
        &self.definition.clustering_config
    }

    fn query_params(&self) -> &[QueryParam] {
        &self.definition.filters
    }

    fn items<'a>(
        &'a self,
        viewport: &Viewport,
        params: &ParsedParams,
    ) -> Box<dyn Iterator<Item = &'a Feature> + 'a> {
        let viewport = *viewport;
        let filters: Vec<(&'a str, ParamValue)> = self
            .definition
            .filters
            .iter()
            .filter(|param| !param.frontend_only)
            .filter_map(|param| {
                params
                    .get(&param.name)
                    .filter(|value| !matches!(value, ParamValue::Many(values) if values.is_empty()))
                    .map(|value| (param.property(), value.clone()))
            })
            .collect();

        Box::new(
            self.features
                .iter()
                .zip(&self.shapes)
                .filter(move |(feature, shape)| {
                    viewport.intersects(shape)
                        && filters
                            .iter()
                            .all(|(property, value)| property_matches(feature, property, value))
                })
                .map(|(feature, _)| feature),
        )
    }

    fn item(&self, id: &str) -> Option<&Feature> {
        self.ids.get(id).map(|&index| &self.features[index])
    }

    fn serializer(&self) -> &dyn FeatureSerializer<Feature> {
        &self.serializer
    }

    fn preferred_viewport_handling(&self) -> &str {
        &self.definition.preferred_viewport_handling
    }

    fn preferred_viewport_chunks(&self) -> u32 {
        self.definition.preferred_viewport_chunks
    }

    fn requirements(&self) -> Vec<ViewportRequirement> {
        self.definition.require_viewport.requirements()
    }

    fn supports_bounds(&self) -> bool {
        self.definition.bounds
    }

    fn has_parametrized_meta(&self) -> bool {
        self.definition.parametrized_meta
    }

    fn parametrized_meta(&self, params: &ParsedParams) -> Value {
        if !self.definition.parametrized_meta {
            return Value::Object(Map::new());
        }
        json!({ "count": self.items(&Viewport::Empty, params).count() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use serde_json::json;

    const POINTS: &str = include_str!("../test-data/points.geojson");

    fn definition() -> LayerDefinition {
        LayerDefinition {
            feature_type: Some("place".to_string()),
            attributes: vec!["name".to_string()],
            filters: vec![
                QueryParam::new("kind", "Kind").many(),
                QueryParam::new("name", "Name").frontend_only(),
            ],
            ..LayerDefinition::new("places", "Places", "points.geojson")
        }
    }

    fn layer() -> GeoJsonLayer {
        GeoJsonLayer::from_geojson_str(definition(), POINTS).unwrap()
    }

    fn ids<'a>(items: impl Iterator<Item = &'a Feature>) -> Vec<String> {
        items
            .map(|feature| feature.id.as_ref().map(id_key).unwrap_or_default())
            .collect()
    }

    #[test]
    fn loads_every_feature_and_fills_missing_ids() {
        let layer = layer();
        assert_eq!(layer.len(), 5);
        assert_eq!(
            ids(layer.items(&Viewport::Empty, &ParsedParams::new())),
            vec!["a", "b", "c", "d", "4"]
        );
        assert!(layer.item("4").is_some());
        assert!(layer.item("missing").is_none());
    }

    #[test]
    fn filters_by_viewport() {
        let layer = layer();
        let viewport = Viewport::Corners {
            upper_left: Point::new(-25.0, -45.0),
            lower_right: Point::new(0.0, -55.0),
        };
        assert_eq!(ids(layer.items(&viewport, &ParsedParams::new())), vec!["4"]);
    }

    #[test]
    fn filters_by_declared_params() {
        let layer = layer();
        let mut params = ParsedParams::new();
        params.insert(
            "kind".to_string(),
            ParamValue::Many(vec!["cafe".to_string(), "park".to_string()]),
        );
        assert_eq!(ids(layer.items(&Viewport::Empty, &params)), vec!["c", "d", "4"]);
    }

    #[test]
    fn ignores_frontend_only_and_empty_params() {
        let layer = layer();
        let mut params = ParsedParams::new();
        params.insert("kind".to_string(), ParamValue::Many(vec![]));
        params.insert("name".to_string(), ParamValue::Single("Alpha".to_string()));
        assert_eq!(layer.items(&Viewport::Empty, &params).count(), 5);
    }

    #[test]
    fn serializes_with_selected_attributes() {
        let layer = layer();
        let feature = layer.item("a").unwrap();
        let record = layer.serializer().serialize(feature).unwrap();
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "type": ["place", "point"],
                "id": "a",
                "geom": [50.0, 20.0],
                "bbox": [50.0, 20.0],
                "name": "Alpha",
            })
        );
    }

    #[test]
    fn renders_meta() {
        let meta = layer().meta();
        assert_eq!(meta.layer_type, "Features");
        assert_eq!(meta.id, "places");
        assert_eq!(meta.preferred_viewport_handling, "split");
        assert_eq!(meta.query_params.len(), 2);
        assert_eq!(meta.query_params["kind"]["many"], json!(true));
    }

    #[test]
    fn renders_requirements_and_parametrized_meta() {
        let mut definition = definition();
        definition.require_viewport.zoom = true;
        definition.parametrized_meta = true;
        let layer = GeoJsonLayer::from_geojson_str(definition, POINTS).unwrap();

        assert_eq!(layer.meta().requirements, vec![ViewportRequirement::Zoom]);
        assert_eq!(
            serde_json::to_value(layer.meta().requirements).unwrap(),
            json!(["viewport.zoom"])
        );

        let mut params = ParsedParams::new();
        params.insert("kind".to_string(), ParamValue::Many(vec!["shop".to_string()]));
        assert_eq!(layer.parametrized_meta(&params), json!({"count": 2}));
        assert_eq!(self::layer().parametrized_meta(&params), json!({}));
    }

    #[test]
    fn rejects_reserved_attributes() {
        let definition = LayerDefinition {
            attributes: vec!["name".to_string(), "geom".to_string()],
            ..definition()
        };
        assert!(matches!(
            GeoJsonLayer::from_geojson_str(definition, POINTS),
            Err(LayerError::ReservedAttribute { attribute, .. }) if attribute == "geom"
        ));
    }

    #[test]
    fn rejects_explicit_id_colliding_with_index_fallback() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "id": "1", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 1]}, "properties": {}}
        ]}"#;
        assert!(matches!(
            GeoJsonLayer::from_geojson_str(definition(), text),
            Err(LayerError::DuplicateFeatureId { id, .. }) if id == "1"
        ));
    }

    #[test]
    fn rejects_bare_feature() {
        let text = r#"{"type": "Feature", "geometry": null, "properties": {}}"#;
        assert!(matches!(
            GeoJsonLayer::from_geojson_str(definition(), text),
            Err(LayerError::NotAFeatureCollection { .. })
        ));
    }

    #[test]
    fn rejects_feature_without_geometry() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": null, "properties": {}}
        ]}"#;
        assert!(matches!(
            GeoJsonLayer::from_geojson_str(definition(), text),
            Err(LayerError::Geometry {
                index: 0,
                source: GeometryError::EmptyGeometry,
                ..
            })
        ));
    }

    #[test]
    fn rejects_malformed_geojson() {
        assert!(matches!(
            GeoJsonLayer::from_geojson_str(definition(), "{"),
            Err(LayerError::GeoJson(_))
        ));
    }
}

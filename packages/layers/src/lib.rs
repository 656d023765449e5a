#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature layers.
//!
//! A [`FeatureLayer`] is one named set of map features: it filters its
//! items by viewport and declared query parameters, looks items up by id,
//! and supplies the serializer that turns them into wire records. The
//! [`LayerRegistry`] holds every configured layer and is shared read-only
//! by the HTTP server.

pub mod geojson_layer;
pub mod params;
pub mod registry;

use std::collections::BTreeMap;
use std::path::PathBuf;

use generic_map_api_clustering_models::ClusteringConfig;
use generic_map_api_geometry::GeometryError;
use generic_map_api_serializer::FeatureSerializer;
use generic_map_api_viewport::Viewport;
use geojson::Feature;
use serde::Serialize;
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display};

pub use geojson_layer::GeoJsonLayer;
pub use params::{ParamKind, ParamValue, ParsedParams, QueryParam, parse_params};
pub use registry::{LayerDefinition, LayerRegistry, RequireViewport, parse_layers_toml};

/// Errors raised while loading layers.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// A layer file could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The layers configuration is not valid TOML.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A layer file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A layer file parsed as `GeoJSON` but holds no feature collection.
    #[error("Layer `{layer}` data is not a FeatureCollection")]
    NotAFeatureCollection {
        /// Offending layer id.
        layer: String,
    },

    /// A feature carries an unusable geometry.
    #[error("Layer `{layer}` feature {index}: {source}")]
    Geometry {
        /// Offending layer id.
        layer: String,
        /// Position of the feature in the collection.
        index: usize,
        /// Underlying error.
        source: GeometryError,
    },

    /// Two layers share an id.
    #[error("Duplicate layer id `{0}`")]
    DuplicateLayer(String),

    /// Two features of one layer resolve to the same id, either explicitly
    /// or through the index fallback.
    #[error("Layer `{layer}` has more than one feature with id `{id}`")]
    DuplicateFeatureId {
        /// Offending layer id.
        layer: String,
        /// The colliding feature id.
        id: String,
    },

    /// A configured attribute would shadow a fixed record key.
    #[error("Layer `{layer}` attribute `{attribute}` is a reserved record key")]
    ReservedAttribute {
        /// Offending layer id.
        layer: String,
        /// The reserved attribute name.
        attribute: String,
    },
}

/// Viewport details a layer needs the client to send with list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
pub enum ViewportRequirement {
    /// `viewport.size`, the map size in pixels.
    #[serde(rename = "viewport.size")]
    #[strum(serialize = "viewport.size")]
    Size,
    /// `viewport.zoom`
    #[serde(rename = "viewport.zoom")]
    #[strum(serialize = "viewport.zoom")]
    Zoom,
    /// `viewport.mpp`, meters per pixel.
    #[serde(rename = "viewport.mpp")]
    #[strum(serialize = "viewport.mpp")]
    MetersPerPixel,
}

/// Metadata describing a layer to frontends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerMeta {
    /// Always `"Features"`.
    #[serde(rename = "type")]
    pub layer_type: &'static str,
    pub id: String,
    pub name: String,
    pub category: Vec<String>,
    pub clustering: bool,
    pub preferred_viewport_handling: String,
    pub preferred_viewport_chunks: u32,
    pub query_params: BTreeMap<String, serde_json::Value>,
    pub requirements: Vec<ViewportRequirement>,
    /// Endpoint URLs, filled in by the server.
    pub urls: BTreeMap<String, String>,
}

/// A named, queryable set of map features.
pub trait FeatureLayer: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn category(&self) -> &[String];

    /// Whether the layer supports clustering at all. Requests still have
    /// to ask for it.
    fn clustering(&self) -> bool;

    fn clustering_config(&self) -> &ClusteringConfig;

    fn query_params(&self) -> &[QueryParam];

    /// Items intersecting `viewport` that match `params`, in a stable
    /// order.
    fn items<'a>(
        &'a self,
        viewport: &Viewport,
        params: &ParsedParams,
    ) -> Box<dyn Iterator<Item = &'a Feature> + 'a>;

    /// Looks an item up by id.
    fn item(&self, id: &str) -> Option<&Feature>;

    fn serializer(&self) -> &dyn FeatureSerializer<Feature>;

    fn preferred_viewport_handling(&self) -> &str {
        "split"
    }

    fn preferred_viewport_chunks(&self) -> u32 {
        10
    }

    /// Viewport details list requests must carry.
    fn requirements(&self) -> Vec<ViewportRequirement> {
        Vec::new()
    }

    /// Whether the bounds endpoint is available.
    fn supports_bounds(&self) -> bool {
        true
    }

    /// Whether [`Self::parametrized_meta`] says anything worth advertising.
    fn has_parametrized_meta(&self) -> bool {
        false
    }

    /// Metadata that depends on the request's parameters.
    fn parametrized_meta(&self, _params: &ParsedParams) -> Value {
        Value::Object(Map::new())
    }

    fn meta(&self) -> LayerMeta {
        LayerMeta {
            layer_type: "Features",
            id: self.id().to_string(),
            name: self.display_name().to_string(),
            category: self.category().to_vec(),
            clustering: self.clustering(),
            preferred_viewport_handling: self.preferred_viewport_handling().to_string(),
            preferred_viewport_chunks: self.preferred_viewport_chunks(),
            query_params: self
                .query_params()
                .iter()
                .map(|param| (param.name.clone(), param.render_meta()))
                .collect(),
            requirements: self.requirements(),
            urls: BTreeMap::new(),
        }
    }
}

//! Layer registry, configured from TOML.
//!
//! ```toml
//! [[layers]]
//! id = "places"
//! name = "Places"
//! path = "data/places.geojson"
//! feature_type = "place"
//! clustering = true
//! cluster_detail = "summary"
//! attributes = ["name"]
//!
//! [[layers.filters]]
//! name = "kind"
//! label = "Kind"
//! many = true
//!
//! [layers.clustering_config]
//! min_samples = 3
//!
//! [layers.require_viewport]
//! zoom = true
//! ```

use std::path::{Path, PathBuf};

use generic_map_api_clustering_models::ClusteringConfig;
use generic_map_api_serializer::ClusterDetail;
use serde::Deserialize;

use crate::{FeatureLayer, GeoJsonLayer, LayerError, QueryParam, ViewportRequirement};

// ── Definitions ──────────────────────────────────────────────────────────

fn default_viewport_handling() -> String {
    "split".to_string()
}

const fn default_viewport_chunks() -> u32 {
    10
}

const fn default_true() -> bool {
    true
}

/// Viewport details list requests of a layer must carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequireViewport {
    #[serde(default)]
    pub size: bool,
    #[serde(default)]
    pub zoom: bool,
    #[serde(default)]
    pub meters_per_pixel: bool,
}

impl RequireViewport {
    /// The enabled requirements, in advertised order.
    #[must_use]
    pub fn requirements(&self) -> Vec<ViewportRequirement> {
        [
            (self.size, ViewportRequirement::Size),
            (self.zoom, ViewportRequirement::Zoom),
            (self.meters_per_pixel, ViewportRequirement::MetersPerPixel),
        ]
        .into_iter()
        .filter_map(|(required, requirement)| required.then_some(requirement))
        .collect()
    }
}

/// One `[[layers]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDefinition {
    /// Unique identifier, used in URLs.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// `GeoJSON` file, relative to the configuration file.
    pub path: PathBuf,
    /// Type tag prefixed to every record of the layer.
    #[serde(default)]
    pub feature_type: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub clustering: bool,
    #[serde(default)]
    pub clustering_config: ClusteringConfig,
    #[serde(default)]
    pub cluster_detail: ClusterDetail,
    #[serde(default)]
    pub summary_limit: Option<usize>,
    /// Feature properties copied into every record.
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub filters: Vec<QueryParam>,
    #[serde(default = "default_viewport_handling")]
    pub preferred_viewport_handling: String,
    #[serde(default = "default_viewport_chunks")]
    pub preferred_viewport_chunks: u32,
    #[serde(default)]
    pub require_viewport: RequireViewport,
    /// Whether the bounds endpoint is served.
    #[serde(default = "default_true")]
    pub bounds: bool,
    /// Whether `_meta/parametrized` is advertised. It reports how many
    /// items match the request's parameters.
    #[serde(default)]
    pub parametrized_meta: bool,
}

impl LayerDefinition {
    /// A definition with every optional setting at its default.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            feature_type: None,
            category: Vec::new(),
            clustering: false,
            clustering_config: ClusteringConfig::default(),
            cluster_detail: ClusterDetail::default(),
            summary_limit: None,
            attributes: Vec::new(),
            filters: Vec::new(),
            preferred_viewport_handling: default_viewport_handling(),
            preferred_viewport_chunks: default_viewport_chunks(),
            require_viewport: RequireViewport::default(),
            bounds: true,
            parametrized_meta: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayersConfig {
    #[serde(default)]
    layers: Vec<LayerDefinition>,
}

/// Parses a layers configuration without loading any data.
///
/// # Errors
///
/// Returns [`LayerError::Toml`] if the text is not a valid configuration.
pub fn parse_layers_toml(toml_str: &str) -> Result<Vec<LayerDefinition>, LayerError> {
    Ok(toml::de::from_str::<LayersConfig>(toml_str)?.layers)
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Every configured layer, in configuration order.
#[derive(Default)]
pub struct LayerRegistry {
    layers: Vec<Box<dyn FeatureLayer>>,
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.id()))
            .finish()
    }
}

impl LayerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::DuplicateLayer`] if a layer with the same id
    /// is already registered.
    pub fn register(&mut self, layer: Box<dyn FeatureLayer>) -> Result<(), LayerError> {
        if self.get(layer.id()).is_some() {
            return Err(LayerError::DuplicateLayer(layer.id().to_string()));
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Loads every `[[layers]]` entry of `toml_str`, resolving data paths
    /// against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError`] if the configuration does not parse, a data
    /// file cannot be loaded, or two layers share an id.
    pub fn from_toml(toml_str: &str, base_dir: &Path) -> Result<Self, LayerError> {
        let mut registry = Self::new();
        for definition in parse_layers_toml(toml_str)? {
            let layer = GeoJsonLayer::load(definition, base_dir)?;
            registry.register(Box::new(layer))?;
        }
        log::info!("Loaded {} layers", registry.len());
        Ok(registry)
    }

    /// Reads the configuration at `path`. Data paths are relative to the
    /// configuration file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Io`] if the file cannot be read, or any error
    /// of [`Self::from_toml`].
    pub fn load(path: &Path) -> Result<Self, LayerError> {
        let toml_str = std::fs::read_to_string(path).map_err(|source| LayerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&toml_str, base_dir)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn FeatureLayer> {
        self.layers
            .iter()
            .find(|layer| layer.id() == id)
            .map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn FeatureLayer> {
        self.layers.iter().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Viewport-aware density-based clustering of map features.
//!
//! [`BasicClustering::find_clusters`] reduces each item to a representative
//! point, runs DBSCAN over those points with a radius scaled to the
//! request's viewport, and yields one [`ClusteringOutput::Cluster`] per
//! dense group plus, optionally, one [`ClusteringOutput::Orphan`] per item
//! left over.
//!
//! The returned [`Clusters`] iterator is lazy and single-pass. Items whose
//! point cannot be extracted are streamed out as orphans while the input
//! is still being read; everything else needs the whole input, so the
//! points of one request are buffered before DBSCAN runs. Dropping the
//! iterator stops all upstream work.

mod config;
pub mod dbscan;
pub mod hull;

use generic_map_api_geometry::{GeometryError, models::Position};
use generic_map_api_serializer::FeatureSerializer;
use generic_map_api_viewport::Viewport;
use geo::Point;

pub use config::ClusteringParams;
pub use generic_map_api_clustering_models::{Cluster, ClusteringConfig, ClusteringOutput};

use crate::config::ValidatedConfig;

/// Errors raised by the clustering engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusteringError {
    /// The clustering configuration holds an unusable value.
    #[error("Invalid clustering config: {message}")]
    InvalidClusteringConfig {
        /// Description of the offending value.
        message: String,
    },

    /// No representative point could be derived for an item.
    #[error("Point extraction failure: {0}")]
    PointExtractionFailure(#[from] GeometryError),
}

impl ClusteringError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidClusteringConfig {
            message: message.into(),
        }
    }
}

type ItemToPointFn<T> = Box<dyn Fn(&T) -> Result<Point<f64>, GeometryError> + Send + Sync>;

/// DBSCAN clustering with a validated configuration.
pub struct BasicClustering<T: ?Sized> {
    config: ValidatedConfig,
    item_to_point: Option<ItemToPointFn<T>>,
}

impl<T: ?Sized> std::fmt::Debug for BasicClustering<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicClustering")
            .field("config", &self.config)
            .field("custom_item_to_point", &self.item_to_point.is_some())
            .finish()
    }
}

impl<T: ?Sized> BasicClustering<T> {
    /// Validates `config` and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ClusteringError::InvalidClusteringConfig`] if a radius
    /// option is negative or not finite, or if `min_samples` or `p` is
    /// zero.
    pub fn new(config: &ClusteringConfig) -> Result<Self, ClusteringError> {
        Ok(Self {
            config: ValidatedConfig::new(config)?,
            item_to_point: None,
        })
    }

    /// Overrides how an item's representative point is derived. By default
    /// it is the centroid of the item's geometry.
    #[must_use]
    pub fn with_item_to_point(
        mut self,
        item_to_point: impl Fn(&T) -> Result<Point<f64>, GeometryError> + Send + Sync + 'static,
    ) -> Self {
        self.item_to_point = Some(Box::new(item_to_point));
        self
    }

    /// DBSCAN parameters this engine would use for `viewport`.
    #[must_use]
    pub fn effective_params(&self, viewport: &Viewport) -> ClusteringParams {
        self.config.params(viewport)
    }

    /// Whether unclustered items are emitted.
    #[must_use]
    pub const fn include_orphans(&self) -> bool {
        self.config.include_orphans
    }

    fn item_to_point<S: FeatureSerializer<T> + ?Sized>(
        &self,
        serializer: &S,
        item: &T,
    ) -> Result<Position, ClusteringError> {
        let point = match &self.item_to_point {
            Some(item_to_point) => item_to_point(item)?,
            None => serializer.geometry(item)?.centroid()?,
        };
        Ok([point.x(), point.y()])
    }

    /// Clusters `items` for `viewport`.
    ///
    /// `serializer` supplies each item's geometry for the default point
    /// extractor.
    pub fn find_clusters<'a, S, I>(
        &'a self,
        serializer: &'a S,
        viewport: &Viewport,
        items: I,
    ) -> Clusters<'a, T, S, I::IntoIter>
    where
        S: FeatureSerializer<T> + ?Sized,
        I: IntoIterator<Item = &'a T>,
    {
        let params = self.effective_params(viewport);
        log::debug!(
            "Clustering with eps={} min_samples={} p={}",
            params.eps,
            params.min_samples,
            params.p
        );

        Clusters {
            clustering: self,
            serializer,
            params,
            state: State::Reading {
                input: items.into_iter(),
                items: Vec::new(),
                points: Vec::new(),
            },
        }
    }
}

enum State<'a, T: ?Sized, I> {
    Reading {
        input: I,
        items: Vec<&'a T>,
        points: Vec<Position>,
    },
    Emitting {
        items: Vec<&'a T>,
        points: Vec<Position>,
        noise: std::vec::IntoIter<usize>,
        groups: std::vec::IntoIter<Vec<usize>>,
    },
}

/// Lazy clustering output stream. See [`BasicClustering::find_clusters`].
///
/// Yields extraction-failure orphans first, as they are found, then
/// noise orphans in input order, then clusters in label order.
pub struct Clusters<'a, T: ?Sized, S: ?Sized, I> {
    clustering: &'a BasicClustering<T>,
    serializer: &'a S,
    params: ClusteringParams,
    state: State<'a, T, I>,
}

impl<'a, T, S, I> Iterator for Clusters<'a, T, S, I>
where
    T: ?Sized,
    S: FeatureSerializer<T> + ?Sized,
    I: Iterator<Item = &'a T>,
{
    type Item = ClusteringOutput<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        let include_orphans = self.clustering.include_orphans();

        loop {
            match &mut self.state {
                State::Reading {
                    input,
                    items,
                    points,
                } => {
                    let Some(item) = input.next() else {
                        let items = std::mem::take(items);
                        let points = std::mem::take(points);
                        let (groups, noise) =
                            dbscan::group_labels(&dbscan::dbscan(&points, self.params));
                        log::debug!(
                            "Found {} clusters and {} noise points among {} items",
                            groups.len(),
                            noise.len(),
                            items.len()
                        );

                        self.state = State::Emitting {
                            items,
                            points,
                            noise: if include_orphans { noise } else { vec![] }.into_iter(),
                            groups: groups.into_iter(),
                        };
                        continue;
                    };

                    match self.clustering.item_to_point(self.serializer, item) {
                        Ok(point) => {
                            items.push(item);
                            points.push(point);
                        }
                        Err(e) => {
                            log::debug!("Skipping item in clustering: {e}");
                            if include_orphans {
                                return Some(ClusteringOutput::Orphan(item));
                            }
                        }
                    }
                }
                State::Emitting {
                    items,
                    points,
                    noise,
                    groups,
                } => {
                    if let Some(index) = noise.next() {
                        return Some(ClusteringOutput::Orphan(items[index]));
                    }

                    let group = groups.next()?;
                    let member_points: Vec<Position> =
                        group.iter().map(|&index| points[index]).collect();
                    let (shape, centroid) = hull::hull(&member_points);

                    return Some(ClusteringOutput::Cluster(Cluster {
                        centroid,
                        shape,
                        items: group.iter().map(|&index| items[index]).collect(),
                    }));
                }
            }
        }
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cluster, clustering output, and clustering configuration types.
//!
//! Clusters are ephemeral: they are built per request by the clustering
//! engine and consumed straight away by the serializer. Nothing here is
//! ever persisted.

use geo::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};

/// Default neighborhood radius when no viewport is supplied.
pub const DEFAULT_EPS: f64 = 0.01;
/// Default fraction of the mean viewport dimension used as the radius.
pub const DEFAULT_EPS_FACTOR: f64 = 0.01;
/// Default upper bound on the radius.
pub const DEFAULT_MAX_EPS: f64 = 1.3;
/// Default minimum neighborhood size (the point itself included).
pub const DEFAULT_MIN_SAMPLES: usize = 5;
/// Default Minkowski power (Euclidean).
pub const DEFAULT_P: u32 = 2;

/// A group of features that share a dense neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster<T> {
    /// Centroid of the hull, in source order.
    pub centroid: Point<f64>,
    /// Convex hull of the members' representative points, as a
    /// single-polygon multipolygon.
    pub shape: MultiPolygon<f64>,
    /// Member items in first-seen order.
    pub items: Vec<T>,
}

impl<T> Cluster<T> {
    /// Number of member items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cluster has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One element of a clustering output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusteringOutput<T> {
    /// A dense group of items.
    Cluster(Cluster<T>),
    /// An item that joined no cluster.
    Orphan(T),
}

impl<T> ClusteringOutput<T> {
    /// Whether this output is a cluster.
    #[must_use]
    pub const fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }
}

/// Clustering options as configured per feature layer.
///
/// Every field is optional; the accessors resolve missing values to the
/// documented defaults. Validation happens once, when the clustering
/// engine is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusteringConfig {
    /// Fraction of the mean viewport dimension used as the radius.
    pub eps_factor: Option<f64>,
    /// Fixed radius, used only when no viewport is supplied.
    pub eps: Option<f64>,
    /// Upper bound on the radius.
    pub max_eps: Option<f64>,
    /// Minimum neighborhood size, the point itself included.
    pub min_samples: Option<usize>,
    /// Minkowski power of the distance metric.
    pub p: Option<u32>,
    /// Whether unclustered items are emitted as orphans.
    pub include_orphans: Option<bool>,
}

impl ClusteringConfig {
    /// Resolved `eps_factor`.
    #[must_use]
    pub fn eps_factor(&self) -> f64 {
        self.eps_factor.unwrap_or(DEFAULT_EPS_FACTOR)
    }

    /// Resolved fixed `eps`.
    #[must_use]
    pub fn eps(&self) -> f64 {
        self.eps.unwrap_or(DEFAULT_EPS)
    }

    /// Resolved `max_eps`.
    #[must_use]
    pub fn max_eps(&self) -> f64 {
        self.max_eps.unwrap_or(DEFAULT_MAX_EPS)
    }

    /// Resolved `min_samples`.
    #[must_use]
    pub fn min_samples(&self) -> usize {
        self.min_samples.unwrap_or(DEFAULT_MIN_SAMPLES)
    }

    /// Resolved Minkowski power.
    #[must_use]
    pub fn p(&self) -> u32 {
        self.p.unwrap_or(DEFAULT_P)
    }

    /// Resolved `include_orphans`. Off unless configured.
    #[must_use]
    pub fn include_orphans(&self) -> bool {
        self.include_orphans.unwrap_or(false)
    }
}

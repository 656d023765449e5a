//! Clustering configuration validation and radius resolution.

use generic_map_api_clustering_models::ClusteringConfig;
use generic_map_api_viewport::Viewport;

use crate::ClusteringError;

/// DBSCAN parameters resolved for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusteringParams {
    /// Neighborhood radius in degrees.
    pub eps: f64,
    /// Minimum neighborhood size, the point itself included.
    pub min_samples: usize,
    /// Minkowski power of the distance metric.
    pub p: u32,
}

/// A [`ClusteringConfig`] with every default resolved and every value
/// checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ValidatedConfig {
    eps_factor: f64,
    eps: f64,
    max_eps: f64,
    min_samples: usize,
    p: u32,
    pub include_orphans: bool,
}

fn non_negative(name: &str, value: f64) -> Result<f64, ClusteringError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ClusteringError::invalid(format!(
            "{name} must be a finite, non-negative number, got {value}"
        )))
    }
}

impl ValidatedConfig {
    pub fn new(config: &ClusteringConfig) -> Result<Self, ClusteringError> {
        let min_samples = config.min_samples();
        if min_samples == 0 {
            return Err(ClusteringError::invalid("min_samples must be at least 1"));
        }

        let p = config.p();
        if p == 0 {
            return Err(ClusteringError::invalid("p must be at least 1"));
        }

        Ok(Self {
            eps_factor: non_negative("eps_factor", config.eps_factor())?,
            eps: non_negative("eps", config.eps())?,
            max_eps: non_negative("max_eps", config.max_eps())?,
            min_samples,
            p,
            include_orphans: config.include_orphans(),
        })
    }

    /// Radius for `viewport`: a fraction of the mean viewport dimension
    /// when there is one, the fixed `eps` otherwise, capped at `max_eps`.
    pub fn eps(&self, viewport: &Viewport) -> f64 {
        let eps = viewport
            .dimensions()
            .map_or(self.eps, |(width, height)| {
                self.eps_factor * (width + height) / 2.0
            });
        eps.min(self.max_eps)
    }

    pub fn params(&self, viewport: &Viewport) -> ClusteringParams {
        ClusteringParams {
            eps: self.eps(viewport),
            min_samples: self.min_samples,
            p: self.p,
        }
    }
}

//! Bounding-box summaries over a set of items.
//!
//! The accumulator folds wire bounding boxes into one overall box and a
//! count. Items whose geometry fails are skipped and not counted, so a
//! summary is always computed from whatever did succeed.

use generic_map_api_clustering_models::ClusteringOutput;
use generic_map_api_geometry_models::{BoundingBox, LatLon};
use serde::Serialize;

use crate::FeatureSerializer;

/// A corner of a [`BoundsSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Corner {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<LatLon> for Corner {
    fn from(value: LatLon) -> Self {
        Self {
            latitude: value.latitude(),
            longitude: value.longitude(),
        }
    }
}

/// Overall extent of a set of items.
///
/// `northwest` is `(max latitude, min longitude)` and `southeast` is
/// `(min latitude, max longitude)`. Both are omitted when nothing was
/// counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundsSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub northwest: Option<Corner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub southeast: Option<Corner>,
    pub count: usize,
}

/// Folds bounding boxes into one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBoxAccumulator {
    min: Option<LatLon>,
    max: Option<LatLon>,
    count: usize,
}

impl BoundingBoxAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Widens the box by `bbox` and adds `count` to the total.
    pub fn add_bbox(&mut self, bbox: &BoundingBox, count: usize) {
        self.min = Some(self.min.map_or(bbox.min(), |min| min.min(bbox.min())));
        self.max = Some(self.max.map_or(bbox.max(), |max| max.max(bbox.max())));
        self.count += count;
    }

    /// Adds one item. Returns whether it was counted.
    pub fn add_item<T: ?Sized, S: FeatureSerializer<T> + ?Sized>(
        &mut self,
        serializer: &S,
        item: &T,
    ) -> bool {
        match serializer.serialize(item) {
            Ok(record) => {
                self.add_bbox(&record.bbox, 1);
                true
            }
            Err(e) => {
                log::debug!("Skipping item in bounds: {e}");
                false
            }
        }
    }

    /// Adds a clustering output. A cluster widens the box by its hull and
    /// counts all of its members.
    pub fn add_output<T: ?Sized, S: FeatureSerializer<T> + ?Sized>(
        &mut self,
        serializer: &S,
        output: &ClusteringOutput<&T>,
    ) -> bool {
        match output {
            ClusteringOutput::Orphan(item) => self.add_item(serializer, *item),
            ClusteringOutput::Cluster(cluster) => match serializer.serialize_cluster(cluster) {
                Ok(record) => {
                    self.add_bbox(&record.bbox, record.count);
                    true
                }
                Err(e) => {
                    log::debug!("Skipping cluster in bounds: {e}");
                    false
                }
            },
        }
    }

    /// Number of items counted so far.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// `(min_corner, max_corner)`, or `None` when nothing was added.
    #[must_use]
    pub fn corners(&self) -> Option<(LatLon, LatLon)> {
        self.min.zip(self.max)
    }

    #[must_use]
    pub fn summary(&self) -> BoundsSummary {
        let corners = self.corners().filter(|_| self.count > 0);

        BoundsSummary {
            northwest: corners.map(|(min, max)| Corner {
                latitude: max.latitude(),
                longitude: min.longitude(),
            }),
            southeast: corners.map(|(min, max)| Corner {
                latitude: min.latitude(),
                longitude: max.longitude(),
            }),
            count: self.count,
        }
    }
}

/// Summarizes the extent of `items`.
pub fn find_bounding_box<'a, T, S>(serializer: &S, items: impl IntoIterator<Item = &'a T>) -> BoundsSummary
where
    T: ?Sized + 'a,
    S: FeatureSerializer<T> + ?Sized,
{
    let mut accumulator = BoundingBoxAccumulator::new();
    for item in items {
        accumulator.add_item(serializer, item);
    }
    accumulator.summary()
}

/// Summarizes the extent of a clustering output stream.
pub fn find_clustered_bounding_box<'a, T, S>(
    serializer: &S,
    outputs: impl IntoIterator<Item = ClusteringOutput<&'a T>>,
) -> BoundsSummary
where
    T: ?Sized + 'a,
    S: FeatureSerializer<T> + ?Sized,
{
    let mut accumulator = BoundingBoxAccumulator::new();
    for output in outputs {
        accumulator.add_output(serializer, &output);
    }
    accumulator.summary()
}

//! Density-based clustering over representative points.
//!
//! Neighborhoods are found with an R-tree envelope query around each point
//! followed by an exact Minkowski distance check, so the result is the
//! same as a brute-force scan. A point's neighborhood includes the point
//! itself. Labels are assigned in input order, which makes the output a
//! pure function of the input order and parameters.

use generic_map_api_geometry::models::Position;
use rstar::{AABB, RTree, RTreeObject};

use crate::ClusteringParams;

struct IndexedPoint {
    index: usize,
    position: Position,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<Position>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Minkowski distance of power `p` between two positions.
#[must_use]
pub fn minkowski(a: Position, b: Position, p: u32) -> f64 {
    let dx = (a[0] - b[0]).abs();
    let dy = (a[1] - b[1]).abs();

    match p {
        1 => dx + dy,
        2 => dx.hypot(dy),
        p => {
            let p = f64::from(p);
            (dx.powf(p) + dy.powf(p)).powf(p.recip())
        }
    }
}

struct Neighborhoods<'a> {
    tree: RTree<IndexedPoint>,
    points: &'a [Position],
    params: ClusteringParams,
}

impl Neighborhoods<'_> {
    fn of(&self, index: usize) -> Vec<usize> {
        let [x, y] = self.points[index];
        let eps = self.params.eps;
        let envelope = AABB::from_corners([x - eps, y - eps], [x + eps, y + eps]);

        let mut neighbors: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|candidate| {
                minkowski(self.points[index], candidate.position, self.params.p) <= eps
            })
            .map(|candidate| candidate.index)
            .collect();
        neighbors.sort_unstable();
        neighbors
    }
}

/// Labels every point with its cluster number, or `None` for noise.
///
/// Cluster numbers are dense and start at zero, in order of each
/// cluster's first core point. A border point reachable from several
/// clusters joins the first one that reaches it.
#[must_use]
pub fn dbscan(points: &[Position], params: ClusteringParams) -> Vec<Option<usize>> {
    let mut labels = vec![None; points.len()];
    if points.is_empty() {
        return labels;
    }

    let neighborhoods = Neighborhoods {
        tree: RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(index, &position)| IndexedPoint { index, position })
                .collect(),
        ),
        points,
        params,
    };

    let mut visited = vec![false; points.len()];
    let mut next_label = 0;

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;

        let neighbors = neighborhoods.of(start);
        if neighbors.len() < params.min_samples {
            continue;
        }

        let label = next_label;
        next_label += 1;
        labels[start] = Some(label);

        let mut queue = neighbors;
        while let Some(index) = queue.pop() {
            if labels[index].is_none() {
                labels[index] = Some(label);
            }
            if visited[index] {
                continue;
            }
            visited[index] = true;

            // Points visited earlier as noise are still unlabeled and join
            // as border points.
            let expansion = neighborhoods.of(index);
            if expansion.len() >= params.min_samples {
                queue.extend(expansion.into_iter().filter(|&i| labels[i].is_none()));
            }
        }
    }

    labels
}

/// Groups point indices by label. Groups are ordered by label and hold
/// indices in input order; noise is returned separately.
#[must_use]
pub fn group_labels(labels: &[Option<usize>]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut noise = Vec::new();

    for (index, label) in labels.iter().enumerate() {
        match *label {
            Some(label) => {
                if groups.len() <= label {
                    groups.resize_with(label + 1, Vec::new);
                }
                groups[label].push(index);
            }
            None => noise.push(index),
        }
    }

    (groups, noise)
}

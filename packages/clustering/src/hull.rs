//! Cluster shapes.

use std::collections::BTreeSet;

use generic_map_api_geometry::models::Position;
use geo::{Centroid as _, ConvexHull as _, Coord, LineString, MultiPoint, MultiPolygon, Point, Polygon};

/// Closes `coords` and pads it to a four-position ring.
fn degenerate_ring(coords: &[Coord<f64>]) -> LineString<f64> {
    let mut ring = coords.to_vec();
    if let Some(&first) = coords.first() {
        ring.push(first);
        while ring.len() < 4 {
            ring.push(first);
        }
    }
    LineString::new(ring)
}

fn unique_coords(points: &[Position]) -> Vec<Coord<f64>> {
    let mut seen = BTreeSet::new();
    points
        .iter()
        .filter(|[x, y]| seen.insert((x.to_bits(), y.to_bits())))
        .map(|&[x, y]| Coord { x, y })
        .collect()
}

fn mean(points: &[Position]) -> Point<f64> {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len().max(1) as f64;
    let (x, y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), [px, py]| (x + px, y + py));
    Point::new(x / n, y / n)
}

/// Convex hull of `points` as a single-polygon multipolygon, plus its
/// centroid.
///
/// One or two distinct points give a closed, zero-area four-position ring,
/// so every hull is a valid polygon. The centroid falls back to the mean of
/// `points` if the hull has none.
#[must_use]
pub fn hull(points: &[Position]) -> (MultiPolygon<f64>, Point<f64>) {
    let unique = unique_coords(points);

    let polygon = if unique.len() < 3 {
        Polygon::new(degenerate_ring(&unique), vec![])
    } else {
        let polygon = MultiPoint::from(unique.clone()).convex_hull();
        if polygon.exterior().0.len() < 4 {
            let (exterior, _) = polygon.into_inner();
            let mut open = exterior.0;
            open.pop();
            Polygon::new(degenerate_ring(&open), vec![])
        } else {
            polygon
        }
    };

    let centroid = polygon.centroid().unwrap_or_else(|| mean(points));

    (MultiPolygon::new(vec![polygon]), centroid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::BoundingRect as _;

    fn ring(shape: &MultiPolygon<f64>) -> &[Coord<f64>] {
        &shape.0[0].exterior().0
    }

    #[test]
    fn hull_of_square_keeps_corners() {
        let points = [[20.0, 50.0], [19.99, 49.99], [19.99, 50.0], [20.0, 49.99]];
        let (shape, centroid) = hull(&points);

        let rect = shape.bounding_rect().unwrap();
        assert_eq!(rect.min(), Coord { x: 19.99, y: 49.99 });
        assert_eq!(rect.max(), Coord { x: 20.0, y: 50.0 });
        assert!((centroid.x() - 19.995).abs() < 1e-9);
        assert!((centroid.y() - 49.995).abs() < 1e-9);
    }

    #[test]
    fn interior_points_are_dropped() {
        let points = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [1.0, 1.0]];
        let (shape, _) = hull(&points);
        assert_eq!(ring(&shape).len(), 5);
        assert!(!ring(&shape).contains(&Coord { x: 1.0, y: 1.0 }));
    }

    #[test]
    fn single_point_becomes_closed_ring() {
        let (shape, centroid) = hull(&[[1.0, 2.0]]);
        assert_eq!(ring(&shape), &[Coord { x: 1.0, y: 2.0 }; 4]);
        assert_eq!(centroid, Point::new(1.0, 2.0));
    }

    #[test]
    fn coincident_points_become_closed_ring() {
        let (shape, _) = hull(&[[1.0, 2.0], [1.0, 2.0]]);
        assert_eq!(ring(&shape).len(), 4);
        assert_eq!(ring(&shape).first(), ring(&shape).last());
    }

    #[test]
    fn two_points_become_padded_ring() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 1.0, y: 1.0 };
        let (shape, centroid) = hull(&[[0.0, 0.0], [1.0, 1.0]]);
        assert_eq!(ring(&shape), &[a, b, a, a]);
        assert!((centroid.x() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn collinear_points_still_give_a_valid_ring() {
        let (shape, _) = hull(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
        let ring = ring(&shape);
        assert!(ring.len() >= 4);
        assert_eq!(ring.first(), ring.last());
    }
}

//! 2D helpers shared by the street graph, boundary extraction and rectangle fitting.

use bevy::prelude::*;

/// Denominator below which two lines are treated as parallel.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Vertex-average centre of a point list.
pub fn centroid(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }

    points.iter().copied().sum::<Vec2>() / points.len() as f32
}

/// Vertex-average centre of a 3D point list.
pub fn centroid3(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }

    points.iter().copied().sum::<Vec3>() / points.len() as f32
}

/// Shoelace area, positive for counter-clockwise winding.
pub fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }

    area / 2.0
}

/// Unsigned polygon area.
pub fn polygon_area(points: &[Vec2]) -> f32 {
    signed_area(points).abs()
}

/// Intersection of the infinite lines through `a1 -> a2` and `b1 -> b2`.
///
/// Returns `None` when the lines are parallel (or either is degenerate).
pub fn line_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let da = a2 - a1;
    let db = b2 - b1;
    let denom = da.perp_dot(db);
    let scale = da.length() * db.length();

    if scale <= f32::EPSILON || denom.abs() <= PARALLEL_EPSILON * scale {
        return None;
    }

    let t = (b1 - a1).perp_dot(db) / denom;
    Some(a1 + da * t)
}

/// Inclusive range test that accepts the bounds in either order.
pub fn in_range(value: f32, a: f32, b: f32) -> bool {
    (a <= value && value <= b) || (b <= value && value <= a)
}

/// Like [`in_range`], but also accepts values within `tolerance` of either bound.
pub fn in_range_tolerance(value: f32, a: f32, b: f32, tolerance: f32) -> bool {
    in_range(value, a, b) || (value - a).abs() <= tolerance || (value - b).abs() <= tolerance
}

/// Move each point the given fraction of the way toward `center`.
pub fn contract_toward(points: &[Vec2], center: Vec2, fraction: f32) -> Vec<Vec2> {
    points.iter().map(|&p| p.lerp(center, fraction)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_area_and_winding() {
        let ccw = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        assert_eq!(signed_area(&ccw), 100.0);

        let mut cw = ccw;
        cw.reverse();
        assert_eq!(signed_area(&cw), -100.0);
        assert_eq!(polygon_area(&cw), 100.0);
    }

    #[test]
    fn degenerate_polygon_has_no_area() {
        assert_eq!(polygon_area(&[Vec2::ZERO, Vec2::X]), 0.0);
    }

    #[test]
    fn lines_intersect_beyond_their_endpoints() {
        let p = line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(5.0, 3.0),
            Vec2::new(5.0, 4.0),
        )
        .unwrap();
        assert!((p - Vec2::new(5.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        let p = line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(2.0, 3.0),
        );
        assert!(p.is_none());
    }

    #[test]
    fn range_checks() {
        assert!(in_range(5.0, 0.0, 10.0));
        assert!(in_range(5.0, 10.0, 0.0));
        assert!(!in_range(0.0, 5.0, 10.0));
        assert!(in_range_tolerance(4.6, 5.0, 10.0, 0.5));
        assert!(!in_range_tolerance(4.0, 5.0, 10.0, 0.5));
    }

    #[test]
    fn centroid_of_square() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
        ];
        assert_eq!(centroid(&pts), Vec2::new(2.0, 2.0));
        assert_eq!(centroid(&[]), Vec2::ZERO);

        let shrunk = contract_toward(&pts, centroid(&pts), 0.5);
        assert_eq!(shrunk[0], Vec2::new(1.0, 1.0));
        assert_eq!(shrunk[2], Vec2::new(3.0, 3.0));
    }
}

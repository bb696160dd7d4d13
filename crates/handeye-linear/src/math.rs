//! Conditioning transforms for the DLT-style solvers.
//!
//! ```
//! use handeye_linear::math::normalize_points_2d;
//! use handeye_core::Pt2;
//!
//! let pixels = [Pt2::new(100.0, 200.0), Pt2::new(150.0, 250.0), Pt2::new(120.0, 220.0)];
//! let (normalized, t) = normalize_points_2d(&pixels).unwrap();
//! assert_eq!(normalized.len(), 3);
//! assert!(((t * pixels[0].to_homogeneous()).x - normalized[0].x).abs() < 1e-12);
//! ```

use handeye_core::{Mat3, Pt2, Real, Vec2};

fn similarity(scale: Real, center: &Vec2) -> Mat3 {
    Mat3::new(
        scale,
        0.0,
        -scale * center.x,
        0.0,
        scale,
        -scale * center.y,
        0.0,
        0.0,
        1.0,
    )
}

/// Hartley normalization: centroid to the origin, mean distance `√2`.
///
/// Returns the normalized points and `T` with `p_norm = T * p`, or `None` for
/// an empty or fully coincident point set.
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as Real;
    let center = points.iter().map(|p| p.coords).sum::<Vec2>() / n;
    let mean_dist = points.iter().map(|p| (p.coords - center).norm()).sum::<Real>() / n;
    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = Real::sqrt(2.0) / mean_dist;
    let normalized = points
        .iter()
        .map(|p| Pt2::from((p.coords - center) * scale))
        .collect();
    Some((normalized, similarity(scale, &center)))
}

/// Similarity that maps a `width × height` image roughly onto `[-1, 1]²`.
///
/// It keeps an intrinsic matrix upper triangular, so `K = T⁻¹ K_cond`.
pub fn image_conditioning(width: Real, height: Real) -> Mat3 {
    let scale = 2.0 / (width + height).max(Real::EPSILON);
    similarity(scale, &Vec2::new(width * 0.5, height * 0.5))
}

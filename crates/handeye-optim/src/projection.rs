//! Projection helpers generic over `RealField` so they can run on dual numbers.

use nalgebra::{convert, RealField, Vector2, Vector3};

/// Below this squared angle the first-order Rodrigues expansion is used.
const SMALL_ANGLE_SQ: f64 = 1e-16;

/// Rotate `p` by the axis-angle vector `w` (Rodrigues formula).
pub fn rotate_rvec<T: RealField>(w: &Vector3<T>, p: &Vector3<T>) -> Vector3<T> {
    let theta2 = w.dot(w);
    let w_cross_p = w.cross(p);
    if theta2 < convert::<_, T>(SMALL_ANGLE_SQ) {
        return p + w_cross_p;
    }
    let theta = theta2.clone().sqrt();
    let (s, c) = theta.clone().sin_cos();
    let a = s / theta;
    let b = (T::one() - c.clone()) / theta2;
    let w_dot_p = w.dot(p);
    p * c + w_cross_p * a + w * (w_dot_p * b)
}

/// Apply Brown-Conrady distortion to normalized coordinates, with `k3 = 0`.
pub fn distort_brown_conrady4<T: RealField>(
    x: T,
    y: T,
    k1: T,
    k2: T,
    p1: T,
    p2: T,
) -> (T, T) {
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();

    let radial = T::one() + k1 * r2.clone() + k2 * r4;

    let two = T::one() + T::one();
    let x2 = x.clone() * x.clone();
    let y2 = y.clone() * y.clone();
    let xy = x.clone() * y.clone();

    let x_tan =
        two.clone() * p1.clone() * xy.clone() + p2.clone() * (r2.clone() + two.clone() * x2);
    let y_tan = p1 * (r2 + two.clone() * y2) + two * p2 * xy;

    (x.clone() * radial.clone() + x_tan, y * radial + y_tan)
}

/// Project a camera-frame point with intrinsics `[fx, fy, cx, cy, skew]` and
/// distortion `[k1, k2, p1, p2]`.
pub fn project_point<T: RealField>(intr: &[T], dist: &[T], pc: &Vector3<T>) -> Vector2<T> {
    debug_assert!(intr.len() >= 5, "intrinsics must have 5 params");
    debug_assert!(dist.len() >= 4, "distortion must have 4 params");

    let x = pc.x.clone() / pc.z.clone();
    let y = pc.y.clone() / pc.z.clone();
    let (xd, yd) = distort_brown_conrady4(
        x,
        y,
        dist[0].clone(),
        dist[1].clone(),
        dist[2].clone(),
        dist[3].clone(),
    );
    let u = intr[0].clone() * xd + intr[4].clone() * yd.clone() + intr[2].clone();
    let v = intr[1].clone() * yd + intr[3].clone();
    Vector2::new(u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use handeye_core::{rvec_to_rotation, BrownConrady5, DistortionModel, Vec2, Vec3};

    #[test]
    fn rotate_matches_rotation_matrix() {
        let p = Vec3::new(0.3, -0.2, 1.5);
        for w in [
            Vec3::new(0.2, -0.4, 0.1),
            Vec3::new(1e-10, 0.0, -2e-10),
            Vec3::new(0.0, 3.0, 0.1),
        ] {
            assert_relative_eq!(rotate_rvec(&w, &p), rvec_to_rotation(&w) * p, epsilon = 1e-12);
        }
    }

    #[test]
    fn distortion_matches_camera_model() {
        let d = BrownConrady5 {
            k1: -0.2,
            k2: 0.05,
            k3: 0.0,
            p1: 0.001,
            p2: -0.002,
        };
        let n = Vec2::new(0.3, -0.25);
        let expected = d.distort(&n);
        let (xd, yd) = distort_brown_conrady4(n.x, n.y, d.k1, d.k2, d.p1, d.p2);
        assert_relative_eq!(xd, expected.x, epsilon = 1e-14);
        assert_relative_eq!(yd, expected.y, epsilon = 1e-14);
    }
}

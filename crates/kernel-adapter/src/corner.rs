//! Tangent-arc geometry for rounding the corner between two straight segments.

use nalgebra::{Point3 as NPoint, Unit, Vector3 as NVector};
use shape_types::Point3;

use crate::types::KernelError;

/// Segments per full turn when an arc is sampled.
pub const ARC_RESOLUTION: usize = 32;

/// A tangent arc replacing a sharp corner.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerArc {
    /// Tangent point on the incoming segment.
    pub start: Point3,
    /// Tangent point on the outgoing segment.
    pub end: Point3,
    pub center: Point3,
    /// Point halfway along the arc.
    pub mid: Point3,
    /// Distance from the corner to either tangent point.
    pub setback: f64,
    /// Samples from `start` to `end` inclusive.
    pub points: Vec<Point3>,
}

fn np(p: &Point3) -> NPoint<f64> {
    NPoint::new(p[0], p[1], p[2])
}

fn arr(p: NPoint<f64>) -> Point3 {
    [p.x, p.y, p.z]
}

/// Rounds the corner at `corner` between the segments coming from `prev`
/// and going to `next` with an arc of `radius`.
pub fn fillet_corner(
    prev: &Point3,
    corner: &Point3,
    next: &Point3,
    radius: f64,
) -> Result<CornerArc, KernelError> {
    if radius.is_nan() || radius <= 0.0 {
        return Err(KernelError::FilletFailed {
            reason: format!("radius must be positive, got {radius}"),
        });
    }
    let c = np(corner);
    let to_prev = np(prev) - c;
    let to_next = np(next) - c;
    let len_prev = to_prev.norm();
    let len_next = to_next.norm();
    let degenerate = || KernelError::FilletFailed {
        reason: "corner has a zero-length or collinear segment".into(),
    };
    let u = Unit::try_new(to_prev, 1e-12).ok_or_else(degenerate)?;
    let v = Unit::try_new(to_next, 1e-12).ok_or_else(degenerate)?;

    let theta = u.dot(&v).clamp(-1.0, 1.0).acos();
    if theta < 1e-9 || (std::f64::consts::PI - theta) < 1e-9 {
        return Err(degenerate());
    }
    let half = 0.5 * theta;
    let setback = radius / half.tan();
    if setback > len_prev + 1e-9 || setback > len_next + 1e-9 {
        return Err(KernelError::FilletFailed {
            reason: format!("radius {radius} does not fit the corner"),
        });
    }

    let start = c + u.into_inner() * setback;
    let end = c + v.into_inner() * setback;
    let bisector = Unit::new_normalize(u.into_inner() + v.into_inner());
    let center = c + bisector.into_inner() * (radius / half.sin());
    let mid = center - bisector.into_inner() * radius;

    let sweep = std::f64::consts::PI - theta;
    let a: NVector<f64> = (start - center) / radius;
    let e: NVector<f64> = end - center;
    let b_raw = e - a * e.dot(&a);
    let b = Unit::try_new(b_raw, 1e-12).ok_or_else(degenerate)?;
    let segments = ((sweep / std::f64::consts::TAU) * ARC_RESOLUTION as f64)
        .ceil()
        .max(2.0) as usize;
    let points = (0..=segments)
        .map(|i| {
            let t = sweep * i as f64 / segments as f64;
            arr(center + (a * t.cos() + b.into_inner() * t.sin()) * radius)
        })
        .collect();

    Ok(CornerArc {
        start: arr(start),
        end: arr(end),
        center: arr(center),
        mid: arr(mid),
        setback,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn right_angle_corner() {
        let arc = fillet_corner(&[0.0, 0.0, 0.0], &[2.0, 0.0, 0.0], &[2.0, 2.0, 0.0], 0.5).unwrap();
        assert_relative_eq!(arc.setback, 0.5, epsilon = 1e-12);
        assert_relative_eq!(arc.start[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(arc.end[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(arc.center[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(arc.center[1], 0.5, epsilon = 1e-12);
        for p in &arc.points {
            let dx = p[0] - arc.center[0];
            let dy = p[1] - arc.center[1];
            assert_relative_eq!((dx * dx + dy * dy).sqrt(), 0.5, epsilon = 1e-9);
        }
        let first = arc.points.first().unwrap();
        let last = arc.points.last().unwrap();
        for i in 0..3 {
            assert_relative_eq!(first[i], arc.start[i], epsilon = 1e-9);
            assert_relative_eq!(last[i], arc.end[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn oversized_radius_fails() {
        let err = fillet_corner(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0], &[1.0, 1.0, 0.0], 5.0);
        assert!(matches!(err, Err(KernelError::FilletFailed { .. })));
    }

    #[test]
    fn collinear_segments_fail() {
        let err = fillet_corner(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0], &[2.0, 0.0, 0.0], 0.1);
        assert!(err.is_err());
    }
}

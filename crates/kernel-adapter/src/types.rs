use serde::{Deserialize, Serialize};
use shape_types::{Point3, ShapeKind, Vector3};

use crate::transform::Transform;

pub use shape_types::Axis;

slotmap::new_key_type! {
    /// Opaque key of a shape held by a kernel session.
    /// NEVER persisted. Valid only for the session that issued it; a key
    /// whose slot was released (or whose owner was released) is rejected.
    pub struct ShapeId;
}

/// Orientation of a shape relative to its underlying geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Forward,
    Reversed,
    Internal,
    External,
}

impl Orientation {
    pub fn reversed(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reversed,
            Orientation::Reversed => Orientation::Forward,
            other => other,
        }
    }

    /// Composes a child orientation with the orientation of its parent.
    pub fn compose(self, parent: Orientation) -> Self {
        if parent == Orientation::Reversed {
            self.reversed()
        } else {
            self
        }
    }
}

/// Plain description of a curve, before it becomes an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CurveDef {
    Line {
        start: Point3,
        end: Point3,
    },
    Circle {
        center: Point3,
        normal: Vector3,
        radius: f64,
    },
    Ellipse {
        center: Point3,
        normal: Vector3,
        /// Direction of the major axis; projected into the ellipse plane.
        x_dir: Vector3,
        major_radius: f64,
        minor_radius: f64,
    },
    /// Clamped uniform B-spline through the given control points, degree
    /// `min(3, points.len() - 1)`. When `closed`, the first point is
    /// appended again to close the curve.
    BSpline { points: Vec<Point3>, closed: bool },
}

impl CurveDef {
    pub fn is_closed(&self) -> bool {
        match self {
            CurveDef::Line { .. } => false,
            CurveDef::Circle { .. } | CurveDef::Ellipse { .. } => true,
            CurveDef::BSpline { closed, .. } => *closed,
        }
    }
}

/// Parameters for building a triangulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshParams {
    /// Maximum chordal deviation from the exact surface.
    pub linear_deflection: f64,
    /// Maximum angle between adjacent facet normals, radians.
    pub angular_deflection: f64,
    /// Mesh independent faces concurrently where the backend can.
    pub parallel: bool,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            linear_deflection: 0.1,
            angular_deflection: 0.5,
            parallel: true,
        }
    }
}

/// Triangulation of a single face.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangulation {
    /// Node positions in face-local coordinates.
    pub nodes: Vec<Point3>,
    /// Unit normal per node, already pointing out of the material.
    pub normals: Vec<Vector3>,
    /// Node index triples in the natural winding of the underlying surface.
    pub triangles: Vec<[u32; 3]>,
    /// Placement of the face-local coordinates in the world.
    pub location: Transform,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    /// An inverted box that any point expands.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.add_point(p);
        }
        bbox
    }

    pub fn add_point(&mut self, p: &Point3) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    pub fn size(&self) -> Vector3 {
        if self.is_empty() {
            return [0.0; 3];
        }
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn center(&self) -> Point3 {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        if !other.is_empty() {
            out.add_point(&other.min);
            out.add_point(&other.max);
        }
        out
    }

    /// True when the boxes overlap or come closer than `tol`.
    pub fn intersects(&self, other: &BoundingBox, tol: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (0..3).all(|i| self.min[i] <= other.max[i] + tol && other.min[i] <= self.max[i] + tol)
    }

    /// True when every corner matches within `tol`.
    pub fn approx_eq(&self, other: &BoundingBox, tol: f64) -> bool {
        (0..3).all(|i| {
            (self.min[i] - other.min[i]).abs() <= tol && (self.max[i] - other.max[i]).abs() <= tol
        })
    }
}

/// Errors reported by a kernel backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("shape handle is stale or was released")]
    StaleHandle,

    #[error("shape is null")]
    NullShape,

    #[error("views are released together with their owning shape")]
    ViewRelease,

    #[error("expected a {expected}, found a {found}")]
    WrongKind { expected: ShapeKind, found: ShapeKind },

    #[error("wire has no edges")]
    EmptyWire,

    #[error("wire edges are disconnected: {reason}")]
    DisconnectedWire { reason: String },

    #[error("wire is non-manifold: {reason}")]
    NonManifoldWire { reason: String },

    #[error("wire is not closed")]
    NotClosed,

    #[error("wire is not planar")]
    NotPlanar,

    #[error("wire intersects itself")]
    SelfIntersecting,

    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("boolean operation failed: {reason}")]
    BooleanFailed { reason: String },

    #[error("fillet failed: {reason}")]
    FilletFailed { reason: String },

    #[error("tessellation failed: {reason}")]
    TessellationFailed { reason: String },

    #[error("data exchange failed: {reason}")]
    ExchangeFailed { reason: String },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },
}

impl KernelError {
    pub(crate) fn wrong_kind(expected: ShapeKind, found: ShapeKind) -> Self {
        KernelError::WrongKind { expected, found }
    }

    pub(crate) fn not_supported(operation: impl Into<String>) -> Self {
        KernelError::NotSupported {
            operation: operation.into(),
        }
    }

    /// Whether the failure is about the handle itself rather than the
    /// algorithm that ran on it.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            KernelError::StaleHandle
                | KernelError::NullShape
                | KernelError::ViewRelease
                | KernelError::WrongKind { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_from_points() {
        let pts = [[0.0, 1.0, 2.0], [3.0, -1.0, 0.5]];
        let bbox = BoundingBox::from_points(&pts);
        assert_eq!(bbox.min, [0.0, -1.0, 0.5]);
        assert_eq!(bbox.max, [3.0, 1.0, 2.0]);
        assert_eq!(bbox.size(), [3.0, 2.0, 1.5]);
    }

    #[test]
    fn empty_bbox_has_zero_size_and_never_intersects() {
        let empty = BoundingBox::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.size(), [0.0; 3]);
        let unit = BoundingBox::from_points(&[[0.0; 3], [1.0; 3]]);
        assert!(!empty.intersects(&unit, 1.0));
        assert_eq!(empty.union(&unit), unit);
    }

    #[test]
    fn separated_boxes_do_not_intersect() {
        let a = BoundingBox::from_points(&[[-1.0; 3], [1.0; 3]]);
        let b = BoundingBox::from_points(&[[4.0; 3], [6.0; 3]]);
        assert!(!a.intersects(&b, 0.05));
        assert!(a.intersects(&a, 0.0));
    }

    #[test]
    fn orientation_composition() {
        assert_eq!(
            Orientation::Forward.compose(Orientation::Reversed),
            Orientation::Reversed
        );
        assert_eq!(
            Orientation::Reversed.compose(Orientation::Reversed),
            Orientation::Forward
        );
        assert_eq!(
            Orientation::Internal.compose(Orientation::Reversed),
            Orientation::Internal
        );
    }
}

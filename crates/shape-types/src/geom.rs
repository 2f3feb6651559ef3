use serde::{Deserialize, Serialize};

/// A point in model space, `[x, y, z]`.
pub type Point3 = [f64; 3];

/// A direction or displacement in model space, `[x, y, z]`.
pub type Vector3 = [f64; 3];

/// A line through `origin` along `direction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub origin: Point3,
    pub direction: Vector3,
}

impl Axis {
    pub fn new(origin: Point3, direction: Vector3) -> Self {
        Self { origin, direction }
    }

    pub fn x() -> Self {
        Self::new([0.0; 3], [1.0, 0.0, 0.0])
    }

    pub fn y() -> Self {
        Self::new([0.0; 3], [0.0, 1.0, 0.0])
    }

    pub fn z() -> Self {
        Self::new([0.0; 3], [0.0, 0.0, 1.0])
    }
}

/// A right-handed coordinate frame. `z_dir` is the main direction and
/// `x_dir` fixes the rotation about it; the y axis is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub origin: Point3,
    pub z_dir: Vector3,
    pub x_dir: Vector3,
}

impl Frame {
    pub fn world() -> Self {
        Self {
            origin: [0.0; 3],
            z_dir: [0.0, 0.0, 1.0],
            x_dir: [1.0, 0.0, 0.0],
        }
    }
}

/// A plane through `origin` with unit `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: Point3,
    pub normal: Vector3,
}

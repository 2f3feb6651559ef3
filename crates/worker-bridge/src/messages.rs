use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shape_types::{MeshResult, Point3, ShapeKind, Vector3};

fn z_axis() -> Vector3 {
    [0.0, 0.0, 1.0]
}

fn unit_scale() -> f64 {
    1.0
}

/// Requests from the UI thread to the shape worker.
/// Serialized as JSON for postMessage transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Request {
    // -- Primitives --
    MakeBox {
        width: f64,
        length: f64,
        height: f64,
        #[serde(default)]
        center: Point3,
    },
    MakeSphere {
        #[serde(default)]
        center: Point3,
        radius: f64,
    },
    /// Cylinder standing on +Z from `center`.
    MakeCylinder {
        #[serde(default)]
        center: Point3,
        radius: f64,
        height: f64,
    },
    MakeCone {
        #[serde(default)]
        center: Point3,
        bottom_radius: f64,
        top_radius: f64,
        height: f64,
    },

    // -- Blends --
    Fillet {
        shape: Uuid,
        radius: Option<f64>,
        radius_list: Option<Vec<f64>>,
        edge_index_list: Option<Vec<usize>>,
    },
    Chamfer {
        shape: Uuid,
        distance: Option<f64>,
        distance_list: Option<Vec<f64>>,
        edge_index_list: Option<Vec<usize>>,
    },

    // -- Booleans --
    Union {
        shapes: Vec<Uuid>,
        #[serde(default)]
        keep_edges: bool,
    },
    Difference {
        shape: Uuid,
        shapes: Vec<Uuid>,
        #[serde(default)]
        keep_edges: bool,
    },
    Intersection {
        shapes: Vec<Uuid>,
        #[serde(default)]
        keep_edges: bool,
    },

    /// Scale, rotate (degrees), then translate.
    Transform {
        shape: Uuid,
        #[serde(default)]
        translation: Vector3,
        #[serde(default = "z_axis")]
        rotation_axis: Vector3,
        #[serde(default)]
        rotation_angle: f64,
        #[serde(default = "unit_scale")]
        scale_factor: f64,
    },

    Tessellate {
        shape: Uuid,
        max_deviation: Option<f64>,
        #[serde(default)]
        adjust_y_to_z: bool,
    },

    // -- Files --
    Import {
        file_name: String,
        file_text: String,
    },
    ExportStep {
        shape: Uuid,
        file_name: String,
    },

    // -- Lifetime --
    Release {
        shape: Uuid,
    },
    /// Releases every shape of the session.
    Reset,
}

impl Request {
    /// Name reported with errors raised while serving this request.
    pub fn operation(&self) -> &'static str {
        match self {
            Request::MakeBox { .. } => "MakeBox",
            Request::MakeSphere { .. } => "MakeSphere",
            Request::MakeCylinder { .. } => "MakeCylinder",
            Request::MakeCone { .. } => "MakeCone",
            Request::Fillet { .. } => "Fillet",
            Request::Chamfer { .. } => "Chamfer",
            Request::Union { .. } => "Union",
            Request::Difference { .. } => "Difference",
            Request::Intersection { .. } => "Intersection",
            Request::Transform { .. } => "Transform",
            Request::Tessellate { .. } => "Tessellate",
            Request::Import { .. } => "Import",
            Request::ExportStep { .. } => "ExportStep",
            Request::Release { .. } => "Release",
            Request::Reset => "Reset",
        }
    }
}

/// Responses from the shape worker to the UI thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Response {
    /// A new shape now lives in the session under `id`.
    Shape { id: Uuid, kind: ShapeKind },
    Mesh { mesh: MeshResult },
    File { text: String },
    Released { id: Uuid },
    /// Every shape was released.
    Reset { released: usize },
    Error {
        message: String,
        operation: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: Request = serde_json::from_str(r#"{"type":"MakeBox","width":1,"length":2,"height":3}"#).unwrap();
        assert_eq!(
            req,
            Request::MakeBox {
                width: 1.0,
                length: 2.0,
                height: 3.0,
                center: [0.0; 3]
            }
        );

        let id = Uuid::new_v4();
        let json = format!(r#"{{"type":"Transform","shape":"{id}","rotationAngle":45}}"#);
        let req: Request = serde_json::from_str(&json).unwrap();
        match req {
            Request::Transform {
                rotation_axis,
                scale_factor,
                translation,
                ..
            } => {
                assert_eq!(rotation_axis, [0.0, 0.0, 1.0]);
                assert_eq!(scale_factor, 1.0);
                assert_eq!(translation, [0.0; 3]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_camel_case_fields() {
        let id = Uuid::new_v4();
        let req = Request::Fillet {
            shape: id,
            radius: None,
            radius_list: Some(vec![0.1]),
            edge_index_list: Some(vec![3]),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "Fillet");
        assert_eq!(json["radiusList"][0], 0.1);
        assert_eq!(json["edgeIndexList"][0], 3);
    }

    #[test]
    fn test_error_response_shape() {
        let resp = Response::Error {
            message: "boom".into(),
            operation: Some("Union".into()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["operation"], "Union");
    }
}

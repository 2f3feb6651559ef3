use serde::{Deserialize, Serialize};

use crate::Point3;

/// Render buffers for one triangulated face.
///
/// Field names are the wire contract consumed by the renderer, so they
/// serialize in camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceTessellation {
    /// Running index of the face in traversal order.
    pub face_index: usize,
    /// Flat xyz triples in world space.
    pub vertex_coord: Vec<f32>,
    /// Flat xyz triples, one unit normal per vertex.
    pub normal_coord: Vec<f32>,
    /// Flat index triples into the vertex buffer, outward winding.
    pub tri_indexes: Vec<u32>,
    pub number_of_triangles: usize,
}

impl FaceTessellation {
    pub fn vertex_count(&self) -> usize {
        self.vertex_coord.len() / 3
    }
}

/// Sampled polyline for an edge that no triangulated face owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeEdgePolyline {
    /// Stable edge index, the same one edge-index lists refer to.
    pub edge_index: usize,
    pub vertex_coord: Vec<Point3>,
}

/// Everything the renderer receives for one shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshResult {
    pub face_list: Vec<FaceTessellation>,
    pub edge_list: Vec<FreeEdgePolyline>,
}

impl MeshResult {
    pub fn triangle_count(&self) -> usize {
        self.face_list.iter().map(|f| f.number_of_triangles).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.face_list.is_empty() && self.edge_list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_renderer_field_names() {
        let mesh = MeshResult {
            face_list: vec![FaceTessellation {
                face_index: 0,
                vertex_coord: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                normal_coord: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
                tri_indexes: vec![0, 1, 2],
                number_of_triangles: 1,
            }],
            edge_list: vec![FreeEdgePolyline {
                edge_index: 3,
                vertex_coord: vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            }],
        };
        let json = serde_json::to_value(&mesh).unwrap();
        let face = &json["faceList"][0];
        assert_eq!(face["faceIndex"], 0);
        assert_eq!(face["numberOfTriangles"], 1);
        assert_eq!(face["triIndexes"].as_array().unwrap().len(), 3);
        assert_eq!(face["vertexCoord"].as_array().unwrap().len(), 9);
        assert_eq!(face["normalCoord"].as_array().unwrap().len(), 9);
        assert_eq!(json["edgeList"][0]["edgeIndex"], 3);
        assert_eq!(json["edgeList"][0]["vertexCoord"][1][2], 1.0);
    }

    #[test]
    fn counts_triangles_across_faces() {
        let mut mesh = MeshResult::default();
        assert!(mesh.is_empty());
        for i in 0..3 {
            mesh.face_list.push(FaceTessellation {
                face_index: i,
                number_of_triangles: 2,
                ..Default::default()
            });
        }
        assert_eq!(mesh.triangle_count(), 6);
    }
}

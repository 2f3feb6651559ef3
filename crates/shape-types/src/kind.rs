use serde::{Deserialize, Serialize};

/// The topological kind of a shape.
///
/// Variants are declared from the top of the containment hierarchy down, so
/// `Compound` ranks highest and `Vertex` lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Compound,
    CompSolid,
    Solid,
    Shell,
    Face,
    Wire,
    Edge,
    Vertex,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 8] = [
        ShapeKind::Compound,
        ShapeKind::CompSolid,
        ShapeKind::Solid,
        ShapeKind::Shell,
        ShapeKind::Face,
        ShapeKind::Wire,
        ShapeKind::Edge,
        ShapeKind::Vertex,
    ];

    /// Depth in the containment hierarchy (0 = compound, 7 = vertex).
    pub fn depth(self) -> u8 {
        match self {
            ShapeKind::Compound => 0,
            ShapeKind::CompSolid => 1,
            ShapeKind::Solid => 2,
            ShapeKind::Shell => 3,
            ShapeKind::Face => 4,
            ShapeKind::Wire => 5,
            ShapeKind::Edge => 6,
            ShapeKind::Vertex => 7,
        }
    }

    /// Whether a shape of this kind can have sub-shapes of kind `other`.
    ///
    /// A kind always contains itself, so exploring a face for faces yields
    /// the face.
    pub fn can_contain(self, other: ShapeKind) -> bool {
        self == ShapeKind::Compound || self.depth() <= other.depth()
    }

    /// Whether this kind sits below `other` in the hierarchy.
    pub fn is_below(self, other: ShapeKind) -> bool {
        !self.can_contain(other)
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Compound => "compound",
            ShapeKind::CompSolid => "compsolid",
            ShapeKind::Solid => "solid",
            ShapeKind::Shell => "shell",
            ShapeKind::Face => "face",
            ShapeKind::Wire => "wire",
            ShapeKind::Edge => "edge",
            ShapeKind::Vertex => "vertex",
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_is_below_face() {
        assert!(ShapeKind::Wire.is_below(ShapeKind::Face));
        assert!(!ShapeKind::Solid.is_below(ShapeKind::Face));
        assert!(!ShapeKind::Face.is_below(ShapeKind::Face));
    }

    #[test]
    fn compound_contains_everything() {
        for kind in ShapeKind::ALL {
            assert!(ShapeKind::Compound.can_contain(kind));
        }
    }

    #[test]
    fn vertex_contains_only_vertices() {
        for kind in ShapeKind::ALL {
            assert_eq!(
                ShapeKind::Vertex.can_contain(kind),
                kind == ShapeKind::Vertex
            );
        }
    }
}

//! Tagged union over truck's topology types, plus traversal and identity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use shape_types::ShapeKind;
use truck_modeling::topology::{Edge, Face, Shell, Solid, Vertex, Wire};
use truck_topology::shell::ShellCondition;

use crate::types::{KernelError, Orientation};

/// Any shape the truck backend hands out. Truck has no compound type, so
/// compounds are plain lists.
#[derive(Clone)]
pub enum TruckShape {
    Vertex(Vertex),
    Edge(Edge),
    Wire(Wire),
    Face(Face),
    Shell(Shell),
    Solid(Solid),
    Compound(Vec<TruckShape>),
}

impl TruckShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            TruckShape::Vertex(_) => ShapeKind::Vertex,
            TruckShape::Edge(_) => ShapeKind::Edge,
            TruckShape::Wire(_) => ShapeKind::Wire,
            TruckShape::Face(_) => ShapeKind::Face,
            TruckShape::Shell(_) => ShapeKind::Shell,
            TruckShape::Solid(_) => ShapeKind::Solid,
            TruckShape::Compound(_) => ShapeKind::Compound,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            TruckShape::Wire(w) => w.is_empty(),
            TruckShape::Shell(s) => s.is_empty(),
            TruckShape::Solid(s) => s.boundaries().is_empty(),
            TruckShape::Compound(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn orientation(&self) -> Orientation {
        let forward = match self {
            TruckShape::Edge(e) => e.orientation(),
            TruckShape::Face(f) => f.orientation(),
            _ => true,
        };
        if forward {
            Orientation::Forward
        } else {
            Orientation::Reversed
        }
    }

    /// Direct sub-shapes. Face boundaries and edge end points follow the
    /// orientation of their parent.
    pub fn children(&self) -> Vec<TruckShape> {
        match self {
            TruckShape::Vertex(_) => Vec::new(),
            TruckShape::Edge(e) => vec![
                TruckShape::Vertex(e.front().clone()),
                TruckShape::Vertex(e.back().clone()),
            ],
            TruckShape::Wire(w) => w.edge_iter().cloned().map(TruckShape::Edge).collect(),
            TruckShape::Face(f) => f.boundaries().into_iter().map(TruckShape::Wire).collect(),
            TruckShape::Shell(s) => s.face_iter().cloned().map(TruckShape::Face).collect(),
            TruckShape::Solid(s) => s.boundaries().iter().cloned().map(TruckShape::Shell).collect(),
            TruckShape::Compound(items) => items.clone(),
        }
    }

    /// Depth-first sub-shapes of `kind`, repeats included.
    pub fn sub_shapes(&self, kind: ShapeKind) -> Vec<TruckShape> {
        let mut out = Vec::new();
        self.collect(kind, &mut out);
        out
    }

    fn collect(&self, kind: ShapeKind, out: &mut Vec<TruckShape>) {
        if self.kind() == kind {
            out.push(self.clone());
            return;
        }
        for child in self.children() {
            child.collect(kind, out);
        }
    }

    /// Session-local identity. Entities truck gives an id hash that id;
    /// containers hash the ids of what they hold.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.feed(&mut hasher);
        hasher.finish()
    }

    /// Identity of this oriented shape among the views of one owner.
    pub fn view_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.feed(&mut hasher);
        self.orientation().hash(&mut hasher);
        hasher.finish()
    }

    fn feed(&self, hasher: &mut DefaultHasher) {
        std::mem::discriminant(self).hash(hasher);
        match self {
            TruckShape::Vertex(v) => v.id().hash(hasher),
            TruckShape::Edge(e) => e.id().hash(hasher),
            TruckShape::Face(f) => f.id().hash(hasher),
            TruckShape::Wire(w) => {
                for e in w.edge_iter() {
                    e.id().hash(hasher);
                }
            }
            TruckShape::Shell(s) => {
                for f in s.face_iter() {
                    f.id().hash(hasher);
                }
            }
            TruckShape::Solid(_) | TruckShape::Compound(_) => {
                for child in self.children() {
                    child.feed(hasher);
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            TruckShape::Edge(e) => e.front().id() == e.back().id(),
            TruckShape::Wire(w) => w.is_closed(),
            TruckShape::Shell(s) => s.shell_condition() == ShellCondition::Closed,
            TruckShape::Solid(_) => true,
            _ => false,
        }
    }

    /// The solids in this shape, for operations that only take solids.
    pub fn solids(&self) -> Vec<Solid> {
        self.sub_shapes(ShapeKind::Solid)
            .into_iter()
            .filter_map(|s| match s {
                TruckShape::Solid(solid) => Some(solid),
                _ => None,
            })
            .collect()
    }

    /// The single solid of a solid or a one-solid compound.
    pub fn single_solid(&self) -> Result<Solid, KernelError> {
        match self.solids().as_slice() {
            [solid] => Ok(solid.clone()),
            _ => Err(KernelError::wrong_kind(ShapeKind::Solid, self.kind())),
        }
    }

    /// Faces grouped into shells ready for meshing.
    pub fn meshable_shells(&self) -> Vec<Shell> {
        match self {
            TruckShape::Face(f) => vec![Shell::from(vec![f.clone()])],
            TruckShape::Shell(s) => vec![s.clone()],
            TruckShape::Solid(s) => s.boundaries().clone(),
            TruckShape::Compound(items) => items.iter().flat_map(|i| i.meshable_shells()).collect(),
            _ => Vec::new(),
        }
    }
}

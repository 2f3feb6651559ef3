//! Owning handles and borrowing views over kernel shapes.
//!
//! A `ShapeHandle` owns a kernel entry and must be given back with
//! `KernelContext::release`. A `ShapeView` comes from traversal; it borrows
//! the shape it was explored from, so the borrow checker keeps the parent
//! handle alive while the view is in use, and the kernel's generation check
//! rejects it once the parent is released.

use std::marker::PhantomData;

use kernel_adapter::ShapeId;
use shape_types::ShapeKind;

/// Anything that names a live kernel shape.
pub trait ShapeRef {
    fn shape_id(&self) -> ShapeId;
    fn shape_kind(&self) -> ShapeKind;
}

/// An owned kernel shape.
#[must_use = "shape handles must be released with KernelContext::release"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ShapeHandle {
    id: ShapeId,
    kind: ShapeKind,
}

impl ShapeHandle {
    pub(crate) fn new(id: ShapeId, kind: ShapeKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }
}

impl ShapeRef for ShapeHandle {
    fn shape_id(&self) -> ShapeId {
        self.id
    }

    fn shape_kind(&self) -> ShapeKind {
        self.kind
    }
}

/// A sub-shape reached by traversal, valid while its parent is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeView<'a> {
    id: ShapeId,
    parent: ShapeId,
    kind: ShapeKind,
    index: usize,
    _parent: PhantomData<&'a ()>,
}

impl<'a> ShapeView<'a> {
    pub(crate) fn new(id: ShapeId, parent: ShapeId, kind: ShapeKind, index: usize) -> Self {
        Self {
            id,
            parent,
            kind,
            index,
            _parent: PhantomData,
        }
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// The shape this view was explored from.
    pub fn parent(&self) -> ShapeId {
        self.parent
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Running index of the view within its traversal.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl ShapeRef for ShapeView<'_> {
    fn shape_id(&self) -> ShapeId {
        self.id
    }

    fn shape_kind(&self) -> ShapeKind {
        self.kind
    }
}

impl<T: ShapeRef + ?Sized> ShapeRef for &T {
    fn shape_id(&self) -> ShapeId {
        (**self).shape_id()
    }

    fn shape_kind(&self) -> ShapeKind {
        (**self).shape_kind()
    }
}

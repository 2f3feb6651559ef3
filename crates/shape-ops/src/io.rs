use std::path::Path;

use tracing::info;

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::{ShapeHandle, ShapeRef};

/// Exchange formats recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Step,
    Iges,
}

impl FileFormat {
    /// Format named by the extension of `file_name`, ignoring case.
    pub fn from_file_name(file_name: &str) -> Result<Self, OpError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "step" | "stp" => Ok(FileFormat::Step),
            "iges" | "igs" => Ok(FileFormat::Iges),
            _ => Err(OpError::UnsupportedFileType { extension }),
        }
    }
}

/// STEP and IGES text to shapes and back.
pub struct IoAdapter<'c> {
    ctx: &'c mut KernelContext,
}

impl<'c> IoAdapter<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    pub fn import(&mut self, file_name: &str, text: &str) -> Result<ShapeHandle, OpError> {
        let format = FileFormat::from_file_name(file_name)?;
        info!(file_name, ?format, bytes = text.len(), "importing");
        let kernel = self.ctx.kernel_mut();
        let id = match format {
            FileFormat::Step => kernel.read_step(text).map_err(OpError::kernel("read_step"))?,
            FileFormat::Iges => kernel.read_iges(text).map_err(OpError::kernel("read_iges"))?,
        };
        self.ctx.adopt(id)
    }

    pub fn export_step(&mut self, shape: &impl ShapeRef, file_name: &str) -> Result<String, OpError> {
        self.ctx.require_shape(shape, "exported shape")?;
        info!(file_name, "exporting STEP");
        self.ctx
            .kernel()
            .write_step(shape.shape_id(), file_name)
            .map_err(OpError::kernel("write_step"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_dispatch_ignores_case() {
        assert_eq!(FileFormat::from_file_name("part.STEP").unwrap(), FileFormat::Step);
        assert_eq!(FileFormat::from_file_name("dir.v2/part.stp").unwrap(), FileFormat::Step);
        assert_eq!(FileFormat::from_file_name("part.Igs").unwrap(), FileFormat::Iges);
        assert_eq!(FileFormat::from_file_name("part.iges").unwrap(), FileFormat::Iges);
    }

    #[test]
    fn test_unknown_extension() {
        match FileFormat::from_file_name("part.stl") {
            Err(OpError::UnsupportedFileType { extension }) => assert_eq!(extension, "stl"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            FileFormat::from_file_name("README"),
            Err(OpError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn test_unsupported_type_allocates_nothing() {
        let mut ctx = KernelContext::mock();
        assert!(ctx.io().import("model.obj", "v 0 0 0").is_err());
        assert_eq!(ctx.live_shapes(), 0);
    }

    #[test]
    fn test_export_names_the_file() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let text = ctx.io().export_step(&cube, "cube.step").unwrap();
        assert!(text.starts_with("ISO-10303-21;"));
        assert!(text.contains("cube.step"));
        ctx.release(cube).unwrap();
    }
}

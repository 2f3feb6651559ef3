use kernel_adapter::KernelError;

/// Errors from facade operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpError {
    /// Null, stale or wrong-kind input, caught before or by the kernel.
    #[error("invalid input shape: {reason}")]
    InvalidInputShape { reason: String },

    #[error("{operation} failed: {source}")]
    KernelOperationFailed {
        operation: String,
        #[source]
        source: KernelError,
    },

    #[error("{operation}: expected {expected} items, got {actual}")]
    ListLengthMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported file type: {extension:?}")]
    UnsupportedFileType { extension: String },
}

impl OpError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        OpError::InvalidInputShape {
            reason: reason.into(),
        }
    }

    /// Translates a kernel failure raised while running `operation`.
    pub(crate) fn kernel(operation: &str) -> impl FnOnce(KernelError) -> OpError + '_ {
        move |source| {
            if source.is_input_error() {
                OpError::InvalidInputShape {
                    reason: format!("{operation}: {source}"),
                }
            } else {
                OpError::KernelOperationFailed {
                    operation: operation.to_string(),
                    source,
                }
            }
        }
    }

    pub(crate) fn check_len(operation: &str, expected: usize, actual: usize) -> Result<(), OpError> {
        if expected == actual {
            Ok(())
        } else {
            Err(OpError::ListLengthMismatch {
                operation: operation.to_string(),
                expected,
                actual,
            })
        }
    }

    /// Name of the operation a kernel failure came from, if any.
    pub fn operation(&self) -> Option<&str> {
        match self {
            OpError::KernelOperationFailed { operation, .. }
            | OpError::ListLengthMismatch { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

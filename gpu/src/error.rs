//! Typed failures for kernel generation.
//!
//! Every variant is a static-shape, compile-time condition: the generator
//! reports it before producing any source, and nothing here is retryable.

use std::collections::BTreeSet;
use std::fmt;

use crate::kernel_ir::Axis;

/// Errors that can occur while generating a mean reduction kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// Requested axes are not exactly {HEIGHT, WIDTH}.
    UnsupportedReduction { axes: BTreeSet<Axis> },

    /// An extent is zero or too large for a shader `int`.
    InvalidExtent { what: &'static str, value: u64 },

    /// Planned geometry exceeds a platform limit.
    ResourceExceeded {
        resource: &'static str,
        required: u64,
        limit: u64,
    },

    /// A template placeholder has no binding.
    UnresolvedPlaceholder(String),

    /// A parameter name was bound twice.
    DuplicateParameter(String),

    /// Host execution touched an element or slot past the end.
    OutOfBounds {
        what: &'static str,
        index: u64,
        len: u64,
    },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::UnsupportedReduction { axes } => {
                let names: Vec<&str> = axes.iter().map(|a| a.name()).collect();
                write!(
                    f,
                    "mean is supported only over height and width, got {{{}}}",
                    names.join(", ")
                )
            }
            GenerateError::InvalidExtent { what, value } => {
                write!(f, "invalid extent: {} = {}", what, value)
            }
            GenerateError::ResourceExceeded {
                resource,
                required,
                limit,
            } => write!(
                f,
                "{} exceeded: requires {}, platform limit is {}",
                resource, required, limit
            ),
            GenerateError::UnresolvedPlaceholder(name) => {
                write!(f, "unresolved template placeholder '${}$'", name)
            }
            GenerateError::DuplicateParameter(name) => {
                write!(f, "parameter '{}' bound more than once", name)
            }
            GenerateError::OutOfBounds { what, index, len } => {
                write!(f, "{} index {} out of bounds (len {})", what, index, len)
            }
        }
    }
}

impl std::error::Error for GenerateError {}

pub type Result<T> = std::result::Result<T, GenerateError>;

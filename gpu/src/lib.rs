//! Meanforge GPU — compute-shader generation for spatial mean reductions
//!
//! Given the height/width/channel extents of a tensor, picks between a
//! sequential scan and a two-phase parallel tree reduction, plans the
//! workload, workgroup and shared-memory layout, and emits a GLSL template
//! whose `$...$` placeholders the shader compiler binds later.
//!
//! ```rust,ignore
//! use meanforge_gpu::{MeanKernelGenerator, ReductionSpec};
//!
//! let kernel = MeanKernelGenerator::default()
//!     .generate(&ReductionSpec::spatial(32, 32, 4))?;
//! assert_eq!(kernel.geometry.shared_memory_elements, 16);
//! ```
//!
//! Generation is pure: nothing is cached and the same spec always yields the
//! same bundle. Compiling and dispatching the shader is the caller's job.

pub mod codegen;
pub mod config;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod kernel_ir;
pub mod logging;
pub mod reference;
pub mod strategy;

pub use config::{ConfigError, DeviceLimits, MeanforgeConfig, TuningConfig};
pub use error::{GenerateError, Result};
pub use generator::{GeneratedKernel, IoStructure, MeanKernelGenerator};
pub use geometry::{ExecutionGeometry, ReductionPlan, Uint3};
pub use kernel_ir::{Axis, ReductionSpec, Strategy};

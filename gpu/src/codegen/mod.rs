//! Compute-shader source generation.
//!
//! Translates a `ReductionPlan` into a GLSL template whose `$...$`
//! placeholders are bound later by the shader compiler.

pub mod glsl_mean;
pub mod template;

//! Strategy selection: sequential scan vs. parallel tree reduction.

use crate::config::TuningConfig;
use crate::error::{GenerateError, Result};
use crate::kernel_ir::{ReductionSpec, Strategy};

/// Largest value a shader `int` can hold.
pub(crate) const SHADER_INT_MAX: u64 = i32::MAX as u64;

/// Check the preconditions every generated kernel relies on.
///
/// The axis set is checked first: a non-spatial request is never this
/// generator's to plan, whatever its extents.
pub fn validate(spec: &ReductionSpec) -> Result<()> {
    if !spec.is_spatial() {
        return Err(GenerateError::UnsupportedReduction {
            axes: spec.axes.clone(),
        });
    }

    for (what, value) in [
        ("height", spec.height),
        ("width", spec.width),
        ("channels", spec.channels),
    ] {
        let value = u64::from(value);
        if value == 0 || value > SHADER_INT_MAX {
            return Err(GenerateError::InvalidExtent { what, value });
        }
    }

    // The templates compute `w * h` in a shader int.
    let count = spec.element_count();
    if count > SHADER_INT_MAX {
        return Err(GenerateError::InvalidExtent {
            what: "height * width",
            value: count,
        });
    }

    Ok(())
}

/// Pick the kernel algorithm for `spec`.
pub fn select(spec: &ReductionSpec, tuning: &TuningConfig) -> Result<Strategy> {
    validate(spec)?;

    let count = spec.element_count();
    let strategy = if count < tuning.parallel_threshold {
        Strategy::Sequential
    } else {
        Strategy::ParallelTree
    };

    log::debug!(
        "mean {}x{}x{}: {} elements, threshold {} -> {}",
        spec.height,
        spec.width,
        spec.channels,
        count,
        tuning.parallel_threshold,
        strategy
    );
    Ok(strategy)
}

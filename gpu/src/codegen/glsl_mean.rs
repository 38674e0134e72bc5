//! GLSL template generation for the spatial mean (sequential and parallel).
//!
//! Both variants read `$input_data_0[w, h, gid.z]$` (one vec4 channel group)
//! and assign the mean to `value_0`; the shader compiler writes `value_0` to
//! the output at `gid`.
//!
//! The parallel variant is a two-phase reduction:
//! - Phase 1: each of the `gx * gy` threads sums a contiguous run of the
//!   flattened plane into its own shared slot
//! - Phase 2: after a full barrier, thread (0, 0) of each z slice sums the
//!   slots of its slice and divides by `h * w`

use crate::error::{GenerateError, Result};
use crate::geometry::{shared_slots, ReductionPlan};
use crate::kernel_ir::Strategy;

use super::template::{SharedElement, SharedVariable, ShaderTemplate, ACCUMULATOR_PRECISION};

/// Tensor object the templates read from.
pub const INPUT_OBJECT: &str = "input_data_0";

/// Shared accumulator array of the parallel variant.
pub const SHARED_MEMORY_NAME: &str = "sh_mem";

pub const PARAM_HEIGHT: &str = "input_data_0_h";
pub const PARAM_WIDTH: &str = "input_data_0_w";
pub const PARAM_CHANNELS: &str = "input_data_0_c";
pub const PARAM_TASK_SIZE: &str = "reduce_task_size";

/// Build the template for `plan`.
pub fn emit(plan: &ReductionPlan) -> Result<ShaderTemplate> {
    let mut template = match plan.strategy {
        Strategy::Sequential => ShaderTemplate::new(sequential_body()),
        Strategy::ParallelTree => {
            let mut t = ShaderTemplate::new(parallel_body());
            t.declare_shared(SharedVariable {
                name: SHARED_MEMORY_NAME.to_string(),
                element: SharedElement::Vec4,
                len: shared_slots(plan.geometry.workgroup),
            });
            t
        }
    };

    template.bind(PARAM_HEIGHT, shader_int("height", u64::from(plan.height))?)?;
    template.bind(PARAM_WIDTH, shader_int("width", u64::from(plan.width))?)?;
    template.bind(PARAM_CHANNELS, shader_int("channels", u64::from(plan.channels))?)?;
    if plan.strategy == Strategy::ParallelTree {
        template.bind(PARAM_TASK_SIZE, shader_int("task size", plan.task_size)?)?;
    }

    log::trace!(
        "emitted {} mean template: {} bytes",
        plan.strategy,
        template.body().len()
    );
    Ok(template)
}

fn shader_int(what: &'static str, value: u64) -> Result<i32> {
    i32::try_from(value).map_err(|_| GenerateError::InvalidExtent { what, value })
}

fn sequential_body() -> String {
    let p = ACCUMULATOR_PRECISION;
    format!(
        r#"
  {p} vec4 sum = vec4(0.0);
  {p} float size = float(${PARAM_WIDTH}$ * ${PARAM_HEIGHT}$);
  for (int h = 0; h < ${PARAM_HEIGHT}$; h++) {{
    for (int w = 0; w < ${PARAM_WIDTH}$; w++) {{
      sum += ${INPUT_OBJECT}[w, h, gid.z]$;
    }}
  }}
  value_0 = sum / size;
"#
    )
}

fn parallel_body() -> String {
    let p = ACCUMULATOR_PRECISION;
    format!(
        r#"
  {p} vec4 sum = vec4(0.0);
  {p} float size = float(${PARAM_WIDTH}$ * ${PARAM_HEIGHT}$);
  int element_count = ${PARAM_WIDTH}$ * ${PARAM_HEIGHT}$;
  int task_size = ${PARAM_TASK_SIZE}$;

  ivec3 local_id = ivec3(gl_LocalInvocationID.xyz);
  int threads_xy = int(gl_WorkGroupSize.x) * int(gl_WorkGroupSize.y);
  int local_linear = local_id.y * int(gl_WorkGroupSize.x) + local_id.x;
  int slot_base = local_id.z * threads_xy;

  int start = local_linear * task_size;
  for (int i = start; i < start + task_size; i++) {{
    if (i < element_count) {{
      int h = i / ${PARAM_WIDTH}$;
      int w = i - h * ${PARAM_WIDTH}$;
      sum += ${INPUT_OBJECT}[w, h, gid.z]$;
    }}
  }}

  {SHARED_MEMORY_NAME}[slot_base + local_linear] = sum;
  memoryBarrierShared();
  barrier();

  if (local_linear != 0) {{
    return;
  }}

  sum = vec4(0.0);
  for (int i = 0; i < threads_xy; i++) {{
    sum += {SHARED_MEMORY_NAME}[slot_base + i];
  }}
  value_0 = sum / size;
"#
    )
}

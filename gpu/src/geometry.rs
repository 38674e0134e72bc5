//! Geometry planning: workload, workgroup and shared-memory layout.
//!
//! For the parallel tree reduction one workgroup covers the whole h*w plane
//! in x/y, so no reduction ever crosses a workgroup boundary. The z extent
//! carries channel groups and is tiled exactly by `workgroup.z`.

use std::ops::Range;

use serde::Serialize;

use crate::config::{DeviceLimits, TuningConfig};
use crate::error::{GenerateError, Result};
use crate::kernel_ir::{ReductionSpec, Strategy};
use crate::strategy::SHADER_INT_MAX;

/// Bytes in one shared accumulator slot (a `highp vec4`).
pub const SHARED_SLOT_BYTES: u64 = 16;

/// An (x, y, z) extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Uint3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Uint3 {
    /// "Not specified": the caller's default dispatch applies.
    pub const ZERO: Uint3 = Uint3 { x: 0, y: 0, z: 0 };

    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Uint3 { x, y, z }
    }

    pub fn volume(self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

/// Dispatch geometry for one generated kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExecutionGeometry {
    /// Logical problem extent; (0, 0, 0) means one invocation per output pixel.
    pub workload: Uint3,
    /// Threads per dimension in one workgroup; (0, 0, 0) when unspecified.
    pub workgroup: Uint3,
    /// Number of vec4 accumulator slots in shared memory.
    pub shared_memory_elements: u32,
}

impl ExecutionGeometry {
    /// Geometry of a kernel that leaves dispatch entirely to the caller.
    pub const UNSPECIFIED: ExecutionGeometry = ExecutionGeometry {
        workload: Uint3::ZERO,
        workgroup: Uint3::ZERO,
        shared_memory_elements: 0,
    };

    pub fn shared_memory_bytes(&self) -> u64 {
        u64::from(self.shared_memory_elements) * SHARED_SLOT_BYTES
    }

    /// Workgroups launched per dimension, or zero when unspecified.
    pub fn workgroup_count(&self) -> Uint3 {
        if self.workgroup.is_zero() {
            return Uint3::ZERO;
        }
        Uint3::new(
            self.workload.x.div_ceil(self.workgroup.x),
            self.workload.y.div_ceil(self.workgroup.y),
            self.workload.z.div_ceil(self.workgroup.z),
        )
    }
}

/// Everything the emitter and the reference executor need to agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReductionPlan {
    pub strategy: Strategy,
    pub geometry: ExecutionGeometry,
    pub height: u32,
    pub width: u32,
    pub channels: u32,
    pub element_count: u64,
    pub channel_groups: u32,
    /// Flattened (h, w) positions summed by one worker thread.
    pub task_size: u64,
}

impl ReductionPlan {
    /// Threads sharing one channel group's plane (1 for sequential).
    pub fn threads_per_plane(&self) -> u32 {
        match self.strategy {
            Strategy::Sequential => 1,
            Strategy::ParallelTree => self
                .geometry
                .workgroup
                .x
                .saturating_mul(self.geometry.workgroup.y),
        }
    }
}

/// Shared accumulator slots required by a workgroup: one per thread.
///
/// Both the shared-memory declaration and the slot indexing in the emitted
/// template derive from this; nothing else may size `sh_mem`. Saturates at
/// `u32::MAX`; planned workgroups never get near it since their volume is
/// bounded by the invocation limit.
pub fn shared_slots(workgroup: Uint3) -> u32 {
    workgroup
        .x
        .saturating_mul(workgroup.y)
        .saturating_mul(workgroup.z)
}

/// Plan the execution geometry of `strategy` for `spec`.
///
/// `spec` must already have passed [`crate::strategy::validate`].
pub fn plan(
    spec: &ReductionSpec,
    strategy: Strategy,
    tuning: &TuningConfig,
    limits: &DeviceLimits,
) -> Result<ReductionPlan> {
    let element_count = spec.element_count();
    let channel_groups = spec.channel_groups();
    if channel_groups == 0 {
        return Err(GenerateError::InvalidExtent {
            what: "channels",
            value: 0,
        });
    }

    let (geometry, task_size) = match strategy {
        Strategy::Sequential => (ExecutionGeometry::UNSPECIFIED, element_count),
        Strategy::ParallelTree => plan_parallel(element_count, channel_groups, tuning, limits)?,
    };

    Ok(ReductionPlan {
        strategy,
        geometry,
        height: spec.height,
        width: spec.width,
        channels: spec.channels,
        element_count,
        channel_groups,
        task_size,
    })
}

fn plan_parallel(
    element_count: u64,
    channel_groups: u32,
    tuning: &TuningConfig,
    limits: &DeviceLimits,
) -> Result<(ExecutionGeometry, u64)> {
    let gx = tuning.tile_x;
    let gy = tuning.tile_y;
    if gx == 0 || gy == 0 {
        return Err(GenerateError::InvalidExtent {
            what: "workgroup tile",
            value: 0,
        });
    }

    let [max_x, max_y, max_z] = limits.max_workgroup_size;
    check_limit("workgroup size x", u64::from(gx), u64::from(max_x))?;
    check_limit("workgroup size y", u64::from(gy), u64::from(max_y))?;

    let invocation_limit = u64::from(limits.max_invocations);
    let threads_xy = gx
        .checked_mul(gy)
        .ok_or(GenerateError::ResourceExceeded {
            resource: "workgroup invocations",
            required: u64::from(gx) * u64::from(gy),
            limit: invocation_limit,
        })?;
    check_limit(
        "workgroup invocations",
        u64::from(threads_xy),
        invocation_limit,
    )?;

    let z_bound = tuning
        .max_channel_groups_per_workgroup
        .min(max_z)
        .min(limits.max_invocations / threads_xy);
    if z_bound == 0 {
        return Err(GenerateError::InvalidExtent {
            what: "channel groups per workgroup",
            value: 0,
        });
    }

    let gz = largest_divisor_at_most(channel_groups, z_bound);
    if gz < channel_groups.min(z_bound) {
        log::warn!(
            "{} channel groups do not tile by {}; using {} per workgroup",
            channel_groups,
            z_bound,
            gz
        );
    }

    let workgroup = Uint3::new(gx, gy, gz);
    let geometry = ExecutionGeometry {
        workload: Uint3::new(gx, gy, channel_groups),
        workgroup,
        shared_memory_elements: shared_slots(workgroup),
    };
    check_limit(
        "shared memory bytes",
        geometry.shared_memory_bytes(),
        limits.max_shared_memory_bytes,
    )?;

    let task_size = element_count.div_ceil(u64::from(threads_xy));
    // The last thread's loop runs to `threads_xy * task_size` in a shader int.
    let loop_end = u64::from(threads_xy) * task_size;
    if loop_end > SHADER_INT_MAX {
        return Err(GenerateError::InvalidExtent {
            what: "threads * task size",
            value: loop_end,
        });
    }
    log::debug!(
        "parallel plan: workload {:?}, workgroup {:?}, {} shared slots, {} elements per thread",
        geometry.workload,
        geometry.workgroup,
        geometry.shared_memory_elements,
        task_size
    );
    Ok((geometry, task_size))
}

fn check_limit(resource: &'static str, required: u64, limit: u64) -> Result<()> {
    if required > limit {
        return Err(GenerateError::ResourceExceeded {
            resource,
            required,
            limit,
        });
    }
    Ok(())
}

/// Largest `d <= bound` with `n % d == 0`. Both arguments must be non-zero.
fn largest_divisor_at_most(n: u32, bound: u32) -> u32 {
    (1..=n.min(bound)).rev().find(|d| n % d == 0).unwrap_or(1)
}

/// Flattened (h, w) indices a worker thread reads after the bounds guard.
///
/// Threads whose run starts past the end get an empty range; together the
/// ranges of all `threads_per_plane` threads cover `[0, element_count)`
/// exactly once.
pub fn thread_range(plan: &ReductionPlan, local_linear: u32) -> Range<u64> {
    let start = u64::from(local_linear)
        .saturating_mul(plan.task_size)
        .min(plan.element_count);
    let end = start.saturating_add(plan.task_size).min(plan.element_count);
    start..end
}

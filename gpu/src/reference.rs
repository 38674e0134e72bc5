//! Host reference execution of a reduction plan.
//!
//! Runs the same algorithm the emitted shader runs, thread by thread, on the
//! CPU: for the parallel plan every workgroup gets its own shared slot
//! buffer, all partial sums are written before any slot is read, and only
//! local thread 0 of each z slice produces an output. Accesses are checked
//! and reported as `OutOfBounds` instead of panicking.

use crate::error::{GenerateError, Result};
use crate::geometry::{shared_slots, thread_range, ReductionPlan};
use crate::kernel_ir::{Strategy, CHANNELS_PER_GROUP};

/// One vec4 channel group.
pub type Vec4 = [f32; 4];

/// A single-batch tensor in HWC order.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
    data: Vec<f32>,
}

impl HostTensor {
    pub fn new(height: u32, width: u32, channels: u32, data: Vec<f32>) -> Result<Self> {
        let expected = u64::from(height) * u64::from(width) * u64::from(channels);
        if data.len() as u64 != expected {
            return Err(GenerateError::InvalidExtent {
                what: "tensor data length",
                value: data.len() as u64,
            });
        }
        Ok(HostTensor {
            height,
            width,
            channels,
            data,
        })
    }

    /// Build a tensor from `f(h, w, c)`.
    pub fn from_fn(height: u32, width: u32, channels: u32, f: impl Fn(u32, u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(height as usize * width as usize * channels as usize);
        for h in 0..height {
            for w in 0..width {
                for c in 0..channels {
                    data.push(f(h, w, c));
                }
            }
        }
        HostTensor {
            height,
            width,
            channels,
            data,
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Read channel group `z` at `(w, h)`; lanes past `channels` read as zero.
    pub fn channel_group(&self, w: u32, h: u32, z: u32) -> Result<Vec4> {
        let groups = self.channels.div_ceil(CHANNELS_PER_GROUP);
        check_index("width", u64::from(w), u64::from(self.width))?;
        check_index("height", u64::from(h), u64::from(self.height))?;
        check_index("channel group", u64::from(z), u64::from(groups))?;

        let base = ((h as usize * self.width as usize) + w as usize) * self.channels as usize;
        let mut out = [0.0; 4];
        for (lane, slot) in out.iter_mut().enumerate() {
            let c = z * CHANNELS_PER_GROUP + lane as u32;
            if c < self.channels {
                *slot = self.data[base + c as usize];
            }
        }
        Ok(out)
    }
}

/// Execute `plan` over `input`, returning one mean per channel group.
pub fn execute(plan: &ReductionPlan, input: &HostTensor) -> Result<Vec<Vec4>> {
    if (input.height, input.width, input.channels) != (plan.height, plan.width, plan.channels) {
        return Err(GenerateError::InvalidExtent {
            what: "tensor shape",
            value: u64::from(input.height) * u64::from(input.width) * u64::from(input.channels),
        });
    }

    match plan.strategy {
        Strategy::Sequential => execute_sequential(plan, input),
        Strategy::ParallelTree => execute_parallel(plan, input),
    }
}

fn execute_sequential(plan: &ReductionPlan, input: &HostTensor) -> Result<Vec<Vec4>> {
    let size = plan.element_count as f32;
    (0..plan.channel_groups)
        .map(|z| -> Result<Vec4> {
            let mut sum = [0.0; 4];
            for h in 0..plan.height {
                for w in 0..plan.width {
                    add(&mut sum, input.channel_group(w, h, z)?);
                }
            }
            Ok(scale(sum, size))
        })
        .collect()
}

fn execute_parallel(plan: &ReductionPlan, input: &HostTensor) -> Result<Vec<Vec4>> {
    let workgroup = plan.geometry.workgroup;
    let groups = plan.geometry.workgroup_count();
    let threads_xy = plan.threads_per_plane();
    let size = plan.element_count as f32;
    let mut output = vec![[0.0; 4]; plan.channel_groups as usize];

    for group_z in 0..groups.z {
        let mut sh_mem = vec![[0.0f32; 4]; shared_slots(workgroup) as usize];

        // Phase 1: every thread of the workgroup stores its partial sum.
        for local_z in 0..workgroup.z {
            let gid_z = group_z * workgroup.z + local_z;
            let slot_base = local_z * threads_xy;
            for local_y in 0..workgroup.y {
                for local_x in 0..workgroup.x {
                    let local_linear = local_y * workgroup.x + local_x;
                    let mut sum = [0.0; 4];
                    for i in thread_range(plan, local_linear) {
                        let h = (i / u64::from(plan.width)) as u32;
                        let w = (i - u64::from(h) * u64::from(plan.width)) as u32;
                        add(&mut sum, input.channel_group(w, h, gid_z)?);
                    }
                    *slot_mut(&mut sh_mem, slot_base + local_linear)? = sum;
                }
            }
        }

        // Barrier: phase 2 only starts once all slots above are written.
        for local_z in 0..workgroup.z {
            let gid_z = group_z * workgroup.z + local_z;
            let slot_base = local_z * threads_xy;
            let mut sum = [0.0; 4];
            for i in 0..threads_xy {
                add(&mut sum, *slot_mut(&mut sh_mem, slot_base + i)?);
            }
            let out = output.get_mut(gid_z as usize).ok_or(GenerateError::OutOfBounds {
                what: "output channel group",
                index: u64::from(gid_z),
                len: u64::from(plan.channel_groups),
            })?;
            *out = scale(sum, size);
        }
    }

    Ok(output)
}

fn slot_mut(sh_mem: &mut [Vec4], index: u32) -> Result<&mut Vec4> {
    let len = sh_mem.len() as u64;
    sh_mem
        .get_mut(index as usize)
        .ok_or(GenerateError::OutOfBounds {
            what: "shared memory slot",
            index: u64::from(index),
            len,
        })
}

fn check_index(what: &'static str, index: u64, len: u64) -> Result<()> {
    if index >= len {
        return Err(GenerateError::OutOfBounds { what, index, len });
    }
    Ok(())
}

fn add(acc: &mut Vec4, v: Vec4) {
    for (a, b) in acc.iter_mut().zip(v) {
        *a += b;
    }
}

fn scale(v: Vec4, size: f32) -> Vec4 {
    v.map(|x| x / size)
}

//! Kernel IR — describes a mean reduction request at a high level.
//!
//! A `ReductionSpec` is what the graph side hands over: the input extents
//! plus the set of axes to reduce. The selector and planner turn it into a
//! `ReductionPlan`, and the codegen layer turns that into shader source.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Number of channels packed into one vec4 accumulator lane.
pub const CHANNELS_PER_GROUP: u32 = 4;

/// Tensor axes a reduction can be requested over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Batch,
    Height,
    Width,
    Channels,
}

impl Axis {
    /// Parse a lowercase axis name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "b" | "batch" => Some(Self::Batch),
            "h" | "height" => Some(Self::Height),
            "w" | "width" => Some(Self::Width),
            "c" | "channels" => Some(Self::Channels),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Height => "height",
            Self::Width => "width",
            Self::Channels => "channels",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of one mean reduction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReductionSpec {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
    pub axes: BTreeSet<Axis>,
}

impl ReductionSpec {
    pub fn new(height: u32, width: u32, channels: u32, axes: BTreeSet<Axis>) -> Self {
        ReductionSpec {
            height,
            width,
            channels,
            axes,
        }
    }

    /// A mean over height and width, the only shape this generator supports.
    pub fn spatial(height: u32, width: u32, channels: u32) -> Self {
        Self::new(height, width, channels, spatial_axes())
    }

    /// Number of (h, w) positions folded into each output value.
    pub fn element_count(&self) -> u64 {
        u64::from(self.height) * u64::from(self.width)
    }

    /// Number of vec4 channel groups, `ceil(channels / 4)`.
    pub fn channel_groups(&self) -> u32 {
        self.channels.div_ceil(CHANNELS_PER_GROUP)
    }

    /// Whether the requested axes are exactly {HEIGHT, WIDTH}.
    pub fn is_spatial(&self) -> bool {
        self.axes == spatial_axes()
    }
}

/// The axis set `{Height, Width}`.
pub fn spatial_axes() -> BTreeSet<Axis> {
    [Axis::Height, Axis::Width].into_iter().collect()
}

/// Kernel-generation algorithm chosen for a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One invocation per output pixel walks the whole plane.
    Sequential,
    /// Per-thread partial sums combined through shared memory.
    ParallelTree,
}

impl Strategy {
    /// Human-readable name used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::ParallelTree => "parallel-tree",
        }
    }

    /// Whether the generated kernel declares shared memory.
    pub fn uses_shared_memory(self) -> bool {
        matches!(self, Self::ParallelTree)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

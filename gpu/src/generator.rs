//! Mean kernel generator: selection, planning and emission in one call.

use serde::Serialize;

use crate::codegen::glsl_mean::{self, INPUT_OBJECT};
use crate::codegen::template::{KernelParameter, SharedVariable, TemplateBinder};
use crate::config::{DeviceLimits, MeanforgeConfig, TuningConfig};
use crate::error::Result;
use crate::geometry::{self, ExecutionGeometry, ReductionPlan};
use crate::kernel_ir::{ReductionSpec, Strategy};
use crate::strategy;

/// How much input/output boilerplate the shader compiler must inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IoStructure {
    /// Only declare the objects; the body reads them itself.
    OnlyDefinitions,
    /// Declare and generate the read/write at `gid`.
    Auto,
}

/// Everything the shader compiler needs for one mean node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedKernel {
    pub strategy: Strategy,
    pub parameters: Vec<KernelParameter>,
    pub shared_variables: Vec<SharedVariable>,
    pub geometry: ExecutionGeometry,
    pub task_size: u64,
    pub source: String,
    pub input: IoStructure,
    pub output: IoStructure,
}

impl GeneratedKernel {
    /// Shared memory the kernel declares, for checking against a platform limit.
    pub fn shared_memory_bytes(&self) -> u64 {
        self.geometry.shared_memory_bytes()
    }

    /// Source with every placeholder resolved by `binder`.
    pub fn render(&self, binder: &TemplateBinder) -> Result<String> {
        binder.render(&self.parameters, &self.shared_variables, &self.source)
    }

    /// Render with the default binder for `input_data_0`.
    pub fn render_default(&self) -> Result<String> {
        self.render(&TemplateBinder::new().with_object(INPUT_OBJECT))
    }
}

/// Generates spatial mean kernels. Holds no state beyond its configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeanKernelGenerator {
    tuning: TuningConfig,
    limits: DeviceLimits,
}

impl MeanKernelGenerator {
    pub fn new(tuning: TuningConfig, limits: DeviceLimits) -> Self {
        MeanKernelGenerator { tuning, limits }
    }

    pub fn from_config(config: &MeanforgeConfig) -> Self {
        Self::new(config.tuning, config.limits)
    }

    pub fn with_tuning(mut self, tuning: TuningConfig) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn tuning(&self) -> &TuningConfig {
        &self.tuning
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// Select a strategy and plan its geometry without emitting source.
    pub fn plan(&self, spec: &ReductionSpec) -> Result<ReductionPlan> {
        let strategy = strategy::select(spec, &self.tuning)?;
        geometry::plan(spec, strategy, &self.tuning, &self.limits)
    }

    /// Generate the kernel bundle for `spec`.
    ///
    /// All validation happens before any source text is built.
    pub fn generate(&self, spec: &ReductionSpec) -> Result<GeneratedKernel> {
        let plan = self.plan(spec)?;
        let template = glsl_mean::emit(&plan)?;
        let (parameters, shared_variables, source) = template.into_parts();

        log::debug!(
            "generated {} mean kernel for {}x{}x{} ({} shared bytes)",
            plan.strategy,
            spec.height,
            spec.width,
            spec.channels,
            plan.geometry.shared_memory_bytes()
        );

        Ok(GeneratedKernel {
            strategy: plan.strategy,
            parameters,
            shared_variables,
            geometry: plan.geometry,
            task_size: plan.task_size,
            source,
            input: IoStructure::OnlyDefinitions,
            output: IoStructure::Auto,
        })
    }
}

//! End-to-end checks of the mean kernel generator.

use meanforge_gpu::codegen::glsl_mean::PARAM_TASK_SIZE;
use meanforge_gpu::geometry::{shared_slots, thread_range};
use meanforge_gpu::reference::{execute, HostTensor};
use meanforge_gpu::{
    Axis, GenerateError, MeanKernelGenerator, MeanforgeConfig, ReductionSpec, Strategy, Uint3,
};

fn host_mean(t: &HostTensor) -> Vec<f64> {
    let plane = f64::from(t.height) * f64::from(t.width);
    let mut sums = vec![0.0f64; t.channels as usize];
    for (i, v) in t.data().iter().enumerate() {
        sums[i % t.channels as usize] += f64::from(*v);
    }
    sums.into_iter().map(|s| s / plane).collect()
}

fn assert_means(out: &[[f32; 4]], expected: &[f64]) {
    for (c, want) in expected.iter().enumerate() {
        let got = f64::from(out[c / 4][c % 4]);
        assert!(
            (got - want).abs() <= 1e-4 * want.abs().max(1.0),
            "channel {}: got {}, want {}",
            c,
            got,
            want
        );
    }
}

#[test]
fn test_strategies_agree_with_host_mean() {
    let gen = MeanKernelGenerator::default();
    for (h, w, c) in [(4, 4, 4), (7, 5, 3), (32, 32, 4), (33, 31, 10), (64, 48, 132)] {
        let spec = ReductionSpec::spatial(h, w, c);
        let tensor = HostTensor::from_fn(h, w, c, |y, x, ch| {
            ((y * 31 + x * 17 + ch * 5) % 23) as f32 - 11.0
        });
        let expected = host_mean(&tensor);

        let plan = gen.plan(&spec).unwrap();
        for strategy in [Strategy::Sequential, Strategy::ParallelTree] {
            let forced = meanforge_gpu::geometry::plan(
                &spec,
                strategy,
                gen.tuning(),
                gen.limits(),
            )
            .unwrap();
            let out = execute(&forced, &tensor).unwrap();
            assert_eq!(out.len() as u32, plan.channel_groups);
            assert_means(&out, &expected);
        }
    }
}

#[test]
fn test_boundary_32x32_selects_parallel() {
    let kernel = MeanKernelGenerator::default()
        .generate(&ReductionSpec::spatial(32, 32, 4))
        .unwrap();
    assert_eq!(kernel.strategy, Strategy::ParallelTree);

    let wg = kernel.geometry.workgroup;
    let threads = u64::from(wg.x * wg.y);
    assert_eq!(kernel.task_size, 1024u64.div_ceil(threads));
    let bound = kernel
        .parameters
        .iter()
        .find(|p| p.name == PARAM_TASK_SIZE)
        .unwrap();
    assert_eq!(bound.value as u64, kernel.task_size);
}

#[test]
fn test_boundary_4x4_selects_sequential() {
    let kernel = MeanKernelGenerator::default()
        .generate(&ReductionSpec::spatial(4, 4, 4))
        .unwrap();
    assert_eq!(kernel.strategy, Strategy::Sequential);
    assert_eq!(kernel.geometry.workload, Uint3::ZERO);
    assert_eq!(kernel.geometry.shared_memory_elements, 0);
}

#[test]
fn test_shared_memory_matches_workgroup() {
    let gen = MeanKernelGenerator::default();
    for (h, w, c) in [(32, 32, 1), (40, 50, 64), (100, 100, 132), (256, 256, 512)] {
        let kernel = gen.generate(&ReductionSpec::spatial(h, w, c)).unwrap();
        let g = kernel.geometry;
        assert_eq!(u64::from(g.shared_memory_elements), g.workgroup.volume());
        assert_eq!(g.shared_memory_elements, shared_slots(g.workgroup));
        assert_eq!(kernel.shared_variables[0].len, g.shared_memory_elements);
    }
}

#[test]
fn test_thread_reads_stay_in_plane() {
    let gen = MeanKernelGenerator::default();
    // 33 * 32 and 37 * 29 do not divide by the 16 threads of a 4x4 tile.
    for (h, w) in [(32, 32), (33, 32), (37, 29), (100, 11), (1, 2000)] {
        let plan = gen.plan(&ReductionSpec::spatial(h, w, 4)).unwrap();
        assert_eq!(plan.strategy, Strategy::ParallelTree);
        let mut total = 0;
        for t in 0..plan.threads_per_plane() {
            let range = thread_range(&plan, t);
            assert!(range.end <= plan.element_count);
            total += range.end - range.start;
        }
        assert_eq!(total, plan.element_count);
    }
}

#[test]
fn test_height_only_is_unsupported() {
    let spec = ReductionSpec::new(8, 8, 4, [Axis::Height].into_iter().collect());
    let err = MeanKernelGenerator::default().generate(&spec).unwrap_err();
    assert!(matches!(err, GenerateError::UnsupportedReduction { .. }));
}

#[test]
fn test_zero_channels_is_invalid() {
    let err = MeanKernelGenerator::default()
        .generate(&ReductionSpec::spatial(8, 8, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        GenerateError::InvalidExtent {
            what: "channels",
            value: 0
        }
    ));
}

#[test]
fn test_generation_is_byte_identical() {
    let gen = MeanKernelGenerator::default();
    for spec in [
        ReductionSpec::spatial(4, 4, 4),
        ReductionSpec::spatial(128, 128, 36),
    ] {
        let a = serde_json::to_vec(&gen.generate(&spec).unwrap()).unwrap();
        let b = serde_json::to_vec(&gen.generate(&spec).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_config_file_drives_generator() {
    let config = MeanforgeConfig::from_toml_str(
        r#"
[tuning]
parallel-threshold = 16
tile-x = 8
tile-y = 8
"#,
    )
    .unwrap();
    let kernel = MeanKernelGenerator::from_config(&config)
        .generate(&ReductionSpec::spatial(4, 4, 8))
        .unwrap();
    assert_eq!(kernel.strategy, Strategy::ParallelTree);
    assert_eq!(kernel.geometry.workgroup, Uint3::new(8, 8, 2));
    assert_eq!(kernel.task_size, 1);
    assert_eq!(kernel.shared_memory_bytes(), 8 * 8 * 2 * 16);
}

#[test]
fn test_rendered_source_is_fully_bound() {
    let kernel = MeanKernelGenerator::default()
        .generate(&ReductionSpec::spatial(64, 64, 16))
        .unwrap();
    let src = kernel.render_default().unwrap();
    assert!(!src.contains('$'));
    assert!(src.starts_with("shared highp vec4 sh_mem[64];"));
    assert!(src.contains("float size = float(64 * 64);"));
}

#[test]
fn test_oversized_tile_config_is_rejected() {
    let config = MeanforgeConfig::from_toml_str(
        r#"
[tuning]
parallel-threshold = 16
tile-x = 70000
tile-y = 70000

[limits]
max-workgroup-size = [70000, 70000, 64]
"#,
    )
    .unwrap();
    let err = MeanKernelGenerator::from_config(&config)
        .generate(&ReductionSpec::spatial(4, 4, 4))
        .unwrap_err();
    assert!(matches!(
        err,
        GenerateError::ResourceExceeded {
            resource: "workgroup invocations",
            ..
        }
    ));
}

#[test]
fn test_plane_near_int_max_is_rejected() {
    let err = MeanKernelGenerator::default()
        .generate(&ReductionSpec::spatial(1, i32::MAX as u32, 4))
        .unwrap_err();
    assert!(matches!(
        err,
        GenerateError::InvalidExtent {
            what: "threads * task size",
            ..
        }
    ));
}

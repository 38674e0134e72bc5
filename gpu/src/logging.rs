//! Logging configuration for meanforge
//!
//! Thin wrappers over `env_logger` for the `log` facade used throughout the
//! generator.
//!
//! The CLI calls [`init_from_verbosity`] with its `-v` count: no flags and
//! `RUST_LOG` set defers to the environment, otherwise the flag count picks
//! the level.
//!
//! # Log Levels
//!
//! - `warn!` - Channel groups clamped to a non-ideal workgroup depth
//! - `debug!` - Strategy choice and planned geometry
//! - `trace!` - Emitted template sizes
//!
//! Module filters work as usual:
//!
//! ```bash
//! RUST_LOG=meanforge_gpu::geometry=debug meanforge generate -H 64 -W 64 -C 8
//! ```

use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for a CLI run with `verbose` `-v` flags.
/// Subsequent calls are no-ops.
pub fn init_from_verbosity(verbose: u8) {
    match verbosity_level(verbose, std::env::var_os("RUST_LOG").is_some()) {
        Some(level) => init_with_level(level),
        None => init_from_env(),
    }
}

/// Level implied by the `-v` count, or `None` to defer to RUST_LOG.
fn verbosity_level(verbose: u8, env_filter_set: bool) -> Option<LevelFilter> {
    match verbose {
        0 if env_filter_set => None,
        0 => Some(LevelFilter::Warn),
        1 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    }
}

/// Initialize logging with a fixed level. Subsequent calls are no-ops.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        Builder::new()
            .filter_level(level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "meanforge [{:5}] {} - {}",
                    record.level(),
                    record.module_path().unwrap_or(record.target()),
                    record.args()
                )
            })
            .init();
    });
}

/// Initialize logging from RUST_LOG, defaulting to Warn.
pub fn init_from_env() {
    INIT.call_once(|| {
        Builder::from_env(Env::default().default_filter_or("warn"))
            .format_timestamp(None)
            .init();
    });
}

/// Initialize logging for tests; safe to call from every test.
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_level(0, false), Some(LevelFilter::Warn));
        assert_eq!(verbosity_level(1, false), Some(LevelFilter::Debug));
        assert_eq!(verbosity_level(2, true), Some(LevelFilter::Trace));
        assert_eq!(verbosity_level(7, false), Some(LevelFilter::Trace));
    }

    #[test]
    fn test_rust_log_wins_without_flags() {
        assert_eq!(verbosity_level(0, true), None);
        assert_eq!(verbosity_level(1, true), Some(LevelFilter::Debug));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_test();
        init_test();
    }

    #[test]
    fn test_generation_logs_do_not_panic() {
        init_test();
        let _ = crate::MeanKernelGenerator::default()
            .generate(&crate::ReductionSpec::spatial(32, 32, 132));
    }
}

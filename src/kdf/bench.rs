//! Host benchmark for key-derivation parameters.
//!
//! Run once at first-run setup and again only on explicit user action.
//! The benchmark doubles the Argon2id memory cost until a single
//! derivation lands in the target window, capped at 256 MiB and floored
//! at 16 MiB.

use std::time::{Duration, Instant};

use crate::config::{
    ARGON_MEMORY_CAP, ARGON_MEMORY_FLOOR, ARGON_THREADS, ARGON_TIME, BENCH_TARGET_HIGH_MS,
    BENCH_TARGET_LOW_MS,
};
use crate::error::Result;
use crate::kdf::{KdfParams, derive, generate_salt};
use crate::secret::Password;

/// Tunable knobs for the benchmark loop.
///
/// The defaults reproduce the production behavior; tests narrow the
/// search space to keep the suite fast.
#[derive(Debug, Clone, Copy)]
pub struct BenchOptions {
    /// Starting (and minimum) memory cost in KiB.
    pub floor_kib: u32,

    /// Maximum memory cost in KiB.
    pub cap_kib: u32,

    /// Time cost used for every probe.
    pub passes: u32,

    /// Parallelism used for every probe.
    pub parallelism: u32,

    /// Lower edge of the target window.
    pub target_low: Duration,

    /// Upper edge of the target window.
    pub target_high: Duration,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            floor_kib: ARGON_MEMORY_FLOOR,
            cap_kib: ARGON_MEMORY_CAP,
            passes: ARGON_TIME,
            parallelism: ARGON_THREADS,
            target_low: Duration::from_millis(BENCH_TARGET_LOW_MS),
            target_high: Duration::from_millis(BENCH_TARGET_HIGH_MS),
        }
    }
}

/// Benchmarks the host with production settings.
///
/// # Errors
///
/// Returns an error if a probe derivation fails.
pub fn bench() -> Result<KdfParams> {
    bench_with(BenchOptions::default())
}

/// Benchmarks the host with explicit options.
///
/// Doubles the memory cost from the floor until a probe derivation takes
/// at least `target_low`, never exceeding the cap. A host too slow to
/// leave the floor still gets the floor; a host too fast for the cap gets
/// the cap.
///
/// # Errors
///
/// Returns an error if a probe derivation fails.
pub fn bench_with(opts: BenchOptions) -> Result<KdfParams> {
    let probe_password = Password::from_slice(b"gvault-bench-probe");
    let probe_salt = generate_salt()?;

    let mut mem_kib = opts.floor_kib.max(ARGON_MEMORY_FLOOR);
    let cap_kib = opts.cap_kib.min(ARGON_MEMORY_CAP).max(mem_kib);

    loop {
        let params = KdfParams::argon2id(mem_kib, opts.passes, opts.parallelism);

        let start = Instant::now();
        derive(&probe_password, &probe_salt, &params)?;
        let elapsed = start.elapsed();

        tracing::debug!(mem_kib, elapsed_ms = elapsed.as_millis() as u64, "kdf bench probe");

        if elapsed >= opts.target_low || mem_kib >= cap_kib {
            if elapsed > opts.target_high {
                tracing::debug!(mem_kib, "bench settled above the target window");
            }
            return Ok(params);
        }

        mem_kib = mem_kib.saturating_mul(2).min(cap_kib);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bench_respects_floor_and_cap() {
        // Pin the search space to a single memory cost so the probe runs
        // exactly once regardless of host speed.
        let opts = BenchOptions {
            floor_kib: ARGON_MEMORY_FLOOR,
            cap_kib: ARGON_MEMORY_FLOOR,
            passes: 1,
            parallelism: 1,
            ..BenchOptions::default()
        };

        let params = bench_with(opts).unwrap();
        assert!(params.mem_kib >= ARGON_MEMORY_FLOOR);
        assert!(params.mem_kib <= ARGON_MEMORY_CAP);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_bench_result_is_usable_for_derivation() {
        let opts = BenchOptions {
            floor_kib: ARGON_MEMORY_FLOOR,
            cap_kib: ARGON_MEMORY_FLOOR,
            passes: 1,
            parallelism: 1,
            ..BenchOptions::default()
        };

        let params = bench_with(opts).unwrap();
        let salt = generate_salt().unwrap();
        let password = Password::from_slice(b"probe");
        assert!(derive(&password, &salt, &params).is_ok());
    }
}

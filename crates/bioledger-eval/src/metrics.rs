//! Latency and throughput measurement (C9).
//!
//! No statistics crate is pulled in solely for percentiles — a sorted
//! vector and nearest-rank indexing is all eight-iteration-count workloads
//! need, and it keeps the dependency surface matched to what this workspace
//! already carries for numeric work elsewhere.

use std::time::Instant;

use anyhow::Result;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub samples: usize,
}

fn nearest_rank(sorted_ms: &[f64], p: f64) -> f64 {
    if sorted_ms.is_empty() {
        return 0.0;
    }
    let rank = ((p * sorted_ms.len() as f64).ceil() as usize).clamp(1, sorted_ms.len());
    sorted_ms[rank - 1]
}

fn compute_stats(mut samples_ms: Vec<f64>) -> LatencyStats {
    if samples_ms.is_empty() {
        return LatencyStats::default();
    }
    samples_ms.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = samples_ms.len() as f64;
    let mean = samples_ms.iter().sum::<f64>() / n;
    let variance = samples_ms.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    LatencyStats {
        p50_ms: nearest_rank(&samples_ms, 0.50),
        p95_ms: nearest_rank(&samples_ms, 0.95),
        p99_ms: nearest_rank(&samples_ms, 0.99),
        mean_ms: mean,
        stddev_ms: variance.sqrt(),
        samples: samples_ms.len(),
    }
}

/// Runs `op` `iterations` times, recording wall-clock latency per call.
/// `op` is responsible for any finality assertions it needs (e.g. calling
/// [`crate::harness::assert_finality`] on a mutating operation's receipt)
/// before returning — this function only measures elapsed time and
/// propagates the first error.
pub fn measure_latency<F: FnMut() -> Result<()>>(iterations: usize, mut op: F) -> Result<LatencyStats> {
    let mut samples_ms = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        op()?;
        samples_ms.push(start.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(compute_stats(samples_ms))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThroughputResult {
    pub concurrency: usize,
    pub total_ops: usize,
    pub elapsed_ms: u128,
    pub ops_per_sec: f64,
}

/// Runs a fixed mixed read/write workload at `concurrency` threads.
/// `read_op`/`write_op` must be `Sync` since every thread shares them; the
/// read pool they draw from is expected to already be frozen by the caller
/// (per spec.md §5, concurrency runs must not let pool growth bias
/// throughput).
pub fn measure_throughput<R, W>(
    concurrency: usize,
    ops_per_thread: usize,
    read_fraction: f64,
    read_op: R,
    write_op: W,
) -> Result<ThroughputResult>
where
    R: Fn(usize) -> Result<()> + Sync,
    W: Fn(usize) -> Result<()> + Sync,
{
    let start = Instant::now();
    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(concurrency);
        for thread_index in 0..concurrency {
            let read_op = &read_op;
            let write_op = &write_op;
            handles.push(scope.spawn(move || -> Result<()> {
                for op_index in 0..ops_per_thread {
                    // Deterministic split: a fixed fraction of slots per
                    // thread are writes, spread evenly rather than rolled,
                    // so the mix is exact regardless of RNG availability.
                    let slot = op_index as f64 / ops_per_thread.max(1) as f64;
                    if slot < read_fraction {
                        read_op(thread_index * ops_per_thread + op_index)?;
                    } else {
                        write_op(thread_index * ops_per_thread + op_index)?;
                    }
                }
                Ok(())
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread panicked")?;
        }
        Ok(())
    })?;
    let elapsed = start.elapsed();
    let total_ops = concurrency * ops_per_thread;
    let ops_per_sec = if elapsed.as_secs_f64() > 0.0 {
        total_ops as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    Ok(ThroughputResult {
        concurrency,
        total_ops,
        elapsed_ms: elapsed.as_millis(),
        ops_per_sec,
    })
}

/// One point in a scaling sweep: latency of `op` after the registry has
/// grown to `registry_size` materials.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalingPoint {
    pub registry_size: usize,
    pub stats: LatencyStats,
}

/// Measures `op`'s latency at each of `scale_points` (materials in the
/// registry), calling `grow(target)` between points to bring the registry
/// from its previous size up to `target`. Per spec.md §5/§9, `grow` must
/// register only the incremental delta (`target - previous`), never
/// re-register materials already present — a scaling sweep that
/// re-registers from scratch at every point would bias later points with
/// the cost of redoing earlier ones, masking whether `op` is actually O(1)
/// in registry size.
pub fn measure_scaling<G, F>(
    scale_points: &[usize],
    iterations: usize,
    mut grow: G,
    mut op: F,
) -> Result<Vec<ScalingPoint>>
where
    G: FnMut(usize) -> Result<()>,
    F: FnMut() -> Result<()>,
{
    let mut points = Vec::with_capacity(scale_points.len());
    let mut previous = 0usize;
    for &target in scale_points {
        if target > previous {
            grow(target)?;
            previous = target;
        }
        let stats = measure_latency(iterations, &mut op)?;
        points.push(ScalingPoint {
            registry_size: target,
            stats,
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_of_uniform_samples() {
        let samples: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let stats = compute_stats(samples);
        assert_eq!(stats.p50_ms, 50.0);
        assert_eq!(stats.p99_ms, 99.0);
        assert_eq!(stats.samples, 100);
    }

    #[test]
    fn measure_latency_counts_every_iteration() {
        let mut calls = 0;
        let stats = measure_latency(10, || {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 10);
        assert_eq!(stats.samples, 10);
    }

    #[test]
    fn measure_scaling_grows_incrementally_not_cumulatively() {
        let mut registered_total = 0usize;
        let mut grow_calls = Vec::new();
        let points = measure_scaling(
            &[100, 250, 250, 400],
            3,
            |target| {
                let delta = target - registered_total;
                grow_calls.push(delta);
                registered_total += delta;
                Ok(())
            },
            || Ok(()),
        )
        .unwrap();

        // 100, then +150 to reach 250, then nothing (already at 250), then +150.
        assert_eq!(grow_calls, vec![100, 150, 150]);
        assert_eq!(registered_total, 400);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].registry_size, 100);
        assert_eq!(points[3].registry_size, 400);
        assert!(points.iter().all(|p| p.stats.samples == 3));
    }

    #[test]
    fn throughput_runs_every_slot_exactly_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let reads = AtomicUsize::new(0);
        let writes = AtomicUsize::new(0);
        let result = measure_throughput(
            4,
            10,
            0.7,
            |_| {
                reads.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            |_| {
                writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(result.total_ops, 40);
        assert_eq!(reads.load(Ordering::SeqCst) + writes.load(Ordering::SeqCst), 40);
    }
}

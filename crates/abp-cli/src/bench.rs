use std::cmp::Ordering;
use std::time::Instant;

use abp_core::matcher::RuleSet;

use crate::requests::Request;

pub struct BenchOptions {
    pub iterations: usize,
    pub warmup_ops: usize,
    pub sample_batch_ops: usize,
}

pub struct BenchResult {
    pub name: &'static str,
    pub op_count: usize,
    pub total_ms: f64,
    pub avg_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub blocked: usize,
}

impl BenchResult {
    pub fn ops_per_sec(&self) -> u64 {
        if self.total_ms > 0.0 {
            (self.op_count as f64 / (self.total_ms / 1000.0)) as u64
        } else {
            0
        }
    }
}

/// Timings for the bare loop and both matcher entry points.
pub struct BenchReport {
    pub baseline: BenchResult,
    pub should_block: BenchResult,
    pub decide: BenchResult,
}

impl BenchReport {
    /// Extra cost per request of recovering the deciding rule.
    pub fn decide_overhead_us(&self) -> f64 {
        self.decide.avg_us - self.should_block.avg_us
    }
}

pub fn run(rule_set: &RuleSet, requests: &[Request], opts: &BenchOptions) -> BenchReport {
    log::info!(
        "benchmarking {} requests x {} iterations",
        requests.len(),
        opts.iterations
    );

    warmup(rule_set, requests, opts.warmup_ops);

    let baseline = run_bench_batched(
        "loop only",
        requests,
        opts.iterations.max(1) / 4,
        opts.sample_batch_ops,
        |_| false,
    );

    let should_block = run_bench_batched(
        "should_block",
        requests,
        opts.iterations,
        opts.sample_batch_ops,
        |req| rule_set.should_block(&req.url, &req.context()),
    );

    let decide = run_bench_batched(
        "decide",
        requests,
        opts.iterations,
        opts.sample_batch_ops,
        |req| rule_set.decide(&req.url, &req.context()).is_blocked(),
    );

    if should_block.blocked != decide.blocked {
        log::warn!(
            "should_block and decide disagree: {} vs {} blocked",
            should_block.blocked,
            decide.blocked
        );
    }

    BenchReport {
        baseline,
        should_block,
        decide,
    }
}

fn warmup(rule_set: &RuleSet, requests: &[Request], warmup_ops: usize) {
    let loops = if requests.is_empty() { 0 } else { warmup_ops / requests.len() + 1 };
    for _ in 0..loops {
        for req in requests {
            let _ = rule_set.should_block(&req.url, &req.context());
        }
    }
}

fn run_bench_batched(
    name: &'static str,
    requests: &[Request],
    iterations: usize,
    sample_batch_ops: usize,
    mut f: impl FnMut(&Request) -> bool,
) -> BenchResult {
    let sample_batch_ops = sample_batch_ops.max(1);
    let mut samples_us = Vec::new();
    let mut blocked = 0usize;
    let total_ops = requests.len() * iterations.max(1);

    let mut batch_ops = 0usize;
    let mut batch_start = Instant::now();
    let start = Instant::now();

    for _ in 0..iterations.max(1) {
        for req in requests {
            if std::hint::black_box(f(req)) {
                blocked += 1;
            }
            batch_ops += 1;
            if batch_ops == sample_batch_ops {
                let dt = batch_start.elapsed();
                samples_us.push(dt.as_secs_f64() * 1_000_000.0 / sample_batch_ops as f64);
                batch_ops = 0;
                batch_start = Instant::now();
            }
        }
    }

    let total_ms = start.elapsed().as_secs_f64() * 1000.0;
    samples_us.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let avg_us = if total_ops == 0 { 0.0 } else { total_ms * 1000.0 / total_ops as f64 };

    BenchResult {
        name,
        op_count: total_ops,
        total_ms,
        avg_us,
        p50_us: percentile(&samples_us, 0.50),
        p95_us: percentile(&samples_us, 0.95),
        p99_us: percentile(&samples_us, 0.99),
        blocked,
    }
}

/// Render the report as one row per measured loop.
pub fn format_report(report: &BenchReport) -> String {
    let mut out = format!(
        "{:<14} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9} {:>12}\n",
        "", "ops", "total ms", "avg us", "p50 us", "p95 us", "p99 us", "ops/sec"
    );
    for result in [&report.baseline, &report.should_block, &report.decide] {
        out.push_str(&format!(
            "{:<14} {:>10} {:>10.2} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>12}\n",
            result.name,
            result.op_count,
            result.total_ms,
            result.avg_us,
            result.p50_us,
            result.p95_us,
            result.p99_us,
            result.ops_per_sec(),
        ));
    }
    out.push_str(&format!(
        "\nBlocked: {} of {} evaluations\ndecide overhead: {:+.3} us/request",
        report.should_block.blocked,
        report.should_block.op_count,
        report.decide_overhead_us(),
    ));
    out
}

/// Nearest-rank percentile of ascending samples.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(last)]
}

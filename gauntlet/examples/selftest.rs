//! Self-contained demonstration suite.
//!
//! Run the unit tests with bounded concurrency:
//! ```sh
//! cargo run -p gauntlet --example selftest -- --jobs 2
//! ```
//!
//! Run the performance tests with a report file:
//! ```sh
//! cargo run -p gauntlet --example selftest -- --mode perf --outfile perf.txt
//! ```

use gauntlet::prelude::*;
use std::time::{Duration, Instant};

fn run_sort_smoke(_ctx: &mut TestContext) -> TestResult {
    let mut v = vec![9, 3, 7, 1, 5];
    v.sort_unstable();
    if v != [1, 3, 5, 7, 9] {
        return Err("sort produced wrong order".into());
    }
    Ok(())
}

fn run_checksum(ctx: &mut TestContext) -> TestResult {
    if ctx.verbose() {
        println!("computing checksum over 64 KiB");
    }
    let data: Vec<u8> = (0..65536u32).map(|i| (i % 251) as u8).collect();
    let sum: u64 = data.iter().map(|&b| u64::from(b)).sum();
    if sum == 0 {
        return Err("checksum collapsed to zero".into());
    }
    Ok(())
}

fn run_expected_failure(_ctx: &mut TestContext) -> TestResult {
    Err("this test always fails, demonstrating failure reporting".into())
}

fn run_slowpoke(_ctx: &mut TestContext) -> TestResult {
    // Exceeds its 1-second limit; with isolation the deadline timer ends the
    // child and the supervisor records a timeout failure.
    std::thread::sleep(Duration::from_secs(5));
    Ok(())
}

fn run_sum_throughput(ctx: &mut TestContext) -> TestResult {
    const ITERATIONS: u32 = 1000;
    let data: Vec<u64> = (0..4096).collect();

    let start = Instant::now();
    let mut acc = 0u64;
    for _ in 0..ITERATIONS {
        acc = acc.wrapping_add(data.iter().sum::<u64>());
    }
    let elapsed = start.elapsed();

    ctx.record_stat("iterations", ITERATIONS);
    ctx.record_stat("total time", format!("{:.2} ms", elapsed.as_secs_f64() * 1e3));
    ctx.record_stat(
        "per iteration",
        format!("{:.2} us", elapsed.as_secs_f64() * 1e6 / f64::from(ITERATIONS)),
    );
    // Keep the accumulator observable so the loop cannot be optimized out.
    if acc == u64::MAX {
        return Err("impossible accumulator value".into());
    }
    Ok(())
}

fn run_interactive(ctx: &mut TestContext) -> TestResult {
    println!("manual test driven by forwarded args: {:?}", ctx.args());
    Ok(())
}

gauntlet::unit_test!("algo", "sort_smoke", run_sort_smoke);
gauntlet::unit_test!("algo", "checksum", run_checksum);
gauntlet::unit_test!("demo", "expected_failure", run_expected_failure);
gauntlet::unit_test!("demo", "slowpoke", 1.0, run_slowpoke);
gauntlet::perf_test!("perf", "sum_throughput", run_sum_throughput);
gauntlet::manual_test!("demo", "interactive", run_interactive);

fn main() -> anyhow::Result<()> {
    gauntlet::run()
}

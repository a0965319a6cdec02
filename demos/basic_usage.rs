use evictsim::prelude::*;
use evictsim::policies::ObjectStats;
use evictsim::sweep::{sweep, SweepJob};
use evictsim::tune::{tune_policy, RandomSearch};

fn main() -> Result<()> {
    println!("=== evictsim demo ===\n");

    // Demo 1: Driving a cache engine by hand
    demo_engine()?;

    // Demo 2: A custom scoring heuristic
    demo_scored_policy()?;

    // Demo 3: Comparing and tuning policies
    demo_compare_and_tune()?;

    Ok(())
}

/// A small synthetic workload: a hot set of 8 objects mixed with a scan
fn workload() -> Vec<CacheObject> {
    (0..5_000u64)
        .map(|i| if i % 3 == 0 { 1_000 + i } else { i % 8 })
        .map(CacheObject::unit)
        .collect()
}

/// Demonstrates the request path of the engine
fn demo_engine() -> Result<()> {
    println!("1. Cache engine with LRU");
    println!("------------------------");

    let mut engine = CacheEngine::new(create_policy("lru", 3, "")?, 3)?;
    for key in [1, 2, 3, 1, 4, 2] {
        let access = engine.process(CacheObject::unit(key))?;
        println!("  request {key}: {access:?}");
    }
    println!("  resident: {:?}", engine.snapshot().keys().collect::<Vec<_>>());
    println!("  miss ratio: {:.3}\n", engine.stats().miss_ratio()?);
    Ok(())
}

/// Demonstrates plugging a closure in as an eviction heuristic
fn demo_scored_policy() -> Result<()> {
    println!("2. Scored policy: evict the oldest insertion");
    println!("--------------------------------------------");

    let policy = ScoredPolicy::from_fn("oldest-first", |s: &ObjectStats, _: &CacheSnapshot<'_>| s.inserted_at as f64);
    let mut engine = CacheEngine::new(policy, 16)?;
    engine.replay(workload())?;
    println!("  miss ratio: {:.4}\n", engine.stats().miss_ratio()?);
    Ok(())
}

/// Demonstrates parallel sweeps and tuning over one workload
fn demo_compare_and_tune() -> Result<()> {
    println!("3. Policy comparison and tuning");
    println!("-------------------------------");

    let requests = workload();
    let jobs: Vec<_> = PolicyType::all()
        .iter()
        .map(|&policy| SweepJob::new(policy, ParamSet::new()))
        .collect();
    for result in sweep(&requests, 16, &jobs)? {
        println!("  {:<10} {:.4}", result.policy, result.miss_ratio);
    }

    let outcome = tune_policy(&requests, PolicyType::S3Fifo, 16, &mut RandomSearch::new(42), 20)?;
    println!(
        "\n  s3fifo default {:.4} -> tuned {:.4} with {}",
        outcome.default_miss_ratio, outcome.miss_ratio, outcome.params
    );
    Ok(())
}

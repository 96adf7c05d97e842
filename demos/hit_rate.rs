//! Miss-ratio comparison of host-defined policies: FIFO vs LRU vs LRU behind
//! a second-hit admissioner.
//!
//! Uses a Zipf(s=1.0) access trace. The same trace is replayed against each
//! plugin cache through `process_trace`, so the comparison is fair.
//!
//! Run with:
//!     RUST_LOG=cachesim_plugin=debug cargo run --example hit_rate --release

use ahash::AHashMap;
use cachesim_plugin::{
    state_mut, OpaqueState, PluginAdmissioner, PluginCache, PluginCacheBuilder, Request, VecReader,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Cache capacity in unit-size objects.
const CAP: u64 = 1_000;
/// Object universe size. CAP is 10 % of POOL.
const POOL: usize = 10_000;
/// Number of accesses in the trace.
const TRACE: usize = 200_000;

// ---------------------------------------------------------------------------
// Zipf(s=1.0) sampler
//
// Inverse-CDF: P(X <= k) ~ ln(k) / ln(N), so k = N^u for u ~ Uniform[0,1].
// ---------------------------------------------------------------------------

struct Xorshift64(u64);

impl Xorshift64 {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// Uniform float in (0, 1].
    fn uniform(&mut self) -> f64 {
        let bits = self.next() >> 11;
        (bits + 1) as f64 / (1u64 << 53) as f64
    }

    /// Zipf(s=1) sample in [0, pool).
    fn zipf(&mut self, pool: usize) -> usize {
        let k = (pool as f64).powf(self.uniform()) as usize;
        k.saturating_sub(1).min(pool - 1)
    }
}

fn generate_trace(seed: u64, pool: usize, len: usize) -> VecReader {
    let mut rng = Xorshift64(seed);
    VecReader::new(
        (0..len)
            .map(|t| Request::new(rng.zipf(pool) as u64, 1).at(t as u64))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Host policies
// ---------------------------------------------------------------------------

type Queue = VecDeque<u64>;

fn queue_policy(name: &str, refresh_on_hit: bool) -> PluginCacheBuilder {
    PluginCache::builder(CAP)
        .name(name)
        .init_hook(|params| Ok(OpaqueState::new(Queue::with_capacity(params.cache_size as usize))))
        .hit_hook(move |state, req| {
            if refresh_on_hit {
                let q = state_mut::<Queue>(state)?;
                if let Some(pos) = q.iter().position(|&id| id == req.obj_id) {
                    q.remove(pos);
                }
                q.push_back(req.obj_id);
            }
            Ok(())
        })
        .miss_hook(|state, req| {
            state_mut::<Queue>(state)?.push_back(req.obj_id);
            Ok(())
        })
        .eviction_hook(|state, _| {
            state_mut::<Queue>(state)?
                .front()
                .copied()
                .ok_or_else(|| "queue is empty".into())
        })
        .remove_hook(|state, obj_id| {
            let q = state_mut::<Queue>(state)?;
            if q.front() == Some(&obj_id) {
                q.pop_front();
            } else {
                q.retain(|&id| id != obj_id);
            }
            Ok(())
        })
}

/// Admits an object from its second request on.
fn second_hit() -> PluginAdmissioner {
    PluginAdmissioner::builder("SecondHit")
        .init_hook(|_| Ok(OpaqueState::new(AHashMap::<u64, u32>::new())))
        .update_hook(|state, req, _| {
            *state_mut::<AHashMap<u64, u32>>(state)?
                .entry(req.obj_id)
                .or_default() += 1;
            Ok(())
        })
        .admit_hook(|state, req| {
            let seen = state_mut::<AHashMap<u64, u32>>(state)?;
            Ok(seen.get(&req.obj_id).copied().unwrap_or(0) >= 2)
        })
        .build()
        .expect("admissioner hooks are complete")
}

fn run(mut cache: PluginCache, reader: &mut VecReader) -> (f64, Duration) {
    let start = Instant::now();
    let (miss_ratio, _) = cache
        .process_trace(reader, 0, None)
        .expect("replay failed");
    (miss_ratio, start.elapsed())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("  Distribution : Zipf(s = 1.0)");
    println!("  Universe     : {POOL:>10} objects");
    println!(
        "  Capacity     : {CAP:>10} objects  ({:.0}% of universe)",
        CAP as f64 / POOL as f64 * 100.0
    );
    println!("  Trace length : {TRACE:>10} requests");
    println!();

    let mut reader = generate_trace(0xDEAD_BEEF_1234_5678, POOL, TRACE);

    let col_policy = 18usize;
    let col_ratio = 12usize;
    let col_time = 12usize;
    println!(
        "{:<col_policy$} {:>col_ratio$} {:>col_time$}",
        "Policy", "Miss Ratio", "Time (ms)"
    );
    println!("{}", "-".repeat(col_policy + col_ratio + col_time + 2));

    let print_row = |name: &str, miss_ratio: f64, elapsed: Duration| {
        println!(
            "{:<col_policy$} {:>11.2}% {:>col_time$}",
            name,
            miss_ratio * 100.0,
            elapsed.as_millis(),
        );
    };

    let fifo = queue_policy("FIFO", false).build().expect("FIFO hooks are complete");
    let (ratio, elapsed) = run(fifo, &mut reader);
    print_row("FIFO", ratio, elapsed);

    let lru = queue_policy("LRU", true).build().expect("LRU hooks are complete");
    let (ratio, elapsed) = run(lru, &mut reader);
    print_row("LRU", ratio, elapsed);

    let admitted = queue_policy("LRU+SecondHit", true)
        .admissioner(second_hit())
        .build()
        .expect("LRU hooks are complete");
    let (ratio, elapsed) = run(admitted, &mut reader);
    print_row("LRU+SecondHit", ratio, elapsed);
}

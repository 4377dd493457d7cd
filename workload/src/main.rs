//! Runs a randomized insert/lookup/remove workload against a [`RobinMap`] and reports how the
//! table's occupancy evolves.
use clap::Parser;
use color_eyre::eyre::{bail, ensure};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use robin_map::{RobinMap, TableStats, MIN_SIZE_EXP};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of keys to insert.
    #[clap(short = 'n', long, default_value = "100000")]
    keys: usize,
    /// Number of inserted keys to remove again.
    #[clap(short = 'r', long, default_value = "90000")]
    remove: usize,
    /// Capacity exponent the table never shrinks below.
    #[clap(short = 'e', long, default_value_t = MIN_SIZE_EXP)]
    reserve: u32,
    /// Seed for key generation.
    #[clap(short = 's', long, default_value = "0")]
    seed: u64,
    /// Keys are drawn from `0..key_range`, a small range produces repeated keys.
    #[clap(short = 'k', long, default_value_t = u32::MAX)]
    key_range: u32,

    #[clap(long)]
    jsonl_output: bool,
}

fn report(args: &Args, phase: &str, stats: &TableStats) {
    log::info!("# {phase}");
    for line in stats.to_string().lines() {
        log::info!("{line}");
    }
    if args.jsonl_output {
        println!(
            "{}",
            json!({
                "phase": phase,
                "members": stats.members,
                "tombstones": stats.tombstones,
                "capacity": stats.capacity,
                "size_exp": stats.size_exp,
                "load_factor": stats.load_factor(),
                "max_probe_distance": stats.max_probe_distance,
                "rebuilds": stats.rebuilds,
            })
        );
    }
}

fn main() -> color_eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    robin_map_logger::setup();

    ensure!(args.key_range > 0, "key range must not be empty");
    if args.remove > args.keys {
        bail!(
            "cannot remove {} of {} inserted keys",
            args.remove,
            args.keys
        );
    }

    let mut map = RobinMap::<u64>::with_reserve(args.reserve)?;
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let keys: Vec<u32> = (0..args.keys)
        .map(|_| rng.gen_range(0..args.key_range))
        .collect();

    for (index, &key) in keys.iter().enumerate() {
        map.try_put(key, index as u64)?;
    }
    report(&args, "insert", &map.stats());

    // Only the last write of each key is visible.
    let distinct = keys
        .iter()
        .enumerate()
        .filter(|&(index, &key)| map.get(key) == Some(&(index as u64)))
        .count();
    ensure!(
        distinct == map.len(),
        "map holds {} keys, but {distinct} distinct keys were inserted",
        map.len()
    );
    report(&args, "lookup", &map.stats());

    let mut removed = 0;
    for &key in &keys[..args.remove] {
        if map.remove(key) {
            removed += 1;
        }
    }
    for &key in &keys[..args.remove] {
        ensure!(!map.contains(key), "key {key} survived its removal");
    }
    log::info!("removed {removed} distinct keys");
    report(&args, "remove", &map.stats());

    map.clear();
    report(&args, "clear", &map.stats());

    Ok(())
}

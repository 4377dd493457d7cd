#![cfg(test)]
#![allow(missing_docs)]
use crate::{RobinMap, MIN_SIZE_EXP};
use rand::prelude::*;
use std::{fmt::Debug, hash::BuildHasherDefault};
use zwohash::ZwoHasher;

type RefMap<V> = hashbrown::HashMap<u32, V, BuildHasherDefault<ZwoHasher>>;

struct CheckedMap<V> {
    dut: RobinMap<V>,
    ref_map: RefMap<V>,
}

impl<V: Eq + Clone + Debug> CheckedMap<V> {
    fn new() -> Self {
        CheckedMap {
            dut: RobinMap::new(),
            ref_map: RefMap::default(),
        }
    }
    fn get(&mut self, key: u32) -> Option<&V> {
        let ref_result = self.ref_map.get(&key);
        let dut_result = self.dut.get(key);
        assert_eq!(ref_result, dut_result);
        assert_eq!(self.dut.contains(key), ref_result.is_some());
        ref_result
    }
    fn put(&mut self, key: u32, value: V) -> Option<V> {
        let ref_result = self.ref_map.insert(key, value.clone());
        let dut_result = self.dut.put(key, value);
        assert_eq!(ref_result, dut_result);
        assert_eq!(self.ref_map.len(), self.dut.len());
        ref_result
    }
    fn take(&mut self, key: u32) -> Option<V> {
        let ref_result = self.ref_map.remove(&key);
        let dut_result = self.dut.take(key);
        assert_eq!(ref_result, dut_result);
        assert_eq!(self.ref_map.len(), self.dut.len());
        ref_result
    }
    fn clear(&mut self) {
        self.ref_map.clear();
        self.dut.clear();
    }
    fn check(&mut self) {
        self.dut.check();
        assert_eq!(self.ref_map.len(), self.dut.len());
        for (key, value) in self.dut.iter() {
            assert_eq!(self.ref_map.get(&key), Some(value));
        }
        let stats = self.dut.stats();
        let mesh = self.dut.capacity() - 1;
        for (&key, _) in self.ref_map.iter() {
            // every lookup walks exactly as far as the key sits from its home slot
            let index = self.dut.slot_index(key).unwrap();
            let offset = index.wrapping_sub(self.dut.home_slot(key)) & mesh;
            let dist = self.dut.probe_distance(key).unwrap();
            assert_eq!(dist as usize, offset);
            assert!(dist <= stats.max_probe_distance);
        }
        assert!(stats.members <= stats.max_live);
        assert!(stats.members + stats.tombstones <= stats.capacity);
    }
}

macro_rules! weighted_choose {
    ($rng:expr, $($name:ident: $weight:expr => $body:expr),+) => {
        {
            enum Branches { $( $name,  )* }
            let weights = [$((Branches::$name, $weight)),+];
            match weights.choose_weighted($rng, |x| x.1).unwrap().0 {
                $(Branches::$name => $body),*
            }
        }
    }
}

fn test_suite<V: Eq + Clone + Debug, R: Rng + SeedableRng>(
    mut rand_key: impl FnMut(&mut R) -> u32,
    mut rand_value: impl FnMut(&mut R) -> V,
    steps: usize,
) {
    let mut map: CheckedMap<V> = CheckedMap::new();
    let mut rng = R::seed_from_u64(25);
    let mut max_size = 0;
    let mut max_size_exp = MIN_SIZE_EXP;
    let verbosity = 0;
    for _ in 0..steps {
        weighted_choose! {&mut rng,
            Put: 1.0 => {
                let key = rand_key(&mut rng);
                let value = rand_value(&mut rng);
                let result = map.put(key, value);
                if verbosity > 0 {
                    println!("putting {key:?} -> {result:?}");
                }
            },
            UpdatePresent: 0.3 => {
                if let Some(key) = map.ref_map.keys().choose(&mut rng).copied() {
                    let value = rand_value(&mut rng);
                    let result = map.put(key, value);
                    if verbosity > 0 {
                        println!("updating {key:?} -> {result:?}");
                    }
                }
            },
            GetPresent: 0.5 => {
                if let Some(key) = map.ref_map.keys().choose(&mut rng).copied() {
                    let result = map.get(key).cloned();
                    if verbosity > 0 {
                        println!("getting {key:?} -> {result:?}");
                    }
                }
            },
            GetRandom: 0.5 => {
                let key = rand_key(&mut rng);
                let result = map.get(key).cloned();
                if verbosity > 0 {
                    println!("getting {key:?} -> {result:?}");
                }
            },
            TakePresent: 0.6 => {
                if let Some(key) = map.ref_map.keys().choose(&mut rng).copied() {
                    let result = map.take(key);
                    if verbosity > 0 {
                        println!("taking {key:?} -> {result:?}");
                    }
                }
            },
            TakeRandom: 0.3 => {
                let key = rand_key(&mut rng);
                let result = map.take(key);
                if verbosity > 0 {
                    println!("taking {key:?} -> {result:?}");
                }
            },
            Clear: 0.001 => {
                map.clear();
                if verbosity > 0 {
                    println!("clear");
                }
            },
            Check: 0.05 => {
                map.check();
                if verbosity > 0 {
                    println!("check");
                }
            }
        };
        max_size = std::cmp::max(max_size, map.ref_map.len());
        max_size_exp = std::cmp::max(max_size_exp, map.dut.size_exp());
    }
    map.check();
    println!("max size: {max_size}, max size_exp: {max_size_exp}");
}

#[test]
fn test_suite_dense_keys() {
    // a small key range makes removed keys come back, exercising tombstone reuse
    test_suite::<u32, rand_pcg::Pcg64>(|rng| rng.gen_range(0..600), |rng| rng.gen(), 20000);
}

#[test]
fn test_suite_sparse_keys() {
    test_suite::<u64, rand_pcg::Pcg64>(|rng| rng.gen(), |rng| rng.gen(), 20000);
}

#[test]
fn test_suite_strings() {
    test_suite::<String, rand_pcg::Pcg64>(
        |rng| rng.gen::<u32>() >> rng.gen_range(0..u32::BITS),
        |rng| {
            let len = rng.gen_range(0..16);
            String::from_iter((0..len).map(|_| rng.gen_range('!'..'~')))
        },
        5000,
    );
}

#[test]
fn test_grow_then_drain() {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(58);
    for size in [10, 129, 500, 3000, 20000] {
        let mut map = CheckedMap::<u32>::new();
        let keys: Vec<u32> = (0..size).map(|_| rng.gen()).collect();
        for &key in &keys {
            map.put(key, key ^ 1);
        }
        map.check();
        for &key in &keys {
            map.take(key);
        }
        map.check();
        let stats = map.dut.stats();
        assert_eq!(stats.size_exp, MIN_SIZE_EXP);
        assert_eq!(stats.members, 0);
        assert_eq!(stats.tombstones, 0);
    }
}

#[test]
fn test_churn_at_fixed_size() {
    // steady state insert/remove cycles must not let tombstones accumulate
    let mut map = CheckedMap::<u32>::new();
    let mut rng = rand_pcg::Pcg64::seed_from_u64(7);
    let mut live: Vec<u32> = vec![];
    for round in 0..20000u32 {
        if live.len() < 100 {
            let key = rng.gen();
            map.put(key, round);
            if !live.contains(&key) {
                live.push(key);
            }
        } else {
            let key = live.swap_remove(rng.gen_range(0..live.len()));
            map.take(key);
        }
        let stats = map.dut.stats();
        assert!(stats.tombstones <= stats.max_live / 2 + 1);
    }
    map.check();
}

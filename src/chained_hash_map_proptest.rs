#![cfg(test)]

// Property tests for ChainedHashMap kept inside the crate so they can check
// structural invariants on the private table after every step.

use crate::chained_hash_map::ChainedHashMap;
use crate::error::{Error, Result};
use crate::protocol::{Equatable, Hashable};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// Pool-indexed operations: indices shrink to earlier keys, the pool shrinks,
// and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Set(usize, i32),
    SetMany(Vec<(usize, i32)>),
    Delete(usize),
    Get(usize),
    Has(usize),
    Resize(usize),
    SetCapacity(usize),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
            1 => proptest::collection::vec((idx.clone(), any::<i32>()), 0..8).prop_map(Op::SetMany),
            2 => idx.clone().prop_map(Op::Delete),
            2 => idx.clone().prop_map(Op::Get),
            1 => idx.clone().prop_map(Op::Has),
            1 => (0usize..200).prop_map(Op::Resize),
            1 => (0usize..200).prop_map(Op::SetCapacity),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives `sut` and a BTreeMap model through the same ops; `key` maps a pool
// string to the key type under test.
fn run<K, F>(sut: &mut ChainedHashMap<K, i32>, pool: &[String], ops: Vec<Op>, key: F) -> std::result::Result<(), TestCaseError>
where
    K: Hashable + Clone + std::fmt::Debug,
    F: Fn(&str) -> K,
{
    let mut model: BTreeMap<String, i32> = BTreeMap::new();
    for op in ops {
        match op {
            Op::Set(i, v) => {
                let prev = sut.set(key(&pool[i]), v).expect("hashable");
                prop_assert_eq!(prev, model.insert(pool[i].clone(), v));
            }
            Op::SetMany(pairs) => {
                sut.set_many(pairs.iter().map(|&(i, v)| (key(&pool[i]), v)))
                    .expect("hashable");
                for (i, v) in pairs {
                    model.insert(pool[i].clone(), v);
                }
            }
            Op::Delete(i) => match model.remove(&pool[i]) {
                Some(v) => {
                    let (_, got) = sut.delete(&key(&pool[i])).expect("present");
                    prop_assert_eq!(got, v);
                }
                None => prop_assert_eq!(sut.delete(&key(&pool[i])).err(), Some(Error::KeyNotFound)),
            },
            Op::Get(i) => {
                let got = sut.try_get(&key(&pool[i])).expect("hashable").copied();
                prop_assert_eq!(got, model.get(&pool[i]).copied());
            }
            Op::Has(i) => {
                prop_assert_eq!(sut.has(&key(&pool[i])), Ok(model.contains_key(&pool[i])));
            }
            Op::Resize(n) => {
                let before = sut.capacity();
                let r = sut.resize(n);
                if n <= before {
                    prop_assert_eq!(sut.capacity(), before);
                } else {
                    prop_assert!(r.is_ok());
                    prop_assert_eq!(sut.capacity(), n.next_power_of_two());
                }
            }
            Op::SetCapacity(n) => {
                let r = sut.set_capacity(n);
                prop_assert_eq!(r.is_err(), n == 0);
                if n > 0 {
                    prop_assert!(sut.capacity() >= n.next_power_of_two());
                }
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
            Op::Iterate => {
                let seen: Vec<(K, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(seen.len(), model.len());
                for (k, v) in &model {
                    let wanted = key(k);
                    let hits: Vec<&(K, i32)> = seen.iter().filter(|(sk, _)| sk.eq_value(&wanted)).collect();
                    prop_assert_eq!(hits.len(), 1, "each live key exactly once");
                    prop_assert_eq!(hits[0].1, *v);
                }
            }
        }

        sut.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence with an ordered model, plus the
// structural invariants (power-of-two capacity, load bound, slot placement,
// exact count) after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: ChainedHashMap<String, i32> = ChainedHashMap::new();
        run(&mut sut, &pool, ops, |s| s.to_string())?;
    }
}

// Key whose hash keeps only two bits, so most keys collide.
#[derive(Clone, Debug)]
struct Crowded(String);
impl Equatable for Crowded {
    fn eq_value(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Hashable for Crowded {
    fn hash_code(&self) -> Result<i64> {
        Ok(self.0.len() as i64 & 3)
    }
}

// Property: same invariants under heavy collisions; equality alone resolves
// entries within a chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let mut sut: ChainedHashMap<Crowded, i32> =
            ChainedHashMap::with_capacity_and_load_factor(1, 1.0).unwrap();
        run(&mut sut, &pool, ops, |s| Crowded(s.to_string()))?;
    }
}

// Property: equal maps hash equal no matter the insertion order or
// starting capacity.
proptest! {
    #[test]
    fn prop_hash_is_order_independent(keys in proptest::collection::btree_set(any::<i64>(), 0..40), cap in 1usize..64) {
        let forward: Vec<i64> = keys.iter().copied().collect();
        let mut a = ChainedHashMap::new();
        let mut b = ChainedHashMap::with_capacity(cap).unwrap();
        for &k in &forward {
            a.set(k, k ^ 0x55).unwrap();
        }
        for &k in forward.iter().rev() {
            b.set(k, k ^ 0x55).unwrap();
        }
        prop_assert!(a.eq_value(&b));
        prop_assert_eq!(a.hash_code(), b.hash_code());
        let ka: BTreeSet<i64> = a.keys().copied().collect();
        prop_assert_eq!(ka, keys);
    }
}

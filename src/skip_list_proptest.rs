#![cfg(test)]

use crate::skip_list::{SetOutcome, SkipList, SkipListOptions};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Set(i16, u8),
    Replace(i16, u8),
    SetMany(Vec<(i16, u8)>),
    Delete(i16),
    Get(i16),
    Ends,
    Clear,
}

// Narrow key range so deletes and overwrites hit live keys often.
fn arb_op() -> impl Strategy<Value = Op> {
    let key = -40i16..40;
    prop_oneof![
        5 => (key.clone(), any::<u8>()).prop_map(|(k, v)| Op::Set(k, v)),
        1 => (key.clone(), any::<u8>()).prop_map(|(k, v)| Op::Replace(k, v)),
        1 => proptest::collection::vec((key.clone(), any::<u8>()), 0..10).prop_map(Op::SetMany),
        3 => key.clone().prop_map(Op::Delete),
        2 => key.prop_map(Op::Get),
        1 => Just(Op::Ends),
        1 => Just(Op::Clear),
    ]
}

fn arb_options() -> impl Strategy<Value = SkipListOptions> {
    (1usize..=8, 0.05f64..0.95, any::<u64>()).prop_map(|(max_level, prob, seed)| SkipListOptions {
        max_level,
        prob,
        seed: Some(seed),
    })
}

// Property: for any options and op sequence the list agrees with a BTreeMap
// on every answer, enumerates the same pairs in the same order, and keeps
// the per-level ordering and nesting invariants.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_btree_model(options in arb_options(), ops in proptest::collection::vec(arb_op(), 1..120)) {
        let mut sut: SkipList<i16, u8> = SkipList::with_options(options).unwrap();
        let mut model: BTreeMap<i16, u8> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    let expect = if model.insert(k, v).is_some() {
                        SetOutcome::Overwrite
                    } else {
                        SetOutcome::Inserted
                    };
                    prop_assert_eq!(sut.set(k, v), Ok(expect));
                }
                Op::Replace(k, v) => {
                    prop_assert_eq!(sut.replace(k, v), Ok(model.insert(k, v)));
                }
                Op::SetMany(pairs) => {
                    sut.set_many(pairs.iter().copied()).unwrap();
                    model.extend(pairs);
                }
                Op::Delete(k) => {
                    prop_assert_eq!(sut.delete(&k), Ok(model.remove_entry(&k)));
                }
                Op::Get(k) => {
                    prop_assert_eq!(sut.try_get(&k), Ok(model.get(&k)));
                    prop_assert_eq!(sut.has(&k), Ok(model.contains_key(&k)));
                }
                Op::Ends => {
                    prop_assert_eq!(sut.first(), model.iter().next());
                    prop_assert_eq!(sut.last(), model.iter().next_back());
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                    prop_assert_eq!(sut.level(), 1);
                }
            }

            sut.check_invariants();
            prop_assert_eq!(sut.len(), model.len());
            prop_assert!(sut.level() <= options.max_level);
            let got: Vec<(i16, u8)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
            let want: Vec<(i16, u8)> = model.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(got, want);
        }
    }
}

// Property: random_level stays within [1, max_level].
proptest! {
    #[test]
    fn prop_random_level_in_range(options in arb_options()) {
        let mut list: SkipList<i32, ()> = SkipList::with_options(options).unwrap();
        for _ in 0..256 {
            let l = list.random_level();
            prop_assert!(l >= 1 && l <= options.max_level);
        }
    }
}

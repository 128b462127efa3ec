#![cfg(test)]

// Property tests for IntSet against a BTreeSet model.

use crate::intset::{Encoding, IntSet};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
enum Op {
    Add(i64),
    Remove(i64),
    Find(i64),
}

// Values cluster around the encoding boundaries so upgrades and narrowing
// are exercised often.
fn arb_value() -> impl Strategy<Value = i64> {
    prop_oneof![
        3 => -300i64..300,
        1 => any::<i16>().prop_map(i64::from),
        1 => any::<i32>().prop_map(i64::from),
        1 => any::<i64>(),
        1 => prop::sample::select(vec![
            i16::MIN as i64 - 1,
            i16::MAX as i64 + 1,
            i32::MIN as i64 - 1,
            i32::MAX as i64 + 1,
            i64::MIN,
            i64::MAX,
        ]),
    ]
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        4 => arb_value().prop_map(Op::Add),
        2 => arb_value().prop_map(Op::Remove),
        1 => arb_value().prop_map(Op::Find),
    ];
    proptest::collection::vec(op, 1..150)
}

fn minimal_encoding(model: &BTreeSet<i64>) -> Encoding {
    model
        .iter()
        .map(|&v| Encoding::of(v))
        .max()
        .unwrap_or(Encoding::Int16)
}

// Property: IntSet mirrors a BTreeSet.
// Invariants exercised across random operation sequences:
// - `add` reports whether the value was new; `find` after `add` is true.
// - Elements are strictly ascending and `get(i)` matches the model order.
// - The encoding is always the narrowest one holding every member.
// - `blob_len` is the header plus `len * width`.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_model(ops in arb_ops()) {
        let mut sut = IntSet::new();
        let mut model = BTreeSet::new();
        for op in ops {
            match op {
                Op::Add(v) => {
                    let added = sut.add(v).unwrap();
                    prop_assert_eq!(added, model.insert(v));
                    prop_assert!(sut.find(v));
                }
                Op::Remove(v) => {
                    prop_assert_eq!(sut.remove(v), model.remove(&v));
                    prop_assert!(!sut.find(v));
                }
                Op::Find(v) => {
                    prop_assert_eq!(sut.find(v), model.contains(&v));
                }
            }
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.encoding(), minimal_encoding(&model));
            prop_assert_eq!(sut.blob_len(), 8 + sut.len() * sut.encoding().width());
            let got: Vec<i64> = sut.iter().collect();
            let want: Vec<i64> = model.iter().copied().collect();
            prop_assert_eq!(&got, &want);
            prop_assert!(got.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(sut.get(sut.len()), None);
        }
    }

    // Property: the blob reproduces values and encoding.
    #[test]
    fn prop_blob_round_trip(values in proptest::collection::vec(arb_value(), 0..64)) {
        let mut s = IntSet::new();
        for v in &values {
            s.add(*v).unwrap();
        }
        let blob = s.to_blob();
        prop_assert_eq!(blob.len(), s.blob_len());
        let back = IntSet::from_blob(&blob).unwrap();
        prop_assert_eq!(back.encoding(), s.encoding());
        prop_assert_eq!(back.iter().collect::<Vec<_>>(), s.iter().collect::<Vec<_>>());
    }
}

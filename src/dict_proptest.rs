#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check the
// bucket arrays directly.

use crate::dict::Dict;
use crate::dict_type::{DefaultType, DictType};
use crate::entry::DictEntry;
use crate::error::DictError;
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

// Pool-indexed operations: indices shrink to earlier keys and op lists
// shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Add(usize, i32),
    Replace(usize, i32),
    Delete(usize),
    Unlink(usize),
    Find(usize),
    AddOrFind(usize),
    Rehash(usize),
    Resize,
    SafeSweep,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Add(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Replace(i, v)),
            2 => idx.clone().prop_map(Op::Delete),
            1 => idx.clone().prop_map(Op::Unlink),
            2 => idx.clone().prop_map(Op::Find),
            1 => idx.clone().prop_map(Op::AddOrFind),
            1 => (0usize..8).prop_map(Op::Rehash),
            1 => Just(Op::Resize),
            1 => Just(Op::SafeSweep),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Descriptor counting destroyed values and optionally collapsing hashes
/// to a few buckets.
struct Counting {
    inner: DefaultType,
    collide: bool,
    freed: Rc<Cell<usize>>,
}

impl DictType<String, i32> for Counting {
    fn hash(&self, key: &String) -> u64 {
        let h = DictType::<String, i32>::hash(&self.inner, key);
        if self.collide {
            h % 3
        } else {
            h
        }
    }

    fn val_destructor(&self, _val: i32) {
        self.freed.set(self.freed.get() + 1);
    }
}

fn keys_of<T: DictType<String, i32>>(d: &Dict<String, i32, T>) -> BTreeSet<String> {
    d.iter().map(|e| e.key().clone()).collect()
}

fn check_structure<T: DictType<String, i32>>(d: &Dict<String, i32, T>) -> Result<(), TestCaseError> {
    let mut total = 0;
    for (t, table) in d.ht.iter().enumerate() {
        prop_assert!(table.size() == 0 || table.size().is_power_of_two());
        let mut n = 0;
        for (b, head) in table.buckets.iter().enumerate() {
            let mut cur = *head;
            while let Some(id) = cur {
                let e: &DictEntry<String, i32> = &d.entries[id];
                prop_assert_eq!(e.hash as usize & table.mask(), b, "entry in wrong bucket");
                if t == 0 {
                    if let Some(idx) = d.rehash_index() {
                        prop_assert!(b >= idx, "entry below rehash index");
                    }
                }
                n += 1;
                cur = e.next;
            }
        }
        prop_assert_eq!(n, table.used);
        total += n;
    }
    prop_assert_eq!(total, d.len());
    prop_assert_eq!(d.entries.len(), d.len());
    if !d.is_rehashing() {
        prop_assert_eq!(d.ht[1].size(), 0);
    }
    Ok(())
}

fn run_scenario(pool: Vec<String>, ops: Vec<Op>, collide: bool) -> Result<(), TestCaseError> {
    let freed = Rc::new(Cell::new(0));
    let ty = Counting {
        inner: DefaultType::new(),
        collide,
        freed: freed.clone(),
    };
    let mut sut: Dict<String, i32, Counting> = Dict::with_type(ty);
    let mut model: HashMap<String, i32> = HashMap::new();
    // Values the model expects the descriptor to have destroyed.
    let mut expected_freed = 0;

    for op in ops {
        match op {
            Op::Add(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match sut.add(k.clone(), v) {
                    Ok(()) => {
                        prop_assert!(!already, "add must fail on duplicate");
                        model.insert(k, v);
                    }
                    Err(DictError::DuplicateKey) => {
                        prop_assert!(already);
                    }
                    Err(e) => return Err(TestCaseError::fail(format!("unexpected {e}"))),
                }
            }
            Op::Replace(i, v) => {
                let k = pool[i].clone();
                let added = sut.replace(k.clone(), v).map_err(|e| TestCaseError::fail(e.to_string()))?;
                let prev = model.insert(k, v);
                prop_assert_eq!(added, prev.is_none());
                if prev.is_some() {
                    expected_freed += 1;
                }
            }
            Op::Delete(i) => {
                let k = &pool[i];
                let removed = sut.delete(k);
                prop_assert_eq!(removed, model.remove(k).is_some());
                if removed {
                    expected_freed += 1;
                }
            }
            Op::Unlink(i) => {
                let k = &pool[i];
                match sut.unlink(k) {
                    Some(e) => {
                        let mv = model.remove(k);
                        prop_assert_eq!(e.val().copied(), mv);
                        prop_assert!(sut.get(k).is_none());
                        sut.free_unlinked_entry(e);
                        expected_freed += 1;
                    }
                    None => {
                        prop_assert!(!model.contains_key(k));
                    }
                }
            }
            Op::Find(i) => {
                let k = &pool[i];
                let found = sut.find(k).and_then(|e| e.val().copied());
                prop_assert_eq!(found, model.get(k).copied());
            }
            Op::AddOrFind(i) => {
                let k = pool[i].clone();
                let e = sut.add_or_find(k.clone()).map_err(|e| TestCaseError::fail(e.to_string()))?;
                match model.get(&k) {
                    Some(&v) => {
                        prop_assert_eq!(e.val().copied(), Some(v));
                    }
                    None => {
                        prop_assert!(e.value().is_empty());
                        e.set_val(0);
                        model.insert(k, 0);
                    }
                }
            }
            Op::Rehash(n) => {
                sut.rehash(n);
            }
            Op::Resize => match sut.resize() {
                Ok(()) | Err(DictError::Rehashing) | Err(DictError::SameSize(_)) => {}
                Err(e) => return Err(TestCaseError::fail(format!("unexpected {e}"))),
            },
            Op::SafeSweep => {
                // Delete every other entry under a safe iterator; the rest
                // must still be visited exactly once.
                let mut it = sut.safe_iterator();
                let mut seen = BTreeSet::new();
                let mut toggle = false;
                while let Some(k) = it.next(&sut).map(|e| e.key().clone()) {
                    prop_assert!(seen.insert(k.clone()), "visited twice");
                    toggle = !toggle;
                    if toggle {
                        prop_assert!(sut.delete(&k));
                        model.remove(&k);
                        expected_freed += 1;
                    }
                }
                sut.release_iterator(it);
                let before: BTreeSet<String> = seen;
                let after = keys_of(&sut);
                prop_assert!(after.is_subset(&before));
            }
        }
        check_structure(&sut)?;
        prop_assert_eq!(sut.len(), model.len());
        let model_keys: BTreeSet<String> = model.keys().cloned().collect();
        prop_assert_eq!(keys_of(&sut), model_keys);
        prop_assert_eq!(freed.get(), expected_freed);
    }

    let live = sut.len();
    drop(sut);
    prop_assert_eq!(freed.get(), expected_freed + live, "drop destroys remaining values");
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `add` rejects duplicates; `replace` reports insert vs update.
// - `delete`/`unlink` parity with the model; unlinked entries are gone.
// - Every entry sits in the bucket its cached hash selects, and nothing
//   remains in ht[0] below the rehash index.
// - The value destructor runs exactly once per destroyed value, including
//   on drop.
// - Safe iteration with deletions never yields an entry twice.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, false)?;
    }

    #[test]
    fn prop_state_machine_colliding((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, true)?;
    }

    // Property: keys present for a whole scan are visited, even when the
    // table grows between cursor calls.
    #[test]
    fn prop_scan_survives_growth(initial in 1u32..200, extra in 0u32..400, step in 1u32..20) {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..initial {
            d.add(i, i).unwrap();
        }
        let mut seen = BTreeSet::new();
        let mut cursor = 0;
        let mut next = initial;
        loop {
            cursor = d.scan(cursor, |e| { seen.insert(*e.key()); });
            for _ in 0..step {
                if next < initial + extra {
                    d.add(next, next).unwrap();
                    next += 1;
                }
            }
            if cursor == 0 {
                break;
            }
        }
        for k in 0..initial {
            prop_assert!(seen.contains(&k), "key {} missed", k);
        }
    }

    // Property: keys present for a whole scan are visited when other keys
    // are deleted and the table shrinks between cursor calls.
    #[test]
    fn prop_scan_survives_shrink(n in 200u32..2000, stride in 5u32..30, per_call in 10usize..80) {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..n {
            d.add(i, i).unwrap();
        }
        d.rehash(usize::MAX);
        let mut victims: Vec<u32> = (0..n).filter(|i| i % stride != 0).collect();
        let mut seen = BTreeSet::new();
        let mut cursor = 0;
        let mut calls = 0u32;
        loop {
            cursor = d.scan(cursor, |e| { seen.insert(*e.key()); });
            calls += 1;
            for _ in 0..per_call {
                if let Some(k) = victims.pop() {
                    prop_assert!(d.delete(&k));
                }
            }
            if calls % 3 == 0 {
                let _ = d.resize();
            }
            if cursor == 0 {
                break;
            }
        }
        for k in (0..n).filter(|i| i % stride == 0) {
            prop_assert!(seen.contains(&k), "key {} missed", k);
        }
    }

    // Property: a resize never loses or duplicates a key.
    #[test]
    fn prop_resize_preserves_keys(n in 0u32..300, keep in 0u32..300) {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..n {
            d.add(i, i).unwrap();
        }
        for i in keep..n {
            d.delete(&i);
        }
        let before: BTreeSet<u32> = d.iter().map(|e| *e.key()).collect();
        d.rehash(usize::MAX);
        let _ = d.resize();
        while !d.rehash(1) {}
        let after: Vec<u32> = d.iter().map(|e| *e.key()).collect();
        prop_assert_eq!(after.len(), before.len());
        prop_assert_eq!(after.into_iter().collect::<BTreeSet<_>>(), before);
    }
}

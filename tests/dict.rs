use kvindex::{
    AddRaw, CaseInsensitiveType, DefaultType, Dict, DictConfig, DictError, DictType, EntryValue,
    ResizeGate,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn add_find_delete_small_table() {
    init_logger();
    let cfg = DictConfig::default().initial_size(4);
    let mut d: Dict<&str, i32> = Dict::with_config(DefaultType::new(), cfg);
    d.add("a", 1).expect("add a");
    d.add("b", 2).expect("add b");
    assert_eq!(d.fetch_value(&"a"), Some(&1));
    assert!(d.delete(&"b"));
    assert!(d.find(&"b").is_none());
    assert!(!d.delete(&"b"), "second delete reports absence");
    assert_eq!(d.len(), 1);
}

#[test]
fn thousand_sequential_keys_finish_rehashing() {
    init_logger();
    let mut d: Dict<u64, u64> = Dict::new();
    for i in 0..1000 {
        d.add(i, i * 2).unwrap();
    }
    assert_eq!(d.len(), 1000);
    assert!(!d.is_rehashing());
    assert_eq!(d.rehash_index(), None);
    assert_eq!(d.slots(), 1024);
    for i in 0..1000 {
        assert_eq!(d.fetch_value(&i), Some(&(i * 2)), "key {} missing", i);
    }
}

#[test]
fn safe_iteration_with_mid_delete() {
    init_logger();
    let mut d: Dict<u32, u32> = Dict::new();
    for i in 0..10 {
        d.add(i, i).unwrap();
    }
    let mut it = d.safe_iterator();
    let mut observed = Vec::new();
    for _ in 0..3 {
        observed.push(*it.next(&d).expect("entry").key());
    }
    // Delete a live entry not yet observed.
    let victim = (0..10).find(|k| !observed.contains(k)).unwrap();
    assert!(d.delete(&victim));
    while let Some(e) = it.next(&d) {
        observed.push(*e.key());
    }
    d.release_iterator(it);

    assert_eq!(observed.len(), 9);
    let set: BTreeSet<u32> = observed.iter().copied().collect();
    assert_eq!(set.len(), 9, "no entry observed twice");
    assert!(!set.contains(&victim));
}

#[test]
fn safe_iterator_defers_rehash_until_release() {
    let mut d: Dict<u32, u32> = Dict::new();
    for i in 0..5 {
        d.add(i, i).unwrap();
    }
    assert!(d.is_rehashing());
    let idx = d.rehash_index();
    let mut it = d.safe_iterator();
    while let Some(e) = it.next(&d) {
        let k = *e.key();
        d.find(&k);
    }
    assert_eq!(d.rehash_index(), idx);
    d.release_iterator(it);
    assert!(d.rehash(100));
}

#[test]
fn destructors_run_on_delete_replace_clear_and_drop() {
    struct Tracking {
        inner: DefaultType,
        keys: Rc<Cell<usize>>,
        vals: Rc<RefCell<Vec<String>>>,
    }
    impl DictType<String, String> for Tracking {
        fn hash(&self, key: &String) -> u64 {
            DictType::<String, String>::hash(&self.inner, key)
        }
        fn key_destructor(&self, _key: String) {
            self.keys.set(self.keys.get() + 1);
        }
        fn val_destructor(&self, val: String) {
            self.vals.borrow_mut().push(val);
        }
    }

    let keys = Rc::new(Cell::new(0));
    let vals = Rc::new(RefCell::new(Vec::new()));
    let ty = Tracking {
        inner: DefaultType::new(),
        keys: keys.clone(),
        vals: vals.clone(),
    };
    let mut d: Dict<String, String, Tracking> = Dict::with_type(ty);
    for i in 0..6 {
        d.add(format!("k{i}"), format!("v{i}")).unwrap();
    }

    assert!(!d.replace("k0".to_string(), "new".to_string()).unwrap());
    assert_eq!(*vals.borrow(), vec!["v0".to_string()]);
    assert_eq!(d.fetch_value(&"k0".to_string()).map(String::as_str), Some("new"));

    assert!(d.delete(&"k1".to_string()));
    assert_eq!(keys.get(), 1);

    let e = d.unlink(&"k2".to_string()).expect("present");
    assert_eq!(keys.get(), 1, "unlink does not destroy");
    d.free_unlinked_entry(e);
    assert_eq!(keys.get(), 2);

    d.clear();
    assert_eq!(keys.get(), 6);
    assert_eq!(vals.borrow().len(), 7);
    assert!(d.is_empty());

    d.add("x".to_string(), "y".to_string()).unwrap();
    drop(d);
    assert_eq!(keys.get(), 7);
    assert_eq!(vals.borrow().len(), 8);
}

#[test]
fn numeric_payloads_bypass_value_destructor() {
    let mut d: Dict<&str, String> = Dict::new();
    match d.add_raw("counter").unwrap() {
        AddRaw::Added(e) => {
            e.set_signed_integer_val(-5);
        }
        AddRaw::Existing(_) => unreachable!(),
    }
    d.add_or_find("ratio").unwrap().set_double_val(0.25);
    d.add_or_find("count").unwrap().set_unsigned_integer_val(3);
    assert_eq!(d.get(&"counter").unwrap().signed_integer_val(), Some(-5));
    assert_eq!(d.get(&"ratio").unwrap().double_val(), Some(0.25));
    assert_eq!(d.get(&"count").unwrap().unsigned_integer_val(), Some(3));
    assert_eq!(d.get(&"count").unwrap().value(), &EntryValue::Unsigned(3));
    assert_eq!(d.fetch_value(&"counter"), None, "no owned value stored");
}

#[test]
fn case_insensitive_keys_collapse() {
    let mut d: Dict<String, u32, CaseInsensitiveType> = Dict::with_type(CaseInsensitiveType::new());
    d.add("Content-Type".into(), 1).unwrap();
    assert_eq!(
        d.add("content-type".into(), 2),
        Err(DictError::DuplicateKey)
    );
    assert!(d.contains_key(&"CONTENT-TYPE".to_string()));
    assert_eq!(d.len(), 1);
}

#[test]
fn shared_gate_defers_growth_across_tables() {
    let gate = ResizeGate::new();
    let cfg = DictConfig::default().resize_gate(gate.clone());
    let mut a: Dict<u32, ()> = Dict::with_config(DefaultType::new(), cfg.clone());
    let mut b: Dict<u32, ()> = Dict::with_config(DefaultType::new(), cfg);
    a.disable_resize();
    assert!(!gate.is_enabled());
    for i in 0..20 {
        a.add(i, ()).unwrap();
        b.add(i, ()).unwrap();
    }
    assert_eq!(a.slots(), 4);
    assert_eq!(b.slots(), 4);
    assert_eq!(b.resize(), Err(DictError::ResizeDisabled));
    b.enable_resize();
    b.add(20, ()).unwrap();
    assert!(b.is_rehashing());
}

#[test]
fn rehash_for_milliseconds_with_mock_clock() {
    init_logger();
    let (clock, mock) = quanta::Clock::mock();
    let cfg = DictConfig::default().clock(clock);
    let mut d: Dict<u32, u32> = Dict::with_config(DefaultType::new(), cfg);
    for i in 0..5000 {
        d.add(i, i).unwrap();
    }
    d.rehash(usize::MAX);
    for i in 0..4990 {
        d.delete(&i);
    }
    d.resize().unwrap();
    assert!(d.is_rehashing());

    // Time stands still, so the budget never runs out before completion.
    mock.increment(Duration::from_millis(1));
    let steps = d.rehash_for_milliseconds(1);
    assert_eq!(steps % 100, 0);
    assert!(!d.is_rehashing());
    assert_eq!(d.len(), 10);
    assert_eq!(d.rehash_for_milliseconds(1), 0, "nothing left to do");
}

#[test]
fn rehash_for_milliseconds_stops_when_budget_runs_out() {
    init_logger();
    let mut d: Dict<u32, u32> = Dict::new();
    for i in 0..200_000 {
        d.add(i, i).unwrap();
    }
    d.rehash(usize::MAX);
    for i in 1_000..200_000 {
        d.delete(&i);
    }
    d.resize().unwrap();
    assert!(d.is_rehashing());

    // A zero budget is spent by the first batch, far short of the old table.
    let steps = d.rehash_for_milliseconds(0);
    assert_eq!(steps, 100);
    assert!(d.is_rehashing());

    // The rehash resumes where the budget cut it off.
    assert!(d.rehash(usize::MAX));
    assert!(!d.is_rehashing());
    assert_eq!(d.len(), 1_000);
    for i in 0..1_000 {
        assert_eq!(d.fetch_value(&i), Some(&i), "key {} lost", i);
    }
}

#[test]
fn random_sampling_is_deterministic_per_seed() {
    let mut d: Dict<u32, u32> = Dict::new();
    for i in 0..200 {
        d.add(i, i).unwrap();
    }
    let pick = |d: &mut Dict<u32, u32>, seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        let one = *d.random_key(&mut rng).unwrap().key();
        let some: Vec<u32> = d
            .get_some_keys(20, &mut rng)
            .into_iter()
            .map(|e| *e.key())
            .collect();
        (one, some)
    };
    d.rehash(usize::MAX);
    let (one, some) = pick(&mut d, 42);
    assert!(one < 200);
    assert!(!some.is_empty() && some.len() <= 20);
    let distinct: BTreeSet<u32> = some.iter().copied().collect();
    assert_eq!(distinct.len(), some.len());
    assert_eq!(pick(&mut d, 42), (one, some));
}

#[test]
fn get_some_keys_caps_at_len() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut d: Dict<u32, u32> = Dict::new();
    assert!(d.get_some_keys(5, &mut rng).is_empty());
    assert!(d.random_key(&mut rng).is_none());
    for i in 0..3 {
        d.add(i, i).unwrap();
    }
    let got: BTreeSet<u32> = d
        .get_some_keys(10, &mut rng)
        .into_iter()
        .map(|e| *e.key())
        .collect();
    assert!(got.len() <= 3);
    assert!(got.iter().all(|k| *k < 3));
}

#[test]
fn scan_under_insertions_visits_initial_keys() {
    let mut d: Dict<u32, u32> = Dict::new();
    for i in 0..64 {
        d.add(i, i).unwrap();
    }
    let mut seen = HashMap::new();
    let mut cursor = 0;
    let mut next = 64;
    loop {
        cursor = d.scan(cursor, |e| {
            *seen.entry(*e.key()).or_insert(0) += 1;
        });
        for _ in 0..7 {
            d.add(next, next).unwrap();
            next += 1;
        }
        if cursor == 0 {
            break;
        }
    }
    for k in 0..64 {
        assert!(seen.contains_key(&k), "key {} not visited", k);
    }
}

#[test]
fn stats_report_mentions_both_tables_while_rehashing() {
    let mut d: Dict<u32, u32> = Dict::new();
    for i in 0..9 {
        d.add(i, i).unwrap();
    }
    assert!(d.is_rehashing());
    let report = d.stats().to_string();
    assert!(report.contains("Hash table 0 stats (main hash table):"));
    assert!(report.contains("Hash table 1 stats (rehashing target):"));
    assert!(report.contains(" Chain length distribution:"));
}
